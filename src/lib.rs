// Tenure Metrics - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod error;
pub mod tables;
pub mod indicators;
pub mod entities;       // Name Normalizer
pub mod temporal;       // Year-range index over observations
pub mod deduplication;  // Exact-row collapse
pub mod boundary;       // Boundary Joiner
pub mod averaging;      // Tenure Averager
pub mod pipeline;
pub mod export;
pub mod schema;         // Record draft validation
pub mod ranking;        // Ranked Record Store
pub mod storage;        // Blob backends
pub mod config;

// Re-export commonly used types
pub use error::{EngineError, EngineResult, StorageError, StoreError, StoreResult};
pub use tables::{
    IndicatorColumn, IndicatorObservation, IndicatorTable, ObservationRow, Tenure,
    load_indicators, load_indicators_path, load_tenures, load_tenures_path,
    parse_date, parse_year,
};
pub use indicators::{IndicatorCatalog, IndicatorDefinition};
pub use entities::{Country, CountryRegistry};
pub use temporal::ObservationIndex;
pub use deduplication::{DedupOutcome, DeduplicationEngine, RowIdentity};
pub use boundary::{BoundaryJoiner, ConsolidatedRecord, ConsolidatedTable, JoinStats};
pub use averaging::{AverageTable, TenureAverage, TenureAverager, AVERAGE_PREFIX};
pub use pipeline::Inputs;
pub use schema::{FieldError, Problem, SchemaValidator, ValidationErrors};
pub use ranking::{
    AuxiliaryField, AuxiliaryValue, DisplayRecord, GrowthFormula, RankedRecord,
    RankingSchema, RankingStore, RecordDraft, StoreOptions,
};
pub use storage::{BlobStore, FsBlobStore, MemoryBlobStore, SqliteBlobStore};
pub use config::{BackendKind, Config};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
