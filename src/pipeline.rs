// 🔄 Pipeline - load, normalize, then join or average
//
// raw tenures -> normalizer -> { boundary joiner, tenure averager }

use crate::averaging::{AverageTable, TenureAverager};
use crate::boundary::{BoundaryJoiner, ConsolidatedTable};
use crate::config::Config;
use crate::entities::CountryRegistry;
use crate::error::EngineResult;
use crate::tables::{self, IndicatorTable, Tenure};
use std::io::Read;
use tracing::info;

/// Normalized tenures and the (optionally narrowed) indicator table
#[derive(Debug, Clone)]
pub struct Inputs {
    pub tenures: Vec<Tenure>,
    pub indicators: IndicatorTable,
}

impl Inputs {
    /// Normalize tenure countries once and narrow the indicator columns
    pub fn prepare(
        mut tenures: Vec<Tenure>,
        indicators: IndicatorTable,
        registry: &CountryRegistry,
        select: Option<&[String]>,
    ) -> EngineResult<Self> {
        let renamed = registry.normalize_tenures(&mut tenures);

        let indicators = match select {
            Some(names) => indicators.select(names)?,
            None => indicators,
        };

        info!(
            tenures = tenures.len(),
            renamed,
            observations = indicators.len(),
            indicators = indicators.columns().len(),
            "inputs ready"
        );

        Ok(Inputs { tenures, indicators })
    }

    /// Read both tables from the paths in `config`
    pub fn load(config: &Config) -> EngineResult<Self> {
        let tenures = tables::load_tenures_path(&config.data.tenures)?;
        let indicators = tables::load_indicators_path(&config.data.indicators, &config.catalog())?;
        Self::prepare(
            tenures,
            indicators,
            &config.registry()?,
            config.indicators.select.as_deref(),
        )
    }

    /// Same as `load` but from in-memory readers
    pub fn from_readers<T: Read, I: Read>(tenures: T, indicators: I, config: &Config) -> EngineResult<Self> {
        let tenures = tables::load_tenures(tenures)?;
        let indicators = tables::load_indicators(indicators, &config.catalog())?;
        Self::prepare(
            tenures,
            indicators,
            &config.registry()?,
            config.indicators.select.as_deref(),
        )
    }

    pub fn consolidate(&self) -> ConsolidatedTable {
        BoundaryJoiner::new().join(&self.tenures, &self.indicators)
    }

    pub fn average(&self) -> AverageTable {
        TenureAverager::new().average(&self.tenures, &self.indicators)
    }
}
