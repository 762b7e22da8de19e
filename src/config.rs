// ⚙️ Configuration - TOML file, every section defaulted
//
// An empty file (or no file at all) is a valid configuration.

use crate::entities::CountryRegistry;
use crate::error::EngineResult;
use crate::indicators::IndicatorCatalog;
use crate::ranking::{GrowthFormula, RankingSchema, StoreOptions, DEFAULT_DECIMALS, DEFAULT_STORE_KEY};
use crate::storage::{BlobStore, FsBlobStore, MemoryBlobStore, SqliteBlobStore};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Environment variable naming the config file when no flag is given
pub const CONFIG_ENV: &str = "TENURE_METRICS_CONFIG";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data: DataConfig,
    pub normalizer: NormalizerConfig,
    pub indicators: IndicatorsConfig,
    pub store: StoreConfig,
    pub server: ServerConfig,
}

/// Source tables
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub tenures: PathBuf,
    pub indicators: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        DataConfig {
            tenures: PathBuf::from("data/tenures.csv"),
            indicators: PathBuf::from("data/indicators.csv"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Raw country name -> canonical name, merged over the built-in table
    pub aliases: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorsConfig {
    /// Indicator code -> display label, merged over the built-in table
    pub renames: BTreeMap<String, String>,

    /// Keep only these indicator columns, in this order (codes or labels)
    pub select: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Fs,
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: BackendKind,

    /// Directory for the fs backend
    pub root: PathBuf,

    /// Database file for the sqlite backend
    pub path: PathBuf,

    pub key: String,
    pub decimals: usize,
    pub growth: GrowthFormula,
    pub schema: RankingSchema,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            backend: BackendKind::Fs,
            root: PathBuf::from("data/store"),
            path: PathBuf::from("data/rankings.db"),
            key: DEFAULT_STORE_KEY.to_string(),
            decimals: DEFAULT_DECIMALS,
            growth: GrowthFormula::Ratio,
            schema: RankingSchema::default(),
        }
    }
}

impl StoreConfig {
    pub fn options(&self) -> StoreOptions {
        StoreOptions {
            key: self.key.clone(),
            schema: self.schema.clone(),
            decimals: self.decimals,
        }
    }

    /// Open the configured blob backend
    pub fn open_backend(&self) -> Result<Box<dyn BlobStore + Send>> {
        let backend: Box<dyn BlobStore + Send> = match self.backend {
            BackendKind::Fs => Box::new(
                FsBlobStore::new(&self.root)
                    .with_context(|| format!("Failed to open store directory {}", self.root.display()))?,
            ),
            BackendKind::Sqlite => Box::new(
                SqliteBlobStore::open(&self.path)
                    .with_context(|| format!("Failed to open store database {}", self.path.display()))?,
            ),
            BackendKind::Memory => Box::new(MemoryBlobStore::new()),
        };
        Ok(backend)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind: "127.0.0.1:3000".to_string(),
        }
    }
}

impl Config {
    /// Load from `path`, or fall back to defaults when there is none
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            None => Ok(Config::default()),
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config {}", path.display()))?;
                Self::from_toml(&text).with_context(|| format!("Invalid config {}", path.display()))
            }
        }
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn registry(&self) -> EngineResult<CountryRegistry> {
        CountryRegistry::with_aliases(&self.normalizer.aliases)
    }

    pub fn catalog(&self) -> IndicatorCatalog {
        IndicatorCatalog::with_renames(&self.indicators.renames)
    }
}
