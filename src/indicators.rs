// 🏷️ Indicator Catalog - source codes → human-readable column labels
// Static rename table, extendable from configuration

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Built-in renames for the time series provider's indicator codes
const BUILTIN_INDICATORS: &[(&str, &str)] = &[
    ("FP.CPI.TOTL.ZG", "Inflation Rate"),
    ("NY.GDP.MKTP.KD.ZG", "GDP Growth"),
    ("NY.GDP.MKTP.CD", "GDP"),
    ("NY.GDP.PCAP.CD", "GDP per Capita"),
    ("SL.UEM.TOTL.ZS", "Unemployment Rate"),
    ("SP.POP.TOTL", "Population"),
    ("SP.POP.GROW", "Population Growth"),
    ("SI.POV.GINI", "Gini Index"),
    ("SI.DST.10TH.10", "Income Share of Top 10%"),
    ("GC.DOD.TOTL.GD.ZS", "Central Government Debt"),
    ("NE.TRD.GNFS.ZS", "Trade"),
    ("BX.KLT.DINV.WD.GD.ZS", "FDI Net Inflows"),
    ("SP.DYN.LE00.IN", "Life Expectancy"),
];

/// IndicatorDefinition - one code and the label presented for it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorDefinition {
    pub code: String,
    pub label: String,
}

/// Registry of indicator renames; unknown codes keep their code as label
#[derive(Debug, Clone)]
pub struct IndicatorCatalog {
    labels: BTreeMap<String, String>,
}

impl IndicatorCatalog {
    /// Create catalog with the built-in renames
    pub fn new() -> Self {
        let labels = BUILTIN_INDICATORS
            .iter()
            .map(|(code, label)| (code.to_string(), label.to_string()))
            .collect();

        IndicatorCatalog { labels }
    }

    /// Built-in renames plus extra ones (extra entries win)
    pub fn with_renames(extra: &BTreeMap<String, String>) -> Self {
        let mut catalog = Self::new();
        for (code, label) in extra {
            catalog.register(code.clone(), label.clone());
        }
        catalog
    }

    pub fn register(&mut self, code: String, label: String) {
        self.labels.insert(code, label);
    }

    /// Label for a code, or the code itself when it is not catalogued
    pub fn label_for<'a>(&'a self, code: &'a str) -> &'a str {
        self.labels.get(code).map(String::as_str).unwrap_or(code)
    }

    pub fn definitions(&self) -> Vec<IndicatorDefinition> {
        self.labels
            .iter()
            .map(|(code, label)| IndicatorDefinition {
                code: code.clone(),
                label: label.clone(),
            })
            .collect()
    }

    pub fn count(&self) -> usize {
        self.labels.len()
    }
}

impl Default for IndicatorCatalog {
    fn default() -> Self {
        Self::new()
    }
}
