// 🏆 Ranked Record Store - scored heads of state, persisted write-through
//
// Records are created from validated form drafts, deduplicated on
// (name, derived growth) and removed by name with explicit disambiguation.

pub mod codec;
pub mod store;

pub use store::{RankingStore, StoreOptions};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default logical key of the ranking list in the object store
pub const DEFAULT_STORE_KEY: &str = "head_of_state_data.csv";

/// Default decimals kept for numeric fields in durable storage
pub const DEFAULT_DECIMALS: usize = 4;

// ============================================================================
// SCHEMA
// ============================================================================

/// An extra numeric column carried by every record, with optional bounds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuxiliaryField {
    pub name: String,

    #[serde(default)]
    pub min: Option<f64>,

    #[serde(default)]
    pub max: Option<f64>,
}

impl AuxiliaryField {
    pub fn new(name: impl Into<String>, min: Option<f64>, max: Option<f64>) -> Self {
        AuxiliaryField {
            name: name.into(),
            min,
            max,
        }
    }

    pub fn admits(&self, value: f64) -> bool {
        self.min.is_none_or(|min| value >= min) && self.max.is_none_or(|max| value <= max)
    }
}

/// Column labels of the durable table plus the auxiliary fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingSchema {
    pub name_label: String,
    pub start_date_label: String,
    pub end_date_label: String,
    pub start_value_label: String,
    pub end_value_label: String,
    pub growth_label: String,
    pub auxiliary: Vec<AuxiliaryField>,
}

impl Default for RankingSchema {
    fn default() -> Self {
        RankingSchema {
            name_label: "Name".to_string(),
            start_date_label: "Start Date".to_string(),
            end_date_label: "End Date".to_string(),
            start_value_label: "GDP Start".to_string(),
            end_value_label: "GDP End".to_string(),
            growth_label: "GDP Growth".to_string(),
            auxiliary: vec![
                AuxiliaryField::new("Unemployment", Some(0.0), Some(100.0)),
                AuxiliaryField::new("Population", Some(0.0), None),
                AuxiliaryField::new("Inequality", Some(0.0), None),
            ],
        }
    }
}

impl RankingSchema {
    /// Header row in storage order
    pub fn headers(&self) -> Vec<&str> {
        let mut headers = vec![
            self.name_label.as_str(),
            self.start_date_label.as_str(),
            self.end_date_label.as_str(),
            self.start_value_label.as_str(),
            self.end_value_label.as_str(),
            self.growth_label.as_str(),
        ];
        headers.extend(self.auxiliary.iter().map(|f| f.name.as_str()));
        headers
    }

    pub fn auxiliary_field(&self, name: &str) -> Option<&AuxiliaryField> {
        self.auxiliary.iter().find(|f| f.name == name)
    }
}

// ============================================================================
// GROWTH FORMULA
// ============================================================================

/// How derived growth is computed from the raw start/end values
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GrowthFormula {
    /// (end - start) / start; undefined when start is zero
    #[default]
    Ratio,

    /// end - start
    Difference,

    /// Caller-supplied formula; None means "undefined for these inputs"
    #[serde(skip)]
    Custom(fn(f64, f64) -> Option<f64>),
}

impl GrowthFormula {
    /// Apply the formula; non-finite results count as undefined
    pub fn apply(&self, start: f64, end: f64) -> Option<f64> {
        let growth = match self {
            GrowthFormula::Ratio => {
                if start == 0.0 {
                    return None;
                }
                (end - start) / start
            }
            GrowthFormula::Difference => end - start,
            GrowthFormula::Custom(f) => f(start, end)?,
        };

        growth.is_finite().then_some(growth)
    }
}

// ============================================================================
// RECORDS
// ============================================================================

/// Form submission; any field may be missing until validated
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordDraft {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub start_date: Option<NaiveDate>,

    #[serde(default)]
    pub end_date: Option<NaiveDate>,

    #[serde(default)]
    pub start_value: Option<f64>,

    #[serde(default)]
    pub end_value: Option<f64>,

    /// Auxiliary values by field name; a missing key is a missing value
    #[serde(default)]
    pub auxiliary: BTreeMap<String, f64>,
}

impl RecordDraft {
    /// Draft with every core field filled in
    pub fn complete(
        name: impl Into<String>,
        start_date: NaiveDate,
        end_date: NaiveDate,
        start_value: f64,
        end_value: f64,
    ) -> Self {
        RecordDraft {
            name: Some(name.into()),
            start_date: Some(start_date),
            end_date: Some(end_date),
            start_value: Some(start_value),
            end_value: Some(end_value),
            auxiliary: BTreeMap::new(),
        }
    }

    /// Builder pattern: add an auxiliary value
    pub fn with_auxiliary(mut self, name: impl Into<String>, value: f64) -> Self {
        self.auxiliary.insert(name.into(), value);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuxiliaryValue {
    pub name: String,

    /// None only for records loaded from data written before the field existed
    pub value: Option<f64>,
}

/// A stored entry of the ranking list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedRecord {
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub start_value: f64,
    pub end_value: f64,
    pub derived_growth: f64,
    pub auxiliary: Vec<AuxiliaryValue>,

    /// Stored columns this schema does not know, as raw (column, cell) text.
    /// Written back untouched so a narrower session never drops them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra: Vec<(String, String)>,
}

impl RankedRecord {
    pub fn auxiliary_value(&self, name: &str) -> Option<f64> {
        self.auxiliary
            .iter()
            .find(|a| a.name == name)
            .and_then(|a| a.value)
    }

    /// Uniqueness key: same name and same derived growth
    pub fn same_entry(&self, name: &str, derived_growth: f64) -> bool {
        self.name == name && self.derived_growth == derived_growth
    }

    /// Table view: raw start/end values dropped, numbers at two decimals
    pub fn display_record(&self) -> DisplayRecord {
        DisplayRecord {
            name: self.name.clone(),
            start_date: self.start_date,
            end_date: self.end_date,
            growth: round_to(self.derived_growth, 2),
            auxiliary: self
                .auxiliary
                .iter()
                .map(|a| AuxiliaryValue {
                    name: a.name.clone(),
                    value: a.value.map(|v| round_to(v, 2)),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayRecord {
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub growth: f64,
    pub auxiliary: Vec<AuxiliaryValue>,
}

/// Round to `decimals` places exactly as the storage text format would
pub fn round_to(value: f64, decimals: usize) -> f64 {
    format!("{:.*}", decimals, value).parse().unwrap_or(value)
}
