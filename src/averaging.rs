// 📊 Tenure Averager - per-indicator mean over a tenure's year span
//
// For a tenure in country C covering [Y0, Y1]:
//   R    = { obs : obs.country == C and Y0 <= obs.year <= Y1 }
//   mean = sum / count over the rows of R where that indicator is present
//
// Each indicator is averaged over its own observed years. No observed value
// in range means the average is absent (None), never zero.

use crate::tables::{IndicatorColumn, IndicatorTable, ObservationRow, Tenure};
use crate::temporal::ObservationIndex;
use serde::{Deserialize, Serialize, Serializer};
use tracing::debug;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Prefix applied to averaged indicator column labels
pub const AVERAGE_PREFIX: &str = "Avg.";

// ============================================================================
// TENURE AVERAGE
// ============================================================================

/// A tenure with each indicator replaced by its mean over the tenure's years
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenureAverage {
    pub tenure: Tenure,

    /// One slot per table column; None = undefined (nothing observed in range)
    pub averages: Vec<Option<f64>>,

    /// Observation rows that fell inside the year span
    pub observed_rows: usize,
}

impl TenureAverage {
    /// True when no observation row fell inside the span at all
    pub fn is_undefined(&self) -> bool {
        self.observed_rows == 0
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AverageTable {
    /// Serialized with presentation labels ("Avg. ...")
    #[serde(serialize_with = "serialize_average_columns")]
    pub columns: Vec<IndicatorColumn>,
    pub rows: Vec<TenureAverage>,
}

impl AverageTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Presentation labels: "Avg. Inflation Rate", ...
    pub fn labels(&self) -> Vec<String> {
        self.columns.iter().map(|c| average_label(&c.label)).collect()
    }

    /// Tenures whose span held no observations
    pub fn undefined_count(&self) -> usize {
        self.rows.iter().filter(|r| r.is_undefined()).count()
    }
}

pub fn average_label(label: &str) -> String {
    format!("{} {}", AVERAGE_PREFIX, label)
}

fn serialize_average_columns<S: Serializer>(columns: &[IndicatorColumn], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(columns.iter().map(|c| IndicatorColumn {
        code: c.code.clone(),
        label: average_label(&c.label),
    }))
}

// ============================================================================
// TENURE AVERAGER
// ============================================================================

pub struct TenureAverager;

impl TenureAverager {
    pub fn new() -> Self {
        TenureAverager
    }

    /// One output row per tenure, in input order
    pub fn average(&self, tenures: &[Tenure], table: &IndicatorTable) -> AverageTable {
        let index = ObservationIndex::build(table);
        let width = table.columns().len();

        let per_tenure = |tenure: &Tenure| average_one(tenure, &index, width);

        #[cfg(feature = "parallel")]
        let rows: Vec<TenureAverage> = tenures.par_iter().map(per_tenure).collect();

        #[cfg(not(feature = "parallel"))]
        let rows: Vec<TenureAverage> = tenures.iter().map(per_tenure).collect();

        let table = AverageTable {
            columns: table.columns().to_vec(),
            rows,
        };

        debug!(
            tenures = table.len(),
            undefined = table.undefined_count(),
            countries = index.countries(),
            "tenure averages computed"
        );

        table
    }
}

impl Default for TenureAverager {
    fn default() -> Self {
        Self::new()
    }
}

fn average_one(tenure: &Tenure, index: &ObservationIndex<'_>, width: usize) -> TenureAverage {
    let in_span: Vec<&ObservationRow> = index.in_range(&tenure.country, tenure.years()).collect();

    let averages = (0..width)
        .map(|slot| mean_ignoring_absent(in_span.iter().map(|row| row.values[slot])))
        .collect();

    TenureAverage {
        tenure: tenure.clone(),
        averages,
        observed_rows: in_span.len(),
    }
}

/// Mean of the present values; None when nothing is present
pub fn mean_ignoring_absent<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = Option<f64>>,
{
    let (sum, count) = values
        .into_iter()
        .flatten()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));

    (count > 0).then(|| sum / count as f64)
}

// ============================================================================
// TESTS
// ============================================================================
