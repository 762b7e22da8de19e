// 🔗 Boundary Joiner - tenures × observations at the start and end years
//
// start_matches = tenure ⋈ obs on (country, start_year = year)
// end_matches   = tenure ⋈ obs on (country, end_year = year)
// result        = distinct(start_matches ∪ end_matches), sorted by
//                 (country, start_date, entity_name)
//
// Inner-join semantics: a tenure with no observation at either boundary year
// contributes no rows.

use crate::deduplication::{float_key, DeduplicationEngine, RowIdentity};
use crate::tables::{IndicatorColumn, IndicatorTable, ObservationRow, Tenure};
use crate::temporal::ObservationIndex;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

// ============================================================================
// CONSOLIDATED RECORD
// ============================================================================

/// A tenure enriched with the indicator row observed at one boundary year
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidatedRecord {
    pub tenure: Tenure,

    /// Year of the matched observation (the tenure's start or end year)
    pub year: i32,

    /// One slot per table column; None = not measured that year
    pub values: Vec<Option<f64>>,
}

impl ConsolidatedRecord {
    fn from_match(tenure: &Tenure, row: &ObservationRow) -> Self {
        ConsolidatedRecord {
            tenure: tenure.clone(),
            year: row.year,
            values: row.values.clone(),
        }
    }
}

impl RowIdentity for ConsolidatedRecord {
    type Key = (String, String, NaiveDate, NaiveDate, i32, i32, i32, Vec<Option<u64>>);

    fn identity(&self) -> Self::Key {
        let t = &self.tenure;
        (
            t.entity_name.clone(),
            t.country.clone(),
            t.start_date,
            t.end_date,
            t.start_year,
            t.end_year,
            self.year,
            self.values.iter().map(|v| float_key(*v)).collect(),
        )
    }
}

// ============================================================================
// CONSOLIDATED TABLE
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsolidatedTable {
    pub columns: Vec<IndicatorColumn>,
    pub rows: Vec<ConsolidatedRecord>,
    pub stats: JoinStats,
}

/// Counters describing one join, for logging and display
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinStats {
    pub start_matches: usize,
    pub end_matches: usize,
    pub collapsed_duplicates: usize,
    pub unmatched_tenures: usize,
}

impl ConsolidatedTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Indicator column labels, in value-slot order
    pub fn labels(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.label.as_str()).collect()
    }
}

// ============================================================================
// BOUNDARY JOINER
// ============================================================================

pub struct BoundaryJoiner {
    dedup: DeduplicationEngine,
}

impl BoundaryJoiner {
    pub fn new() -> Self {
        BoundaryJoiner {
            dedup: DeduplicationEngine::new(),
        }
    }

    /// Join normalized tenures to the indicator table at both boundary years
    pub fn join(&self, tenures: &[Tenure], table: &IndicatorTable) -> ConsolidatedTable {
        let index = ObservationIndex::build(table);

        let start_matches = boundary_matches(tenures, &index, |t| t.start_year);
        let end_matches = boundary_matches(tenures, &index, |t| t.end_year);

        let unmatched_tenures = tenures
            .iter()
            .filter(|t| {
                index.count_in_range(&t.country, t.start_year..=t.start_year) == 0
                    && index.count_in_range(&t.country, t.end_year..=t.end_year) == 0
            })
            .count();

        let mut stats = JoinStats {
            start_matches: start_matches.len(),
            end_matches: end_matches.len(),
            unmatched_tenures,
            ..JoinStats::default()
        };

        let mut union = start_matches;
        union.extend(end_matches);

        let outcome = self.dedup.collapse_exact(union);
        stats.collapsed_duplicates = outcome.collapsed;

        let mut rows = outcome.rows;
        rows.sort_by(|a, b| {
            a.tenure
                .country
                .cmp(&b.tenure.country)
                .then(a.tenure.start_date.cmp(&b.tenure.start_date))
                .then(a.tenure.entity_name.cmp(&b.tenure.entity_name))
        });

        debug!(
            rows = rows.len(),
            start_matches = stats.start_matches,
            end_matches = stats.end_matches,
            collapsed = stats.collapsed_duplicates,
            unmatched = stats.unmatched_tenures,
            "boundary join complete"
        );

        ConsolidatedTable {
            columns: table.columns().to_vec(),
            rows,
            stats,
        }
    }
}

impl Default for BoundaryJoiner {
    fn default() -> Self {
        Self::new()
    }
}

/// Inner join of every tenure with the rows at the year `boundary` picks
fn boundary_matches<F>(tenures: &[Tenure], index: &ObservationIndex<'_>, boundary: F) -> Vec<ConsolidatedRecord>
where
    F: Fn(&Tenure) -> i32 + Sync,
{
    let per_tenure = |tenure: &Tenure| -> Vec<ConsolidatedRecord> {
        index
            .at_year(&tenure.country, boundary(tenure))
            .map(|row| ConsolidatedRecord::from_match(tenure, row))
            .collect()
    };

    #[cfg(feature = "parallel")]
    let nested: Vec<Vec<ConsolidatedRecord>> = tenures.par_iter().map(per_tenure).collect();

    #[cfg(not(feature = "parallel"))]
    let nested: Vec<Vec<ConsolidatedRecord>> = tenures.iter().map(per_tenure).collect();

    nested.into_iter().flatten().collect()
}

// ============================================================================
// TESTS
// ============================================================================
