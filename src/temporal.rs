// ⏰ Temporal Index - observations by country, sorted by year
//
// Built once per indicator table. Boundary lookups and year-range scans are
// binary searches over a country's year-sorted rows, never full-table scans.
// Year comparison is integer comparison throughout.

use crate::tables::{IndicatorTable, ObservationRow};
use std::collections::HashMap;
use std::ops::RangeInclusive;

/// country → row indices into the table, ordered by year (ties keep table order)
#[derive(Debug)]
pub struct ObservationIndex<'t> {
    table: &'t IndicatorTable,
    by_country: HashMap<&'t str, Vec<usize>>,
}

impl<'t> ObservationIndex<'t> {
    pub fn build(table: &'t IndicatorTable) -> Self {
        let mut by_country: HashMap<&'t str, Vec<usize>> = HashMap::new();

        for (i, row) in table.rows().iter().enumerate() {
            by_country.entry(row.country.as_str()).or_default().push(i);
        }

        let rows = table.rows();
        for indices in by_country.values_mut() {
            // Stable sort: duplicate (country, year) rows stay in table order
            indices.sort_by_key(|&i| rows[i].year);
        }

        ObservationIndex { table, by_country }
    }

    pub fn table(&self) -> &'t IndicatorTable {
        self.table
    }

    /// Rows for `country` observed exactly in `year`
    pub fn at_year(&self, country: &str, year: i32) -> impl Iterator<Item = &'t ObservationRow> + '_ {
        self.in_range(country, year..=year)
    }

    /// Rows for `country` with `start <= year <= end`, in year order
    pub fn in_range(
        &self,
        country: &str,
        years: RangeInclusive<i32>,
    ) -> impl Iterator<Item = &'t ObservationRow> + '_ {
        let rows: &'t [ObservationRow] = self.table.rows();
        let slice = self.range_slice(country, years);
        slice.iter().map(move |&i| &rows[i])
    }

    /// Number of rows for `country` inside `years`
    pub fn count_in_range(&self, country: &str, years: RangeInclusive<i32>) -> usize {
        self.range_slice(country, years).len()
    }

    pub fn countries(&self) -> usize {
        self.by_country.len()
    }

    fn range_slice(&self, country: &str, years: RangeInclusive<i32>) -> &[usize] {
        let Some(indices) = self.by_country.get(country) else {
            return &[];
        };
        if years.is_empty() {
            return &[];
        }

        let rows = self.table.rows();
        let (start, end) = (*years.start(), *years.end());
        let lo = indices.partition_point(|&i| rows[i].year < start);
        let hi = indices.partition_point(|&i| rows[i].year <= end);

        &indices[lo..hi]
    }
}
