// 🔍 Deduplication Engine - collapse rows identical in every column
// Set semantics after a union: first occurrence survives, order preserved

use std::collections::HashSet;
use std::hash::Hash;

// ============================================================================
// ROW IDENTITY
// ============================================================================

/// Full-row identity: two rows with equal keys are equal in every column
pub trait RowIdentity {
    type Key: Eq + Hash;

    fn identity(&self) -> Self::Key;
}

/// Hashable stand-in for an optional float cell.
///
/// `-0.0` and `0.0` compare equal as values, so they share a key.
pub fn float_key(value: Option<f64>) -> Option<u64> {
    value.map(|v| if v == 0.0 { 0.0f64.to_bits() } else { v.to_bits() })
}

// ============================================================================
// DEDUPLICATION RESULT
// ============================================================================

#[derive(Debug, Clone)]
pub struct DedupOutcome<T> {
    /// Surviving rows in first-seen order
    pub rows: Vec<T>,

    /// How many exact duplicates were dropped
    pub collapsed: usize,
}

// ============================================================================
// DEDUPLICATION ENGINE
// ============================================================================

pub struct DeduplicationEngine;

impl DeduplicationEngine {
    pub fn new() -> Self {
        DeduplicationEngine
    }

    /// Keep the first of every group of identical rows
    pub fn collapse_exact<T: RowIdentity>(&self, rows: Vec<T>) -> DedupOutcome<T> {
        let mut seen = HashSet::with_capacity(rows.len());
        let before = rows.len();

        let rows: Vec<T> = rows
            .into_iter()
            .filter(|row| seen.insert(row.identity()))
            .collect();

        DedupOutcome {
            collapsed: before - rows.len(),
            rows,
        }
    }
}

impl Default for DeduplicationEngine {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================
