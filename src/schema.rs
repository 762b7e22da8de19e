// 📐 Shape Layer - Record Draft Validation
// Checks a form submission against the ranking schema before anything is stored

use crate::ranking::{RankingSchema, RecordDraft};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// VALIDATION RESULT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Problem {
    /// Field was not supplied
    Missing,
    /// Start date after end date
    DateOrder,
    /// Value outside the field's bounds
    OutOfRange,
    /// Field name is not part of the schema
    Unknown,
    /// Derived value cannot be computed from the inputs (e.g. ratio over zero)
    Undefined,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub problem: Problem,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, problem: Problem, message: impl Into<String>) -> Self {
        FieldError {
            field: field.to_string(),
            problem,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Every problem found in one draft
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationErrors(pub Vec<FieldError>);

impl ValidationErrors {
    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }

    pub fn has(&self, problem: Problem) -> bool {
        self.0.iter().any(|e| e.problem == problem)
    }

    /// Start date after end date was among the problems
    pub fn is_date_order(&self) -> bool {
        self.has(Problem::DateOrder)
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|e| e.to_string()).collect();
        write!(f, "{}", parts.join("; "))
    }
}

/// A draft with every field present and in range
#[derive(Debug, Clone, PartialEq)]
pub struct ValidDraft {
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub start_value: f64,
    pub end_value: f64,
    /// In schema order
    pub auxiliary: Vec<(String, f64)>,
}

// ============================================================================
// SCHEMA VALIDATOR
// ============================================================================

pub struct SchemaValidator<'s> {
    schema: &'s RankingSchema,
}

impl<'s> SchemaValidator<'s> {
    pub fn new(schema: &'s RankingSchema) -> Self {
        SchemaValidator { schema }
    }

    /// Validate a draft; date order is reported first, then completeness
    /// and ranges, all problems together
    pub fn validate(&self, draft: &RecordDraft) -> Result<ValidDraft, ValidationErrors> {
        let schema = self.schema;
        let mut errors = Vec::new();

        if let (Some(start), Some(end)) = (draft.start_date, draft.end_date) {
            if start > end {
                errors.push(FieldError::new(
                    &schema.start_date_label,
                    Problem::DateOrder,
                    format!("start date {} is after end date {}", start, end),
                ));
            }
        }

        let name = draft
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty());
        if name.is_none() {
            errors.push(missing(&schema.name_label));
        }
        if draft.start_date.is_none() {
            errors.push(missing(&schema.start_date_label));
        }
        if draft.end_date.is_none() {
            errors.push(missing(&schema.end_date_label));
        }

        check_non_negative(&schema.start_value_label, draft.start_value, &mut errors);
        check_non_negative(&schema.end_value_label, draft.end_value, &mut errors);

        let auxiliary = self.check_auxiliary(&draft.auxiliary, &mut errors);

        if !errors.is_empty() {
            return Err(ValidationErrors(errors));
        }

        // All Options were checked above
        match (name, draft.start_date, draft.end_date, draft.start_value, draft.end_value) {
            (Some(name), Some(start_date), Some(end_date), Some(start_value), Some(end_value)) => {
                Ok(ValidDraft {
                    name: name.to_string(),
                    start_date,
                    end_date,
                    start_value,
                    end_value,
                    auxiliary,
                })
            }
            _ => Err(ValidationErrors(vec![missing(&schema.name_label)])),
        }
    }

    fn check_auxiliary(&self, supplied: &BTreeMap<String, f64>, errors: &mut Vec<FieldError>) -> Vec<(String, f64)> {
        let mut values = Vec::with_capacity(self.schema.auxiliary.len());

        for field in &self.schema.auxiliary {
            match supplied.get(&field.name) {
                None => errors.push(missing(&field.name)),
                Some(&v) if !v.is_finite() || !field.admits(v) => errors.push(FieldError::new(
                    &field.name,
                    Problem::OutOfRange,
                    format!("{} is outside {}", v, describe_bounds(field.min, field.max)),
                )),
                Some(&v) => values.push((field.name.clone(), v)),
            }
        }

        for name in supplied.keys() {
            if self.schema.auxiliary_field(name).is_none() {
                errors.push(FieldError::new(name, Problem::Unknown, "not a field of this ranking"));
            }
        }

        values
    }
}

fn missing(field: &str) -> FieldError {
    FieldError::new(field, Problem::Missing, "Required field is empty")
}

fn check_non_negative(field: &str, value: Option<f64>, errors: &mut Vec<FieldError>) {
    match value {
        None => errors.push(missing(field)),
        Some(v) if !v.is_finite() || v < 0.0 => errors.push(FieldError::new(
            field,
            Problem::OutOfRange,
            format!("{} must be a number >= 0", v),
        )),
        Some(_) => {}
    }
}

fn describe_bounds(min: Option<f64>, max: Option<f64>) -> String {
    match (min, max) {
        (Some(lo), Some(hi)) => format!("[{}, {}]", lo, hi),
        (Some(lo), None) => format!(">= {}", lo),
        (None, Some(hi)) => format!("<= {}", hi),
        (None, None) => "finite numbers".to_string(),
    }
}

// ============================================================================
// TESTS
// ============================================================================
