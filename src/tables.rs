// 📥 Source Tables - Tenures + wide indicator observations
// Typed rows with named fields; CSV loading with line-accurate errors

use crate::error::{EngineError, EngineResult};
use crate::indicators::IndicatorCatalog;
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use csv::{ReaderBuilder, StringRecord, Trim};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::ops::RangeInclusive;
use std::path::Path;
use tracing::debug;

const TENURE_TABLE: &str = "tenure";
const INDICATOR_TABLE: &str = "indicator";

/// Cell markers that mean "not measured this year"
const ABSENT_MARKERS: &[&str] = &["", "..", "NA", "N/A", "NaN", "nan", "null"];

/// Identifier columns an indicator export may carry besides country/year
const IGNORED_INDICATOR_COLUMNS: &[&str] = &["iso2c", "iso3c", "country code", "country_code"];

// ============================================================================
// TENURE
// ============================================================================

/// One entity holding a role in one country over a date range
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tenure {
    pub entity_name: String,
    pub country: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub start_year: i32,
    pub end_year: i32,
}

impl Tenure {
    /// Build a tenure whose boundary years are taken from its dates
    pub fn new(
        entity_name: impl Into<String>,
        country: impl Into<String>,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Self {
        Tenure {
            entity_name: entity_name.into(),
            country: country.into(),
            start_year: start_date.year(),
            end_year: end_date.year(),
            start_date,
            end_date,
        }
    }

    /// Inclusive span of calendar years covered
    pub fn years(&self) -> RangeInclusive<i32> {
        self.start_year..=self.end_year
    }

    pub fn is_single_year(&self) -> bool {
        self.start_year == self.end_year
    }
}

/// Raw tenure row as it appears in the source export
#[derive(Debug, Deserialize)]
struct RawTenure {
    #[serde(rename = "leader", alias = "entity_name", alias = "entity", alias = "name")]
    leader: String,

    country: String,

    #[serde(rename = "startdate", alias = "start_date")]
    startdate: String,

    #[serde(rename = "enddate", alias = "end_date")]
    enddate: String,

    #[serde(default, rename = "startyear", alias = "start_year")]
    startyear: Option<String>,

    #[serde(default, rename = "endyear", alias = "end_year")]
    endyear: Option<String>,
}

// ============================================================================
// INDICATOR TABLE (wide form)
// ============================================================================

/// One indicator column: source code + human-readable label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorColumn {
    pub code: String,
    pub label: String,
}

/// One (country, year) row with a value slot per indicator column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationRow {
    pub country: String,
    pub year: i32,
    pub values: Vec<Option<f64>>,
}

/// Long-form view of a single cell
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorObservation<'a> {
    pub country: &'a str,
    pub year: i32,
    pub indicator_name: &'a str,
    pub value: Option<f64>,
}

/// Wide indicator table keyed by (country, year)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorTable {
    columns: Vec<IndicatorColumn>,
    rows: Vec<ObservationRow>,
}

impl IndicatorTable {
    /// Build a table, checking every row carries one slot per column
    pub fn new(columns: Vec<IndicatorColumn>, rows: Vec<ObservationRow>) -> EngineResult<Self> {
        for (i, row) in rows.iter().enumerate() {
            if row.values.len() != columns.len() {
                return Err(EngineError::Parse {
                    table: INDICATOR_TABLE,
                    line: i as u64 + 2,
                    column: "*".to_string(),
                    message: format!(
                        "row has {} values but the table has {} indicator columns",
                        row.values.len(),
                        columns.len()
                    ),
                });
            }
        }

        Ok(IndicatorTable { columns, rows })
    }

    pub fn columns(&self) -> &[IndicatorColumn] {
        &self.columns
    }

    pub fn rows(&self) -> &[ObservationRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column position of an indicator, by code or label
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.code == name || c.label == name)
    }

    /// Iterate every cell in long form (country, year, indicator, value)
    pub fn observations(&self) -> impl Iterator<Item = IndicatorObservation<'_>> + '_ {
        self.rows.iter().flat_map(move |row| {
            self.columns
                .iter()
                .zip(row.values.iter())
                .map(move |(column, value)| IndicatorObservation {
                    country: &row.country,
                    year: row.year,
                    indicator_name: &column.label,
                    value: *value,
                })
        })
    }

    /// Project onto a subset of indicators, in the given order
    ///
    /// Lets successive iterations of the same computation change the
    /// indicator set without reloading the source.
    pub fn select(&self, names: &[String]) -> EngineResult<IndicatorTable> {
        let positions = names
            .iter()
            .map(|name| {
                self.column_index(name).ok_or_else(|| EngineError::MissingColumn {
                    table: INDICATOR_TABLE,
                    column: name.clone(),
                })
            })
            .collect::<EngineResult<Vec<usize>>>()?;

        let columns = positions.iter().map(|&i| self.columns[i].clone()).collect();
        let rows = self
            .rows
            .iter()
            .map(|row| ObservationRow {
                country: row.country.clone(),
                year: row.year,
                values: positions.iter().map(|&i| row.values[i]).collect(),
            })
            .collect();

        Ok(IndicatorTable { columns, rows })
    }
}

// ============================================================================
// LOADING
// ============================================================================

/// Load tenures from a CSV export
pub fn load_tenures<R: Read>(reader: R) -> EngineResult<Vec<Tenure>> {
    let mut rdr = ReaderBuilder::new().trim(Trim::All).from_reader(reader);
    let headers = lowercase_headers(rdr.headers()?);

    require_column(&headers, TENURE_TABLE, &["leader", "entity_name", "entity", "name"])?;
    require_column(&headers, TENURE_TABLE, &["country"])?;
    require_column(&headers, TENURE_TABLE, &["startdate", "start_date"])?;
    require_column(&headers, TENURE_TABLE, &["enddate", "end_date"])?;

    let mut tenures = Vec::new();

    for result in rdr.records() {
        let record = result?;
        let line = record_line(&record);
        let raw: RawTenure = record.deserialize(Some(&headers))?;
        tenures.push(tenure_from_raw(raw, line)?);
    }

    debug!(count = tenures.len(), "loaded tenures");
    Ok(tenures)
}

pub fn load_tenures_path(path: &Path) -> EngineResult<Vec<Tenure>> {
    load_tenures(File::open(path)?)
}

/// Load a wide indicator table; every column other than country/year
/// (and known identifier columns) is an indicator, labelled via the catalog
pub fn load_indicators<R: Read>(reader: R, catalog: &IndicatorCatalog) -> EngineResult<IndicatorTable> {
    let mut rdr = ReaderBuilder::new().trim(Trim::All).from_reader(reader);
    let headers = rdr.headers()?.clone();

    let country_idx = find_column(&headers, &["country", "country name", "country_name"])
        .ok_or_else(|| EngineError::MissingColumn {
            table: INDICATOR_TABLE,
            column: "country".to_string(),
        })?;
    let year_idx = find_column(&headers, &["year", "date"]).ok_or_else(|| {
        EngineError::MissingColumn {
            table: INDICATOR_TABLE,
            column: "year".to_string(),
        }
    })?;

    let indicator_positions: Vec<usize> = (0..headers.len())
        .filter(|&i| i != country_idx && i != year_idx)
        .filter(|&i| !IGNORED_INDICATOR_COLUMNS.contains(&headers[i].to_lowercase().as_str()))
        .collect();

    let columns: Vec<IndicatorColumn> = indicator_positions
        .iter()
        .map(|&i| IndicatorColumn {
            code: headers[i].to_string(),
            label: catalog.label_for(&headers[i]).to_string(),
        })
        .collect();

    let mut rows = Vec::new();

    for result in rdr.records() {
        let record = result?;
        let line = record_line(&record);

        let country = record.get(country_idx).unwrap_or_default().to_string();
        let year_cell = record.get(year_idx).unwrap_or_default();
        let year = parse_year(year_cell).ok_or_else(|| EngineError::Parse {
            table: INDICATOR_TABLE,
            line,
            column: headers[year_idx].to_string(),
            message: format!("'{}' is not a year", year_cell),
        })?;

        let values = indicator_positions
            .iter()
            .map(|&i| {
                let cell = record.get(i).unwrap_or_default();
                parse_value(cell).map_err(|message| EngineError::Parse {
                    table: INDICATOR_TABLE,
                    line,
                    column: headers[i].to_string(),
                    message,
                })
            })
            .collect::<EngineResult<Vec<Option<f64>>>>()?;

        rows.push(ObservationRow { country, year, values });
    }

    debug!(rows = rows.len(), indicators = columns.len(), "loaded indicator table");
    IndicatorTable::new(columns, rows)
}

pub fn load_indicators_path(path: &Path, catalog: &IndicatorCatalog) -> EngineResult<IndicatorTable> {
    load_indicators(File::open(path)?, catalog)
}

fn tenure_from_raw(raw: RawTenure, line: u64) -> EngineResult<Tenure> {
    let start_date = parse_date(&raw.startdate).ok_or_else(|| EngineError::Parse {
        table: TENURE_TABLE,
        line,
        column: "startdate".to_string(),
        message: format!("'{}' is not a date", raw.startdate),
    })?;
    let end_date = parse_date(&raw.enddate).ok_or_else(|| EngineError::Parse {
        table: TENURE_TABLE,
        line,
        column: "enddate".to_string(),
        message: format!("'{}' is not a date", raw.enddate),
    })?;

    if start_date > end_date {
        return Err(EngineError::DateOrder {
            line,
            entity: raw.leader,
            start: start_date,
            end: end_date,
        });
    }

    let start_year = year_or_date(raw.startyear.as_deref(), start_date, line, "startyear")?;
    let end_year = year_or_date(raw.endyear.as_deref(), end_date, line, "endyear")?;

    if start_year > end_year {
        return Err(EngineError::Parse {
            table: TENURE_TABLE,
            line,
            column: "startyear".to_string(),
            message: format!("start year {} is after end year {}", start_year, end_year),
        });
    }

    Ok(Tenure {
        entity_name: raw.leader,
        country: raw.country,
        start_date,
        end_date,
        start_year,
        end_year,
    })
}

/// Explicit year column wins; a blank cell falls back to the date's year
fn year_or_date(cell: Option<&str>, date: NaiveDate, line: u64, column: &str) -> EngineResult<i32> {
    match cell.map(str::trim).filter(|c| !c.is_empty()) {
        None => Ok(date.year()),
        Some(c) => parse_year(c).ok_or_else(|| EngineError::Parse {
            table: TENURE_TABLE,
            line,
            column: column.to_string(),
            message: format!("'{}' is not a year", c),
        }),
    }
}

// ============================================================================
// CELL PARSING
// ============================================================================

/// Parse a year that may arrive as "1993" or as a float like "1993.0"
pub fn parse_year(cell: &str) -> Option<i32> {
    let cell = cell.trim();
    if let Ok(year) = cell.parse::<i32>() {
        return Some(year);
    }

    let value = cell.parse::<f64>().ok()?;
    if value.fract() == 0.0 && value.abs() < i32::MAX as f64 {
        Some(value as i32)
    } else {
        None
    }
}

/// Parse date from string (supports YYYY-MM-DD, MM/DD/YYYY and timestamps)
pub fn parse_date(cell: &str) -> Option<NaiveDate> {
    let cell = cell.trim();

    // Try YYYY-MM-DD
    if let Ok(date) = NaiveDate::parse_from_str(cell, "%Y-%m-%d") {
        return Some(date);
    }

    // Try MM/DD/YYYY
    if let Ok(date) = NaiveDate::parse_from_str(cell, "%m/%d/%Y") {
        return Some(date);
    }

    // Try "YYYY-MM-DD HH:MM:SS" as written by dataframe exports
    NaiveDateTime::parse_from_str(cell, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|dt| dt.date())
}

/// Absent markers become None; anything else must be a finite number
fn parse_value(cell: &str) -> Result<Option<f64>, String> {
    if ABSENT_MARKERS.contains(&cell) {
        return Ok(None);
    }

    match cell.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(Some(v)),
        Ok(_) => Err(format!("'{}' is not a finite number", cell)),
        Err(_) => Err(format!("'{}' is not a number", cell)),
    }
}

// ============================================================================
// HEADER HELPERS
// ============================================================================

fn lowercase_headers(headers: &StringRecord) -> StringRecord {
    headers.iter().map(|h| h.to_lowercase()).collect()
}

fn find_column(headers: &StringRecord, names: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|h| names.iter().any(|n| h.eq_ignore_ascii_case(n)))
}

fn require_column(headers: &StringRecord, table: &'static str, names: &[&str]) -> EngineResult<()> {
    match find_column(headers, names) {
        Some(_) => Ok(()),
        None => Err(EngineError::MissingColumn {
            table,
            column: names[0].to_string(),
        }),
    }
}

fn record_line(record: &StringRecord) -> u64 {
    record.position().map(|p| p.line()).unwrap_or(0)
}
