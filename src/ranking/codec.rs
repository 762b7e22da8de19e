// CSV codec for the durable ranking list
//
// Header row = schema labels. Auxiliary columns absent from an older blob
// load as None. Columns the schema does not know ride along on each record
// and are written back after the schema's own columns.

use super::{round_to, AuxiliaryValue, RankedRecord, RankingSchema};
use crate::error::{StoreError, StoreResult};
use crate::tables::parse_date;
use csv::{ReaderBuilder, StringRecord, Trim, WriterBuilder};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Serialize records under the schema's header row
pub fn encode(records: &[RankedRecord], schema: &RankingSchema) -> StoreResult<Vec<u8>> {
    let mut headers = schema.headers();
    let known = headers.len();
    for record in records {
        for (column, _) in &record.extra {
            if !headers.contains(&column.as_str()) {
                headers.push(column.as_str());
            }
        }
    }

    let mut wtr = WriterBuilder::new().from_writer(Vec::new());
    wtr.write_record(&headers).map_err(format_error)?;

    for record in records {
        let mut row = vec![
            record.name.clone(),
            record.start_date.format(DATE_FORMAT).to_string(),
            record.end_date.format(DATE_FORMAT).to_string(),
            record.start_value.to_string(),
            record.end_value.to_string(),
            record.derived_growth.to_string(),
        ];
        row.extend(
            schema
                .auxiliary
                .iter()
                .map(|field| record.auxiliary_value(&field.name).map(|v| v.to_string()).unwrap_or_default()),
        );
        row.extend(headers[known..].iter().map(|column| {
            record
                .extra
                .iter()
                .find(|(name, _)| name.as_str() == *column)
                .map(|(_, cell)| cell.clone())
                .unwrap_or_default()
        }));
        wtr.write_record(&row).map_err(format_error)?;
    }

    wtr.into_inner()
        .map_err(|e| StoreError::Format(e.to_string()))
}

/// Parse a blob; numbers are rounded to `decimals` so a fresh load equals the cache
pub fn decode(body: &[u8], schema: &RankingSchema, decimals: usize) -> StoreResult<Vec<RankedRecord>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }

    let mut rdr = ReaderBuilder::new().trim(Trim::All).from_reader(body);
    let headers = rdr.headers().map_err(format_error)?.clone();

    let core = CoreColumns {
        name: required(&headers, &schema.name_label)?,
        start_date: required(&headers, &schema.start_date_label)?,
        end_date: required(&headers, &schema.end_date_label)?,
        start_value: required(&headers, &schema.start_value_label)?,
        end_value: required(&headers, &schema.end_value_label)?,
        growth: required(&headers, &schema.growth_label)?,
    };
    let aux_columns: Vec<(&str, Option<usize>)> = schema
        .auxiliary
        .iter()
        .map(|f| (f.name.as_str(), headers.iter().position(|h| h == f.name)))
        .collect();
    let known = [core.name, core.start_date, core.end_date, core.start_value, core.end_value, core.growth];
    let extra_columns: Vec<usize> = (0..headers.len())
        .filter(|idx| !known.contains(idx) && !aux_columns.iter().any(|&(_, pos)| pos == Some(*idx)))
        .collect();

    let mut records = Vec::new();

    for result in rdr.records() {
        let row = result.map_err(format_error)?;
        let line = row.position().map(|p| p.line()).unwrap_or(0);
        let cell = |idx: usize| row.get(idx).unwrap_or_default();

        let number = |idx: usize| -> StoreResult<f64> {
            cell(idx)
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(|v| round_to(v, decimals))
                .ok_or_else(|| bad_cell(line, &headers[idx], cell(idx), "a number"))
        };
        let date = |idx: usize| {
            parse_date(cell(idx)).ok_or_else(|| bad_cell(line, &headers[idx], cell(idx), "a date"))
        };

        let auxiliary = aux_columns
            .iter()
            .map(|&(name, idx)| {
                let value = match idx.map(cell) {
                    None | Some("") => None,
                    Some(_) => idx.map(number).transpose()?,
                };
                Ok(AuxiliaryValue {
                    name: name.to_string(),
                    value,
                })
            })
            .collect::<StoreResult<Vec<_>>>()?;

        records.push(RankedRecord {
            name: cell(core.name).to_string(),
            start_date: date(core.start_date)?,
            end_date: date(core.end_date)?,
            start_value: number(core.start_value)?,
            end_value: number(core.end_value)?,
            derived_growth: number(core.growth)?,
            auxiliary,
            extra: extra_columns
                .iter()
                .filter(|&&idx| !cell(idx).is_empty())
                .map(|&idx| (headers[idx].to_string(), cell(idx).to_string()))
                .collect(),
        });
    }

    Ok(records)
}

struct CoreColumns {
    name: usize,
    start_date: usize,
    end_date: usize,
    start_value: usize,
    end_value: usize,
    growth: usize,
}

fn required(headers: &StringRecord, label: &str) -> StoreResult<usize> {
    headers
        .iter()
        .position(|h| h == label)
        .ok_or_else(|| StoreError::Format(format!("missing column '{}'", label)))
}

fn bad_cell(line: u64, column: &str, value: &str, expected: &str) -> StoreError {
    StoreError::Format(format!("line {}, column '{}': '{}' is not {}", line, column, value, expected))
}

fn format_error(e: csv::Error) -> StoreError {
    StoreError::Format(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranking::AuxiliaryField;
    use chrono::NaiveDate;

    fn create_test_record(name: &str, growth: f64) -> RankedRecord {
        RankedRecord {
            name: name.to_string(),
            start_date: NaiveDate::from_ymd_opt(2001, 1, 20).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2009, 1, 20).unwrap(),
            start_value: 100.0,
            end_value: 120.5,
            derived_growth: growth,
            auxiliary: vec![
                AuxiliaryValue { name: "Unemployment".into(), value: Some(4.5) },
                AuxiliaryValue { name: "Population".into(), value: Some(280.0) },
                AuxiliaryValue { name: "Inequality".into(), value: None },
            ],
            extra: Vec::new(),
        }
    }

    #[test]
    fn test_header_row_uses_schema_labels() {
        let schema = RankingSchema::default();
        let body = encode(&[create_test_record("Bush", 0.205)], &schema).unwrap();
        let text = String::from_utf8(body).unwrap();
        let mut lines = text.lines();

        assert_eq!(
            lines.next().unwrap(),
            "Name,Start Date,End Date,GDP Start,GDP End,GDP Growth,Unemployment,Population,Inequality"
        );
        assert_eq!(lines.next().unwrap(), "Bush,2001-01-20,2009-01-20,100,120.5,0.205,4.5,280,");
    }

    #[test]
    fn test_decode_reads_back_encoded_records() {
        let schema = RankingSchema::default();
        let records = vec![create_test_record("Bush", 0.205), create_test_record("Ford, Gerald", -0.01)];

        let body = encode(&records, &schema).unwrap();
        assert_eq!(decode(&body, &schema, 4).unwrap(), records);
    }

    #[test]
    fn test_empty_blob_is_empty_list() {
        let schema = RankingSchema::default();
        assert!(decode(b"", &schema, 4).unwrap().is_empty());
        assert!(decode(b"\n", &schema, 4).unwrap().is_empty());
    }

    #[test]
    fn test_older_blob_without_auxiliary_columns() {
        let schema = RankingSchema::default();
        let body = b"Name,Start Date,End Date,GDP Start,GDP End,GDP Growth,Legacy\n\
Carter,1977-01-20,1981-01-20,10,12,0.2,x\n";

        let records = decode(body, &schema, 4).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].auxiliary.len(), 3);
        assert!(records[0].auxiliary.iter().all(|a| a.value.is_none()));
        assert_eq!(records[0].extra, vec![("Legacy".to_string(), "x".to_string())]);
    }

    #[test]
    fn test_unknown_columns_are_written_back() {
        let narrow = RankingSchema {
            auxiliary: vec![AuxiliaryField::new("Unemployment", Some(0.0), Some(100.0))],
            ..RankingSchema::default()
        };
        let body = encode(&[create_test_record("Bush", 0.205)], &RankingSchema::default()).unwrap();

        let mut records = decode(&body, &narrow, 4).unwrap();
        assert_eq!(records[0].extra, vec![("Population".to_string(), "280".to_string())]);

        let mut added = create_test_record("Obama", 0.15);
        added.auxiliary.truncate(1);
        records.push(added);
        let rewritten = encode(&records, &narrow).unwrap();
        let text = String::from_utf8(rewritten.clone()).unwrap();
        assert!(text.starts_with("Name,Start Date,End Date,GDP Start,GDP End,GDP Growth,Unemployment,Population\n"));

        let full = decode(&rewritten, &RankingSchema::default(), 4).unwrap();
        assert_eq!(full[0].auxiliary_value("Population"), Some(280.0));
        assert_eq!(full[1].auxiliary_value("Population"), None);
        assert!(full.iter().all(|r| r.extra.is_empty()));
    }

    #[test]
    fn test_decode_rounds_to_storage_precision() {
        let schema = RankingSchema {
            auxiliary: vec![AuxiliaryField::new("Unemployment", Some(0.0), Some(100.0))],
            ..RankingSchema::default()
        };
        let body = b"Name,Start Date,End Date,GDP Start,GDP End,GDP Growth,Unemployment\n\
Nixon,1969-01-20,1974-08-09,3.0,4.0,0.333333333,5.55556\n";

        let records = decode(body, &schema, 4).unwrap();

        assert_eq!(records[0].derived_growth, 0.3333);
        assert_eq!(records[0].auxiliary_value("Unemployment"), Some(5.5556));
    }

    #[test]
    fn test_malformed_blob_is_format_error() {
        let schema = RankingSchema::default();

        let missing = decode(b"Name,Start Date\nA,2000-01-01\n", &schema, 4).unwrap_err();
        assert!(matches!(missing, StoreError::Format(_)));

        let body = b"Name,Start Date,End Date,GDP Start,GDP End,GDP Growth\n\
A,soon,2000-01-01,1,2,1\n";
        let bad_date = decode(body, &schema, 4).unwrap_err();
        assert!(bad_date.to_string().contains("'soon' is not a date"));
    }
}
