// 📤 Exports - consolidated and averaged tables as CSV
//
// Column names are part of the output contract: tenure columns first, then
// one column per indicator label. Absent values are written as empty cells.

use crate::averaging::AverageTable;
use crate::boundary::ConsolidatedTable;
use crate::error::EngineResult;
use crate::tables::Tenure;
use csv::Writer;
use std::io::Write;

const TENURE_HEADERS: &[&str] = &["country", "leader", "startdate", "enddate", "startyear", "endyear"];
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Boundary-year rows: tenure columns, the matched `year`, then indicators
pub fn write_consolidated<W: Write>(table: &ConsolidatedTable, out: W) -> EngineResult<()> {
    let mut wtr = Writer::from_writer(out);

    let mut headers: Vec<String> = TENURE_HEADERS.iter().map(|h| h.to_string()).collect();
    headers.push("year".to_string());
    headers.extend(table.labels().into_iter().map(String::from));
    wtr.write_record(&headers)?;

    for row in &table.rows {
        let mut cells = tenure_cells(&row.tenure);
        cells.push(row.year.to_string());
        cells.extend(row.values.iter().map(|v| value_cell(*v)));
        wtr.write_record(&cells)?;
    }

    wtr.flush()?;
    Ok(())
}

/// One row per tenure with "Avg."-prefixed indicator columns
pub fn write_averages<W: Write>(table: &AverageTable, out: W) -> EngineResult<()> {
    let mut wtr = Writer::from_writer(out);

    let mut headers: Vec<String> = TENURE_HEADERS.iter().map(|h| h.to_string()).collect();
    headers.extend(table.labels());
    wtr.write_record(&headers)?;

    for row in &table.rows {
        let mut cells = tenure_cells(&row.tenure);
        cells.extend(row.averages.iter().map(|v| value_cell(*v)));
        wtr.write_record(&cells)?;
    }

    wtr.flush()?;
    Ok(())
}

fn tenure_cells(tenure: &Tenure) -> Vec<String> {
    vec![
        tenure.country.clone(),
        tenure.entity_name.clone(),
        tenure.start_date.format(DATE_FORMAT).to_string(),
        tenure.end_date.format(DATE_FORMAT).to_string(),
        tenure.start_year.to_string(),
        tenure.end_year.to_string(),
    ]
}

fn value_cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::averaging::TenureAverager;
    use crate::boundary::BoundaryJoiner;
    use crate::tables::{IndicatorColumn, IndicatorTable, ObservationRow};
    use chrono::NaiveDate;

    fn create_test_inputs() -> (Vec<Tenure>, IndicatorTable) {
        let tenures = vec![Tenure::new(
            "Lagos",
            "Chile",
            NaiveDate::from_ymd_opt(2000, 3, 11).unwrap(),
            NaiveDate::from_ymd_opt(2001, 3, 11).unwrap(),
        )];
        let table = IndicatorTable::new(
            vec![IndicatorColumn {
                code: "FP.CPI.TOTL.ZG".into(),
                label: "Inflation Rate".into(),
            }],
            vec![
                ObservationRow { country: "Chile".into(), year: 2000, values: vec![Some(3.5)] },
                ObservationRow { country: "Chile".into(), year: 2001, values: vec![None] },
            ],
        )
        .unwrap();
        (tenures, table)
    }

    #[test]
    fn test_consolidated_columns_and_absent_cells() {
        let (tenures, table) = create_test_inputs();
        let consolidated = BoundaryJoiner::new().join(&tenures, &table);

        let mut out = Vec::new();
        write_consolidated(&consolidated, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "country,leader,startdate,enddate,startyear,endyear,year,Inflation Rate");
        assert_eq!(lines[1], "Chile,Lagos,2000-03-11,2001-03-11,2000,2001,2000,3.5");
        assert_eq!(lines[2], "Chile,Lagos,2000-03-11,2001-03-11,2000,2001,2001,");
    }

    #[test]
    fn test_average_columns_carry_prefix() {
        let (tenures, table) = create_test_inputs();
        let averages = TenureAverager::new().average(&tenures, &table);

        let mut out = Vec::new();
        write_averages(&averages, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "country,leader,startdate,enddate,startyear,endyear,Avg. Inflation Rate");
        assert_eq!(lines[1], "Chile,Lagos,2000-03-11,2001-03-11,2000,2001,3.5");
    }
}
