//! CSV ingest and normalization.
//!
//! This module is responsible for turning a market-data export into clean,
//! typed rows that are safe to estimate on.
//!
//! Design goals:
//! - **Strict schema** for required fields (clear errors + exit code 2)
//! - **Row-level validation** with CSV line numbers (exit code 3 if any row is bad)
//! - **Deterministic behavior** (no hidden reordering or imputation)
//! - **Separation of concerns**: no estimation logic here

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use csv::StringRecord;
use tracing::{debug, info};

use crate::domain::{Observation, PanelRow, YearMonth};
use crate::error::{AppError, EXIT_DATA, EXIT_INPUT};

/// Required columns for the hourly (synthetic-control) table.
pub const HOURLY_COLUMNS: [&str; 6] = ["date", "hr_end", "zone", "treated", "post", "da_lmp"];

/// Required columns for the monthly panel table. `natural_gas_price` also
/// accepts a `gas_price` header.
pub const PANEL_COLUMNS: [&str; 8] = [
    "zone",
    "month",
    "treated",
    "post",
    "avg_price",
    "load",
    "natural_gas_price",
    "weather",
];

/// Maximum number of row errors quoted in the failure message.
const MAX_REPORTED_ROW_ERRORS: usize = 5;

/// A row-level error encountered during ingest.
#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Load the hourly price table.
pub fn load_observations(path: &Path) -> Result<Vec<Observation>, AppError> {
    let (mut reader, header_map) = open_table(path)?;
    ensure_required_columns_exist(&HOURLY_COLUMNS, &header_map)?;

    let mut rows = Vec::new();
    let mut row_errors = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        // +2: records() starts after the header, and CSV lines are 1-based.
        let line = idx + 2;
        let parsed = result
            .map_err(|e| format!("CSV parse error: {e}"))
            .and_then(|record| parse_observation(&record, &header_map));
        match parsed {
            Ok(row) => rows.push(row),
            Err(message) => row_errors.push(RowError { line, message }),
        }
    }

    finish_load(path, rows, &row_errors)
        .and_then(|rows| ensure_unique_hours(&rows).map(|()| rows))
}

/// Load the monthly zone panel table.
pub fn load_panel_rows(path: &Path) -> Result<Vec<PanelRow>, AppError> {
    let (mut reader, mut header_map) = open_table(path)?;
    if !header_map.contains_key("natural_gas_price") {
        if let Some(&idx) = header_map.get("gas_price") {
            header_map.insert("natural_gas_price".to_string(), idx);
        }
    }
    ensure_required_columns_exist(&PANEL_COLUMNS, &header_map)?;

    let mut rows = Vec::new();
    let mut row_errors = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        let parsed = result
            .map_err(|e| format!("CSV parse error: {e}"))
            .and_then(|record| parse_panel_row(&record, &header_map));
        match parsed {
            Ok(row) => rows.push(row),
            Err(message) => row_errors.push(RowError { line, message }),
        }
    }

    finish_load(path, rows, &row_errors)
}

fn open_table(path: &Path) -> Result<(csv::Reader<File>, HashMap<String, usize>), AppError> {
    let file = File::open(path).map_err(|e| {
        AppError::new(
            EXIT_INPUT,
            format!("Failed to open CSV '{}': {e}", path.display()),
        )
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(EXIT_INPUT, format!("Failed to read CSV headers: {e}")))?
        .clone();

    let header_map = build_header_map(&headers);
    debug!(columns = ?headers.iter().collect::<Vec<_>>(), "read CSV header");
    Ok((reader, header_map))
}

fn finish_load<T>(path: &Path, rows: Vec<T>, row_errors: &[RowError]) -> Result<Vec<T>, AppError> {
    if !row_errors.is_empty() {
        let quoted: Vec<String> = row_errors
            .iter()
            .take(MAX_REPORTED_ROW_ERRORS)
            .map(|e| format!("  line {}: {}", e.line, e.message))
            .collect();
        return Err(AppError::new(
            EXIT_DATA,
            format!(
                "{} malformed row(s) in '{}':\n{}",
                row_errors.len(),
                path.display(),
                quoted.join("\n")
            ),
        ));
    }
    if rows.is_empty() {
        return Err(AppError::new(
            EXIT_DATA,
            format!("No data rows in '{}'.", path.display()),
        ));
    }
    info!(rows = rows.len(), path = %path.display(), "loaded input table");
    Ok(rows)
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

pub(crate) fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports often carry a BOM on the first header and use
    // spaces in names ("natural gas price"). Fold both so schema validation
    // matches on the logical column name.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            c => c.to_ascii_lowercase(),
        })
        .collect()
}

fn ensure_required_columns_exist(
    required: &[&str],
    header_map: &HashMap<String, usize>,
) -> Result<(), AppError> {
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|name| !header_map.contains_key(*name))
        .collect();
    if missing.is_empty() {
        return Ok(());
    }
    Err(AppError::new(
        EXIT_INPUT,
        format!("Missing required column(s): {}", missing.join(", ")),
    ))
}

fn parse_observation(
    record: &StringRecord,
    header_map: &HashMap<String, usize>,
) -> Result<Observation, String> {
    let date = parse_date(get_required(record, header_map, "date")?)?;
    let hour = parse_hour(get_required(record, header_map, "hr_end")?)?;
    let zone = get_required(record, header_map, "zone")?.to_string();
    let treated = parse_flag(get_required(record, header_map, "treated")?, "treated")?;
    let post = parse_flag(get_required(record, header_map, "post")?, "post")?;
    let price = parse_f64(get_required(record, header_map, "da_lmp")?, "da_lmp")?;

    Ok(Observation {
        date,
        zone,
        hour,
        treated,
        post,
        price,
    })
}

fn parse_panel_row(
    record: &StringRecord,
    header_map: &HashMap<String, usize>,
) -> Result<PanelRow, String> {
    Ok(PanelRow {
        zone: get_required(record, header_map, "zone")?.to_string(),
        month: parse_month(get_required(record, header_map, "month")?)?,
        treated: parse_flag(get_required(record, header_map, "treated")?, "treated")?,
        post: parse_flag(get_required(record, header_map, "post")?, "post")?,
        price: parse_f64(get_required(record, header_map, "avg_price")?, "avg_price")?,
        load: parse_f64(get_required(record, header_map, "load")?, "load")?,
        gas_price: parse_f64(
            get_required(record, header_map, "natural_gas_price")?,
            "natural_gas_price",
        )?,
        weather: parse_f64(get_required(record, header_map, "weather")?, "weather")?,
    })
}

fn ensure_unique_hours(rows: &[Observation]) -> Result<(), AppError> {
    let mut seen = HashSet::with_capacity(rows.len());
    for row in rows {
        if !seen.insert((row.date, row.zone.as_str(), row.hour)) {
            return Err(AppError::new(
                EXIT_DATA,
                format!(
                    "Duplicate row for date={} zone={} hour={}.",
                    row.date, row.zone, row.hour
                ),
            ));
        }
    }
    Ok(())
}

fn get_required<'a>(
    record: &'a StringRecord,
    header_map: &HashMap<String, usize>,
    name: &str,
) -> Result<&'a str, String> {
    let idx = header_map
        .get(name)
        .ok_or_else(|| format!("Missing required column: `{name}`"))?;
    record
        .get(*idx)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("Missing required value: `{name}`"))
}

pub(crate) fn parse_date(s: &str) -> Result<NaiveDate, String> {
    // ISO dates are preferred, but spreadsheet exports frequently render
    // dates as timestamps or US-style `MM/DD/YYYY`. We accept a small fixed
    // set of formats to keep parsing deterministic.
    const DATE_FMTS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];
    const DATETIME_FMTS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%m/%d/%Y %H:%M"];
    for fmt in DATE_FMTS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(d);
        }
    }
    for fmt in DATETIME_FMTS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(dt.date());
        }
    }
    Err(format!(
        "Invalid date '{s}'. Expected one of: YYYY-MM-DD, MM/DD/YYYY, YYYY/MM/DD (optionally with a time)."
    ))
}

pub(crate) fn parse_month(s: &str) -> Result<YearMonth, String> {
    if let Ok(d) = parse_date(s) {
        return Ok(YearMonth::from_date(d));
    }
    for (sep, order_year_first) in [('-', true), ('/', true), ('/', false)] {
        let mut parts = s.splitn(2, sep);
        let (Some(a), Some(b)) = (parts.next(), parts.next()) else {
            continue;
        };
        let (y, m) = if order_year_first { (a, b) } else { (b, a) };
        if let (Ok(year), Ok(month)) = (y.trim().parse::<i32>(), m.trim().parse::<u32>()) {
            if y.trim().len() == 4 {
                if let Some(ym) = YearMonth::new(year, month) {
                    return Ok(ym);
                }
            }
        }
    }
    Err(format!("Invalid month '{s}'. Expected YYYY-MM or a full date."))
}

fn parse_hour(s: &str) -> Result<u32, String> {
    let v = parse_f64(s, "hr_end")?;
    if v.fract() != 0.0 || !(0.0..=24.0).contains(&v) {
        return Err(format!("Invalid `hr_end` '{s}' (expected an integer hour 0..=24)."));
    }
    Ok(v as u32)
}

pub(crate) fn parse_flag(s: &str, name: &str) -> Result<bool, String> {
    match s.to_ascii_lowercase().as_str() {
        "1" | "1.0" | "true" => Ok(true),
        "0" | "0.0" | "false" => Ok(false),
        _ => Err(format!("Invalid `{name}` flag '{s}' (expected 0 or 1).")),
    }
}

fn parse_f64(s: &str, name: &str) -> Result<f64, String> {
    let v = s
        .replace(',', "")
        .parse::<f64>()
        .map_err(|_| format!("Invalid number for `{name}`: '{s}'"))?;
    if v.is_finite() {
        Ok(v)
    } else {
        Err(format!("Non-finite value for `{name}`: '{s}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn header_names_are_folded() {
        assert_eq!(normalize_header_name("\u{feff}Date"), "date");
        assert_eq!(normalize_header_name(" natural gas price "), "natural_gas_price");
        assert_eq!(normalize_header_name("DA_LMP"), "da_lmp");
    }

    #[test]
    fn parses_common_date_and_month_formats() {
        let d = NaiveDate::from_ymd_opt(2022, 5, 1).unwrap();
        assert_eq!(parse_date("2022-05-01").unwrap(), d);
        assert_eq!(parse_date("05/01/2022").unwrap(), d);
        assert_eq!(parse_date("2022-05-01 00:00:00").unwrap(), d);
        assert!(parse_date("May 1st").is_err());

        let ym = YearMonth::new(2022, 5).unwrap();
        assert_eq!(parse_month("2022-05").unwrap(), ym);
        assert_eq!(parse_month("2022-05-17").unwrap(), ym);
        assert_eq!(parse_month("05/2022").unwrap(), ym);
        assert!(parse_month("2022-13").is_err());
    }

    #[test]
    fn flags_accept_numeric_and_boolean_spellings() {
        assert!(parse_flag("1", "treated").unwrap());
        assert!(parse_flag("1.0", "treated").unwrap());
        assert!(!parse_flag("FALSE", "treated").unwrap());
        assert!(parse_flag("2", "treated").is_err());
    }

    #[test]
    fn loads_hourly_table() {
        let file = write_csv(
            "Date,Hr_End,zone,treated,post,DA_LMP\n\
             2022-04-30,17,A,0,0,30.5\n\
             2022-04-30,17,F,1,0,41.0\n",
        );
        let rows = load_observations(file.path()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].zone, "F");
        assert!(rows[1].treated);
        assert_eq!(rows[0].hour, 17);
        assert!((rows[0].price - 30.5).abs() < 1e-12);
    }

    #[test]
    fn missing_column_is_an_input_error() {
        let file = write_csv("Date,Hr_End,zone,treated,DA_LMP\n2022-04-30,17,A,0,30.5\n");
        let err = load_observations(file.path()).unwrap_err();
        assert_eq!(err.exit_code(), EXIT_INPUT);
        assert!(err.message().contains("post"));
    }

    #[test]
    fn malformed_rows_report_line_numbers() {
        let file = write_csv(
            "Date,Hr_End,zone,treated,post,DA_LMP\n\
             2022-04-30,17,A,0,0,30.5\n\
             2022-04-30,18,A,0,0,abc\n",
        );
        let err = load_observations(file.path()).unwrap_err();
        assert_eq!(err.exit_code(), EXIT_DATA);
        assert!(err.message().contains("line 3"), "{}", err.message());
    }

    #[test]
    fn duplicate_hour_is_rejected() {
        let file = write_csv(
            "Date,Hr_End,zone,treated,post,DA_LMP\n\
             2022-04-30,17,A,0,0,30.5\n\
             2022-04-30,17,A,0,0,31.5\n",
        );
        let err = load_observations(file.path()).unwrap_err();
        assert_eq!(err.exit_code(), EXIT_DATA);
    }

    #[test]
    fn panel_table_accepts_spaced_gas_header() {
        let file = write_csv(
            "zone,month,treated,post,avg_price,load,natural gas price,weather\n\
             Zone F,2022-01-01,1,0,55.2,1200,4.1,30\n",
        );
        let rows = load_panel_rows(file.path()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].month, YearMonth::new(2022, 1).unwrap());
        assert!((rows[0].gas_price - 4.1).abs() < 1e-12);
    }
}
