//! Result exports: panel CSVs, text reports, and JSON.
//!
//! Exports are meant to be easy to consume in spreadsheets or downstream
//! scripts. All of them live under one results directory.

use std::fs::{self, File};
use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::domain::{Observation, PanelObservation, PanelRow};
use crate::error::{AppError, EXIT_INPUT};

/// Flat CSV record for one panel observation (flags as 0/1).
#[derive(Debug, Serialize)]
struct PanelCsvRow<'a> {
    zone: &'a str,
    month: String,
    entity_id: usize,
    time_id: usize,
    treated: u8,
    post: u8,
    did: u8,
    avg_price: f64,
    log_price: f64,
    load: f64,
    natural_gas_price: f64,
    weather: f64,
}

/// Hourly input record, in the loader's column layout.
#[derive(Debug, Serialize)]
struct HourlyCsvRow<'a> {
    date: String,
    hr_end: u32,
    zone: &'a str,
    treated: u8,
    post: u8,
    da_lmp: f64,
}

/// Monthly panel input record, in the loader's column layout.
#[derive(Debug, Serialize)]
struct PanelInputCsvRow<'a> {
    zone: &'a str,
    month: String,
    treated: u8,
    post: u8,
    avg_price: f64,
    load: f64,
    natural_gas_price: f64,
    weather: f64,
}

/// Create the results directory (and parents) if absent.
pub fn ensure_results_dir(dir: &Path) -> Result<(), AppError> {
    fs::create_dir_all(dir).map_err(|e| {
        AppError::new(
            EXIT_INPUT,
            format!("Failed to create results directory '{}': {e}", dir.display()),
        )
    })
}

fn write_csv_rows<T: Serialize>(
    path: &Path,
    what: &str,
    rows: impl IntoIterator<Item = T>,
) -> Result<usize, AppError> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| {
        AppError::new(
            EXIT_INPUT,
            format!("Failed to create {what} CSV '{}': {e}", path.display()),
        )
    })?;

    let mut n = 0;
    for row in rows {
        writer
            .serialize(row)
            .map_err(|e| AppError::new(EXIT_INPUT, format!("Failed to write {what} CSV row: {e}")))?;
        n += 1;
    }

    writer
        .flush()
        .map_err(|e| AppError::new(EXIT_INPUT, format!("Failed to flush {what} CSV: {e}")))?;
    info!(path = %path.display(), rows = n, "wrote {what} CSV");
    Ok(n)
}

/// Write the prepared panel (with derived fields) to CSV.
pub fn write_panel_csv(path: &Path, observations: &[PanelObservation]) -> Result<(), AppError> {
    let rows = observations.iter().map(|o| PanelCsvRow {
        zone: &o.zone,
        month: o.month.to_string(),
        entity_id: o.entity_id,
        time_id: o.time_id,
        treated: u8::from(o.treated),
        post: u8::from(o.post),
        did: u8::from(o.did),
        avg_price: o.price,
        log_price: o.log_price,
        load: o.load,
        natural_gas_price: o.gas_price,
        weather: o.weather,
    });
    write_csv_rows(path, "panel", rows).map(|_| ())
}

/// Write hourly prices in the layout `load_observations` reads.
pub fn write_hourly_input(path: &Path, observations: &[Observation]) -> Result<usize, AppError> {
    let rows = observations.iter().map(|o| HourlyCsvRow {
        date: o.date.format("%Y-%m-%d").to_string(),
        hr_end: o.hour,
        zone: &o.zone,
        treated: u8::from(o.treated),
        post: u8::from(o.post),
        da_lmp: o.price,
    });
    write_csv_rows(path, "hourly", rows)
}

/// Write a monthly panel in the layout `load_panel_rows` reads.
pub fn write_panel_input(path: &Path, rows: &[PanelRow]) -> Result<usize, AppError> {
    let records = rows.iter().map(|r| PanelInputCsvRow {
        zone: &r.zone,
        month: r.month.to_string(),
        treated: u8::from(r.treated),
        post: u8::from(r.post),
        avg_price: r.price,
        load: r.load,
        natural_gas_price: r.gas_price,
        weather: r.weather,
    });
    write_csv_rows(path, "panel input", records)
}

/// Write a plain-text report.
pub fn write_text(path: &Path, contents: &str) -> Result<(), AppError> {
    fs::write(path, contents).map_err(|e| {
        AppError::new(
            EXIT_INPUT,
            format!("Failed to write '{}': {e}", path.display()),
        )
    })?;
    info!(path = %path.display(), "wrote report");
    Ok(())
}

/// Write any serializable value as pretty JSON.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), AppError> {
    let file = File::create(path).map_err(|e| {
        AppError::new(
            EXIT_INPUT,
            format!("Failed to create JSON '{}': {e}", path.display()),
        )
    })?;
    serde_json::to_writer_pretty(file, value)
        .map_err(|e| AppError::new(EXIT_INPUT, format!("Failed to write JSON: {e}")))?;
    info!(path = %path.display(), "wrote JSON export");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::YearMonth;

    #[test]
    fn panel_csv_writes_flags_as_digits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("panel.csv");
        let obs = vec![PanelObservation {
            zone: "Zone F".to_string(),
            entity_id: 1,
            month: YearMonth::new(2022, 6).unwrap(),
            time_id: 5,
            treated: true,
            post: true,
            did: true,
            price: 80.0,
            log_price: 80.0_f64.ln(),
            load: 1000.0,
            gas_price: 7.5,
            weather: 70.0,
        }];
        write_panel_csv(&path, &obs).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "zone,month,entity_id,time_id,treated,post,did,avg_price,log_price,load,natural_gas_price,weather"
        );
        assert!(lines.next().unwrap().starts_with("Zone F,2022-06,1,5,1,1,1,80.0,"));
    }

    #[test]
    fn hourly_input_round_trips_through_the_loader() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hourly.csv");
        let obs = vec![Observation {
            date: chrono::NaiveDate::from_ymd_opt(2022, 5, 2).unwrap(),
            zone: "Zone A".to_string(),
            hour: 18,
            treated: false,
            post: true,
            price: 42.5,
        }];
        assert_eq!(write_hourly_input(&path, &obs).unwrap(), 1);
        let back = crate::io::ingest::load_observations(&path).unwrap();
        assert_eq!(back, obs);
    }

    #[test]
    fn results_dir_is_created_recursively() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        ensure_results_dir(&nested).unwrap();
        assert!(nested.is_dir());
    }
}
