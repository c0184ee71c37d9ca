//! Shared domain types.
//!
//! These types are intentionally kept lightweight and (where they leave the
//! process) serializable so they can be:
//!
//! - used in-memory by both pipelines
//! - exported to CSV/JSON
//! - asserted on directly in tests

use std::fmt;
use std::path::PathBuf;

use chrono::{Datelike, NaiveDate};
use clap::ValueEnum;
use serde::{Serialize, Serializer};

/// One raw hourly price row (synthetic-control input).
///
/// `(date, zone, hour)` identifies a row uniquely.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub date: NaiveDate,
    pub zone: String,
    /// Hour-ending label (1..=24 in most market exports).
    pub hour: u32,
    pub treated: bool,
    pub post: bool,
    pub price: f64,
}

/// Mean peak-hour price for one `(date, zone)`.
#[derive(Debug, Clone, PartialEq)]
pub struct PeakObservation {
    pub date: NaiveDate,
    pub zone: String,
    pub treated: bool,
    pub post: bool,
    pub avg_price: f64,
}

/// Calendar month used as the panel's time axis.
///
/// Ordering is chronological (year first, then month).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        if (1..=12).contains(&month) {
            Some(Self { year, month })
        } else {
            None
        }
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// First calendar day of the month.
    pub fn first_day(self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl Serialize for YearMonth {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One raw monthly panel row (DiD input).
#[derive(Debug, Clone, PartialEq)]
pub struct PanelRow {
    pub zone: String,
    pub month: YearMonth,
    pub treated: bool,
    pub post: bool,
    pub price: f64,
    pub load: f64,
    pub gas_price: f64,
    pub weather: f64,
}

/// A panel row enriched with the derived regression fields.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelObservation {
    pub zone: String,
    /// Zero-based rank of `zone` among the panel's sorted distinct zones.
    pub entity_id: usize,
    pub month: YearMonth,
    /// Zero-based rank of `month` among the panel's sorted distinct months.
    pub time_id: usize,
    pub treated: bool,
    pub post: bool,
    /// `treated × post`.
    pub did: bool,
    pub price: f64,
    /// `ln(max(price, 1))`.
    pub log_price: f64,
    pub load: f64,
    pub gas_price: f64,
    pub weather: f64,
}

/// Observation counts per treatment/period cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct GroupSizes {
    pub pre_control: usize,
    pub pre_treated: usize,
    pub post_control: usize,
    pub post_treated: usize,
}

/// Ridge weights for one (real or placebo) treated unit.
///
/// Entries follow the column order of the donor matrix they were fitted on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DonorWeights {
    pub zones: Vec<String>,
    pub values: Vec<f64>,
}

impl DonorWeights {
    pub fn get(&self, zone: &str) -> Option<f64> {
        self.zones
            .iter()
            .position(|z| z == zone)
            .map(|idx| self.values[idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.zones
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// One dated point of an effect series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EffectPoint {
    pub date: NaiveDate,
    pub actual: f64,
    pub synthetic: f64,
    /// `actual - synthetic`.
    pub gap: f64,
    /// `date >= cutover`.
    pub post: bool,
}

/// Actual vs synthetic trajectory for one treated unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffectSeries {
    pub cutover: NaiveDate,
    pub points: Vec<EffectPoint>,
    /// Dates present on only one side of the actual/synthetic inner join.
    pub dropped_dates: usize,
}

impl EffectSeries {
    /// Mean gap over post-cutover dates (`None` if there are none).
    pub fn average_post_gap(&self) -> Option<f64> {
        let (sum, n) = self
            .points
            .iter()
            .filter(|p| p.post)
            .fold((0.0, 0usize), |(s, n), p| (s + p.gap, n + 1));
        if n == 0 { None } else { Some(sum / n as f64) }
    }

    /// Mean gap over pre-cutover dates (`None` if there are none).
    pub fn average_pre_gap(&self) -> Option<f64> {
        let (sum, n) = self
            .points
            .iter()
            .filter(|p| !p.post)
            .fold((0.0, 0usize), |(s, n), p| (s + p.gap, n + 1));
        if n == 0 { None } else { Some(sum / n as f64) }
    }
}

/// Result of one item in a loop whose items fail independently
/// (placebo zones, regression specifications).
#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome<T> {
    Ok(T),
    /// The item was not attempted (e.g. too few donors).
    Skipped(String),
    /// The item was attempted and failed.
    Failed(String),
}

impl<T> ItemOutcome<T> {
    pub fn ok(&self) -> Option<&T> {
        match self {
            ItemOutcome::Ok(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, ItemOutcome::Ok(_))
    }

    /// Short status label for tables and logs.
    pub fn status(&self) -> &'static str {
        match self {
            ItemOutcome::Ok(_) => "ok",
            ItemOutcome::Skipped(_) => "skipped",
            ItemOutcome::Failed(_) => "failed",
        }
    }

    /// Reason for a skip or failure.
    pub fn reason(&self) -> Option<&str> {
        match self {
            ItemOutcome::Ok(_) => None,
            ItemOutcome::Skipped(r) | ItemOutcome::Failed(r) => Some(r),
        }
    }
}

/// Configuration for a synthetic-control run.
///
/// Derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct SynthConfig {
    pub input: PathBuf,
    pub results_dir: PathBuf,
    /// First peak hour (inclusive).
    pub peak_start: u32,
    /// Last peak hour (inclusive).
    pub peak_end: u32,
    /// Ridge penalty.
    pub alpha: f64,
    /// Policy start. `None` means: earliest date flagged `post = 1`.
    pub cutover: Option<NaiveDate>,
    pub charts: bool,
    pub export_json: Option<PathBuf>,
}

/// Configuration for a panel DiD run.
#[derive(Debug, Clone)]
pub struct PanelConfig {
    pub input: PathBuf,
    pub results_dir: PathBuf,
    /// Control zone kept in the restricted sample. `None` means: first
    /// control zone by name.
    pub compare_zone: Option<String>,
    pub charts: bool,
}

/// Which kind of input table to simulate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SimulateKind {
    /// Hourly prices for the synthetic-control pipeline.
    Hourly,
    /// Monthly zone panel for the DiD pipeline.
    Panel,
}

/// Configuration for the input simulator.
#[derive(Debug, Clone)]
pub struct SimulateConfig {
    pub kind: SimulateKind,
    pub output: PathBuf,
    pub seed: u64,
    /// Number of untreated zones (one extra treated zone is always added).
    pub control_zones: usize,
    pub start: NaiveDate,
    pub cutover: NaiveDate,
    /// Number of periods (days for `hourly`, months for `panel`).
    pub periods: usize,
    /// Additive policy effect on the treated zone after the cutover ($/MWh).
    pub effect: f64,
    /// Standard deviation of idiosyncratic noise ($/MWh).
    pub noise: f64,
}
