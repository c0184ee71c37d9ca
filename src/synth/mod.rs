//! Synthetic-control estimation with placebo inference.
//!
//! - peak-hour aggregation and zone roles (`aggregate`)
//! - date-indexed matrices and joins (`matrix`)
//! - ridge donor weights (`weights`)
//! - synthetic trajectory and gaps (`effect`)
//! - one target vs donor pool (`control`)
//! - placebo loop (`placebo`) and the pseudo p-value (`inference`)

pub mod aggregate;
pub mod control;
pub mod effect;
pub mod inference;
pub mod matrix;
pub mod placebo;
pub mod weights;

pub use aggregate::{DEFAULT_PEAK_HOURS, aggregate_peak, control_zones, infer_cutover, treated_zone};
pub use control::{SyntheticControl, fit_synthetic_control};
pub use effect::estimate_effect;
pub use inference::{Inference, pseudo_p_value, summarize};
pub use matrix::{DateSeries, PriceMatrix, align};
pub use placebo::{MIN_PLACEBO_DONORS, PlaceboRun, run_placebos};
pub use weights::{DEFAULT_ALPHA, fit_donor_weights};
