//! Panel difference-in-differences.
//!
//! - panel construction (`builder`)
//! - the specification menu (`specs`)
//! - estimation (`estimator`)

pub mod builder;
pub mod estimator;
pub mod specs;

pub use builder::{LOG_PRICE_FLOOR, Panel, build_panel, clipped_log};
pub use estimator::{Coefficient, SIGNIFICANCE, SpecResult, SpecRun, fit_spec, normal_p_value, run_all};
pub use specs::{
    Effects, LOG_TWO_WAY_FE_CONTROLS, ModelSpec, POOLED_OLS, PriceScale, RESTRICTED_TWO_WAY_FE_CONTROLS, Regressor,
    SampleKind, TWO_WAY_FE, TWO_WAY_FE_CONTROLS, menu,
};
