//! Domain types used throughout both pipelines.
//!
//! This module defines:
//!
//! - raw and derived observations (`Observation`, `PeakObservation`,
//!   `PanelRow`, `PanelObservation`)
//! - estimation outputs (`DonorWeights`, `EffectSeries`, `ItemOutcome`)
//! - run configuration (`SynthConfig`, `PanelConfig`, `SimulateConfig`)

pub mod types;

pub use types::*;
