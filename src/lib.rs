//! `lmp-impact` library crate.
//!
//! Two policy-evaluation pipelines for day-ahead electricity prices:
//!
//! - `synth`: synthetic control for one treated zone, with placebo inference
//! - `panel`: difference-in-differences panel regressions over a fixed menu
//!   of specifications
//!
//! The binary (`lmp`) is a thin wrapper around this library so that the
//! pipelines are testable without spawning processes.

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod io;
pub mod math;
pub mod panel;
pub mod plot;
pub mod report;
pub mod synth;
