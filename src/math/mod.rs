//! Mathematical utilities: least-squares solvers and fixed-effects absorption.

pub mod demean;
pub mod ols;

pub use demean::*;
pub use ols::*;
