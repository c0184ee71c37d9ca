//! The fixed menu of regression specifications.

use std::fmt;

use serde::Serialize;

use crate::domain::PanelObservation;

/// Which fixed effects a specification absorbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Effects {
    None,
    Entity,
    TwoWay,
}

/// Dependent variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PriceScale {
    Level,
    Log,
}

/// Which observations a specification uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SampleKind {
    Full,
    /// Treated zones plus one comparison control zone.
    Restricted,
}

/// A design-matrix column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Regressor {
    Const,
    Treated,
    Post,
    Did,
    Load,
    GasPrice,
    Weather,
}

impl Regressor {
    pub const CONTROLS: [Regressor; 3] = [Regressor::Load, Regressor::GasPrice, Regressor::Weather];

    pub fn name(self) -> &'static str {
        match self {
            Regressor::Const => "const",
            Regressor::Treated => "treated",
            Regressor::Post => "post",
            Regressor::Did => "did",
            Regressor::Load => "load",
            Regressor::GasPrice => "natural_gas_price",
            Regressor::Weather => "weather",
        }
    }

    pub fn value(self, o: &PanelObservation) -> f64 {
        let flag = |b: bool| if b { 1.0 } else { 0.0 };
        match self {
            Regressor::Const => 1.0,
            Regressor::Treated => flag(o.treated),
            Regressor::Post => flag(o.post),
            Regressor::Did => flag(o.did),
            Regressor::Load => o.load,
            Regressor::GasPrice => o.gas_price,
            Regressor::Weather => o.weather,
        }
    }
}

impl fmt::Display for Regressor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One row of the specification menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModelSpec {
    pub name: &'static str,
    pub effects: Effects,
    pub controls: bool,
    pub scale: PriceScale,
    pub sample: SampleKind,
}

impl ModelSpec {
    const fn new(
        name: &'static str,
        effects: Effects,
        controls: bool,
        scale: PriceScale,
        sample: SampleKind,
    ) -> Self {
        Self {
            name,
            effects,
            controls,
            scale,
            sample,
        }
    }

    /// Columns of the design matrix. Terms absorbed by the fixed effects are
    /// left out here rather than left for the solver to drop.
    pub fn design_columns(&self) -> Vec<Regressor> {
        let mut cols = match self.effects {
            Effects::None => vec![Regressor::Const, Regressor::Treated, Regressor::Post, Regressor::Did],
            Effects::Entity => vec![Regressor::Post, Regressor::Did],
            Effects::TwoWay => vec![Regressor::Did],
        };
        if self.controls {
            cols.extend(Regressor::CONTROLS);
        }
        cols
    }

    pub fn response(&self, o: &PanelObservation) -> f64 {
        match self.scale {
            PriceScale::Level => o.price,
            PriceScale::Log => o.log_price,
        }
    }
}

pub const POOLED_OLS: &str = "Pooled OLS";
pub const TWO_WAY_FE: &str = "Two-way FE";
pub const TWO_WAY_FE_CONTROLS: &str = "Two-way FE with Controls";
pub const LOG_TWO_WAY_FE_CONTROLS: &str = "Log Two-way FE with Controls";
pub const RESTRICTED_TWO_WAY_FE_CONTROLS: &str = "Restricted Two-way FE with Controls";

use Effects::{Entity, TwoWay};
use PriceScale::{Level, Log};
use SampleKind::{Full, Restricted};

const MENU: [ModelSpec; 12] = [
    ModelSpec::new(POOLED_OLS, Effects::None, false, Level, Full),
    ModelSpec::new("Pooled OLS with Controls", Effects::None, true, Level, Full),
    ModelSpec::new("Entity FE", Entity, false, Level, Full),
    ModelSpec::new("Entity FE with Controls", Entity, true, Level, Full),
    ModelSpec::new(TWO_WAY_FE, TwoWay, false, Level, Full),
    ModelSpec::new(TWO_WAY_FE_CONTROLS, TwoWay, true, Level, Full),
    ModelSpec::new("Log Two-way FE", TwoWay, false, Log, Full),
    ModelSpec::new(LOG_TWO_WAY_FE_CONTROLS, TwoWay, true, Log, Full),
    ModelSpec::new("Restricted Two-way FE", TwoWay, false, Level, Restricted),
    ModelSpec::new(RESTRICTED_TWO_WAY_FE_CONTROLS, TwoWay, true, Level, Restricted),
    ModelSpec::new("Restricted Log Two-way FE", TwoWay, false, Log, Restricted),
    ModelSpec::new("Restricted Log Two-way FE with Controls", TwoWay, true, Log, Restricted),
];

/// All twelve specifications, in reporting order.
pub fn menu() -> &'static [ModelSpec] {
    &MENU
}
