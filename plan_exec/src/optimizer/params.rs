//! Speed optimiser parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the speed optimiser.
///
/// Not every backend uses every parameter, the weights in particular only apply to
/// quadratic-programming backends.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct OptimizerParams {
    /// Vehicle mass.
    ///
    /// Units: kilograms
    pub mass_kg: f64,

    /// Tyre/road friction coefficient.
    pub mu: f64,

    /// Nominal sample spacing of the discretised problem.
    ///
    /// Units: meters
    pub ds_m: f64,

    /// Distance ahead of the vehicle covered by the optimisation.
    ///
    /// Units: meters
    pub preview_distance_m: f64,

    pub curvature_weight: f64,
    pub decay_factor: f64,

    pub time_weight: f64,
    pub smooth_weight: f64,
    pub velocity_weight: f64,
    pub lon_slack_weight: f64,
    pub lat_slack_weight: f64,

    /// Number of samples skipped between optimisation nodes.
    pub skip_size: usize,

    /// Number of samples in the curvature smoothing window.
    pub smooth_size: usize,
}

impl Default for OptimizerParams {
    fn default() -> Self {
        Self {
            mass_kg: 1500.0,
            mu: 0.8,
            ds_m: 0.1,
            preview_distance_m: 20.0,
            curvature_weight: 20.0,
            decay_factor: 0.8,
            time_weight: 0.0,
            smooth_weight: 15.0,
            velocity_weight: 0.001,
            lon_slack_weight: 1.0,
            lat_slack_weight: 10.0,
            skip_size: 10,
            smooth_size: 50,
        }
    }
}
