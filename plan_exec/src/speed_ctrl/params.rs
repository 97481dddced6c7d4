//! Speed planner parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Deserialize;

// Internal
use crate::collision::EgoFootprint;
use crate::constraints::ConstraintParams;
use crate::obstacle::{ClassifierParams, Prediction};
use crate::optimizer::OptimizerParams;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the speed planner.
///
/// Any value missing from the parameter file takes its default.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Params {
    /// Speed ceiling applied to every sample.
    ///
    /// Units: meters/second
    pub max_speed_ms: f64,

    /// Lateral acceleration used to derive the desired speed from curvature.
    ///
    /// Units: meters/second^2
    pub lateral_g: f64,

    /// Published speeds are capped at this value.
    pub output_speed_cap_ms: f64,

    /// Desired speed is kept this far below the ceiling.
    pub desired_speed_margin_ms: f64,

    /// Lower bound of the desired speed.
    pub min_desired_speed_ms: f64,

    /// Samples before a static collision which carry no desired speed.
    pub static_lookback_samples: usize,

    /// Gravitational acceleration used for the friction limits.
    pub gravity_mss: f64,

    /// Fraction of `mu * g` used as the hard acceleration limit.
    pub hard_friction_fraction: f64,

    /// Fraction of `mu * g` used as the comfort acceleration limit.
    pub comfort_friction_fraction: f64,

    /// Collisions predicted further away than this are not acted upon by the optimiser.
    ///
    /// Units: seconds
    pub safety_time_horizon_s: f64,

    /// Obstacles faster than this are dynamic.
    pub dynamic_speed_threshold_ms: f64,

    /// Prediction horizon for dynamic obstacles.
    ///
    /// Units: seconds
    pub dynamic_prediction_horizon_s: f64,

    /// Growth of a dynamic obstacle's radius per second of prediction.
    pub dynamic_velocity_margin_ms: f64,

    /// Speed assumed by the collision checker for samples without an assigned speed.
    pub collision_nominal_speed_ms: f64,

    /// Stride of the coarse nearest point search on the previous trajectory.
    pub warm_start_search_stride: usize,

    /// Index of the desired speed reported alongside each output.
    pub desired_speed_lookahead_index: usize,

    /// If true, lanes built from the previous cycle's speeds after an optimiser failure are
    /// published.
    pub publish_fallback: bool,

    /// If true, every published output is saved in the session directory.
    pub archive_outputs: bool,

    /// Ego vehicle geometry.
    pub vehicle: EgoFootprint,

    pub optimizer: OptimizerParams,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Params {
    /// Parameters for constraint synthesis.
    pub fn constraint_params(&self) -> ConstraintParams {
        ConstraintParams {
            max_speed_ms: self.max_speed_ms,
            lateral_g: self.lateral_g,
            desired_speed_margin_ms: self.desired_speed_margin_ms,
            min_desired_speed_ms: self.min_desired_speed_ms,
            static_lookback_samples: self.static_lookback_samples,
            mu: self.optimizer.mu,
            gravity_mss: self.gravity_mss,
            hard_friction_fraction: self.hard_friction_fraction,
            comfort_friction_fraction: self.comfort_friction_fraction,
        }
    }

    /// Parameters for obstacle classification.
    pub fn classifier_params(&self) -> ClassifierParams {
        ClassifierParams {
            dynamic_speed_threshold_ms: self.dynamic_speed_threshold_ms,
            prediction: Prediction {
                horizon_s: self.dynamic_prediction_horizon_s,
                velocity_margin_ms: self.dynamic_velocity_margin_ms,
            },
        }
    }
}

impl Default for Params {
    fn default() -> Self {
        Self {
            max_speed_ms: 5.0,
            lateral_g: 0.4,
            output_speed_cap_ms: 4.9,
            desired_speed_margin_ms: 0.5,
            min_desired_speed_ms: 1.0,
            static_lookback_samples: 100,
            gravity_mss: 9.83,
            hard_friction_fraction: 0.5,
            comfort_friction_fraction: 0.4,
            safety_time_horizon_s: 10.0,
            dynamic_speed_threshold_ms: 0.1,
            dynamic_prediction_horizon_s: 5.0,
            dynamic_velocity_margin_ms: 0.5,
            collision_nominal_speed_ms: 4.5,
            warm_start_search_stride: 2,
            desired_speed_lookahead_index: 2,
            publish_fallback: true,
            archive_outputs: false,
            vehicle: EgoFootprint::default(),
            optimizer: OptimizerParams::default(),
        }
    }
}
