//! # Constraint synthesis
//!
//! Builds the per-sample speed and acceleration bounds handed to the optimiser:
//!
//! - `vr`: hard speed ceiling
//! - `vd`: desired speed, derived from the trajectory curvature and the allowed lateral
//!   acceleration
//! - `arlon`/`arlat`: hard longitudinal/lateral acceleration limits (friction circle)
//! - `aclon`/`aclat`: comfort longitudinal/lateral acceleration limits
//!
//! When a static obstacle blocks the trajectory the desired speed is only set well before the
//! obstacle, samples close to and beyond it carry no desired target (`vd = 0`).

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Serialize;

// Internal
use crate::collision::CollisionInfo;
use crate::obstacle::ObstacleType;
use crate::traj::Trajectory;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Added to the curvature magnitude so straight segments don't divide by zero.
const CURVATURE_EPSILON_M: f64 = 1e-10;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Per-sample bounds, every vector has one entry per trajectory sample.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConstraintProfile {
    pub vr: Vec<f64>,
    pub vd: Vec<f64>,
    pub arlon: Vec<f64>,
    pub arlat: Vec<f64>,
    pub aclon: Vec<f64>,
    pub aclat: Vec<f64>,
}

/// Parameters for constraint synthesis.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ConstraintParams {
    /// Units: meters/second
    pub max_speed_ms: f64,

    /// Allowed lateral acceleration used for the desired speed.
    ///
    /// Units: meters/second^2
    pub lateral_g: f64,

    /// Desired speed sits this far below the ceiling.
    pub desired_speed_margin_ms: f64,

    /// Lowest desired speed produced by the curvature formula.
    pub min_desired_speed_ms: f64,

    /// Number of samples before a static collision index which carry no desired speed.
    pub static_lookback_samples: usize,

    /// Tyre/road friction coefficient.
    pub mu: f64,

    /// Units: meters/second^2
    pub gravity_mss: f64,

    /// Fraction of the friction limit used for the hard acceleration limits.
    pub hard_friction_fraction: f64,

    /// Fraction of the friction limit used for the comfort acceleration limits.
    pub comfort_friction_fraction: f64,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Desired speed at a sample with curvature `curvature_m`.
pub fn desired_speed(curvature_m: f64, params: &ConstraintParams) -> f64 {
    let cornering_ms = (params.lateral_g / (curvature_m.abs() + CURVATURE_EPSILON_M)).sqrt();

    (params.max_speed_ms - params.desired_speed_margin_ms)
        .min(cornering_ms)
        .max(params.min_desired_speed_ms)
}

/// Build the bounds for `trajectory` given the initial speed and the first collision, if any.
pub fn synthesize(
    trajectory: &Trajectory,
    v0_ms: f64,
    collision: Option<&CollisionInfo>,
    params: &ConstraintParams,
) -> ConstraintProfile {
    let n = trajectory.len();
    if n == 0 {
        return ConstraintProfile::default();
    }

    let vr = vec![params.max_speed_ms; n];

    // Range of samples (from 1) which get a desired speed
    let desired_end = match collision {
        Some(c) if c.obstacle_type == ObstacleType::Static => {
            c.index.saturating_sub(params.static_lookback_samples).min(n)
        }
        _ => n,
    };

    let mut vd = vec![0.0; n];
    vd[0] = v0_ms.min(vr[0]);
    for i in 1..desired_end {
        vd[i] = desired_speed(trajectory.points[i].curvature_m, params);
    }

    let friction_mss = params.mu * params.gravity_mss;
    let hard_mss = params.hard_friction_fraction * friction_mss;
    let comfort_mss = params.comfort_friction_fraction * friction_mss;

    ConstraintProfile {
        vr,
        vd,
        arlon: vec![hard_mss; n],
        arlat: vec![hard_mss; n],
        aclon: vec![comfort_mss; n],
        aclat: vec![comfort_mss; n],
    }
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ConstraintProfile {
    /// Length of the profile, or `None` if the vectors disagree.
    pub fn checked_len(&self) -> Option<usize> {
        let n = self.vr.len();
        let lens = [
            self.vd.len(),
            self.arlon.len(),
            self.arlat.len(),
            self.aclon.len(),
            self.aclat.len(),
        ];

        if lens.iter().all(|&l| l == n) {
            Some(n)
        } else {
            None
        }
    }

    pub fn is_empty(&self) -> bool {
        self.vr.is_empty()
    }
}

impl Default for ConstraintParams {
    fn default() -> Self {
        Self {
            max_speed_ms: 5.0,
            lateral_g: 0.4,
            desired_speed_margin_ms: 0.5,
            min_desired_speed_ms: 1.0,
            static_lookback_samples: 100,
            mu: 0.8,
            gravity_mss: 9.83,
            hard_friction_fraction: 0.5,
            comfort_friction_fraction: 0.4,
        }
    }
}
