//! # Speed optimisation module
//!
//! The optimiser assigns a speed and acceleration to every sample of a trajectory, respecting
//! the bounds from [`crate::constraints`], the vehicle's current speed and any collision ahead.
//!
//! Backends implement [`SpeedOptimizer`]. The planner only relies on the contract: on success
//! the profile has one entry per sample, on failure an [`OptimizerError`] is returned and the
//! planner falls back to the previous cycle's speeds.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod kinematic;
pub mod params;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use thiserror::Error;

// Internal
use crate::collision::CollisionInfo;
use crate::constraints::ConstraintProfile;
pub use crate::traj::SpeedProfile;
use crate::traj::Trajectory;
pub use kinematic::KinematicSpeedOptimizer;
pub use params::OptimizerParams;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A speed optimisation backend.
pub trait SpeedOptimizer {
    /// Compute a speed profile for the input.
    fn solve(&mut self, input: &OptimizerInput) -> Result<SpeedProfile, OptimizerError>;
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Everything the optimiser is given for one solve.
#[derive(Debug, Clone, Copy)]
pub struct OptimizerInput<'a> {
    pub trajectory: &'a Trajectory,
    pub bounds: &'a ConstraintProfile,

    /// Units: meters/second
    pub v0_ms: f64,

    /// Units: meters/second^2
    pub a0_mss: f64,

    /// The collision to stop before, if any.
    pub collision: Option<CollisionTarget>,

    /// Collisions further away in time than this are not acted upon.
    pub safety_horizon_s: f64,
}

/// Where the vehicle has to stop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionTarget {
    /// Distance along the trajectory to the collision. Zero or less means the vehicle is
    /// already inside the clearance and must stop from the first sample.
    ///
    /// Units: meters
    pub distance_m: f64,

    /// Predicted time to the collision, `None` for static obstacles which are always acted on.
    ///
    /// Units: seconds
    pub time_s: Option<f64>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Clone, PartialEq)]
pub enum OptimizerError {
    #[error("The trajectory contains no points")]
    EmptyTrajectory,

    #[error("Bounds do not match the trajectory length of {expected}")]
    BoundsMismatch { expected: usize },

    #[error("Optimiser returned a non-finite value at index {index}")]
    NonFiniteProfile { index: usize },

    #[error("Optimiser returned {found} samples for a trajectory of {expected}")]
    ProfileLengthMismatch { expected: usize, found: usize },

    #[error("Optimiser backend failed: {0}")]
    Backend(String),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl CollisionTarget {
    /// The stop target for a collision, `None` if the collision has no known distance.
    pub fn from_collision(info: &CollisionInfo) -> Option<Self> {
        info.distance_m.map(|distance_m| Self {
            distance_m,
            time_s: info.time_s,
        })
    }

    /// True if the collision is close enough in time to be acted upon.
    pub fn within(&self, horizon_s: f64) -> bool {
        self.time_s.map_or(true, |t| t <= horizon_s)
    }
}

impl<'a> OptimizerInput<'a> {
    /// Check that the trajectory is non-empty and the bounds match its length.
    pub fn validate(&self) -> Result<usize, OptimizerError> {
        let n = self.trajectory.len();
        if n == 0 {
            return Err(OptimizerError::EmptyTrajectory);
        }

        match self.bounds.checked_len() {
            Some(l) if l == n => Ok(n),
            _ => Err(OptimizerError::BoundsMismatch { expected: n }),
        }
    }
}
