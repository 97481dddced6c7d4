//! # Collision evaluation module
//!
//! Determines whether following a trajectory would bring the vehicle into contact with any
//! obstacle, and if so where along the trajectory the first contact happens.
//!
//! The geometry itself is done by a [`CollisionChecker`], which is swappable. The evaluator
//! only guarantees the common behaviour: no obstacles means no collision, and a checker result
//! pointing outside the trajectory is discarded.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod circle;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, warn};
use serde::{Deserialize, Serialize};

// Internal
use crate::obstacle::{Obstacle, ObstacleType};
use crate::traj::Trajectory;
pub use circle::CircleCollisionChecker;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Geometry routine testing a trajectory against a set of obstacles.
pub trait CollisionChecker {
    /// Return the first (lowest index) collision between the vehicle following `trajectory`
    /// and any of the `obstacles`, or `None` if the trajectory is clear.
    fn check(
        &self,
        trajectory: &Trajectory,
        obstacles: &[Obstacle],
        ego: &EgoFootprint,
    ) -> Option<CollisionInfo>;
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Geometry of the ego vehicle.
#[derive(Deserialize, Serialize, Debug, Copy, Clone, PartialEq)]
pub struct EgoFootprint {
    pub length_m: f64,
    pub width_m: f64,
    pub wheel_base_m: f64,

    /// Clearance added around the vehicle body.
    pub safety_distance_m: f64,
}

/// Description of the first collision found along a trajectory.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct CollisionInfo {
    /// Trajectory index at which the collision happens.
    pub index: usize,

    pub obstacle_type: ObstacleType,

    /// Predicted time until the collision, if known.
    ///
    /// Units: seconds
    pub time_s: Option<f64>,

    /// Distance along the trajectory to the collision, if known.
    ///
    /// Units: meters
    pub distance_m: Option<f64>,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Evaluate the trajectory against the obstacles using the given checker.
///
/// The checker is not consulted when there are no obstacles.
pub fn evaluate(
    checker: &dyn CollisionChecker,
    trajectory: &Trajectory,
    obstacles: &[Obstacle],
    ego: &EgoFootprint,
) -> Option<CollisionInfo> {
    if obstacles.is_empty() || trajectory.is_empty() {
        return None;
    }

    match checker.check(trajectory, obstacles, ego) {
        Some(info) if info.index >= trajectory.len() => {
            warn!(
                "Collision checker reported index {} on a trajectory of {} points, ignoring",
                info.index,
                trajectory.len()
            );
            None
        }
        Some(info) => {
            debug!("Collision: {:?}", info);
            Some(info)
        }
        None => None,
    }
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl EgoFootprint {
    /// Radius of the circle bounding the vehicle body plus the safety distance.
    pub fn bounding_radius_m(&self) -> f64 {
        0.5 * self.length_m.hypot(self.width_m) + self.safety_distance_m
    }
}

impl Default for EgoFootprint {
    fn default() -> Self {
        Self {
            length_m: 5.0,
            width_m: 1.895,
            wheel_base_m: 2.79,
            safety_distance_m: 0.1,
        }
    }
}
