//! # Planner messages
//!
//! Messages recieved and published by the speed planner. Inputs arrive as [`PlanInput`] values,
//! each serialised as externally tagged JSON, and every published planning cycle produces one
//! [`PlanOutput`].

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use chrono::{DateTime, Utc};
use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Standard message header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    /// Coordinate frame the message's geometry is expressed in.
    pub frame_id: String,

    /// Time at which the data was valid.
    pub stamp: DateTime<Utc>,
}

/// A position and attitude.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Position in meters.
    pub position_m: Vector3<f64>,

    /// Attitude as a quaternion rotating from the body frame into the parent frame.
    pub attitude_q: UnitQuaternion<f64>,
}

/// A pose with a header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseStamped {
    pub header: Header,
    pub pose: Pose,
}

/// Vehicle body velocity with a header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TwistStamped {
    pub header: Header,

    /// Longitudinal velocity.
    ///
    /// Units: meters/second
    pub linear_x_ms: f64,

    /// Yaw rate.
    ///
    /// Units: radians/second
    pub angular_z_rads: f64,
}

/// Status reported by the vehicle's drive-by-wire interface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleStatus {
    pub header: Header,

    /// Wheel speed estimate in meters/second.
    pub speed_ms: f64,

    /// Front wheel steering angle in radians.
    pub steering_angle_rad: f64,

    /// Current drive mode as reported by the vehicle.
    pub drive_mode: DriveMode,
}

/// A single lane waypoint.
///
/// The z component of the position doesn't carry height, it carries the path curvature at this
/// point in 1/meters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaneWaypoint {
    pub pose: Pose,

    /// Target longitudinal speed at this waypoint.
    ///
    /// Units: meters/second
    pub speed_ms: f64,
}

/// An ordered sequence of waypoints plus the routing metadata attached by the lane planner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lane {
    pub header: Header,

    pub lane_id: i32,

    pub lane_index: i32,

    pub is_blocked: bool,

    pub increment: i32,

    pub cost: f64,

    /// Distance to the closest object as reported by the lane planner.
    pub closest_object_distance: f64,

    /// Velocity of the closest object as reported by the lane planner.
    pub closest_object_velocity: f64,

    pub waypoints: Vec<LaneWaypoint>,
}

/// Footprint extents of a detected object.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub length_m: f64,
    pub width_m: f64,
}

/// A single perceived object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedObject {
    pub header: Header,

    pub pose: Pose,

    /// Velocity along the object's heading in meters/second.
    pub velocity_lon_ms: f64,

    pub dimensions: Dimensions,
}

/// A batch of perceived objects, all in the same sensor frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedObjectArray {
    pub header: Header,
    pub objects: Vec<DetectedObject>,
}

/// Data published by the planner at the end of each planning cycle that produced a lane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanOutput {
    /// The cycle number this output was produced in.
    pub tick: u64,

    /// Whether the lane came from the optimiser or from the fallback.
    pub kind: PlanOutputKind,

    /// The speed annotated lane.
    pub lane: Lane,

    /// The committed initial speed, i.e. the speed of the first waypoint.
    pub result_velocity_ms: f64,

    /// The desired speed at the configured lookahead index.
    pub desired_velocity_ms: f64,

    /// The curvature at the start of the trajectory.
    pub curvature_m: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Drive modes reported in [`VehicleStatus`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriveMode {
    Manual,
    Autonomous,
}

/// Source of a published lane.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanOutputKind {
    /// Speeds come from a successful optimisation this cycle.
    Committed,

    /// Speeds are reused from the previous cycle after the optimisation failed.
    Fallback,
}

/// All inputs the planner accepts over its input socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlanInput {
    Lane(Lane),
    Pose(PoseStamped),
    Velocity(TwistStamped),
    Status(VehicleStatus),
    Objects(DetectedObjectArray),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Header {
    /// A header in the given frame stamped with the current time.
    pub fn now(frame_id: &str) -> Self {
        Self {
            frame_id: String::from(frame_id),
            stamp: Utc::now(),
        }
    }
}

impl Pose {
    /// Build a planar pose from a position and heading.
    pub fn from_xy_heading(x_m: f64, y_m: f64, z_m: f64, heading_rad: f64) -> Self {
        Self {
            position_m: Vector3::new(x_m, y_m, z_m),
            attitude_q: UnitQuaternion::from_euler_angles(0.0, 0.0, heading_rad),
        }
    }

    /// Return the heading (rotation about +z from the parent frame's +x axis) in radians.
    pub fn get_heading(&self) -> f64 {
        self.attitude_q.euler_angles().2
    }
}

impl LaneWaypoint {
    /// The curvature carried in the waypoint's auxiliary scalar.
    pub fn curvature_m(&self) -> f64 {
        self.pose.position_m.z
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_pose_heading() {
        let pose = Pose::from_xy_heading(1.0, 2.0, 0.05, 0.75);
        assert!((pose.get_heading() - 0.75).abs() < 1e-12);
        assert_eq!(pose.position_m.z, 0.05);
    }

    #[test]
    fn test_plan_input_json() {
        let input = PlanInput::Velocity(TwistStamped {
            header: Header::now("base_link"),
            linear_x_ms: 2.5,
            angular_z_rads: 0.0,
        });

        let json = serde_json::to_string(&input).unwrap();
        assert!(json.starts_with("{\"Velocity\""));

        let parsed: PlanInput = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, input);
    }
}
