//! # Obstacle classification
//!
//! Aligned objects are turned into planar obstacles with a circular bounding footprint and
//! classified as static or dynamic from their longitudinal speed.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Serialize;

// Internal
use crate::frame::AlignedObject;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A planar obstacle in the lane frame.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct Obstacle {
    pub x_m: f64,
    pub y_m: f64,
    pub heading_rad: f64,

    /// Radius of the circle bounding the obstacle's footprint.
    pub radius_m: f64,

    /// Longitudinal velocity along the obstacle's heading.
    ///
    /// Units: meters/second
    pub velocity_ms: f64,

    pub kind: ObstacleKind,
}

/// Prediction settings carried by a dynamic obstacle.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct Prediction {
    /// How far ahead the obstacle's motion is propagated.
    ///
    /// Units: seconds
    pub horizon_s: f64,

    /// Growth rate of the obstacle's radius with prediction time, covering velocity
    /// uncertainty.
    ///
    /// Units: meters/second
    pub velocity_margin_ms: f64,
}

/// Parameters for the classifier.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ClassifierParams {
    /// Objects strictly faster than this (in magnitude) are dynamic.
    pub dynamic_speed_threshold_ms: f64,

    pub prediction: Prediction,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub enum ObstacleKind {
    Static,
    Dynamic(Prediction),
}

/// The kind of obstacle, without any of the associated data.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum ObstacleType {
    Static,
    Dynamic,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Convert aligned objects into classified obstacles.
pub fn classify(objects: &[AlignedObject], params: &ClassifierParams) -> Vec<Obstacle> {
    objects
        .iter()
        .map(|o| Obstacle::from_aligned(o, params))
        .collect()
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Obstacle {
    /// Build an obstacle from an aligned object.
    ///
    /// The bounding radius is the full diagonal of the footprint rectangle.
    pub fn from_aligned(object: &AlignedObject, params: &ClassifierParams) -> Self {
        let kind = if object.velocity_lon_ms.abs() > params.dynamic_speed_threshold_ms {
            ObstacleKind::Dynamic(params.prediction)
        } else {
            ObstacleKind::Static
        };

        Self {
            x_m: object.pose.position_m.x,
            y_m: object.pose.position_m.y,
            heading_rad: object.pose.get_heading(),
            radius_m: object.dimensions.length_m.hypot(object.dimensions.width_m),
            velocity_ms: object.velocity_lon_ms,
            kind,
        }
    }

    pub fn obstacle_type(&self) -> ObstacleType {
        match self.kind {
            ObstacleKind::Static => ObstacleType::Static,
            ObstacleKind::Dynamic(_) => ObstacleType::Dynamic,
        }
    }

    /// Predicted centre of the obstacle after `t_s` seconds at constant velocity along its
    /// heading. Static obstacles don't move.
    pub fn position_at(&self, t_s: f64) -> (f64, f64) {
        match self.kind {
            ObstacleKind::Static => (self.x_m, self.y_m),
            ObstacleKind::Dynamic(_) => (
                self.x_m + self.velocity_ms * t_s * self.heading_rad.cos(),
                self.y_m + self.velocity_ms * t_s * self.heading_rad.sin(),
            ),
        }
    }
}

impl Default for ClassifierParams {
    fn default() -> Self {
        Self {
            dynamic_speed_threshold_ms: 0.1,
            prediction: Prediction {
                horizon_s: 5.0,
                velocity_margin_ms: 0.5,
            },
        }
    }
}
