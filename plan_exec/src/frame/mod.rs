//! # Frame alignment module
//!
//! Obstacles arrive in whatever frame perception publishes them in, while the lane is expressed
//! in its own frame. Before any geometry is done the obstacles are moved into the lane frame
//! using a [`TransformSource`].
//!
//! Alignment never modifies the received obstacle batch, it produces a new list of
//! [`AlignedObject`]s. Objects whose frame cannot be reached are dropped for this cycle.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod static_tree;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use chrono::{DateTime, Utc};
use log::{debug, warn};
use nalgebra::{Isometry2, Point2, UnitQuaternion, Vector2, Vector3};
use std::collections::HashMap;
use thiserror::Error;

// Internal
use comms_if::msg::{DetectedObjectArray, Dimensions, Pose};
pub use static_tree::{FrameEdge, FrameParams, StaticFrameTree};

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A service able to provide the transform between two named frames.
pub trait TransformSource {
    /// Find the transform which maps poses expressed in `source` into `target`, valid at
    /// `stamp`.
    fn lookup(
        &self,
        target: &str,
        source: &str,
        stamp: &DateTime<Utc>,
    ) -> Result<FrameTransform, FrameError>;
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A planar rigid transform between two frames.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameTransform {
    pub target: String,
    pub source: String,

    /// Maps `source` coordinates into `target` coordinates.
    pub iso: Isometry2<f64>,
}

/// A detected object expressed in the lane frame.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedObject {
    pub pose: Pose,
    pub velocity_lon_ms: f64,
    pub dimensions: Dimensions,
}

/// Result of aligning one obstacle batch.
#[derive(Debug, Clone, Default)]
pub struct Alignment {
    pub objects: Vec<AlignedObject>,

    /// Number of objects dropped because their frame could not be reached.
    pub num_dropped: usize,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FrameError {
    #[error("No transform path from {source_frame:?} to {target:?}")]
    NoPath {
        target: String,
        source_frame: String,
    },
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Express every object of the batch in `target_frame`.
///
/// One lookup is made per distinct source frame in the batch (an object's own header frame,
/// or the batch header frame if the object's is empty). If a lookup fails every object in that
/// frame is dropped and the failure is logged.
pub fn align_objects(
    batch: &DetectedObjectArray,
    target_frame: &str,
    transforms: &dyn TransformSource,
) -> Alignment {
    let mut cache: HashMap<&str, Option<FrameTransform>> = HashMap::new();
    let mut alignment = Alignment::default();

    for object in batch.objects.iter() {
        let source = if object.header.frame_id.is_empty() {
            batch.header.frame_id.as_str()
        } else {
            object.header.frame_id.as_str()
        };

        let tf = cache.entry(source).or_insert_with(|| {
            match transforms.lookup(target_frame, source, &batch.header.stamp) {
                Ok(tf) => Some(tf),
                Err(e) => {
                    warn!(
                        "Dropping obstacles in frame {:?}, could not transform into {:?}: {}",
                        source, target_frame, e
                    );
                    None
                }
            }
        });

        match tf {
            Some(tf) => alignment.objects.push(AlignedObject {
                pose: tf.apply(&object.pose),
                velocity_lon_ms: object.velocity_lon_ms,
                dimensions: object.dimensions,
            }),
            None => alignment.num_dropped += 1,
        }
    }

    debug!(
        "Aligned {} obstacles into {:?} ({} dropped)",
        alignment.objects.len(),
        target_frame,
        alignment.num_dropped
    );

    alignment
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl FrameTransform {
    /// The identity transform of a frame onto itself.
    pub fn identity(frame: &str) -> Self {
        Self {
            target: String::from(frame),
            source: String::from(frame),
            iso: Isometry2::identity(),
        }
    }

    /// Create a transform from a translation and rotation about +z.
    pub fn new(target: &str, source: &str, x_m: f64, y_m: f64, yaw_rad: f64) -> Self {
        Self {
            target: String::from(target),
            source: String::from(source),
            iso: Isometry2::new(Vector2::new(x_m, y_m), yaw_rad),
        }
    }

    /// The transform in the opposite direction.
    pub fn inverse(&self) -> Self {
        Self {
            target: self.source.clone(),
            source: self.target.clone(),
            iso: self.iso.inverse(),
        }
    }

    /// Compose `self` (`b <- a`) with `next` (`c <- b`), giving `c <- a`.
    pub fn then(&self, next: &FrameTransform) -> Self {
        Self {
            target: next.target.clone(),
            source: self.source.clone(),
            iso: next.iso * self.iso,
        }
    }

    /// Apply the transform to a pose in the source frame.
    ///
    /// Position x/y and heading are transformed, the z component is passed through unchanged.
    pub fn apply(&self, pose: &Pose) -> Pose {
        let p = self.iso * Point2::new(pose.position_m.x, pose.position_m.y);
        let yaw = UnitQuaternion::from_euler_angles(0.0, 0.0, self.iso.rotation.angle());

        Pose {
            position_m: Vector3::new(p.x, p.y, pose.position_m.z),
            attitude_q: yaw * pose.attitude_q,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use comms_if::msg::{DetectedObject, Header};
    use std::f64::consts::FRAC_PI_2;

    /// Fixed lookup table for tests: only `map <- lidar` is known.
    struct LidarOnly;

    impl TransformSource for LidarOnly {
        fn lookup(
            &self,
            target: &str,
            source: &str,
            _stamp: &DateTime<Utc>,
        ) -> Result<FrameTransform, FrameError> {
            if target == "map" && source == "lidar" {
                Ok(FrameTransform::new("map", "lidar", 10.0, 0.0, FRAC_PI_2))
            } else {
                Err(FrameError::NoPath {
                    target: target.into(),
                    source_frame: source.into(),
                })
            }
        }
    }

    fn object(frame: &str, x: f64, y: f64) -> DetectedObject {
        DetectedObject {
            header: Header::now(frame),
            pose: Pose::from_xy_heading(x, y, 0.0, 0.0),
            velocity_lon_ms: 1.0,
            dimensions: Dimensions {
                length_m: 4.0,
                width_m: 2.0,
            },
        }
    }

    #[test]
    fn test_apply() {
        let tf = FrameTransform::new("map", "lidar", 10.0, 0.0, FRAC_PI_2);
        let pose = tf.apply(&Pose::from_xy_heading(1.0, 0.0, 0.3, 0.0));

        assert!((pose.position_m.x - 10.0).abs() < 1e-9);
        assert!((pose.position_m.y - 1.0).abs() < 1e-9);
        assert_eq!(pose.position_m.z, 0.3);
        assert!((pose.get_heading() - FRAC_PI_2).abs() < 1e-9);

        let back = tf.inverse().apply(&pose);
        assert!((back.position_m.x - 1.0).abs() < 1e-9);
        assert!(back.position_m.y.abs() < 1e-9);
    }

    #[test]
    fn test_align_drops_unknown_frames() {
        let batch = DetectedObjectArray {
            header: Header::now("lidar"),
            objects: vec![object("lidar", 1.0, 0.0), object("radar", 5.0, 5.0), object("", 2.0, 0.0)],
        };

        let alignment = align_objects(&batch, "map", &LidarOnly);

        assert_eq!(alignment.num_dropped, 1);
        assert_eq!(alignment.objects.len(), 2);
        assert!((alignment.objects[1].pose.position_m.y - 2.0).abs() < 1e-9);

        // The input batch is untouched
        assert_eq!(batch.objects[0].pose.position_m.x, 1.0);
    }
}
