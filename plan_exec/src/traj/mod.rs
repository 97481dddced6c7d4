//! # Trajectory module
//!
//! A trajectory is the lane's waypoint sequence re-anchored so that index 0 is the waypoint
//! nearest the vehicle. Each planning cycle builds a new one from the latest lane, since the
//! vehicle moves between cycles while the lane geometry stays more or less fixed.
//!
//! Once the optimiser (or the fallback) has assigned speeds the trajectory carries a
//! [`SpeedProfile`], and the committed trajectory is kept as the warm start for the next cycle.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use ordered_float::OrderedFloat;
use serde::Serialize;

// Internal
use comms_if::msg::Lane;
use util::maths::cumulative_length;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A single trajectory sample.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct TrajPoint {
    pub x_m: f64,
    pub y_m: f64,
    pub heading_rad: f64,
    pub curvature_m: f64,
}

/// Per-sample speed and acceleration assigned to a trajectory.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SpeedProfile {
    /// Units: meters/second
    pub speed_ms: Vec<f64>,

    /// Units: meters/second^2
    pub accel_mss: Vec<f64>,
}

/// A re-anchored sequence of trajectory samples, optionally speed annotated.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Trajectory {
    pub points: Vec<TrajPoint>,

    /// `None` until the optimiser or the fallback has assigned speeds.
    pub profile: Option<SpeedProfile>,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Find the index of the point nearest to `(x_m, y_m)` by linear scan.
///
/// Ties resolve to the lowest index. Returns `None` for an empty slice.
pub fn nearest_index(points: &[TrajPoint], x_m: f64, y_m: f64) -> Option<usize> {
    points
        .iter()
        .enumerate()
        .min_by_key(|(_, p)| OrderedFloat(p.dist_sq(x_m, y_m)))
        .map(|(i, _)| i)
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl TrajPoint {
    /// Squared distance from this point to `(x_m, y_m)`.
    pub fn dist_sq(&self, x_m: f64, y_m: f64) -> f64 {
        (self.x_m - x_m).powi(2) + (self.y_m - y_m).powi(2)
    }
}

impl SpeedProfile {
    pub fn len(&self) -> usize {
        self.speed_ms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.speed_ms.is_empty()
    }

    /// Index of the first non-finite speed or acceleration.
    pub fn first_non_finite(&self) -> Option<usize> {
        self.speed_ms
            .iter()
            .zip(self.accel_mss.iter())
            .position(|(v, a)| !v.is_finite() || !a.is_finite())
    }
}

impl Trajectory {
    /// Build a trajectory directly from a list of points.
    pub fn from_points(points: Vec<TrajPoint>) -> Self {
        Self {
            points,
            profile: None,
        }
    }

    /// Build a trajectory from a lane, re-anchored on the waypoint nearest to `(x_m, y_m)`.
    ///
    /// Waypoints before the nearest one are dropped. Heading comes from the waypoint attitude and
    /// curvature from the waypoint's auxiliary scalar. Returns `None` if the lane is empty.
    pub fn from_lane(lane: &Lane, x_m: f64, y_m: f64) -> Option<Self> {
        let points: Vec<TrajPoint> = lane
            .waypoints
            .iter()
            .map(|wp| TrajPoint {
                x_m: wp.pose.position_m.x,
                y_m: wp.pose.position_m.y,
                heading_rad: wp.pose.get_heading(),
                curvature_m: wp.curvature_m(),
            })
            .collect();

        let nearest = nearest_index(&points, x_m, y_m)?;

        Some(Self::from_points(points[nearest..].to_vec()))
    }

    /// Number of samples in the trajectory.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Attach a speed profile to the trajectory.
    pub fn with_profile(mut self, profile: SpeedProfile) -> Self {
        self.profile = Some(profile);
        self
    }

    /// Speed at `index`, if the trajectory is annotated and the index exists.
    pub fn speed_at(&self, index: usize) -> Option<f64> {
        self.profile
            .as_ref()
            .and_then(|p| p.speed_ms.get(index).copied())
    }

    /// Acceleration at `index`, if the trajectory is annotated and the index exists.
    pub fn accel_at(&self, index: usize) -> Option<f64> {
        self.profile
            .as_ref()
            .and_then(|p| p.accel_mss.get(index).copied())
    }

    /// Cumulative arc length at each sample, starting from zero.
    pub fn arc_lengths(&self) -> Vec<f64> {
        let xs: Vec<f64> = self.points.iter().map(|p| p.x_m).collect();
        let ys: Vec<f64> = self.points.iter().map(|p| p.y_m).collect();

        cumulative_length(&xs, &ys)
    }

    /// Nearest sample to `(x_m, y_m)` using a coarse scan with the given stride followed by a
    /// fine scan of the neighbourhood around the coarse result.
    ///
    /// The last sample is always part of the coarse scan so that a vehicle near the end of the
    /// trajectory is found. A stride of 0 or 1 is a full linear scan.
    pub fn nearest_index_strided(&self, x_m: f64, y_m: f64, stride: usize) -> Option<usize> {
        let n = self.points.len();
        if n == 0 {
            return None;
        }
        let stride = stride.max(1);

        let coarse = (0..n)
            .step_by(stride)
            .chain(std::iter::once(n - 1))
            .min_by_key(|&i| OrderedFloat(self.points[i].dist_sq(x_m, y_m)))?;

        let lo = coarse.saturating_sub(stride);
        let hi = (coarse + stride).min(n - 1);

        nearest_index(&self.points[lo..=hi], x_m, y_m).map(|i| lo + i)
    }

    /// The part of the trajectory from `offset` onwards, re-indexed from zero.
    ///
    /// The offset is clamped to the last sample, so the result always contains at least one
    /// sample unless the trajectory itself is empty. Any speed profile is sliced along with the
    /// points.
    pub fn tail_from(&self, offset: usize) -> Self {
        if self.points.is_empty() {
            return Self::default();
        }
        let offset = offset.min(self.points.len() - 1);

        let profile = self.profile.as_ref().map(|p| SpeedProfile {
            speed_ms: p.speed_ms.get(offset..).map(|s| s.to_vec()).unwrap_or_default(),
            accel_mss: p.accel_mss.get(offset..).map(|a| a.to_vec()).unwrap_or_default(),
        });

        Self {
            points: self.points[offset..].to_vec(),
            profile,
        }
    }
}
