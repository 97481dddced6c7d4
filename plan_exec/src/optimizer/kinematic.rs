//! Forward/backward kinematic speed optimiser
//!
//! The speed limit at each sample is the lowest of the ceiling, the desired speed and the
//! speed at which the lateral acceleration reaches its hard limit. A forward pass then limits
//! acceleration from the initial speed, sharing the friction circle with the lateral
//! acceleration, and a backward pass limits braking so every limit can be met.
//!
//! When the initial speed is too high to meet the limits with the hard braking bound the
//! profile brakes at that bound from the first sample until it rejoins the limited profile.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, warn};

// Internal
use super::{OptimizerError, OptimizerInput, OptimizerParams, SpeedOptimizer, SpeedProfile};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Curvatures below this are treated as straight.
const MIN_CURVATURE_M: f64 = 1e-9;

/// Allowed excess of the initial speed over the braking bound.
const BRAKING_TOLERANCE_MS: f64 = 1e-6;

/// Segments shorter than this produce zero acceleration.
const MIN_SEGMENT_M: f64 = 1e-9;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct KinematicSpeedOptimizer {
    params: OptimizerParams,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl KinematicSpeedOptimizer {
    pub fn new(params: OptimizerParams) -> Self {
        info!(
            "Kinematic speed optimiser: mass {} kg, mu {}, ds {} m, preview {} m",
            params.mass_kg, params.mu, params.ds_m, params.preview_distance_m
        );
        info!(
            "Weights (unused by this backend): time {}, smooth {}, velocity {}, lon slack {}, \
            lat slack {}, curvature {}, decay {}",
            params.time_weight,
            params.smooth_weight,
            params.velocity_weight,
            params.lon_slack_weight,
            params.lat_slack_weight,
            params.curvature_weight,
            params.decay_factor
        );

        Self { params }
    }

    pub fn params(&self) -> &OptimizerParams {
        &self.params
    }
}

impl SpeedOptimizer for KinematicSpeedOptimizer {
    fn solve(&mut self, input: &OptimizerInput) -> Result<SpeedProfile, OptimizerError> {
        let n = input.validate()?;
        let bounds = input.bounds;
        let points = &input.trajectory.points;
        let s = input.trajectory.arc_lengths();

        // Collision ahead within the safety horizon: stop before it
        let stop_distance_m = match input.collision {
            Some(c) if c.within(input.safety_horizon_s) => {
                debug!(
                    "Stopping before collision at {:.2} m ({:?} s)",
                    c.distance_m, c.time_s
                );
                Some(c.distance_m)
            }
            _ => None,
        };

        // Per-sample speed limit
        let limit: Vec<f64> = (0..n)
            .map(|i| {
                if let Some(d) = stop_distance_m {
                    if s[i] >= d {
                        return 0.0;
                    }
                }

                let mut v = bounds.vr[i];
                if bounds.vd[i] > 0.0 {
                    v = v.min(bounds.vd[i]);
                }
                let k = points[i].curvature_m.abs();
                if k > MIN_CURVATURE_M {
                    v = v.min((bounds.arlat[i] / k).sqrt());
                }
                v.max(0.0)
            })
            .collect();

        // Forward pass
        let mut v = vec![0.0; n];
        v[0] = input.v0_ms.max(0.0);
        for i in 0..n - 1 {
            let ds = s[i + 1] - s[i];
            let a_lat = v[i].powi(2) * points[i].curvature_m.abs();
            let a_lon = bounds.aclon[i].min((bounds.arlon[i].powi(2) - a_lat.powi(2)).max(0.0).sqrt());

            v[i + 1] = limit[i + 1].min((v[i].powi(2) + 2.0 * a_lon * ds).sqrt());
        }

        // Backward pass
        let mut short_braking = false;
        for i in (0..n - 1).rev() {
            let ds = s[i + 1] - s[i];
            let bound = (v[i + 1].powi(2) + 2.0 * bounds.arlon[i] * ds).sqrt();

            if i == 0 {
                short_braking = v[0] > bound + BRAKING_TOLERANCE_MS;
            } else {
                v[i] = v[i].min(bound);
            }
        }

        // Not enough distance to meet the limits, brake as hard as allowed
        if short_braking {
            warn!(
                "Initial speed {:.3} m/s exceeds the braking bound, braking at {:.3} m/s^2",
                v[0], bounds.arlon[0]
            );
            for i in 0..n - 1 {
                let ds = s[i + 1] - s[i];
                let braked = (v[i].powi(2) - 2.0 * bounds.arlon[i] * ds).max(0.0).sqrt();
                v[i + 1] = v[i + 1].max(braked);
            }
        }

        let mut a = vec![0.0; n];
        for i in 0..n - 1 {
            let ds = s[i + 1] - s[i];
            if ds > MIN_SEGMENT_M {
                a[i] = (v[i + 1].powi(2) - v[i].powi(2)) / (2.0 * ds);
            }
        }

        Ok(SpeedProfile {
            speed_ms: v,
            accel_mss: a,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::constraints::{synthesize, ConstraintParams, ConstraintProfile};
    use crate::optimizer::CollisionTarget;
    use crate::traj::{test::straight_points, Trajectory};

    fn input<'a>(traj: &'a Trajectory, bounds: &'a ConstraintProfile, v0_ms: f64) -> OptimizerInput<'a> {
        OptimizerInput {
            trajectory: traj,
            bounds,
            v0_ms,
            a0_mss: 0.0,
            collision: None,
            safety_horizon_s: 10.0,
        }
    }

    #[test]
    fn test_free_flow_respects_bounds() {
        let traj = Trajectory::from_points(straight_points(100));
        let bounds = synthesize(&traj, 1.0, None, &ConstraintParams::default());
        let mut opt = KinematicSpeedOptimizer::new(OptimizerParams::default());

        let profile = opt.solve(&input(&traj, &bounds, 1.0)).unwrap();

        assert_eq!(profile.len(), 100);
        assert_eq!(profile.speed_ms[0], 1.0);
        assert!((profile.speed_ms[99] - 4.5).abs() < 1e-9);

        for i in 0..99 {
            assert!(profile.speed_ms[i] <= bounds.vr[i] + 1e-9);
            assert!(profile.accel_mss[i] <= bounds.aclon[i] + 1e-9);
            assert!(profile.accel_mss[i] >= -bounds.arlon[i] - 1e-9);
        }
        assert_eq!(profile.accel_mss[99], 0.0);
    }

    #[test]
    fn test_stops_before_collision() {
        let traj = Trajectory::from_points(straight_points(100));
        let bounds = synthesize(&traj, 2.0, None, &ConstraintParams::default());
        let mut opt = KinematicSpeedOptimizer::new(OptimizerParams::default());

        let mut inp = input(&traj, &bounds, 2.0);
        inp.collision = Some(CollisionTarget {
            distance_m: 50.0,
            time_s: Some(8.0),
        });

        let profile = opt.solve(&inp).unwrap();
        assert!(profile.speed_ms[50..].iter().all(|&v| v == 0.0));
        assert!(profile.speed_ms[49] > 0.0);

        // Beyond the safety horizon the collision is ignored
        inp.collision = Some(CollisionTarget {
            distance_m: 50.0,
            time_s: Some(12.0),
        });
        let profile = opt.solve(&inp).unwrap();
        assert!(profile.speed_ms[60] > 0.0);

        // Static collisions have no time and are always acted on
        inp.collision = Some(CollisionTarget {
            distance_m: 50.0,
            time_s: None,
        });
        let profile = opt.solve(&inp).unwrap();
        assert!(profile.speed_ms[50..].iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_stops_inside_clearance() {
        let traj = Trajectory::from_points(straight_points(20));
        let bounds = synthesize(&traj, 0.0, None, &ConstraintParams::default());
        let mut opt = KinematicSpeedOptimizer::new(OptimizerParams::default());

        let mut inp = input(&traj, &bounds, 0.0);
        inp.collision = Some(CollisionTarget {
            distance_m: 0.0,
            time_s: None,
        });

        let profile = opt.solve(&inp).unwrap();
        assert!(profile.speed_ms.iter().all(|&v| v == 0.0));
        assert!(profile.accel_mss.iter().all(|&a| a == 0.0));
    }

    #[test]
    fn test_short_braking_brakes_hard() {
        let traj = Trajectory::from_points(straight_points(20));
        let bounds = synthesize(&traj, 4.5, None, &ConstraintParams::default());
        let mut opt = KinematicSpeedOptimizer::new(OptimizerParams::default());

        let mut inp = input(&traj, &bounds, 4.5);
        inp.collision = Some(CollisionTarget {
            distance_m: 1.0,
            time_s: None,
        });

        let profile = opt.solve(&inp).unwrap();
        let arlon = bounds.arlon[0];

        // v^2 drops by 2 * arlon per meter until the vehicle is stopped
        assert_eq!(profile.speed_ms[0], 4.5);
        assert!((profile.speed_ms[1] - (4.5f64.powi(2) - 2.0 * arlon).sqrt()).abs() < 1e-9);
        assert!((profile.speed_ms[2] - (4.5f64.powi(2) - 4.0 * arlon).sqrt()).abs() < 1e-9);
        assert!(profile.speed_ms[3..].iter().all(|&v| v == 0.0));

        for i in 0..19 {
            assert!(profile.accel_mss[i] >= -arlon - 1e-9);
        }
    }

    #[test]
    fn test_invalid_input() {
        let traj = Trajectory::from_points(straight_points(10));
        let bounds = synthesize(&traj, 1.0, None, &ConstraintParams::default());
        let mut opt = KinematicSpeedOptimizer::new(OptimizerParams::default());

        let empty = Trajectory::default();
        assert_eq!(
            opt.solve(&input(&empty, &bounds, 1.0)),
            Err(OptimizerError::EmptyTrajectory)
        );

        let short = Trajectory::from_points(straight_points(5));
        assert_eq!(
            opt.solve(&input(&short, &bounds, 1.0)),
            Err(OptimizerError::BoundsMismatch { expected: 5 })
        );
    }
}
