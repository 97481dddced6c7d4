//! Circle footprint collision checker

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
use super::{CollisionChecker, CollisionInfo, EgoFootprint};
use crate::obstacle::{Obstacle, ObstacleKind};
use crate::traj::Trajectory;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Lowest speed used when converting distance along the trajectory into time.
const MIN_TIMING_SPEED_MS: f64 = 0.1;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Collision checker approximating the vehicle and every obstacle by a circle.
///
/// Static obstacles are tested against every sample. Dynamic obstacles are propagated at
/// constant velocity to the time the vehicle reaches each sample, with their radius growing by
/// the velocity margin, until the prediction horizon runs out.
#[derive(Debug, Clone)]
pub struct CircleCollisionChecker {
    /// Speed assumed for samples without a speed annotation.
    nominal_speed_ms: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl CircleCollisionChecker {
    pub fn new(nominal_speed_ms: f64) -> Self {
        Self { nominal_speed_ms }
    }

    /// Time at which the vehicle reaches each sample.
    fn sample_times(&self, trajectory: &Trajectory, arc_lengths: &[f64]) -> Vec<f64> {
        arc_lengths
            .iter()
            .enumerate()
            .map(|(i, s)| {
                let v_ref = trajectory.speed_at(i).unwrap_or(self.nominal_speed_ms);
                s / v_ref.max(MIN_TIMING_SPEED_MS)
            })
            .collect()
    }
}

impl CollisionChecker for CircleCollisionChecker {
    fn check(
        &self,
        trajectory: &Trajectory,
        obstacles: &[Obstacle],
        ego: &EgoFootprint,
    ) -> Option<CollisionInfo> {
        let ego_radius_m = ego.bounding_radius_m();
        let arc_lengths = trajectory.arc_lengths();
        let times = self.sample_times(trajectory, &arc_lengths);

        for (i, point) in trajectory.points.iter().enumerate() {
            for obstacle in obstacles.iter() {
                let (radius_m, t_s) = match obstacle.kind {
                    ObstacleKind::Static => (obstacle.radius_m, 0.0),
                    ObstacleKind::Dynamic(prediction) => {
                        if times[i] > prediction.horizon_s {
                            continue;
                        }
                        (
                            obstacle.radius_m + prediction.velocity_margin_ms * times[i],
                            times[i],
                        )
                    }
                };

                let (ox, oy) = obstacle.position_at(t_s);

                if point.dist_sq(ox, oy) < (ego_radius_m + radius_m).powi(2) {
                    let time_s = match obstacle.kind {
                        ObstacleKind::Static => None,
                        ObstacleKind::Dynamic(_) => Some(times[i]),
                    };

                    return Some(CollisionInfo {
                        index: i,
                        obstacle_type: obstacle.obstacle_type(),
                        time_s,
                        distance_m: Some(arc_lengths[i]),
                    });
                }
            }
        }

        None
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::obstacle::{ObstacleType, Prediction};
    use crate::traj::test::straight_points;

    fn ego() -> EgoFootprint {
        // Bounding radius of exactly 1 m
        EgoFootprint {
            length_m: 1.6,
            width_m: 1.2,
            wheel_base_m: 1.0,
            safety_distance_m: 0.0,
        }
    }

    fn static_obstacle(x_m: f64, y_m: f64) -> Obstacle {
        Obstacle {
            x_m,
            y_m,
            heading_rad: 0.0,
            radius_m: 0.5,
            velocity_ms: 0.0,
            kind: ObstacleKind::Static,
        }
    }

    #[test]
    fn test_static_first_index() {
        let traj = Trajectory::from_points(straight_points(100));
        let checker = CircleCollisionChecker::new(2.0);

        let info = checker
            .check(&traj, &[static_obstacle(60.0, 0.0), static_obstacle(40.0, 1.0)], &ego())
            .unwrap();

        // Obstacle at x = 40, y = 1 touches the 1.5 m clearance from x = 39 onwards
        assert_eq!(info.index, 39);
        assert_eq!(info.obstacle_type, ObstacleType::Static);
        assert_eq!(info.time_s, None);
        assert_eq!(info.distance_m, Some(39.0));

        assert!(checker
            .check(&traj, &[static_obstacle(50.0, 3.0)], &ego())
            .is_none());
    }

    #[test]
    fn test_dynamic_horizon() {
        let traj = Trajectory::from_points(straight_points(100));
        let checker = CircleCollisionChecker::new(1.0);

        // Oncoming obstacle at x = 30 moving towards the vehicle at 1 m/s
        let oncoming = Obstacle {
            x_m: 30.0,
            y_m: 0.0,
            heading_rad: std::f64::consts::PI,
            radius_m: 0.5,
            velocity_ms: 1.0,
            kind: ObstacleKind::Dynamic(Prediction {
                horizon_s: 20.0,
                velocity_margin_ms: 0.0,
            }),
        };

        let info = checker.check(&traj, &[oncoming], &ego()).unwrap();
        assert_eq!(info.obstacle_type, ObstacleType::Dynamic);

        // Vehicle and obstacle meet at x = 15 after 15 s
        assert_eq!(info.index, 15);
        assert_eq!(info.time_s, Some(15.0));
        assert_eq!(info.distance_m, Some(15.0));

        // Same obstacle with a horizon shorter than the meeting time is ignored
        let short = Obstacle {
            kind: ObstacleKind::Dynamic(Prediction {
                horizon_s: 5.0,
                velocity_margin_ms: 0.0,
            }),
            ..oncoming
        };
        assert!(checker.check(&traj, &[short], &ego()).is_none());
    }
}
