//! Speed control module state

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, warn};
use serde::Serialize;

// Internal
use super::Params;
use crate::{
    collision::{evaluate, CircleCollisionChecker, CollisionChecker, CollisionInfo},
    constraints::{synthesize, ConstraintParams, ConstraintProfile},
    frame::{align_objects, FrameParams, StaticFrameTree, TransformSource},
    input_cache::Snapshot,
    obstacle::{classify, ClassifierParams, Obstacle},
    optimizer::{
        CollisionTarget, KinematicSpeedOptimizer, OptimizerError, OptimizerInput, SpeedOptimizer,
        SpeedProfile,
    },
    traj::Trajectory,
};
use comms_if::msg::{Lane, LaneWaypoint, PlanOutput, PlanOutputKind, Pose, VehicleStatus};
use util::{maths::clamp, module::State, params, session::Session};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The speed planner.
pub struct SpeedPlanner {
    params: Params,
    constraint_params: ConstraintParams,
    classifier_params: ClassifierParams,

    optimizer: Box<dyn SpeedOptimizer + Send>,
    checker: Box<dyn CollisionChecker + Send>,
    transforms: Box<dyn TransformSource + Send>,

    /// The trajectory committed in the previous cycle
    warm_start: WarmStart,

    /// Number of cycles processed
    tick: u64,
}

/// Paths to the parameter files needed to initialise the planner.
#[derive(Debug, Clone)]
pub struct InitData {
    pub params_file: String,
    pub frames_file: String,
}

/// The trajectory committed in a previous cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct WarmStartState {
    /// Speed annotated trajectory, either optimised or a fallback.
    pub trajectory: Trajectory,

    /// Initial speed used in the cycle which committed the trajectory.
    pub v0_ms: f64,
}

/// Monitoring quantities for one cycle.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusReport {
    /// The last state reached in the cycle.
    pub mode: PlannerMode,

    pub v0_ms: f64,
    pub a0_mss: f64,

    /// Longitudinal velocity measured by the vehicle.
    pub measured_speed_ms: f64,

    /// Latest vehicle status, if one has been received.
    pub vehicle_status: Option<VehicleStatus>,

    pub trajectory_len: usize,

    /// Index of the vehicle on the warm start trajectory.
    pub warm_start_index: Option<usize>,

    pub num_obstacles: usize,
    pub num_dropped_obstacles: usize,

    pub collision: Option<CollisionInfo>,

    /// Description of the optimiser failure, if any.
    pub optimizer_error: Option<String>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Warm start state between cycles.
#[derive(Debug, Clone, PartialEq)]
pub enum WarmStart {
    /// Nothing has been committed yet.
    ColdStart,

    Warm(WarmStartState),
}

/// States of the per-cycle state machine.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum PlannerMode {
    AwaitInputs,
    Plan,
    CommitSuccess,
    CommitFallback,
}

/// What a cycle produced.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Inputs were missing, nothing was done.
    Skipped,

    /// The optimiser failed and there was no previous trajectory to fall back on.
    NoOutput,

    /// An output to publish.
    Publish(PlanOutput),

    /// A fallback output which is not published because `publish_fallback` is off.
    Withheld(PlanOutput),
}

#[derive(Debug, thiserror::Error)]
pub enum SpeedPlannerError {
    #[error("Could not load parameters: {0}")]
    ParamLoadError(params::LoadError),

    #[error("Could not load frame parameters: {0}")]
    FrameParamLoadError(params::LoadError),

    #[error("Received a non-finite {0}")]
    NonFiniteInput(&'static str),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl State for SpeedPlanner {
    type InitData = InitData;
    type InitError = SpeedPlannerError;

    type InputData = Snapshot;
    type OutputData = TickOutcome;
    type StatusReport = StatusReport;
    type ProcError = SpeedPlannerError;

    /// Initialise the planner with the kinematic optimiser, the circle collision checker and
    /// the static frame tree.
    fn init(init_data: Self::InitData, _session: &Session) -> Result<Self, Self::InitError> {
        let params: Params =
            params::load(&init_data.params_file).map_err(SpeedPlannerError::ParamLoadError)?;
        let frame_params: FrameParams = params::load(&init_data.frames_file)
            .map_err(SpeedPlannerError::FrameParamLoadError)?;

        Ok(Self::new(params, Box::new(StaticFrameTree::new(&frame_params))))
    }

    /// Run one planning cycle on the snapshot.
    fn proc(
        &mut self,
        snapshot: &Self::InputData,
    ) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {
        self.tick += 1;
        let mut report = StatusReport {
            mode: PlannerMode::AwaitInputs,
            ..Default::default()
        };

        // ---- AWAIT INPUTS ----

        let (lane, pose, velocity) = match (&snapshot.lane, &snapshot.pose, &snapshot.velocity) {
            (Some(l), Some(p), Some(v)) if !l.waypoints.is_empty() => (l, p, v),
            _ => {
                debug!("Waiting for lane, pose and velocity");
                return Ok((TickOutcome::Skipped, report));
            }
        };

        let x_m = pose.pose.position_m.x;
        let y_m = pose.pose.position_m.y;
        if !x_m.is_finite() || !y_m.is_finite() {
            return Err(SpeedPlannerError::NonFiniteInput("pose"));
        }
        let measured_speed_ms = velocity.linear_x_ms;
        if !measured_speed_ms.is_finite() {
            return Err(SpeedPlannerError::NonFiniteInput("velocity"));
        }

        // ---- PLAN ----

        report.mode = PlannerMode::Plan;
        report.measured_speed_ms = measured_speed_ms;
        report.vehicle_status = snapshot.status.as_deref().cloned();
        if let Some(ref status) = report.vehicle_status {
            debug!(
                "Vehicle status: {:?}, wheel speed {:.3} m/s, steering {:.3} rad",
                status.drive_mode, status.speed_ms, status.steering_angle_rad
            );
        }

        let trajectory = match Trajectory::from_lane(lane, x_m, y_m) {
            Some(t) => t,
            None => return Ok((TickOutcome::Skipped, report)),
        };
        report.trajectory_len = trajectory.len();

        // Initial conditions from the warm start
        let (v0_ms, a0_mss, warm_start_index) = match &self.warm_start {
            WarmStart::ColdStart => (measured_speed_ms, 0.0, None),
            WarmStart::Warm(ws) => {
                match ws.trajectory.nearest_index_strided(
                    x_m,
                    y_m,
                    self.params.warm_start_search_stride,
                ) {
                    Some(i) => (
                        ws.trajectory.speed_at(i).unwrap_or(measured_speed_ms),
                        ws.trajectory.accel_at(i).unwrap_or(0.0),
                        Some(i),
                    ),
                    None => (measured_speed_ms, 0.0, None),
                }
            }
        };
        report.v0_ms = v0_ms;
        report.a0_mss = a0_mss;
        report.warm_start_index = warm_start_index;

        info!(
            "v0: {:.3} m/s, a0: {:.3} m/s^2, current velocity: {:.3} m/s",
            v0_ms, a0_mss, measured_speed_ms
        );
        debug!(
            "Nearest lane index re-anchored, {} points, warm start index {:?}",
            trajectory.len(),
            warm_start_index
        );

        // Obstacles and collisions
        let obstacles: Vec<Obstacle> = match &snapshot.objects {
            Some(batch) => {
                let alignment =
                    align_objects(batch, &lane.header.frame_id, self.transforms.as_ref());
                report.num_dropped_obstacles = alignment.num_dropped;
                classify(&alignment.objects, &self.classifier_params)
            }
            None => Vec::new(),
        };
        report.num_obstacles = obstacles.len();

        // Time the samples with the speeds the vehicle is expected to follow
        let timing = self.timing_profile(trajectory.len(), v0_ms, warm_start_index);
        let trajectory = trajectory.with_profile(timing);

        let collision = evaluate(
            self.checker.as_ref(),
            &trajectory,
            &obstacles,
            &self.params.vehicle,
        );
        report.collision = collision;

        // Bounds and optimisation
        let bounds = synthesize(&trajectory, v0_ms, collision.as_ref(), &self.constraint_params);

        let input = OptimizerInput {
            trajectory: &trajectory,
            bounds: &bounds,
            v0_ms,
            a0_mss,
            collision: collision.as_ref().and_then(CollisionTarget::from_collision),
            safety_horizon_s: self.params.safety_time_horizon_s,
        };

        let n = trajectory.len();
        let result = self.optimizer.solve(&input).and_then(|p| {
            if p.speed_ms.len() != n || p.accel_mss.len() != n {
                return Err(OptimizerError::ProfileLengthMismatch {
                    expected: n,
                    found: p.speed_ms.len(),
                });
            }
            match p.first_non_finite() {
                Some(index) => Err(OptimizerError::NonFiniteProfile { index }),
                None => Ok(p),
            }
        });

        // ---- COMMIT ----

        match result {
            Ok(profile) => {
                report.mode = PlannerMode::CommitSuccess;

                let cap_ms = self.params.output_speed_cap_ms;
                let committed = trajectory.with_profile(SpeedProfile {
                    speed_ms: profile.speed_ms.iter().map(|&v| clamp(v, 0.0, cap_ms)).collect(),
                    accel_mss: profile.accel_mss,
                });

                let output = self.build_output(PlanOutputKind::Committed, lane, &committed, &bounds);
                info!(
                    "Committed optimised speeds, result velocity {:.3} m/s",
                    output.result_velocity_ms
                );

                self.warm_start = WarmStart::Warm(WarmStartState {
                    trajectory: committed,
                    v0_ms,
                });

                Ok((TickOutcome::Publish(output), report))
            }
            Err(e) => {
                warn!("Speed optimisation failed: {}", e);
                report.mode = PlannerMode::CommitFallback;
                report.optimizer_error = Some(e.to_string());

                let fallback = match &self.warm_start {
                    WarmStart::ColdStart => {
                        warn!("No previous trajectory to fall back on, nothing published");
                        return Ok((TickOutcome::NoOutput, report));
                    }
                    WarmStart::Warm(ws) => ws.trajectory.tail_from(warm_start_index.unwrap_or(0)),
                };

                let output = self.build_output(PlanOutputKind::Fallback, lane, &fallback, &bounds);

                self.warm_start = WarmStart::Warm(WarmStartState {
                    trajectory: fallback,
                    v0_ms,
                });

                if self.params.publish_fallback {
                    info!("Committed fallback speeds from the previous trajectory");
                    Ok((TickOutcome::Publish(output), report))
                } else {
                    info!("Fallback built but not published (publish_fallback is off)");
                    Ok((TickOutcome::Withheld(output), report))
                }
            }
        }
    }
}

impl SpeedPlanner {
    /// Create a planner using the kinematic optimiser and the circle collision checker.
    pub fn new(params: Params, transforms: Box<dyn TransformSource + Send>) -> Self {
        let optimizer = Box::new(KinematicSpeedOptimizer::new(params.optimizer.clone()));
        let checker = Box::new(CircleCollisionChecker::new(params.collision_nominal_speed_ms));

        Self::with_backends(params, optimizer, checker, transforms)
    }

    /// Create a planner with the given collaborators.
    pub fn with_backends(
        params: Params,
        optimizer: Box<dyn SpeedOptimizer + Send>,
        checker: Box<dyn CollisionChecker + Send>,
        transforms: Box<dyn TransformSource + Send>,
    ) -> Self {
        if !params.publish_fallback {
            info!("Fallback lanes will not be published");
        }

        Self {
            constraint_params: params.constraint_params(),
            classifier_params: params.classifier_params(),
            params,
            optimizer,
            checker,
            transforms,
            warm_start: WarmStart::ColdStart,
            tick: 0,
        }
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn warm_start(&self) -> &WarmStart {
        &self.warm_start
    }

    /// Speeds used to time the trajectory for collision checking.
    ///
    /// The warm start speeds from the vehicle's index onwards, padded with the last one, or the
    /// initial speed everywhere on a cold start.
    fn timing_profile(
        &self,
        n: usize,
        v0_ms: f64,
        warm_start_index: Option<usize>,
    ) -> SpeedProfile {
        let speed_ms = match (&self.warm_start, warm_start_index) {
            (WarmStart::Warm(ws), Some(i)) => {
                let last = ws
                    .trajectory
                    .profile
                    .as_ref()
                    .and_then(|p| p.speed_ms.last().copied())
                    .unwrap_or(v0_ms);
                (0..n)
                    .map(|k| ws.trajectory.speed_at(i + k).unwrap_or(last))
                    .collect()
            }
            _ => vec![v0_ms; n],
        };

        SpeedProfile {
            speed_ms,
            accel_mss: vec![0.0; n],
        }
    }

    /// Build the output packet for a speed annotated trajectory.
    ///
    /// Routing metadata is copied from the source lane, positions, headings, curvatures and
    /// speeds come from the trajectory.
    fn build_output(
        &self,
        kind: PlanOutputKind,
        source: &Lane,
        trajectory: &Trajectory,
        bounds: &ConstraintProfile,
    ) -> PlanOutput {
        let waypoints = trajectory
            .points
            .iter()
            .enumerate()
            .map(|(i, p)| LaneWaypoint {
                pose: Pose::from_xy_heading(p.x_m, p.y_m, p.curvature_m, p.heading_rad),
                speed_ms: trajectory.speed_at(i).unwrap_or(0.0),
            })
            .collect();

        let lane = Lane {
            header: source.header.clone(),
            lane_id: source.lane_id,
            lane_index: source.lane_index,
            is_blocked: source.is_blocked,
            increment: source.increment,
            cost: source.cost,
            closest_object_distance: source.closest_object_distance,
            closest_object_velocity: source.closest_object_velocity,
            waypoints,
        };

        let desired_velocity_ms = if bounds.vd.is_empty() {
            0.0
        } else {
            bounds.vd[self.params.desired_speed_lookahead_index.min(bounds.vd.len() - 1)]
        };

        PlanOutput {
            tick: self.tick,
            kind,
            lane,
            result_velocity_ms: trajectory.speed_at(0).unwrap_or(0.0),
            desired_velocity_ms,
            curvature_m: trajectory.points.first().map(|p| p.curvature_m).unwrap_or(0.0),
        }
    }
}

impl Default for PlannerMode {
    fn default() -> Self {
        PlannerMode::AwaitInputs
    }
}

impl TickOutcome {
    /// The output to publish, if any.
    pub fn published(&self) -> Option<&PlanOutput> {
        match self {
            TickOutcome::Publish(o) => Some(o),
            _ => None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::input_cache::InputCache;
    use crate::traj::test::straight_lane;
    use crate::obstacle::ObstacleType;
    use comms_if::msg::{
        DetectedObject, DetectedObjectArray, Dimensions, DriveMode, Header, PlanInput,
        PoseStamped, TwistStamped,
    };

    /// Wraps the kinematic optimiser, failing every call after the first `ok_calls`.
    struct FailAfter {
        inner: KinematicSpeedOptimizer,
        ok_calls: usize,
        calls: usize,
    }

    impl SpeedOptimizer for FailAfter {
        fn solve(&mut self, input: &OptimizerInput) -> Result<SpeedProfile, OptimizerError> {
            self.calls += 1;
            if self.calls > self.ok_calls {
                Err(OptimizerError::Backend("solver diverged".into()))
            } else {
                self.inner.solve(input)
            }
        }
    }

    /// Returns a constant speed everywhere.
    struct Constant(f64);

    impl SpeedOptimizer for Constant {
        fn solve(&mut self, input: &OptimizerInput) -> Result<SpeedProfile, OptimizerError> {
            let n = input.validate()?;
            Ok(SpeedProfile {
                speed_ms: vec![self.0; n],
                accel_mss: vec![0.0; n],
            })
        }
    }

    /// Returns a constant speed everywhere, taking the next speed from the list on each call.
    struct Sequence(Vec<f64>);

    impl SpeedOptimizer for Sequence {
        fn solve(&mut self, input: &OptimizerInput) -> Result<SpeedProfile, OptimizerError> {
            let n = input.validate()?;
            let v = self.0.remove(0);
            Ok(SpeedProfile {
                speed_ms: vec![v; n],
                accel_mss: vec![0.0; n],
            })
        }
    }

    fn planner_with(params: Params, optimizer: Box<dyn SpeedOptimizer + Send>) -> SpeedPlanner {
        let checker = Box::new(CircleCollisionChecker::new(params.collision_nominal_speed_ms));
        SpeedPlanner::with_backends(params, optimizer, checker, Box::new(StaticFrameTree::default()))
    }

    fn fail_after(ok_calls: usize) -> Box<FailAfter> {
        Box::new(FailAfter {
            inner: KinematicSpeedOptimizer::new(Default::default()),
            ok_calls,
            calls: 0,
        })
    }

    /// Cache holding a 100 point unit spaced lane in `map`, the vehicle at `x_m` and the given
    /// measured speed.
    fn inputs(x_m: f64, speed_ms: f64) -> InputCache {
        let cache = InputCache::new();
        cache.handle(PlanInput::Lane(straight_lane(100, 1.0, 0.0)));
        set_vehicle(&cache, x_m, speed_ms);
        cache
    }

    fn set_vehicle(cache: &InputCache, x_m: f64, speed_ms: f64) {
        cache.handle(PlanInput::Pose(PoseStamped {
            header: Header::now("map"),
            pose: Pose::from_xy_heading(x_m, 0.0, 0.0, 0.0),
        }));
        cache.handle(PlanInput::Velocity(TwistStamped {
            header: Header::now("base_link"),
            linear_x_ms: speed_ms,
            angular_z_rads: 0.0,
        }));
    }

    fn objects(frame: &str, x_m: f64, speed_ms: f64) -> PlanInput {
        PlanInput::Objects(DetectedObjectArray {
            header: Header::now(frame),
            objects: vec![DetectedObject {
                header: Header::now(frame),
                pose: Pose::from_xy_heading(x_m, 0.0, 0.0, 0.0),
                velocity_lon_ms: speed_ms,
                dimensions: Dimensions {
                    length_m: 2.0,
                    width_m: 1.0,
                },
            }],
        })
    }

    fn published(outcome: TickOutcome) -> PlanOutput {
        match outcome {
            TickOutcome::Publish(o) => o,
            other => panic!("Expected a published output, got {:?}", other),
        }
    }

    #[test]
    fn test_skips_without_inputs() {
        let mut planner = SpeedPlanner::new(Params::default(), Box::new(StaticFrameTree::default()));
        let cache = InputCache::new();

        let (outcome, report) = planner.proc(&cache.snapshot()).unwrap();
        assert_eq!(outcome, TickOutcome::Skipped);
        assert_eq!(report.mode, PlannerMode::AwaitInputs);

        // Lane without pose/velocity
        cache.handle(PlanInput::Lane(straight_lane(10, 1.0, 0.0)));
        assert_eq!(planner.proc(&cache.snapshot()).unwrap().0, TickOutcome::Skipped);

        // Empty lane
        let mut lane = straight_lane(10, 1.0, 0.0);
        lane.waypoints.clear();
        cache.handle(PlanInput::Lane(lane));
        set_vehicle(&cache, 0.0, 1.0);
        assert_eq!(planner.proc(&cache.snapshot()).unwrap().0, TickOutcome::Skipped);

        assert_eq!(planner.warm_start(), &WarmStart::ColdStart);
    }

    #[test]
    fn test_non_finite_input() {
        let mut planner = SpeedPlanner::new(Params::default(), Box::new(StaticFrameTree::default()));

        match planner.proc(&inputs(f64::NAN, 1.0).snapshot()) {
            Err(SpeedPlannerError::NonFiniteInput("pose")) => (),
            other => panic!("Expected a non-finite pose error, got {:?}", other.map(|r| r.0)),
        }
        match planner.proc(&inputs(0.0, f64::INFINITY).snapshot()) {
            Err(SpeedPlannerError::NonFiniteInput("velocity")) => (),
            other => panic!("Expected a non-finite velocity error, got {:?}", other.map(|r| r.0)),
        }
    }

    #[test]
    fn test_commit_and_warm_start_idempotence() {
        let mut planner = SpeedPlanner::new(Params::default(), Box::new(StaticFrameTree::default()));
        let snapshot = inputs(0.0, 2.0).snapshot();

        let (outcome, report) = planner.proc(&snapshot).unwrap();
        let first = published(outcome);
        assert_eq!(report.mode, PlannerMode::CommitSuccess);
        assert_eq!(report.v0_ms, 2.0);
        assert_eq!(report.warm_start_index, None);

        assert_eq!(first.kind, PlanOutputKind::Committed);
        assert_eq!(first.lane.waypoints.len(), 100);
        assert_eq!(first.result_velocity_ms, 2.0);
        assert_eq!(first.desired_velocity_ms, 4.5);
        assert_eq!(first.curvature_m, 0.0);
        assert_eq!(first.lane.lane_id, 3);
        assert_eq!(first.lane.cost, 12.5);
        assert_eq!(first.lane.closest_object_distance, 40.0);
        assert!(first.lane.waypoints.iter().all(|w| w.speed_ms <= 4.9));

        // Same inputs again: the warm start supplies v0 from index 0 and the speeds repeat
        let (outcome, report) = planner.proc(&snapshot).unwrap();
        let second = published(outcome);
        assert_eq!(report.warm_start_index, Some(0));
        assert_eq!(report.v0_ms, 2.0);

        let first_speeds: Vec<f64> = first.lane.waypoints.iter().map(|w| w.speed_ms).collect();
        let second_speeds: Vec<f64> = second.lane.waypoints.iter().map(|w| w.speed_ms).collect();
        assert_eq!(first_speeds, second_speeds);
        assert_eq!(second.tick, first.tick + 1);
    }

    #[test]
    fn test_v0_from_warm_start() {
        let mut planner = SpeedPlanner::new(Params::default(), Box::new(StaticFrameTree::default()));

        let first = published(planner.proc(&inputs(0.0, 1.0).snapshot()).unwrap().0);

        // Vehicle moved on but reports a stale speed, v0 comes from the committed trajectory
        let (_, report) = planner.proc(&inputs(3.0, 0.0).snapshot()).unwrap();
        assert_eq!(report.warm_start_index, Some(3));
        assert_eq!(report.v0_ms, first.lane.waypoints[3].speed_ms);
        assert_eq!(report.measured_speed_ms, 0.0);
    }

    #[test]
    fn test_fallback_tail() {
        let mut planner = planner_with(Params::default(), fail_after(1));

        let first = published(planner.proc(&inputs(0.0, 1.0).snapshot()).unwrap().0);

        let (outcome, report) = planner.proc(&inputs(10.0, 1.0).snapshot()).unwrap();
        let fallback = published(outcome);
        assert_eq!(report.mode, PlannerMode::CommitFallback);
        assert!(report.optimizer_error.is_some());

        assert_eq!(fallback.kind, PlanOutputKind::Fallback);
        assert_eq!(fallback.lane.waypoints.len(), 90);
        assert_eq!(fallback.lane.waypoints[..], first.lane.waypoints[10..]);
        assert_eq!(fallback.result_velocity_ms, first.lane.waypoints[10].speed_ms);

        // The fallback is the new warm start
        match planner.warm_start() {
            WarmStart::Warm(ws) => {
                assert_eq!(ws.trajectory.len(), 90);
                assert_eq!(ws.trajectory.points[0].x_m, 10.0);
            }
            WarmStart::ColdStart => panic!("Expected a warm start"),
        }

        // Vehicle past the end of the lane: offset clamps to the last sample
        let (outcome, _) = planner.proc(&inputs(150.0, 1.0).snapshot()).unwrap();
        let last = published(outcome);
        assert_eq!(last.lane.waypoints.len(), 1);
        assert_eq!(last.lane.waypoints[0], first.lane.waypoints[99]);
        assert_eq!(last.desired_velocity_ms, last.result_velocity_ms);
    }

    #[test]
    fn test_fallback_cold_start() {
        let mut planner = planner_with(Params::default(), fail_after(0));

        let (outcome, report) = planner.proc(&inputs(0.0, 1.0).snapshot()).unwrap();
        assert_eq!(outcome, TickOutcome::NoOutput);
        assert_eq!(report.mode, PlannerMode::CommitFallback);
        assert_eq!(planner.warm_start(), &WarmStart::ColdStart);
    }

    #[test]
    fn test_fallback_withheld() {
        let params = Params {
            publish_fallback: false,
            ..Default::default()
        };
        let mut planner = planner_with(params, fail_after(1));

        planner.proc(&inputs(0.0, 1.0).snapshot()).unwrap();
        let (outcome, _) = planner.proc(&inputs(5.0, 1.0).snapshot()).unwrap();

        assert!(outcome.published().is_none());
        match outcome {
            TickOutcome::Withheld(o) => assert_eq!(o.kind, PlanOutputKind::Fallback),
            other => panic!("Expected a withheld fallback, got {:?}", other),
        }
    }

    #[test]
    fn test_speed_cap() {
        let mut planner = planner_with(Params::default(), Box::new(Constant(7.3)));

        let output = published(planner.proc(&inputs(0.0, 1.0).snapshot()).unwrap().0);

        assert_eq!(output.result_velocity_ms, 4.9);
        assert!(output.lane.waypoints.iter().all(|w| w.speed_ms == 4.9));
    }

    #[test]
    fn test_static_obstacle_stops_vehicle() {
        let mut planner = SpeedPlanner::new(Params::default(), Box::new(StaticFrameTree::default()));
        let cache = inputs(0.0, 0.0);
        cache.handle(objects("map", 60.0, 0.0));

        let (outcome, report) = planner.proc(&cache.snapshot()).unwrap();
        let output = published(outcome);

        assert_eq!(report.num_obstacles, 1);
        let collision = report.collision.unwrap();
        assert_eq!(collision.obstacle_type, ObstacleType::Static);

        // Combined clearance of the two footprints is just over 5 m
        assert_eq!(collision.index, 55);
        assert_eq!(collision.distance_m, Some(55.0));
        assert!(output.lane.waypoints[54].speed_ms > 0.0);
        assert!(output.lane.waypoints[55..]
            .iter()
            .all(|w| w.speed_ms == 0.0));
    }

    #[test]
    fn test_unreachable_obstacle_frame_dropped() {
        let mut planner = SpeedPlanner::new(Params::default(), Box::new(StaticFrameTree::default()));
        let cache = inputs(0.0, 1.0);
        cache.handle(objects("radar", 20.0, 0.0));

        let (outcome, report) = planner.proc(&cache.snapshot()).unwrap();

        assert_eq!(report.num_dropped_obstacles, 1);
        assert_eq!(report.num_obstacles, 0);
        assert!(report.collision.is_none());
        assert_eq!(published(outcome).kind, PlanOutputKind::Committed);
    }

    #[test]
    fn test_stops_inside_clearance() {
        // Obstacle 5 m ahead is already inside the combined clearance
        for &speed_ms in [0.0, 2.0].iter() {
            let mut planner =
                SpeedPlanner::new(Params::default(), Box::new(StaticFrameTree::default()));
            let cache = inputs(55.0, speed_ms);
            cache.handle(objects("map", 60.0, 0.0));

            let (outcome, report) = planner.proc(&cache.snapshot()).unwrap();
            let output = published(outcome);

            let collision = report.collision.unwrap();
            assert_eq!(collision.index, 0);
            assert_eq!(collision.distance_m, Some(0.0));

            assert_eq!(report.mode, PlannerMode::CommitSuccess);
            assert_eq!(output.kind, PlanOutputKind::Committed);
            assert_eq!(output.result_velocity_ms, speed_ms);
            assert!(output.lane.waypoints[1..].iter().all(|w| w.speed_ms == 0.0));
        }
    }

    #[test]
    fn test_short_braking_slows_down() {
        let mut planner = SpeedPlanner::new(Params::default(), Box::new(StaticFrameTree::default()));

        // Cruise at 4.5 m/s
        published(planner.proc(&inputs(0.0, 4.5).snapshot()).unwrap().0);
        published(planner.proc(&inputs(10.0, 4.5).snapshot()).unwrap().0);

        // Obstacle appears too close to stop before it
        let cache = inputs(12.0, 4.5);
        cache.handle(objects("map", 19.0, 0.0));
        let (outcome, report) = planner.proc(&cache.snapshot()).unwrap();
        let first = published(outcome);

        assert_eq!(report.collision.map(|c| c.index), Some(2));
        assert_eq!(report.mode, PlannerMode::CommitSuccess);
        assert!(report.optimizer_error.is_none());
        assert_eq!(first.kind, PlanOutputKind::Committed);

        let speeds: Vec<f64> = first.lane.waypoints.iter().map(|w| w.speed_ms).collect();
        assert_eq!(speeds[0], 4.5);
        assert!(speeds[1] < speeds[0]);
        assert!(speeds[2] < speeds[1]);
        assert!(speeds[3..].iter().all(|&v| v == 0.0));

        // Next cycle starts from the braked speed and keeps slowing down
        let cache = inputs(13.0, 4.5);
        cache.handle(objects("map", 19.0, 0.0));
        let (outcome, report) = planner.proc(&cache.snapshot()).unwrap();
        let second = published(outcome);

        assert_eq!(report.collision.map(|c| c.index), Some(1));
        assert_eq!(report.v0_ms, speeds[1]);
        assert_eq!(second.kind, PlanOutputKind::Committed);
        assert_eq!(second.result_velocity_ms, speeds[1]);
        assert!(second.lane.waypoints[1].speed_ms < speeds[1]);
        assert!(second.lane.waypoints[2..].iter().all(|w| w.speed_ms == 0.0));
    }

    #[test]
    fn test_dynamic_collision_timed_from_initial_speed() {
        // Obstacle 20 m ahead moving away at 1 m/s
        let collision_at = |speed_ms: f64| {
            let mut planner =
                SpeedPlanner::new(Params::default(), Box::new(StaticFrameTree::default()));
            let cache = inputs(0.0, speed_ms);
            cache.handle(objects("map", 20.0, 1.0));
            planner.proc(&cache.snapshot()).unwrap().1.collision
        };

        // At 4.5 m/s the vehicle catches up within the prediction horizon
        let fast = collision_at(4.5).unwrap();
        assert_eq!(fast.obstacle_type, ObstacleType::Dynamic);
        assert_eq!(fast.index, 17);
        assert!((fast.time_s.unwrap() - 17.0 / 4.5).abs() < 1e-9);

        // At 1 m/s it never closes the gap
        assert!(collision_at(1.0).is_none());
    }

    #[test]
    fn test_non_finite_profile_falls_back() {
        let mut planner = planner_with(Params::default(), Box::new(Sequence(vec![2.0, f64::NAN])));

        let first = published(planner.proc(&inputs(0.0, 2.0).snapshot()).unwrap().0);
        assert_eq!(first.kind, PlanOutputKind::Committed);

        let (outcome, report) = planner.proc(&inputs(5.0, 2.0).snapshot()).unwrap();
        let fallback = published(outcome);

        assert_eq!(report.mode, PlannerMode::CommitFallback);
        assert_eq!(
            report.optimizer_error,
            Some(OptimizerError::NonFiniteProfile { index: 0 }.to_string())
        );
        assert_eq!(fallback.kind, PlanOutputKind::Fallback);
        assert!(fallback.lane.waypoints.iter().all(|w| w.speed_ms == 2.0));
    }

    #[test]
    fn test_vehicle_status_reported() {
        let mut planner = SpeedPlanner::new(Params::default(), Box::new(StaticFrameTree::default()));
        let cache = inputs(0.0, 1.0);

        assert!(planner.proc(&cache.snapshot()).unwrap().1.vehicle_status.is_none());

        let status = VehicleStatus {
            header: Header::now("base_link"),
            speed_ms: 1.1,
            steering_angle_rad: 0.05,
            drive_mode: DriveMode::Autonomous,
        };
        cache.handle(PlanInput::Status(status.clone()));

        let (_, report) = planner.proc(&cache.snapshot()).unwrap();
        assert_eq!(report.vehicle_status, Some(status));
    }
}
