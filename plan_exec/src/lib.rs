//! # Speed planner library.
//!
//! This library holds the speed planning pipeline run by `plan_exec`, so that it can be tested and
//! benchmarked independently of the executable.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

/// Collision evaluation - finds the first collision between the trajectory and the obstacles
pub mod collision;

/// Constraint synthesis - speed and acceleration bounds for each trajectory sample
pub mod constraints;

/// Frame alignment - moves obstacles into the lane frame
pub mod frame;

/// Input cache - latest value of every planner input
pub mod input_cache;

/// Input client - receives planner inputs from the upstream stack
pub mod input_client;

/// Lane server - publishes the speed annotated lane
pub mod lane_server;

/// Obstacle classification - static/dynamic obstacles with circular footprints
pub mod obstacle;

/// Speed optimisation - the optimiser interface and the kinematic backend
pub mod optimizer;

/// Speed control - the per-cycle planning state machine
pub mod speed_ctrl;

/// Trajectories - re-anchored lanes and their speed profiles
pub mod traj;
