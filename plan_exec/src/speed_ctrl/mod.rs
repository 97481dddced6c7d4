//! # Speed control module
//!
//! Speed control runs the planning pipeline once per cycle and decides what is published:
//!
//! 1. Wait until a lane, a pose and a velocity have been received.
//! 2. Re-anchor the lane on the vehicle and look up the initial speed and acceleration on the
//!    trajectory committed in the previous cycle (the warm start). Without a previous
//!    trajectory the measured velocity is used.
//! 3. Align and classify obstacles, evaluate collisions, synthesise the bounds and run the
//!    optimiser.
//! 4. On success publish the optimised lane and keep it as the next warm start.
//! 5. On failure reuse the remainder of the previous trajectory with its speeds, if there is
//!    one, so the vehicle keeps a consistent plan. With no previous trajectory nothing is
//!    published.
//!
//! Errors within a cycle never leave the warm start half updated, it is replaced wholesale on
//! every commit.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod params;
pub mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use params::Params;
pub use state::*;
