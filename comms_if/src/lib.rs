//! # Communications interface crate.
//!
//! Provides the message definitions exchanged with the speed planner and the network
//! abstractions used to carry them.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

/// Message definitions for planner inputs and outputs
pub mod msg;

/// Network module
pub mod net;
