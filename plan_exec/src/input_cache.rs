//! # Input cache
//!
//! Holds the latest value of every planner input. Each input has its own [`Slot`], written by
//! the network thread whenever a new message arrives and read by the main loop at the start of
//! each cycle.
//!
//! Values are always replaced wholesale, and the main loop works on a [`Snapshot`] taken at the
//! start of the cycle, so a message arriving mid-cycle is only seen by the next cycle.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::sync::{Arc, Mutex};

use comms_if::msg::{DetectedObjectArray, Lane, PlanInput, PoseStamped, TwistStamped, VehicleStatus};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Latest-value storage shared between one writer and any number of readers.
#[derive(Debug)]
pub struct Slot<T>(Arc<Mutex<Option<Arc<T>>>>);

/// Slots for every planner input.
#[derive(Debug, Clone, Default)]
pub struct InputCache {
    pub lane: Slot<Lane>,
    pub pose: Slot<PoseStamped>,
    pub velocity: Slot<TwistStamped>,
    pub status: Slot<VehicleStatus>,
    pub objects: Slot<DetectedObjectArray>,
}

/// The inputs as they were at the start of a cycle.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub lane: Option<Arc<Lane>>,
    pub pose: Option<Arc<PoseStamped>>,
    pub velocity: Option<Arc<TwistStamped>>,
    pub status: Option<Arc<VehicleStatus>>,
    pub objects: Option<Arc<DetectedObjectArray>>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<T> Slot<T> {
    /// Replace the stored value.
    pub fn set(&self, value: T) {
        *self.0.lock().expect("Input slot mutex poisoned") = Some(Arc::new(value));
    }

    /// Get the stored value, if any.
    pub fn get(&self) -> Option<Arc<T>> {
        self.0.lock().expect("Input slot mutex poisoned").clone()
    }
}

impl<T> Clone for Slot<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self(Arc::new(Mutex::new(None)))
    }
}

impl InputCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a received input in its slot.
    pub fn handle(&self, input: PlanInput) {
        match input {
            PlanInput::Lane(l) => self.lane.set(l),
            PlanInput::Pose(p) => self.pose.set(p),
            PlanInput::Velocity(v) => self.velocity.set(v),
            PlanInput::Status(s) => self.status.set(s),
            PlanInput::Objects(o) => self.objects.set(o),
        }
    }

    /// Take a snapshot of all current inputs.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            lane: self.lane.get(),
            pose: self.pose.get(),
            velocity: self.velocity.get(),
            status: self.status.get(),
            objects: self.objects.get(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use comms_if::msg::{Header, Pose};

    fn pose(x: f64) -> PlanInput {
        PlanInput::Pose(PoseStamped {
            header: Header::now("map"),
            pose: Pose::from_xy_heading(x, 0.0, 0.0, 0.0),
        })
    }

    #[test]
    fn test_snapshot_isolated_from_later_writes() {
        let cache = InputCache::new();
        assert!(cache.snapshot().pose.is_none());

        cache.handle(pose(1.0));
        let snap = cache.snapshot();

        // Write from another handle to the same slots
        let writer = cache.clone();
        std::thread::spawn(move || writer.handle(pose(2.0)))
            .join()
            .unwrap();

        assert_eq!(snap.pose.as_ref().unwrap().pose.position_m.x, 1.0);
        assert_eq!(cache.snapshot().pose.unwrap().pose.position_m.x, 2.0);
        assert!(snap.lane.is_none());
    }
}
