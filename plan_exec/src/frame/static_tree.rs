//! Fixed frame tree loaded from parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::{HashSet, VecDeque};

// Internal
use super::{FrameError, FrameTransform, TransformSource};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters describing the fixed frames known to the planner.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct FrameParams {
    #[serde(default)]
    pub frames: Vec<FrameEdge>,
}

/// A fixed transform mapping `child` coordinates into `parent` coordinates.
#[derive(Deserialize, Debug, Clone)]
pub struct FrameEdge {
    pub parent: String,
    pub child: String,
    pub x_m: f64,
    pub y_m: f64,
    pub yaw_rad: f64,
}

/// A [`TransformSource`] over a set of fixed frames.
///
/// Transforms do not change with time so the lookup stamp is ignored.
#[derive(Debug, Clone, Default)]
pub struct StaticFrameTree {
    edges: Vec<FrameTransform>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl StaticFrameTree {
    pub fn new(params: &FrameParams) -> Self {
        Self {
            edges: params
                .frames
                .iter()
                .map(|e| FrameTransform::new(&e.parent, &e.child, e.x_m, e.y_m, e.yaw_rad))
                .collect(),
        }
    }

    /// All transforms leaving `frame`, in both edge directions.
    fn neighbours<'a>(&'a self, frame: &'a str) -> impl Iterator<Item = FrameTransform> + 'a {
        self.edges.iter().filter_map(move |e| {
            if e.source == frame {
                Some(e.clone())
            } else if e.target == frame {
                Some(e.inverse())
            } else {
                None
            }
        })
    }
}

impl TransformSource for StaticFrameTree {
    fn lookup(
        &self,
        target: &str,
        source: &str,
        _stamp: &DateTime<Utc>,
    ) -> Result<FrameTransform, FrameError> {
        if target == source {
            return Ok(FrameTransform::identity(target));
        }

        // Breadth first search from the source frame, accumulating `frame <- source`
        let mut visited: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<FrameTransform> = VecDeque::new();

        visited.insert(String::from(source));
        queue.push_back(FrameTransform::identity(source));

        while let Some(current) = queue.pop_front() {
            for step in self.neighbours(&current.target) {
                if visited.contains(&step.target) {
                    continue;
                }

                let next = current.then(&step);
                if next.target == target {
                    return Ok(next);
                }

                visited.insert(next.target.clone());
                queue.push_back(next);
            }
        }

        Err(FrameError::NoPath {
            target: String::from(target),
            source_frame: String::from(source),
        })
    }
}
