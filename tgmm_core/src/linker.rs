//! Lineage linking: resolves each record's parent local-id into the spot
//! built for it one frame earlier.
//!
//! Only two generations of `local-id → spot` maps are alive at any time, so
//! peak memory is bounded by the largest frame, not by the whole import.

use std::collections::HashMap;
use tracing::debug;

use crate::error::ImportWarning;
use crate::graph::{LineageGraph, DEFAULT_EDGE_WEIGHT};
use crate::spot::{Spot, SpotId};

/// Spots of one parsed frame, by local id.
#[derive(Debug, Default)]
struct Generation {
    frame: usize,
    by_local_id: HashMap<i64, SpotId>,
}

/// Incrementally assembles spots into a [`LineageGraph`], frame by frame.
#[derive(Debug, Default)]
pub struct LineageLinker {
    graph: LineageGraph,
    previous: Option<Generation>,
    current: Option<Generation>,
}

impl LineageLinker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a frame. Frames must come in ascending order.
    ///
    /// A frame with no readable document is still started, as an empty
    /// generation, so that children in the next frame become roots. Skipping
    /// a frame makes the next one resolve into the last started frame, which
    /// is reported as out of order.
    pub fn begin_frame(&mut self, frame: usize) {
        if let Some(current) = self.current.take() {
            self.previous = Some(current);
        }
        self.current = Some(Generation {
            frame,
            by_local_id: HashMap::new(),
        });
    }

    /// Add a spot that survived filtering, linking it to its parent when the
    /// parent also survived.
    ///
    /// Returns a warning when the parent resolved to a frame other than the
    /// immediately preceding one; the spot is still added, as a root.
    pub fn link(&mut self, spot: Spot, local_id: i64, parent: Option<i64>) -> Option<ImportWarning> {
        let frame = spot.frame;
        let id = spot.id;

        if self.current.as_ref().map_or(true, |g| g.frame != frame) {
            self.begin_frame(frame);
        }
        if let Some(generation) = self.current.as_mut() {
            generation.by_local_id.insert(local_id, id);
        }
        self.graph.add_spot(spot);

        let parent_id = parent?;
        let previous = self.previous.as_ref()?;
        let &parent_spot = previous.by_local_id.get(&parent_id)?;

        if previous.frame + 1 != frame {
            return Some(ImportWarning::OutOfOrderParent {
                frame,
                local_id,
                parent_id,
                parent_frame: previous.frame,
            });
        }

        match self.graph.add_edge(parent_spot, id, DEFAULT_EDGE_WEIGHT) {
            Ok(()) => None,
            Err(e) => {
                debug!("Link {} -> {} dropped: {}", parent_spot, id, e);
                None
            }
        }
    }

    /// Spots linked so far.
    pub fn spot_count(&self) -> usize {
        self.graph.spot_count()
    }

    /// Hand over the assembled graph.
    pub fn finish(self) -> LineageGraph {
        self.graph
    }
}
