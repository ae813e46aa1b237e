//! The spot/edge graph: a time-forward DAG with in-degree ≤ 1.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::spot::{Spot, SpotId};

/// Default link weight.
pub const DEFAULT_EDGE_WEIGHT: f64 = 1.0;

/// A temporal link from a parent spot to a child one frame later.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub source: SpotId,
    pub target: SpotId,
    pub weight: f64,
}

/// Reasons an edge cannot be added.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    #[error("Unknown spot {0}")]
    UnknownSpot(SpotId),

    #[error("Edge {parent} -> {child} spans frames {parent_frame} -> {child_frame}")]
    FrameMismatch {
        parent: SpotId,
        child: SpotId,
        parent_frame: usize,
        child_frame: usize,
    },

    #[error("Spot {target} already has parent {existing}")]
    SecondParent { target: SpotId, existing: SpotId },
}

/// Spots plus directed parent → child edges.
///
/// Every mutation keeps `source.frame + 1 == target.frame` and in-degree ≤ 1,
/// which also makes the graph acyclic.
#[derive(Debug, Clone, Default)]
pub struct LineageGraph {
    spots: BTreeMap<SpotId, Spot>,

    /// Children per spot, ascending by id
    children: BTreeMap<SpotId, Vec<SpotId>>,

    /// Single parent per spot
    parents: BTreeMap<SpotId, SpotId>,

    /// Weights keyed by (source, target)
    weights: BTreeMap<(SpotId, SpotId), f64>,
}

impl LineageGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a spot. A spot with the same id is replaced.
    pub fn add_spot(&mut self, spot: Spot) {
        self.spots.insert(spot.id, spot);
    }

    /// Link `source → target`.
    pub fn add_edge(&mut self, source: SpotId, target: SpotId, weight: f64) -> Result<(), LinkError> {
        let source_frame = self.spots.get(&source).ok_or(LinkError::UnknownSpot(source))?.frame;
        let target_frame = self.spots.get(&target).ok_or(LinkError::UnknownSpot(target))?.frame;

        if source_frame + 1 != target_frame {
            return Err(LinkError::FrameMismatch {
                parent: source,
                child: target,
                parent_frame: source_frame,
                child_frame: target_frame,
            });
        }
        if let Some(&existing) = self.parents.get(&target) {
            return Err(LinkError::SecondParent { target, existing });
        }

        self.parents.insert(target, source);
        let children = self.children.entry(source).or_default();
        let at = children.binary_search(&target).unwrap_or_else(|i| i);
        children.insert(at, target);
        self.weights.insert((source, target), weight);
        Ok(())
    }

    /// Remove `source → target`. Returns false if it did not exist.
    pub fn remove_edge(&mut self, source: SpotId, target: SpotId) -> bool {
        if self.weights.remove(&(source, target)).is_none() {
            return false;
        }
        self.parents.remove(&target);
        if let Some(children) = self.children.get_mut(&source) {
            children.retain(|&c| c != target);
            if children.is_empty() {
                self.children.remove(&source);
            }
        }
        true
    }

    pub fn spot(&self, id: SpotId) -> Option<&Spot> {
        self.spots.get(&id)
    }

    pub(crate) fn spot_mut(&mut self, id: SpotId) -> Option<&mut Spot> {
        self.spots.get_mut(&id)
    }

    /// Spots in ascending id order.
    pub fn spots(&self) -> impl Iterator<Item = &Spot> {
        self.spots.values()
    }

    pub(crate) fn spots_mut(&mut self) -> impl Iterator<Item = &mut Spot> {
        self.spots.values_mut()
    }

    /// Edges in ascending (source, target) order.
    pub fn edges(&self) -> impl Iterator<Item = Edge> + '_ {
        self.weights.iter().map(|(&(source, target), &weight)| Edge {
            source,
            target,
            weight,
        })
    }

    pub fn parent_of(&self, id: SpotId) -> Option<SpotId> {
        self.parents.get(&id).copied()
    }

    /// Children of a spot, ascending by id.
    pub fn children_of(&self, id: SpotId) -> &[SpotId] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn in_degree(&self, id: SpotId) -> usize {
        usize::from(self.parents.contains_key(&id))
    }

    pub fn out_degree(&self, id: SpotId) -> usize {
        self.children_of(id).len()
    }

    /// Spots with two or more children, ascending by id.
    pub fn division_sites(&self) -> Vec<SpotId> {
        self.children
            .iter()
            .filter(|(_, c)| c.len() >= 2)
            .map(|(&id, _)| id)
            .collect()
    }

    pub fn spot_count(&self) -> usize {
        self.spots.len()
    }

    pub fn edge_count(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spots.is_empty()
    }
}
