//! Track labelling: weakly connected components of the lineage graph.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::graph::{Edge, LineageGraph};
use crate::spot::SpotId;

/// Track identifier, dense from 0 in ascending order of minimum spot id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TrackId(pub u32);

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One weakly connected component.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub id: TrackId,

    /// Member spots, ascending by id
    pub spots: Vec<SpotId>,

    /// Member edges, ascending by (source, target)
    pub edges: Vec<Edge>,
}

impl Track {
    /// Smallest spot id in the track.
    pub fn root_spot(&self) -> Option<SpotId> {
        self.spots.first().copied()
    }
}

/// All tracks of a graph plus the spot → track lookup.
#[derive(Debug, Clone, Default)]
pub struct TrackIndex {
    tracks: Vec<Track>,
    by_spot: HashMap<SpotId, TrackId>,
}

impl TrackIndex {
    /// Tracks ordered by id.
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn track(&self, id: TrackId) -> Option<&Track> {
        self.tracks.get(id.0 as usize)
    }

    pub fn track_of(&self, spot: SpotId) -> Option<TrackId> {
        self.by_spot.get(&spot).copied()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

// ============================================================================
// Union-Find
// ============================================================================

/// Union-find over dense indices. The smaller index always becomes the root,
/// so every root is the minimum of its set.
#[derive(Debug)]
struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
        }
    }

    /// Find root with iterative path compression (two-pass).
    fn find(&mut self, index: usize) -> usize {
        let mut root = index;
        while self.parent[root] != root {
            root = self.parent[root];
        }

        let mut current = index;
        while current != root {
            let next = self.parent[current];
            self.parent[current] = root;
            current = next;
        }
        root
    }

    fn union(&mut self, a: usize, b: usize) {
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a != root_b {
            let (low, high) = if root_a < root_b { (root_a, root_b) } else { (root_b, root_a) };
            self.parent[high] = low;
        }
    }
}

/// Label every spot with its track, singletons included.
///
/// Tracks are numbered from 0 in ascending order of their minimum spot id.
pub fn label_tracks(graph: &LineageGraph) -> TrackIndex {
    let ids: Vec<SpotId> = graph.spots().map(|s| s.id).collect();
    let index_of: HashMap<SpotId, usize> = ids.iter().enumerate().map(|(i, &id)| (id, i)).collect();

    let mut uf = UnionFind::new(ids.len());
    for edge in graph.edges() {
        if let (Some(&a), Some(&b)) = (index_of.get(&edge.source), index_of.get(&edge.target)) {
            uf.union(a, b);
        }
    }

    // Spots are visited in ascending id order, so the first member seen of
    // each component is its minimum and fixes the component's rank.
    let mut track_of_root: HashMap<usize, usize> = HashMap::new();
    let mut tracks: Vec<Track> = Vec::new();
    let mut by_spot = HashMap::with_capacity(ids.len());
    for (i, &spot) in ids.iter().enumerate() {
        let root = uf.find(i);
        let slot = *track_of_root.entry(root).or_insert_with(|| {
            tracks.push(Track {
                id: TrackId(tracks.len() as u32),
                spots: Vec::new(),
                edges: Vec::new(),
            });
            tracks.len() - 1
        });
        tracks[slot].spots.push(spot);
        by_spot.insert(spot, tracks[slot].id);
    }

    for edge in graph.edges() {
        if let Some(track) = by_spot.get(&edge.source) {
            tracks[track.0 as usize].edges.push(edge);
        }
    }

    TrackIndex { tracks, by_spot }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests::spot;

    #[test]
    fn test_singletons_are_tracks() {
        let mut g = LineageGraph::new();
        g.add_spot(spot(4, 0, [0.0; 3]));
        g.add_spot(spot(2, 0, [0.0; 3]));

        let index = label_tracks(&g);
        assert_eq!(index.len(), 2);
        assert_eq!(index.track_of(SpotId(2)), Some(TrackId(0)));
        assert_eq!(index.track_of(SpotId(4)), Some(TrackId(1)));
        assert!(index.tracks().iter().all(|t| t.edges.is_empty()));
    }

    #[test]
    fn test_ordering_by_minimum_spot_id() {
        // Track A: 3 → 5; track B: 0 (singleton); track C: 1 → 4, 1 → 6
        let mut g = LineageGraph::new();
        g.add_spot(spot(0, 0, [0.0; 3]));
        g.add_spot(spot(1, 0, [0.0; 3]));
        g.add_spot(spot(3, 0, [0.0; 3]));
        g.add_spot(spot(4, 1, [0.0; 3]));
        g.add_spot(spot(5, 1, [0.0; 3]));
        g.add_spot(spot(6, 1, [0.0; 3]));
        g.add_edge(SpotId(3), SpotId(5), 1.0).unwrap();
        g.add_edge(SpotId(1), SpotId(4), 1.0).unwrap();
        g.add_edge(SpotId(1), SpotId(6), 1.0).unwrap();

        let index = label_tracks(&g);
        assert_eq!(index.len(), 3);
        assert_eq!(index.tracks()[0].spots, vec![SpotId(0)]);
        assert_eq!(index.tracks()[1].spots, vec![SpotId(1), SpotId(4), SpotId(6)]);
        assert_eq!(index.tracks()[1].edges.len(), 2);
        assert_eq!(index.tracks()[2].spots, vec![SpotId(3), SpotId(5)]);
        assert_eq!(index.track(TrackId(2)).and_then(Track::root_spot), Some(SpotId(3)));
    }

    #[test]
    fn test_union_find_roots_are_minimal() {
        let mut uf = UnionFind::new(6);
        uf.union(5, 3);
        uf.union(3, 4);
        uf.union(4, 1);
        assert_eq!(uf.find(5), 1);
        assert_eq!(uf.find(4), 1);
        assert_eq!(uf.find(0), 0);
        assert_eq!(uf.find(2), 2);
    }

    #[test]
    fn test_empty_graph() {
        let index = label_tracks(&LineageGraph::new());
        assert!(index.is_empty());
        assert_eq!(index.track_of(SpotId(0)), None);
    }
}
