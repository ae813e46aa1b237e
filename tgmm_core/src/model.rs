//! The assembled lineage model and the assembler producing it.

use std::collections::BTreeMap;
use tracing::debug;

use crate::components::{label_tracks, Track, TrackId, TrackIndex};
use crate::features::{AnalyzerRegistry, ModelView};
use crate::graph::{Edge, LineageGraph};
use crate::spot::{Spot, SpotId, POSITION_T};

/// Feature maps keyed by feature name.
pub type FeatureMap = BTreeMap<String, f64>;

/// Immutable, feature-annotated lineage model.
#[derive(Debug, Clone, Default)]
pub struct Model {
    graph: LineageGraph,
    tracks: TrackIndex,

    /// Spot ids per frame, ascending
    frames: BTreeMap<usize, Vec<SpotId>>,

    edge_features: BTreeMap<(SpotId, SpotId), FeatureMap>,
    track_features: BTreeMap<TrackId, FeatureMap>,
    dt: f64,
}

impl Model {
    pub fn graph(&self) -> &LineageGraph {
        &self.graph
    }

    pub fn spot(&self, id: SpotId) -> Option<&Spot> {
        self.graph.spot(id)
    }

    /// Spots in ascending id order.
    pub fn spots(&self) -> impl Iterator<Item = &Spot> {
        self.graph.spots()
    }

    /// Edges in ascending (source, target) order.
    pub fn edges(&self) -> impl Iterator<Item = Edge> + '_ {
        self.graph.edges()
    }

    pub fn tracks(&self) -> &[Track] {
        self.tracks.tracks()
    }

    pub fn track_of(&self, spot: SpotId) -> Option<TrackId> {
        self.tracks.track_of(spot)
    }

    /// Frames holding at least one spot, ascending.
    pub fn frames(&self) -> impl Iterator<Item = usize> + '_ {
        self.frames.keys().copied()
    }

    /// Spot ids of a frame, ascending. Empty if the frame has no spots.
    pub fn spots_in_frame(&self, frame: usize) -> &[SpotId] {
        self.frames.get(&frame).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn edge_feature(&self, source: SpotId, target: SpotId, key: &str) -> Option<f64> {
        self.edge_features.get(&(source, target))?.get(key).copied()
    }

    pub fn edge_features(&self, source: SpotId, target: SpotId) -> Option<&FeatureMap> {
        self.edge_features.get(&(source, target))
    }

    pub fn track_feature(&self, track: TrackId, key: &str) -> Option<f64> {
        self.track_features.get(&track)?.get(key).copied()
    }

    pub fn track_features(&self, track: TrackId) -> Option<&FeatureMap> {
        self.track_features.get(&track)
    }

    /// Frame interval the model was assembled with.
    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn spot_count(&self) -> usize {
        self.graph.spot_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }
}

/// Turns a linked (and split-processed) graph into a [`Model`].
#[derive(Debug)]
pub struct ModelAssembler<'a> {
    analyzers: &'a AnalyzerRegistry,
    dt: f64,
}

impl<'a> ModelAssembler<'a> {
    pub fn new(analyzers: &'a AnalyzerRegistry, dt: f64) -> Self {
        Self { analyzers, dt }
    }

    /// Seed POSITION_T, label tracks, then run every analyzer once, in
    /// registration order, on the calling thread.
    pub fn assemble(&self, mut graph: LineageGraph) -> Model {
        let mut frames: BTreeMap<usize, Vec<SpotId>> = BTreeMap::new();
        for spot in graph.spots_mut() {
            spot.set_feature(POSITION_T, spot.frame as f64 * self.dt);
            frames.entry(spot.frame).or_default().push(spot.id);
        }

        let tracks = label_tracks(&graph);

        // Analyzers read the graph; results are written back afterwards.
        let view = ModelView {
            graph: &graph,
            tracks: &tracks,
            dt: self.dt,
        };

        let mut spot_values: Vec<(SpotId, Vec<(&'static str, f64)>)> = Vec::new();
        for analyzer in self.analyzers.spot_analyzers() {
            debug!("Running spot analyzer '{}'", analyzer.key());
            for spot in graph.spots() {
                spot_values.push((spot.id, analyzer.compute(&view, spot)));
            }
        }

        let mut edge_features: BTreeMap<(SpotId, SpotId), FeatureMap> =
            graph.edges().map(|e| ((e.source, e.target), FeatureMap::new())).collect();
        for analyzer in self.analyzers.edge_analyzers() {
            debug!("Running edge analyzer '{}'", analyzer.key());
            for edge in graph.edges() {
                let values = analyzer.compute(&view, &edge);
                let map = edge_features.entry((edge.source, edge.target)).or_default();
                map.extend(values.into_iter().map(|(k, v)| (k.to_string(), v)));
            }
        }

        let mut track_features: BTreeMap<TrackId, FeatureMap> =
            tracks.tracks().iter().map(|t| (t.id, FeatureMap::new())).collect();
        for analyzer in self.analyzers.track_analyzers() {
            debug!("Running track analyzer '{}'", analyzer.key());
            for track in tracks.tracks() {
                let values = analyzer.compute(&view, track);
                let map = track_features.entry(track.id).or_default();
                map.extend(values.into_iter().map(|(k, v)| (k.to_string(), v)));
            }
        }

        for (id, values) in spot_values {
            if let Some(spot) = graph.spot_mut(id) {
                for (key, value) in values {
                    spot.set_feature(key, value);
                }
            }
        }

        Model {
            graph,
            tracks,
            frames,
            edge_features,
            track_features,
            dt: self.dt,
        }
    }
}
