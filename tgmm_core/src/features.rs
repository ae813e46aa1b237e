//! Feature analyzer capabilities and their registry.
//!
//! Analyzers see an immutable [`ModelView`] and return `(key, value)` pairs;
//! the assembler is the only writer of feature maps. Each analyzer runs once
//! per import, in registration order.

use std::fmt;

use crate::components::{Track, TrackIndex};
use crate::graph::{Edge, LineageGraph};
use crate::spot::Spot;

/// Feature values produced for one spot, edge or track.
pub type FeatureValues = Vec<(&'static str, f64)>;

/// Read-only view of the assembled graph handed to analyzers.
#[derive(Debug, Clone, Copy)]
pub struct ModelView<'a> {
    pub graph: &'a LineageGraph,
    pub tracks: &'a TrackIndex,

    /// Frame interval, time units per frame
    pub dt: f64,
}

impl ModelView<'_> {
    /// Time of a frame, `frame · dt`.
    pub fn time_of(&self, frame: usize) -> f64 {
        frame as f64 * self.dt
    }
}

/// Computes per-spot features.
pub trait SpotAnalyzer: Send + Sync {
    /// Analyzer key, unique within a registry
    fn key(&self) -> &'static str;

    /// Feature keys this analyzer produces
    fn features(&self) -> &'static [&'static str];

    fn compute(&self, view: &ModelView<'_>, spot: &Spot) -> FeatureValues;
}

/// Computes per-edge features.
pub trait EdgeAnalyzer: Send + Sync {
    fn key(&self) -> &'static str;

    fn features(&self) -> &'static [&'static str];

    fn compute(&self, view: &ModelView<'_>, edge: &Edge) -> FeatureValues;
}

/// Computes per-track features.
pub trait TrackAnalyzer: Send + Sync {
    fn key(&self) -> &'static str;

    fn features(&self) -> &'static [&'static str];

    fn compute(&self, view: &ModelView<'_>, track: &Track) -> FeatureValues;
}

/// Ordered lists of analyzers, one per capability.
#[derive(Default)]
pub struct AnalyzerRegistry {
    spot: Vec<Box<dyn SpotAnalyzer>>,
    edge: Vec<Box<dyn EdgeAnalyzer>>,
    track: Vec<Box<dyn TrackAnalyzer>>,
}

impl AnalyzerRegistry {
    /// Empty registry: the assembler then only seeds the built-in spot
    /// features.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_spot_analyzer(&mut self, analyzer: impl SpotAnalyzer + 'static) -> &mut Self {
        self.spot.push(Box::new(analyzer));
        self
    }

    pub fn add_edge_analyzer(&mut self, analyzer: impl EdgeAnalyzer + 'static) -> &mut Self {
        self.edge.push(Box::new(analyzer));
        self
    }

    pub fn add_track_analyzer(&mut self, analyzer: impl TrackAnalyzer + 'static) -> &mut Self {
        self.track.push(Box::new(analyzer));
        self
    }

    pub fn spot_analyzers(&self) -> &[Box<dyn SpotAnalyzer>] {
        &self.spot
    }

    pub fn edge_analyzers(&self) -> &[Box<dyn EdgeAnalyzer>] {
        &self.edge
    }

    pub fn track_analyzers(&self) -> &[Box<dyn TrackAnalyzer>] {
        &self.track
    }

    /// Analyzer keys in execution order: spot, then edge, then track.
    pub fn keys(&self) -> Vec<&'static str> {
        self.spot
            .iter()
            .map(|a| a.key())
            .chain(self.edge.iter().map(|a| a.key()))
            .chain(self.track.iter().map(|a| a.key()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.spot.len() + self.edge.len() + self.track.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for AnalyzerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalyzerRegistry")
            .field("analyzers", &self.keys())
            .finish()
    }
}
