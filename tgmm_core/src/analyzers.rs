//! Standard feature analyzers, using the TrackMate feature keys.

use crate::components::Track;
use crate::features::{
    AnalyzerRegistry, EdgeAnalyzer, FeatureValues, ModelView, SpotAnalyzer, TrackAnalyzer,
};
use crate::graph::Edge;
use crate::spot::Spot;

// ============================================================================
// FEATURE KEYS
// ============================================================================

pub const SOURCE_ID: &str = "SOURCE_ID";

pub const SPOT_SOURCE_ID: &str = "SPOT_SOURCE_ID";
pub const SPOT_TARGET_ID: &str = "SPOT_TARGET_ID";
pub const LINK_COST: &str = "LINK_COST";
pub const VELOCITY: &str = "VELOCITY";
pub const DISPLACEMENT: &str = "DISPLACEMENT";
pub const EDGE_TIME: &str = "EDGE_TIME";
pub const EDGE_X_LOCATION: &str = "EDGE_X_LOCATION";
pub const EDGE_Y_LOCATION: &str = "EDGE_Y_LOCATION";
pub const EDGE_Z_LOCATION: &str = "EDGE_Z_LOCATION";

pub const TRACK_INDEX: &str = "TRACK_INDEX";
pub const TRACK_ID: &str = "TRACK_ID";
pub const NUMBER_SPOTS: &str = "NUMBER_SPOTS";
pub const NUMBER_GAPS: &str = "NUMBER_GAPS";
pub const NUMBER_SPLITS: &str = "NUMBER_SPLITS";
pub const NUMBER_MERGES: &str = "NUMBER_MERGES";
pub const NUMBER_COMPLEX: &str = "NUMBER_COMPLEX";
pub const TRACK_DURATION: &str = "TRACK_DURATION";
pub const TRACK_START: &str = "TRACK_START";
pub const TRACK_STOP: &str = "TRACK_STOP";
pub const TRACK_DISPLACEMENT: &str = "TRACK_DISPLACEMENT";
pub const TRACK_X_LOCATION: &str = "TRACK_X_LOCATION";
pub const TRACK_Y_LOCATION: &str = "TRACK_Y_LOCATION";
pub const TRACK_Z_LOCATION: &str = "TRACK_Z_LOCATION";
pub const TRACK_MEAN_SPEED: &str = "TRACK_MEAN_SPEED";
pub const TRACK_MAX_SPEED: &str = "TRACK_MAX_SPEED";
pub const TRACK_MIN_SPEED: &str = "TRACK_MIN_SPEED";
pub const TRACK_MEDIAN_SPEED: &str = "TRACK_MEDIAN_SPEED";
pub const TRACK_STD_SPEED: &str = "TRACK_STD_SPEED";

impl AnalyzerRegistry {
    /// Registry with every standard analyzer, spots tagged with the view
    /// setup they came from.
    pub fn standard(view_setup_id: u32) -> Self {
        let mut registry = Self::new();
        registry
            .add_spot_analyzer(SpotSourceIdAnalyzer { view_setup_id })
            .add_edge_analyzer(EdgeTargetAnalyzer)
            .add_edge_analyzer(EdgeVelocityAnalyzer)
            .add_edge_analyzer(EdgeTimeLocationAnalyzer)
            .add_track_analyzer(TrackIndexAnalyzer)
            .add_track_analyzer(TrackBranchingAnalyzer)
            .add_track_analyzer(TrackDurationAnalyzer)
            .add_track_analyzer(TrackLocationAnalyzer)
            .add_track_analyzer(TrackSpeedStatisticsAnalyzer);
        registry
    }
}

/// Resolve both endpoints of an edge.
fn endpoints<'a>(view: &ModelView<'a>, edge: &Edge) -> Option<(&'a Spot, &'a Spot)> {
    Some((view.graph.spot(edge.source)?, view.graph.spot(edge.target)?))
}

/// Edge speed in world units per time unit.
fn edge_speed(view: &ModelView<'_>, source: &Spot, target: &Spot) -> Option<f64> {
    let elapsed = view.time_of(target.frame) - view.time_of(source.frame);
    (elapsed > 0.0).then(|| source.distance_to(target) / elapsed)
}

// ============================================================================
// SPOT ANALYZERS
// ============================================================================

/// Tags each spot with the view setup it was imported from.
#[derive(Debug, Clone, Copy)]
pub struct SpotSourceIdAnalyzer {
    pub view_setup_id: u32,
}

impl SpotAnalyzer for SpotSourceIdAnalyzer {
    fn key(&self) -> &'static str {
        "Spot source ID"
    }

    fn features(&self) -> &'static [&'static str] {
        &[SOURCE_ID]
    }

    fn compute(&self, _view: &ModelView<'_>, _spot: &Spot) -> FeatureValues {
        vec![(SOURCE_ID, f64::from(self.view_setup_id))]
    }
}

// ============================================================================
// EDGE ANALYZERS
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub struct EdgeTargetAnalyzer;

impl EdgeAnalyzer for EdgeTargetAnalyzer {
    fn key(&self) -> &'static str {
        "Edge target"
    }

    fn features(&self) -> &'static [&'static str] {
        &[SPOT_SOURCE_ID, SPOT_TARGET_ID, LINK_COST]
    }

    fn compute(&self, _view: &ModelView<'_>, edge: &Edge) -> FeatureValues {
        vec![
            (SPOT_SOURCE_ID, edge.source.0 as f64),
            (SPOT_TARGET_ID, edge.target.0 as f64),
            (LINK_COST, edge.weight),
        ]
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EdgeVelocityAnalyzer;

impl EdgeAnalyzer for EdgeVelocityAnalyzer {
    fn key(&self) -> &'static str {
        "Edge velocity"
    }

    fn features(&self) -> &'static [&'static str] {
        &[VELOCITY, DISPLACEMENT]
    }

    fn compute(&self, view: &ModelView<'_>, edge: &Edge) -> FeatureValues {
        let Some((source, target)) = endpoints(view, edge) else {
            return Vec::new();
        };
        let mut values = vec![(DISPLACEMENT, source.distance_to(target))];
        if let Some(speed) = edge_speed(view, source, target) {
            values.push((VELOCITY, speed));
        }
        values
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EdgeTimeLocationAnalyzer;

impl EdgeAnalyzer for EdgeTimeLocationAnalyzer {
    fn key(&self) -> &'static str {
        "Edge mean location"
    }

    fn features(&self) -> &'static [&'static str] {
        &[EDGE_TIME, EDGE_X_LOCATION, EDGE_Y_LOCATION, EDGE_Z_LOCATION]
    }

    fn compute(&self, view: &ModelView<'_>, edge: &Edge) -> FeatureValues {
        let Some((source, target)) = endpoints(view, edge) else {
            return Vec::new();
        };
        let mid = (source.position + target.position) / 2.0;
        let time = (view.time_of(source.frame) + view.time_of(target.frame)) / 2.0;
        vec![
            (EDGE_TIME, time),
            (EDGE_X_LOCATION, mid.x),
            (EDGE_Y_LOCATION, mid.y),
            (EDGE_Z_LOCATION, mid.z),
        ]
    }
}

// ============================================================================
// TRACK ANALYZERS
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub struct TrackIndexAnalyzer;

impl TrackAnalyzer for TrackIndexAnalyzer {
    fn key(&self) -> &'static str {
        "Track index"
    }

    fn features(&self) -> &'static [&'static str] {
        &[TRACK_INDEX, TRACK_ID]
    }

    fn compute(&self, view: &ModelView<'_>, track: &Track) -> FeatureValues {
        let index = view
            .tracks
            .tracks()
            .iter()
            .position(|t| t.id == track.id)
            .unwrap_or(track.id.0 as usize);
        vec![(TRACK_INDEX, index as f64), (TRACK_ID, f64::from(track.id.0))]
    }
}

/// Counts spots, gaps and the branching topology of a track.
#[derive(Debug, Clone, Copy)]
pub struct TrackBranchingAnalyzer;

impl TrackAnalyzer for TrackBranchingAnalyzer {
    fn key(&self) -> &'static str {
        "Branching analyzer"
    }

    fn features(&self) -> &'static [&'static str] {
        &[NUMBER_SPOTS, NUMBER_GAPS, NUMBER_SPLITS, NUMBER_MERGES, NUMBER_COMPLEX]
    }

    fn compute(&self, view: &ModelView<'_>, track: &Track) -> FeatureValues {
        let graph = view.graph;
        let (mut splits, mut merges, mut complex) = (0usize, 0usize, 0usize);
        for &id in &track.spots {
            let (inputs, outputs) = (graph.in_degree(id), graph.out_degree(id));
            match (inputs > 1, outputs > 1) {
                (true, true) => complex += 1,
                (false, true) => splits += 1,
                (true, false) => merges += 1,
                (false, false) => {}
            }
        }

        let gaps = track
            .edges
            .iter()
            .filter_map(|e| endpoints(view, e))
            .filter(|(s, t)| t.frame.abs_diff(s.frame) > 1)
            .count();

        vec![
            (NUMBER_SPOTS, track.spots.len() as f64),
            (NUMBER_GAPS, gaps as f64),
            (NUMBER_SPLITS, splits as f64),
            (NUMBER_MERGES, merges as f64),
            (NUMBER_COMPLEX, complex as f64),
        ]
    }
}

/// Start, stop, duration and end-to-end displacement of a track.
#[derive(Debug, Clone, Copy)]
pub struct TrackDurationAnalyzer;

impl TrackAnalyzer for TrackDurationAnalyzer {
    fn key(&self) -> &'static str {
        "Track duration"
    }

    fn features(&self) -> &'static [&'static str] {
        &[TRACK_DURATION, TRACK_START, TRACK_STOP, TRACK_DISPLACEMENT]
    }

    fn compute(&self, view: &ModelView<'_>, track: &Track) -> FeatureValues {
        let spots: Vec<&Spot> = track.spots.iter().filter_map(|&id| view.graph.spot(id)).collect();
        // Member ids are ascending, so ties resolve to the smallest id.
        let first = spots.iter().min_by_key(|s| s.frame);
        let last = spots.iter().rev().max_by_key(|s| s.frame);
        let (Some(first), Some(last)) = (first, last) else {
            return Vec::new();
        };

        let start = view.time_of(first.frame);
        let stop = view.time_of(last.frame);
        vec![
            (TRACK_DURATION, stop - start),
            (TRACK_START, start),
            (TRACK_STOP, stop),
            (TRACK_DISPLACEMENT, first.distance_to(last)),
        ]
    }
}

/// Mean position of a track's spots.
#[derive(Debug, Clone, Copy)]
pub struct TrackLocationAnalyzer;

impl TrackAnalyzer for TrackLocationAnalyzer {
    fn key(&self) -> &'static str {
        "Track location"
    }

    fn features(&self) -> &'static [&'static str] {
        &[TRACK_X_LOCATION, TRACK_Y_LOCATION, TRACK_Z_LOCATION]
    }

    fn compute(&self, view: &ModelView<'_>, track: &Track) -> FeatureValues {
        let positions: Vec<_> = track
            .spots
            .iter()
            .filter_map(|&id| view.graph.spot(id))
            .map(|s| s.position)
            .collect();
        if positions.is_empty() {
            return Vec::new();
        }
        let mean = positions.iter().sum::<nalgebra::Vector3<f64>>() / positions.len() as f64;
        vec![
            (TRACK_X_LOCATION, mean.x),
            (TRACK_Y_LOCATION, mean.y),
            (TRACK_Z_LOCATION, mean.z),
        ]
    }
}

/// Speed statistics over a track's edges. Tracks without edges get none.
#[derive(Debug, Clone, Copy)]
pub struct TrackSpeedStatisticsAnalyzer;

impl TrackAnalyzer for TrackSpeedStatisticsAnalyzer {
    fn key(&self) -> &'static str {
        "Track speed"
    }

    fn features(&self) -> &'static [&'static str] {
        &[
            TRACK_MEAN_SPEED,
            TRACK_MAX_SPEED,
            TRACK_MIN_SPEED,
            TRACK_MEDIAN_SPEED,
            TRACK_STD_SPEED,
        ]
    }

    fn compute(&self, view: &ModelView<'_>, track: &Track) -> FeatureValues {
        let mut speeds: Vec<f64> = track
            .edges
            .iter()
            .filter_map(|e| endpoints(view, e))
            .filter_map(|(s, t)| edge_speed(view, s, t))
            .collect();
        if speeds.is_empty() {
            return Vec::new();
        }
        speeds.sort_by(f64::total_cmp);

        let n = speeds.len();
        let mean = speeds.iter().sum::<f64>() / n as f64;
        let median = if n % 2 == 1 {
            speeds[n / 2]
        } else {
            (speeds[n / 2 - 1] + speeds[n / 2]) / 2.0
        };
        let std = if n > 1 {
            (speeds.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64).sqrt()
        } else {
            0.0
        };

        vec![
            (TRACK_MEAN_SPEED, mean),
            (TRACK_MAX_SPEED, speeds[n - 1]),
            (TRACK_MIN_SPEED, speeds[0]),
            (TRACK_MEDIAN_SPEED, median),
            (TRACK_STD_SPEED, std),
        ]
    }
}
