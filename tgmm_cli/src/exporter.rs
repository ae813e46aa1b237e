//! JSON exporter for imported lineage models.
//!
//! A diagnostic dump of spots, edges, tracks and their features, written with
//! `serde_json::to_string_pretty`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tgmm_core::{ImportReport, Model, WarningSummary};

/// One spot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotExport {
    pub id: u64,
    pub name: String,
    pub frame: usize,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub radius: f64,
    pub features: BTreeMap<String, f64>,
}

/// One parent → child link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeExport {
    pub source: u64,
    pub target: u64,
    pub weight: f64,

    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub features: BTreeMap<String, f64>,
}

/// One track.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackExport {
    pub id: u32,
    pub spots: Vec<u64>,
    pub edge_count: usize,

    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub features: BTreeMap<String, f64>,
}

/// Import totals and warning counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryExport {
    pub spots: usize,
    pub edges: usize,
    pub tracks: usize,
    pub frames: usize,
    pub edges_unlinked: usize,
    pub warnings: usize,
    pub parse: usize,
    pub missing_frame: usize,
    pub degenerate: usize,
    pub out_of_order: usize,
}

impl SummaryExport {
    fn new(report: &ImportReport) -> Self {
        let WarningSummary {
            parse,
            missing_frame,
            degenerate,
            out_of_order,
        } = report.summary;
        Self {
            spots: report.model.spot_count(),
            edges: report.model.edge_count(),
            tracks: report.model.track_count(),
            frames: report.frames_processed,
            edges_unlinked: report.edges_unlinked,
            warnings: report.summary.total(),
            parse,
            missing_frame,
            degenerate,
            out_of_order,
        }
    }
}

/// Complete model export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelExport {
    /// Time units per frame
    pub dt: f64,

    pub spots: Vec<SpotExport>,
    pub edges: Vec<EdgeExport>,
    pub tracks: Vec<TrackExport>,
    pub summary: SummaryExport,

    /// Warning messages, in the order they were raised
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub warnings: Vec<String>,
}

impl ModelExport {
    /// Snapshot an import report.
    pub fn from_report(report: &ImportReport) -> Self {
        let model: &Model = &report.model;

        let spots = model
            .spots()
            .map(|s| SpotExport {
                id: s.id.0,
                name: s.name.clone(),
                frame: s.frame,
                x: s.position.x,
                y: s.position.y,
                z: s.position.z,
                radius: s.radius,
                features: s.features.clone(),
            })
            .collect();

        let edges = model
            .edges()
            .map(|e| EdgeExport {
                source: e.source.0,
                target: e.target.0,
                weight: e.weight,
                features: model.edge_features(e.source, e.target).cloned().unwrap_or_default(),
            })
            .collect();

        let tracks = model
            .tracks()
            .iter()
            .map(|t| TrackExport {
                id: t.id.0,
                spots: t.spots.iter().map(|s| s.0).collect(),
                edge_count: t.edges.len(),
                features: model.track_features(t.id).cloned().unwrap_or_default(),
            })
            .collect();

        Self {
            dt: model.dt(),
            spots,
            edges,
            tracks,
            summary: SummaryExport::new(report),
            warnings: report.warnings.iter().map(|w| w.to_string()).collect(),
        }
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}
