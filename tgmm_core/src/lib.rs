//! TGMM Core - Lineage import for Gaussian-mixture cell tracking results
//!
//! Converts a folder of per-timepoint TGMM documents into a feature-annotated
//! 4D lineage model:
//! 1. **Parsing**: one XML document per frame, one Gaussian record per nucleus
//! 2. **Registration**: per-frame affine transforms from view-local pixels to world space
//! 3. **Linking**: parent ids resolved one frame back into a forest of tracks
//! 4. **Assembly**: division handling, track labelling and feature analyzers

pub mod analyzers;
pub mod cancel;
pub mod components;
pub mod config;
pub mod dataset;
pub mod document;
pub mod error;
pub mod features;
pub mod filter;
pub mod graph;
pub mod importer;
pub mod linker;
pub mod logger;
pub mod model;
pub mod spot;
pub mod split;
pub mod transform;

// Re-export key types for convenience
pub use cancel::CancellationToken;
pub use components::{Track, TrackId, TrackIndex};
pub use config::ImportConfig;
pub use dataset::{DatasetError, SpimDataset, ViewSetup};
pub use document::{FramePattern, GaussianRecord, DEFAULT_PATTERN};
pub use error::{ImportError, ImportWarning, WarningKind, WarningSummary};
pub use features::{AnalyzerRegistry, EdgeAnalyzer, ModelView, SpotAnalyzer, TrackAnalyzer};
pub use filter::{RealInterval, SpotFilter, TimeRange};
pub use graph::{Edge, LineageGraph};
pub use importer::{import_tgmm, ImportReport, TgmmImporter};
pub use logger::{ImportLogger, LogEntry, MemoryLogger, TracingLogger};
pub use model::Model;
pub use spot::{Spot, SpotId};
pub use split::SplitPolicy;
pub use transform::{AffineTransform3D, RegistrationTable, TransformProvider};
