//! TGMM Import CLI
//!
//! Batch driver around `tgmm_core`: loads a BigDataViewer dataset descriptor,
//! imports a folder of TGMM frame documents against one of its view setups,
//! and optionally dumps the resulting model as JSON.

pub mod cli;
pub mod exporter;

pub use cli::Args;
pub use exporter::{EdgeExport, ModelExport, SpotExport, SummaryExport, TrackExport};
