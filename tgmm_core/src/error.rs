//! Error types for the TGMM importer.
//!
//! Fatal conditions abort an import and are reported as [`ImportError`].
//! Everything else is an [`ImportWarning`]: logged, counted, and the import
//! carries on without the offending frame, record or link.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort an import. No model is returned alongside them.
#[derive(Debug, Error)]
pub enum ImportError {
    /// No transform registered for the requested view setup at a frame
    #[error("Missing registration for view setup {view_setup} at frame {frame}")]
    MissingRegistration { view_setup: u32, frame: usize },

    /// The TGMM folder does not exist or cannot be listed
    #[error("Unreadable folder {path}: {reason}")]
    UnreadableFolder { path: PathBuf, reason: String },

    /// The caller cancelled the import at a frame boundary
    #[error("Import cancelled")]
    Cancelled,

    /// Configuration rejected before any file was touched
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ImportError {
    /// Creates an unreadable-folder error.
    pub fn unreadable(path: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        Self::UnreadableFolder {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Creates an invalid-configuration error.
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

/// Non-fatal problems met during an import.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ImportWarning {
    /// No document found for a frame inside the requested range
    #[error("Missing frame {frame}: {path} not found")]
    MissingFrame { frame: usize, path: PathBuf },

    /// Malformed document or record; the record (or whole document) is skipped
    #[error("Parse error in {path} at byte {position}: {message}")]
    ParseError {
        path: PathBuf,
        position: u64,
        message: String,
    },

    /// Record whose precision matrix cannot describe a Gaussian
    #[error("Degenerate record {local_id} in frame {frame}: {reason}")]
    DegenerateRecord {
        frame: usize,
        local_id: i64,
        reason: String,
    },

    /// Parent resolved into a frame other than the immediately preceding one
    #[error(
        "Out-of-order parent for record {local_id} in frame {frame}: \
         parent {parent_id} resolved in frame {parent_frame}"
    )]
    OutOfOrderParent {
        frame: usize,
        local_id: i64,
        parent_id: i64,
        parent_frame: usize,
    },
}

/// Warning categories, used for the completion summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WarningKind {
    Parse,
    MissingFrame,
    Degenerate,
    OutOfOrder,
}

impl ImportWarning {
    /// Returns the category this warning is counted under.
    pub fn kind(&self) -> WarningKind {
        match self {
            Self::MissingFrame { .. } => WarningKind::MissingFrame,
            Self::ParseError { .. } => WarningKind::Parse,
            Self::DegenerateRecord { .. } => WarningKind::Degenerate,
            Self::OutOfOrderParent { .. } => WarningKind::OutOfOrder,
        }
    }
}

/// Per-category warning counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WarningSummary {
    pub parse: usize,
    pub missing_frame: usize,
    pub degenerate: usize,
    pub out_of_order: usize,
}

impl WarningSummary {
    /// Counts one warning.
    pub fn record(&mut self, warning: &ImportWarning) {
        match warning.kind() {
            WarningKind::Parse => self.parse += 1,
            WarningKind::MissingFrame => self.missing_frame += 1,
            WarningKind::Degenerate => self.degenerate += 1,
            WarningKind::OutOfOrder => self.out_of_order += 1,
        }
    }

    /// Total number of warnings.
    pub fn total(&self) -> usize {
        self.parse + self.missing_frame + self.degenerate + self.out_of_order
    }

    /// Number of warnings of the given kind.
    pub fn count(&self, kind: WarningKind) -> usize {
        match kind {
            WarningKind::Parse => self.parse,
            WarningKind::MissingFrame => self.missing_frame,
            WarningKind::Degenerate => self.degenerate,
            WarningKind::OutOfOrder => self.out_of_order,
        }
    }
}

impl fmt::Display for WarningSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} warnings ({} parse, {} missing-frame, {} degenerate, {} out-of-order)",
            self.total(),
            self.parse,
            self.missing_frame,
            self.degenerate,
            self.out_of_order
        )
    }
}
