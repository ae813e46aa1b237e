//! The import driver: frame documents in, assembled model out.
//!
//! Frames are processed in ascending order. Each frame is located, parsed,
//! turned into spots, filtered and linked before the next one is touched, so
//! only the current and previous frame's lookup tables are ever alive.

use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::cancel::CancellationToken;
use crate::config::ImportConfig;
use crate::document::{parse_frame_document, FramePattern};
use crate::error::{ImportError, ImportWarning, WarningSummary};
use crate::features::AnalyzerRegistry;
use crate::linker::LineageLinker;
use crate::logger::{ImportLogger, TracingLogger};
use crate::model::{Model, ModelAssembler};
use crate::spot::SpotBuilder;
use crate::transform::{AffineTransform3D, TransformProvider};

/// Outcome of a successful import.
#[derive(Debug)]
pub struct ImportReport {
    pub model: Model,

    /// Every warning, in the order it was raised
    pub warnings: Vec<ImportWarning>,

    pub summary: WarningSummary,

    /// Frames of the requested range that were visited
    pub frames_processed: usize,

    /// Edges removed by the split policy
    pub edges_unlinked: usize,
}

impl ImportReport {
    /// `imported N spots over M frames; K warnings (...)`
    pub fn summary_line(&self) -> String {
        format!(
            "imported {} spots over {} frames; {}",
            self.model.spot_count(),
            self.frames_processed,
            self.summary
        )
    }
}

/// Imports one folder of TGMM frame documents.
pub struct TgmmImporter<'a, P: TransformProvider + ?Sized> {
    folder: PathBuf,
    provider: &'a P,
    config: ImportConfig,
    logger: Arc<dyn ImportLogger>,
    cancellation: CancellationToken,
    analyzers: Option<AnalyzerRegistry>,
}

impl<'a, P: TransformProvider + ?Sized> TgmmImporter<'a, P> {
    pub fn new(folder: impl Into<PathBuf>, provider: &'a P, config: ImportConfig) -> Self {
        Self {
            folder: folder.into(),
            provider,
            config,
            logger: Arc::new(TracingLogger),
            cancellation: CancellationToken::new(),
            analyzers: None,
        }
    }

    pub fn with_logger(mut self, logger: Arc<dyn ImportLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Replace the standard analyzers.
    pub fn with_analyzers(mut self, analyzers: AnalyzerRegistry) -> Self {
        self.analyzers = Some(analyzers);
        self
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    /// Validate the configuration and the TGMM folder without importing.
    pub fn check_input(&self) -> Result<FramePattern, ImportError> {
        let pattern = self.config.validate()?;
        std::fs::read_dir(&self.folder).map_err(|e| ImportError::unreadable(&self.folder, e))?;
        Ok(pattern)
    }

    /// Frames to visit: the provider's frames clipped to the time range.
    fn frame_range(&self) -> Option<RangeInclusive<usize>> {
        let last = self.provider.num_frames().checked_sub(1)?;
        let (from, to) = match self.config.time_range {
            Some(range) => (range.from, range.to.min(last)),
            None => (0, last),
        };
        (from <= to).then_some(from..=to)
    }

    /// Run the import. Nothing is returned on a fatal error.
    pub fn import(&self) -> Result<ImportReport, ImportError> {
        let pattern = self.check_input()?;
        let setup = self.config.view_setup_id;

        // Resolve every transform up front so a missing registration fails
        // before any document is parsed.
        let transforms: Vec<(usize, AffineTransform3D)> = match self.frame_range() {
            Some(range) => range
                .map(|frame| -> Result<_, ImportError> {
                    Ok((frame, self.provider.transform_for(setup, frame)?))
                })
                .collect::<Result<_, _>>()?,
            None => Vec::new(),
        };

        info!(
            "Importing {} frames from {} (view setup {})",
            transforms.len(),
            self.folder.display(),
            setup
        );

        let filter = self.config.filter();
        let mut builder = SpotBuilder::new();
        let mut linker = LineageLinker::new();
        let mut warnings = Vec::new();
        let mut summary = WarningSummary::default();
        let mut warn = |warning: ImportWarning| {
            self.logger.error(&warning.to_string());
            summary.record(&warning);
            warnings.push(warning);
        };

        let total = transforms.len();
        for (i, (frame, transform)) in transforms.iter().enumerate() {
            if self.cancellation.is_cancelled() {
                return Err(ImportError::Cancelled);
            }

            // A frame without a readable document is an empty generation.
            linker.begin_frame(*frame);

            let path = pattern.path_in(&self.folder, *frame);
            if !path.is_file() {
                warn(ImportWarning::MissingFrame { frame: *frame, path });
                self.logger.progress((i + 1) as f64 / total as f64);
                continue;
            }

            let document = match parse_frame_document(&path, *frame) {
                Ok(document) => document,
                Err(warning) => {
                    warn(warning);
                    self.logger.progress((i + 1) as f64 / total as f64);
                    continue;
                }
            };
            document.warnings.into_iter().for_each(&mut warn);

            let before = linker.spot_count();
            for record in &document.records {
                let spot = match builder.build(record, *frame, transform) {
                    Ok(spot) => spot,
                    Err(warning) => {
                        warn(warning);
                        continue;
                    }
                };
                if !filter.accepts(&spot) {
                    continue;
                }
                if let Some(warning) = linker.link(spot, record.local_id, record.parent) {
                    warn(warning);
                }
            }

            debug!(
                "Frame {}: {} records, {} spots kept",
                frame,
                document.records.len(),
                linker.spot_count() - before
            );
            self.logger.progress((i + 1) as f64 / total as f64);
        }

        if self.cancellation.is_cancelled() {
            return Err(ImportError::Cancelled);
        }

        let mut graph = linker.finish();
        let edges_unlinked = self.config.split_policy.apply(&mut graph);

        let standard;
        let analyzers = match &self.analyzers {
            Some(analyzers) => analyzers,
            None => {
                standard = AnalyzerRegistry::standard(setup);
                &standard
            }
        };
        let model = ModelAssembler::new(analyzers, self.config.dt).assemble(graph);

        let report = ImportReport {
            model,
            warnings,
            summary,
            frames_processed: total,
            edges_unlinked,
        };
        self.logger.log(&report.summary_line());
        self.logger.progress(1.0);
        Ok(report)
    }
}

/// Import with the tracing logger, no cancellation and the standard analyzers.
pub fn import_tgmm<P: TransformProvider + ?Sized>(
    folder: impl Into<PathBuf>,
    provider: &P,
    config: ImportConfig,
) -> Result<ImportReport, ImportError> {
    TgmmImporter::new(folder, provider, config).import()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::TimeRange;
    use crate::logger::MemoryLogger;
    use crate::transform::RegistrationTable;

    #[test]
    fn test_unreadable_folder_is_fatal() {
        let table = RegistrationTable::uniform(0, 2, AffineTransform3D::identity());
        let result = import_tgmm("/definitely/not/a/tgmm/folder", &table, ImportConfig::default());
        assert!(matches!(result, Err(ImportError::UnreadableFolder { .. })));
    }

    #[test]
    fn test_missing_registration_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut table = RegistrationTable::new();
        table.insert(0, 0, AffineTransform3D::identity());
        table.insert(0, 2, AffineTransform3D::identity());

        let result = import_tgmm(dir.path(), &table, ImportConfig::default());
        assert!(matches!(
            result,
            Err(ImportError::MissingRegistration { view_setup: 0, frame: 1 })
        ));
    }

    #[test]
    fn test_invalid_config_is_rejected_first() {
        let table = RegistrationTable::new();
        let config = ImportConfig { dt: -1.0, ..Default::default() };
        let result = import_tgmm("/definitely/not/a/tgmm/folder", &table, config);
        assert!(matches!(result, Err(ImportError::InvalidConfig(_))));
    }

    #[test]
    fn test_cancelled_before_first_frame() {
        let dir = tempfile::tempdir().unwrap();
        let table = RegistrationTable::uniform(0, 3, AffineTransform3D::identity());
        let token = CancellationToken::new();
        token.cancel();

        let result = TgmmImporter::new(dir.path(), &table, ImportConfig::default())
            .with_cancellation(token)
            .import();
        assert!(matches!(result, Err(ImportError::Cancelled)));
    }

    /// Cancels its token once the first frame has been reported.
    #[derive(Debug)]
    struct CancelOnProgress {
        token: CancellationToken,
        inner: MemoryLogger,
    }

    impl ImportLogger for CancelOnProgress {
        fn log(&self, message: &str) {
            self.inner.log(message);
        }

        fn error(&self, message: &str) {
            self.inner.error(message);
        }

        fn progress(&self, fraction: f64) {
            self.inner.progress(fraction);
            self.token.cancel();
        }
    }

    #[test]
    fn test_cancelled_between_frames() {
        let dir = tempfile::tempdir().unwrap();
        let table = RegistrationTable::uniform(0, 3, AffineTransform3D::identity());
        let token = CancellationToken::new();
        let logger = Arc::new(CancelOnProgress {
            token: token.clone(),
            inner: MemoryLogger::new(),
        });

        let result = TgmmImporter::new(dir.path(), &table, ImportConfig::default())
            .with_logger(logger.clone())
            .with_cancellation(token)
            .import();

        assert!(matches!(result, Err(ImportError::Cancelled)));
        // Only frame 0 was visited before the token was seen.
        assert_eq!(logger.inner.errors().len(), 1);
        assert!(logger.inner.messages().is_empty());
    }

    #[test]
    fn test_missing_frames_are_warnings() {
        let dir = tempfile::tempdir().unwrap();
        let table = RegistrationTable::uniform(0, 2, AffineTransform3D::identity());
        let logger = Arc::new(MemoryLogger::new());

        let report = TgmmImporter::new(dir.path(), &table, ImportConfig::default())
            .with_logger(logger.clone())
            .import()
            .unwrap();

        assert!(report.model.is_empty());
        assert_eq!(report.summary.missing_frame, 2);
        assert_eq!(logger.errors().len(), 2);
        assert_eq!(
            logger.messages(),
            vec![
                "imported 0 spots over 2 frames; 2 warnings (0 parse, 2 missing-frame, 0 degenerate, 0 out-of-order)"
                    .to_string()
            ]
        );
        assert_eq!(logger.last_progress(), Some(1.0));
    }

    #[test]
    fn test_time_range_beyond_dataset_is_clipped() {
        let dir = tempfile::tempdir().unwrap();
        let table = RegistrationTable::uniform(0, 2, AffineTransform3D::identity());
        let config = ImportConfig {
            time_range: Some(TimeRange::new(1, 50)),
            ..Default::default()
        };
        let report = import_tgmm(dir.path(), &table, config).unwrap();
        assert_eq!(report.frames_processed, 1);
    }
}
