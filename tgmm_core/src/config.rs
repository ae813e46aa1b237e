//! Import configuration.

use serde::{Deserialize, Serialize};

use crate::document::{FramePattern, DEFAULT_PATTERN};
use crate::error::ImportError;
use crate::filter::{RealInterval, SpotFilter, TimeRange};
use crate::split::SplitPolicy;

/// Every knob of an import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// View setup whose registrations map TGMM pixels to world space (default: 0)
    pub view_setup_id: u32,

    /// World-space crop box, inclusive (default: none)
    pub interval: Option<RealInterval>,

    /// Inclusive frame range (default: all frames of the dataset)
    pub time_range: Option<TimeRange>,

    /// Division handling (default: keep intact)
    pub split_policy: SplitPolicy,

    /// Time units per frame, strictly positive (default: 1.0)
    pub dt: f64,

    /// printf-style frame file name (default: `GMEMfinalResult_frame%04d.xml`)
    pub pattern: String,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            view_setup_id: 0,
            interval: None,
            time_range: None,
            split_policy: SplitPolicy::KeepIntact,
            dt: 1.0,
            pattern: DEFAULT_PATTERN.to_string(),
        }
    }
}

impl ImportConfig {
    /// Check every field, returning the parsed frame pattern on success.
    ///
    /// An inverted time range is valid and yields an empty model.
    pub fn validate(&self) -> Result<FramePattern, ImportError> {
        if !(self.dt.is_finite() && self.dt > 0.0) {
            return Err(ImportError::invalid_config(format!(
                "dt must be strictly positive, got {}",
                self.dt
            )));
        }
        if let Some(interval) = &self.interval {
            if !interval.is_finite() {
                return Err(ImportError::invalid_config("interval bounds must be finite"));
            }
            if interval.is_empty() {
                return Err(ImportError::invalid_config(format!(
                    "interval is inverted: min {:?} max {:?}",
                    interval.min, interval.max
                )));
            }
        }
        FramePattern::parse(&self.pattern)
    }

    /// Space-time filter described by this configuration.
    pub fn filter(&self) -> SpotFilter {
        SpotFilter::new(self.interval, self.time_range)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = ImportConfig::default();
        let pattern = config.validate().unwrap();
        assert_eq!(pattern.file_name(7), "GMEMfinalResult_frame0007.xml");
        assert_eq!(config.filter(), SpotFilter::default());
    }

    #[test]
    fn test_rejects_bad_values() {
        let bad_dt = ImportConfig { dt: 0.0, ..Default::default() };
        assert!(matches!(bad_dt.validate(), Err(ImportError::InvalidConfig(_))));

        let nan_dt = ImportConfig { dt: f64::NAN, ..Default::default() };
        assert!(nan_dt.validate().is_err());

        let inverted = ImportConfig {
            interval: Some(RealInterval::from_bounds([5.0, 0.0, 0.0, 1.0, 1.0, 1.0])),
            ..Default::default()
        };
        assert!(inverted.validate().is_err());

        let infinite = ImportConfig {
            interval: Some(RealInterval::from_bounds([0.0, 0.0, 0.0, f64::INFINITY, 1.0, 1.0])),
            ..Default::default()
        };
        assert!(infinite.validate().is_err());

        let no_substitution = ImportConfig {
            pattern: "frame.xml".to_string(),
            ..Default::default()
        };
        assert!(no_substitution.validate().is_err());
    }

    #[test]
    fn test_inverted_time_range_is_accepted() {
        let config = ImportConfig {
            time_range: Some(TimeRange::new(5, 2)),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_json_partial_config_uses_defaults() {
        let config: ImportConfig =
            serde_json::from_str(r#"{ "view_setup_id": 2, "split_policy": "unlink_all_splits" }"#)
                .unwrap();
        assert_eq!(config.view_setup_id, 2);
        assert_eq!(config.split_policy, SplitPolicy::UnlinkAllSplits);
        assert_eq!(config.dt, 1.0);
        assert_eq!(config.pattern, DEFAULT_PATTERN);
    }
}
