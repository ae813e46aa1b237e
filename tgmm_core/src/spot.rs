//! Spots: single detections in world coordinates, and the builder turning
//! Gaussian records into them.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::document::GaussianRecord;
use crate::error::ImportWarning;
use crate::transform::AffineTransform3D;

// ============================================================================
// FEATURE KEYS
// ============================================================================

pub const POSITION_X: &str = "POSITION_X";
pub const POSITION_Y: &str = "POSITION_Y";
pub const POSITION_Z: &str = "POSITION_Z";
pub const RADIUS: &str = "RADIUS";
pub const POSITION_T: &str = "POSITION_T";
pub const FRAME: &str = "FRAME";
pub const QUALITY: &str = "QUALITY";
pub const VISIBILITY: &str = "VISIBILITY";

/// Features every imported spot carries.
pub const SPOT_FEATURES: [&str; 8] = [
    POSITION_X, POSITION_Y, POSITION_Z, RADIUS, POSITION_T, FRAME, QUALITY, VISIBILITY,
];

// ============================================================================
// SPOT
// ============================================================================

/// Importer-assigned spot identifier, unique across one import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SpotId(pub u64);

impl fmt::Display for SpotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single detection in one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spot {
    pub id: SpotId,

    /// Display name, `ID<n>` like the host application names new spots
    pub name: String,

    /// Frame index t ≥ 0
    pub frame: usize,

    /// World-space position
    pub position: Vector3<f64>,

    /// Mean radius in world units, strictly positive
    pub radius: f64,

    /// Numeric features by key
    pub features: BTreeMap<String, f64>,
}

impl Spot {
    /// Feature value, if set.
    pub fn feature(&self, key: &str) -> Option<f64> {
        self.features.get(key).copied()
    }

    /// Set or replace a feature value.
    pub fn set_feature(&mut self, key: impl Into<String>, value: f64) {
        self.features.insert(key.into(), value);
    }

    /// Euclidean distance to another spot, world units.
    #[inline]
    pub fn distance_to(&self, other: &Spot) -> f64 {
        (self.position - other.position).norm()
    }
}

// ============================================================================
// SPOT BUILDER
// ============================================================================

/// Representative radius of a Gaussian, in the units of its mean.
///
/// The covariance is `W⁻¹/ν`; its eigenvalues are the variances σᵢ² along the
/// principal axes and the radius is the geometric mean `∛(σ₁σ₂σ₃)`.
/// Returns `None` when the result is not strictly positive and finite.
pub fn gaussian_radius(record: &GaussianRecord) -> Option<f64> {
    let covariance = record.precision.try_inverse()? / record.nu;
    let variances = covariance.symmetric_eigenvalues();
    if variances.iter().any(|&v| !(v > 0.0)) {
        return None;
    }
    let radius = variances.iter().map(|v| v.sqrt()).product::<f64>().cbrt();
    (radius.is_finite() && radius > 0.0).then_some(radius)
}

/// Turns Gaussian records into spots, handing out increasing ids.
#[derive(Debug, Default)]
pub struct SpotBuilder {
    next_id: u64,
}

impl SpotBuilder {
    /// Create a builder whose first spot gets id 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Id the next successfully built spot will receive.
    pub fn peek_next_id(&self) -> SpotId {
        SpotId(self.next_id)
    }

    /// Build a world-space spot from a record of `frame`.
    ///
    /// POSITION_T is seeded later by the assembler, once dt is known.
    pub fn build(
        &mut self,
        record: &GaussianRecord,
        frame: usize,
        transform: &AffineTransform3D,
    ) -> Result<Spot, ImportWarning> {
        let degenerate = |reason: String| ImportWarning::DegenerateRecord {
            frame,
            local_id: record.local_id,
            reason,
        };

        let local_radius = gaussian_radius(record)
            .ok_or_else(|| degenerate("covariance has no positive finite radius".to_string()))?;
        let radius = local_radius * transform.isotropic_scale();
        if !(radius.is_finite() && radius > 0.0) {
            return Err(degenerate(format!("transform collapses radius to {}", radius)));
        }

        let position = transform.apply(&record.mean);
        if position.iter().any(|v| !v.is_finite()) {
            return Err(degenerate("non-finite world position".to_string()));
        }

        let id = SpotId(self.next_id);
        self.next_id += 1;

        let mut features = BTreeMap::new();
        features.insert(POSITION_X.to_string(), position.x);
        features.insert(POSITION_Y.to_string(), position.y);
        features.insert(POSITION_Z.to_string(), position.z);
        features.insert(RADIUS.to_string(), radius);
        features.insert(FRAME.to_string(), frame as f64);
        features.insert(QUALITY.to_string(), record.split_score.unwrap_or(1.0));
        features.insert(VISIBILITY.to_string(), 1.0);

        Ok(Spot {
            id,
            name: format!("ID{}", id.0),
            frame,
            position,
            radius,
            features,
        })
    }
}
