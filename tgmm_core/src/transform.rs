//! Per-frame affine transforms from view-local pixel coordinates to world
//! coordinates, and the provider seam the importer resolves them through.

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ImportError;

// ============================================================================
// AFFINE TRANSFORM
// ============================================================================

/// A 3D affine transform stored as a 3×4 matrix: linear part plus translation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffineTransform3D {
    /// 3×3 linear part
    linear: Matrix3<f64>,

    /// Translation column
    translation: Vector3<f64>,
}

impl Default for AffineTransform3D {
    fn default() -> Self {
        Self::identity()
    }
}

impl AffineTransform3D {
    /// Create a transform from its linear part and translation.
    pub fn new(linear: Matrix3<f64>, translation: Vector3<f64>) -> Self {
        Self {
            linear,
            translation,
        }
    }

    /// The identity transform.
    pub fn identity() -> Self {
        Self::new(Matrix3::identity(), Vector3::zeros())
    }

    /// Uniform scaling followed by a translation.
    pub fn scale_translate(scale: f64, translation: Vector3<f64>) -> Self {
        Self::new(Matrix3::identity() * scale, translation)
    }

    /// Build from 12 row-major values `m00 m01 m02 m03 m10 … m23`.
    ///
    /// Returns `None` if the slice does not hold exactly 12 finite values.
    pub fn from_row_major(values: &[f64]) -> Option<Self> {
        if values.len() != 12 || values.iter().any(|v| !v.is_finite()) {
            return None;
        }
        #[rustfmt::skip]
        let linear = Matrix3::new(
            values[0], values[1], values[2],
            values[4], values[5], values[6],
            values[8], values[9], values[10],
        );
        let translation = Vector3::new(values[3], values[7], values[11]);
        Some(Self::new(linear, translation))
    }

    /// The 12 row-major values of the 3×4 matrix.
    pub fn to_row_major(&self) -> [f64; 12] {
        let l = &self.linear;
        let t = &self.translation;
        [
            l[(0, 0)], l[(0, 1)], l[(0, 2)], t.x,
            l[(1, 0)], l[(1, 1)], l[(1, 2)], t.y,
            l[(2, 0)], l[(2, 1)], l[(2, 2)], t.z,
        ]
    }

    /// Linear part.
    #[inline]
    pub fn linear(&self) -> &Matrix3<f64> {
        &self.linear
    }

    /// Translation part.
    #[inline]
    pub fn translation(&self) -> &Vector3<f64> {
        &self.translation
    }

    /// Map a point: `p' = L·p + t`.
    #[inline]
    pub fn apply(&self, point: &Vector3<f64>) -> Vector3<f64> {
        self.linear * point + self.translation
    }

    /// Compose so that `other` is applied first, then `self`.
    pub fn concatenate(&self, other: &AffineTransform3D) -> Self {
        Self::new(
            self.linear * other.linear,
            self.linear * other.translation + self.translation,
        )
    }

    /// Isotropic scale factor `∛|det L|`.
    ///
    /// Spots are treated as spheres downstream, so anisotropy is absorbed
    /// into positions and only this scalar reaches the radius.
    pub fn isotropic_scale(&self) -> f64 {
        self.linear.determinant().abs().cbrt()
    }
}

// ============================================================================
// TRANSFORM PROVIDER
// ============================================================================

/// Resolves the local-to-world transform of a view setup at a frame.
pub trait TransformProvider {
    /// Number of frames (timepoints) the provider knows about.
    fn num_frames(&self) -> usize;

    /// Transform for `(view_setup_id, frame)`.
    ///
    /// Fails with [`ImportError::MissingRegistration`] when no entry exists.
    fn transform_for(&self, view_setup_id: u32, frame: usize) -> Result<AffineTransform3D, ImportError>;
}

/// In-memory registration table keyed by `(view setup, frame)`.
#[derive(Debug, Clone, Default)]
pub struct RegistrationTable {
    entries: BTreeMap<(u32, usize), AffineTransform3D>,
    num_frames: usize,
}

impl RegistrationTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Table registering the same transform for frames `0..num_frames`.
    pub fn uniform(view_setup_id: u32, num_frames: usize, transform: AffineTransform3D) -> Self {
        let mut table = Self::new();
        for frame in 0..num_frames {
            table.insert(view_setup_id, frame, transform);
        }
        table
    }

    /// Register a transform, replacing any previous entry.
    pub fn insert(&mut self, view_setup_id: u32, frame: usize, transform: AffineTransform3D) {
        self.entries.insert((view_setup_id, frame), transform);
        self.num_frames = self.num_frames.max(frame + 1);
    }

    /// Number of registered entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl TransformProvider for RegistrationTable {
    fn num_frames(&self) -> usize {
        self.num_frames
    }

    fn transform_for(&self, view_setup_id: u32, frame: usize) -> Result<AffineTransform3D, ImportError> {
        self.entries
            .get(&(view_setup_id, frame))
            .copied()
            .ok_or(ImportError::MissingRegistration {
                view_setup: view_setup_id,
                frame,
            })
    }
}
