//! Space-time cropping of spots before linking.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::spot::Spot;

/// World-space axis-aligned box, bounds inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RealInterval {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl RealInterval {
    pub fn new(min: [f64; 3], max: [f64; 3]) -> Self {
        Self { min, max }
    }

    /// From six values `xMin, yMin, zMin, xMax, yMax, zMax`.
    pub fn from_bounds(bounds: [f64; 6]) -> Self {
        Self::new(
            [bounds[0], bounds[1], bounds[2]],
            [bounds[3], bounds[4], bounds[5]],
        )
    }

    /// True if the point lies inside or on the boundary.
    pub fn contains(&self, point: &Vector3<f64>) -> bool {
        (0..3).all(|d| self.min[d] <= point[d] && point[d] <= self.max[d])
    }

    /// Intersection of two boxes. May be empty.
    pub fn intersect(&self, other: &RealInterval) -> RealInterval {
        let mut out = *self;
        for d in 0..3 {
            out.min[d] = self.min[d].max(other.min[d]);
            out.max[d] = self.max[d].min(other.max[d]);
        }
        out
    }

    /// True if no point can be contained.
    pub fn is_empty(&self) -> bool {
        (0..3).any(|d| self.min[d] > self.max[d])
    }

    /// True if all six bounds are finite.
    pub fn is_finite(&self) -> bool {
        self.min.iter().chain(self.max.iter()).all(|v| v.is_finite())
    }
}

/// Inclusive frame range `[from, to]`. Empty when `from > to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub from: usize,
    pub to: usize,
}

impl TimeRange {
    pub fn new(from: usize, to: usize) -> Self {
        Self { from, to }
    }

    pub fn contains(&self, frame: usize) -> bool {
        self.from <= frame && frame <= self.to
    }

    pub fn is_empty(&self) -> bool {
        self.from > self.to
    }
}

/// Keeps spots inside an optional box and an optional frame range.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SpotFilter {
    pub interval: Option<RealInterval>,
    pub time_range: Option<TimeRange>,
}

impl SpotFilter {
    pub fn new(interval: Option<RealInterval>, time_range: Option<TimeRange>) -> Self {
        Self {
            interval,
            time_range,
        }
    }

    /// Frame check alone, used to skip whole frames.
    pub fn accepts_frame(&self, frame: usize) -> bool {
        self.time_range.map_or(true, |range| range.contains(frame))
    }

    /// Full space-time check.
    pub fn accepts(&self, spot: &Spot) -> bool {
        self.accepts_frame(spot.frame)
            && self
                .interval
                .map_or(true, |interval| interval.contains(&spot.position))
    }

    /// Keep accepted spots, preserving order.
    pub fn retain(&self, spots: Vec<Spot>) -> Vec<Spot> {
        spots.into_iter().filter(|s| self.accepts(s)).collect()
    }
}
