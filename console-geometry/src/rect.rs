// SPDX-License-Identifier: MIT
//! # Boxes and Regions of Interest
//!
//! `Box2D` sorts its corners on construction so `min <= max` holds on both
//! axes no matter which corner a pointer drag started from. `Roi` is the
//! device-side capture window in sensor pixels.

use serde::{Deserialize, Serialize};

use crate::point::Point2D;

/// Axis-aligned box with `min <= max` componentwise.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Box2D {
    pub min: Point2D,
    pub max: Point2D,
}

impl Box2D {
    /// Build a box from two arbitrary corners.
    pub fn new(a: Point2D, b: Point2D) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Box spanning `origin .. origin + size`.
    pub fn from_origin_size(origin: Point2D, size: Point2D) -> Self {
        Self::new(origin, origin + size)
    }

    pub fn size(&self) -> Point2D {
        self.max - self.min
    }

    /// Intersection with `other`.
    ///
    /// Non-overlapping boxes give a degenerate result with `min` and `max`
    /// taken verbatim (min of maxes, max of mins); callers treat a
    /// non-positive size as empty.
    pub fn clamp(&self, other: &Box2D) -> Box2D {
        Box2D {
            min: self.min.max(other.min),
            max: self.max.min(other.max),
        }
    }

    pub fn is_empty(&self) -> bool {
        let s = self.size();
        s.x <= 0.0 || s.y <= 0.0
    }

    pub fn contains(&self, p: Point2D) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    pub fn mul(&self, factor: f64) -> Box2D {
        Box2D::new(self.min.mul(factor), self.max.mul(factor))
    }

    pub fn vect_mul(&self, factor: Point2D) -> Box2D {
        Box2D::new(self.min.vect_mul(factor), self.max.vect_mul(factor))
    }

    pub fn translate(&self, offset: Point2D) -> Box2D {
        Box2D::new(self.min + offset, self.max + offset)
    }

    pub fn round(&self) -> Box2D {
        Box2D::new(self.min.round(), self.max.round())
    }

    /// The four corners, clockwise from `min`.
    pub fn corners(&self) -> [Point2D; 4] {
        [
            self.min,
            Point2D::new(self.max.x, self.min.y),
            self.max,
            Point2D::new(self.min.x, self.max.y),
        ]
    }
}

/// Region of interest in device pixel space.
///
/// `offset >= 0` and `offset + size <= sensor` are expected by the device but
/// not enforced here.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Roi {
    pub offset: Point2D,
    pub size: Point2D,
}

impl Roi {
    pub fn new(offset: Point2D, size: Point2D) -> Self {
        Self { offset, size }
    }

    /// The whole sensor; the default ROI of every device.
    pub fn full(sensor: Point2D) -> Self {
        Self::new(Point2D::ZERO, sensor)
    }

    /// Expand a normalized selection into device pixels and round.
    pub fn from_normalized(selection: &Box2D, sensor: Point2D) -> Self {
        let pixels = selection.vect_mul(sensor).round();
        Self::new(pixels.min, pixels.size())
    }

    /// Inverse of [`Roi::from_normalized`] (up to rounding).
    pub fn to_normalized(&self, sensor: Point2D) -> Box2D {
        self.as_box().vect_mul(sensor.invert())
    }

    pub fn as_box(&self) -> Box2D {
        Box2D::from_origin_size(self.offset, self.size)
    }

    pub fn is_full(&self, sensor: Point2D) -> bool {
        *self == Roi::full(sensor)
    }
}
