// SPDX-License-Identifier: MIT
//! # 2D Points
//!
//! `Point2D` is a plain value type. Every operation returns a new point;
//! nothing mutates in place, so a point can be shared freely between the
//! stream, the scene and the pointer controls.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Sub};

/// A real-valued 2D point or vector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub const ZERO: Point2D = Point2D { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Multiply both components by the same factor.
    pub fn mul(self, factor: f64) -> Self {
        Self::new(self.x * factor, self.y * factor)
    }

    /// Componentwise multiplication.
    ///
    /// This is the conversion from normalized `[0, 1]` coordinates into a
    /// pixel space of size `other`.
    pub fn vect_mul(self, other: Point2D) -> Self {
        Self::new(self.x * other.x, self.y * other.y)
    }

    /// Componentwise reciprocal. A zero component inverts to zero so the
    /// operation stays total.
    pub fn invert(self) -> Self {
        let inv = |v: f64| if v == 0.0 { 0.0 } else { 1.0 / v };
        Self::new(inv(self.x), inv(self.y))
    }

    pub fn round(self) -> Self {
        Self::new(self.x.round(), self.y.round())
    }

    pub fn min(self, other: Point2D) -> Self {
        Self::new(self.x.min(other.x), self.y.min(other.y))
    }

    pub fn max(self, other: Point2D) -> Self {
        Self::new(self.x.max(other.x), self.y.max(other.y))
    }

    /// Width over height; zero for a zero-height extent.
    pub fn aspect(self) -> f64 {
        if self.y == 0.0 { 0.0 } else { self.x / self.y }
    }
}

impl Add for Point2D {
    type Output = Point2D;

    fn add(self, rhs: Point2D) -> Point2D {
        Point2D::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point2D {
    type Output = Point2D;

    fn sub(self, rhs: Point2D) -> Point2D {
        Point2D::new(self.x - rhs.x, self.y - rhs.y)
    }
}
