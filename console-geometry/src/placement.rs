// SPDX-License-Identifier: MIT
//! # Letterbox Placement
//!
//! Computes where an image of a given natural size lands inside a render
//! surface when its aspect ratio is preserved.
//!
//! - Image aspect `>=` surface aspect: width-bound, bars above and below
//! - Image aspect `<` surface aspect: height-bound, bars left and right
//!
//! The result is a [`Placement`]: the placed box in surface units plus the
//! uniform scale from natural-image units to surface units. Any point `p`
//! in natural units maps to `p * scale + boundary.min`.

use crate::point::Point2D;
use crate::rect::Box2D;

/// Placement of an image inside a surface.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Placement {
    /// The placed image within the surface, in surface units.
    pub boundary: Box2D,
    /// Placed width over natural width.
    pub scale: f64,
}

impl Placement {
    /// Identity placement covering the whole surface.
    pub fn identity(surface: Point2D) -> Self {
        Self {
            boundary: Box2D::new(Point2D::ZERO, surface),
            scale: 1.0,
        }
    }

    /// Natural-image point to surface point.
    pub fn to_surface(&self, p: Point2D) -> Point2D {
        p.mul(self.scale) + self.boundary.min
    }

    pub fn box_to_surface(&self, b: &Box2D) -> Box2D {
        b.mul(self.scale).translate(self.boundary.min)
    }

    /// Surface point to natural-image point.
    pub fn to_natural(&self, p: Point2D) -> Point2D {
        let inv = if self.scale == 0.0 { 0.0 } else { 1.0 / self.scale };
        (p - self.boundary.min).mul(inv)
    }

    pub fn box_to_natural(&self, b: &Box2D) -> Box2D {
        Box2D::new(self.to_natural(b.min), self.to_natural(b.max))
    }

    /// Natural size of the placed image.
    pub fn natural_size(&self) -> Point2D {
        let inv = if self.scale == 0.0 { 0.0 } else { 1.0 / self.scale };
        self.boundary.size().mul(inv)
    }
}

/// Center `natural` inside `surface` preserving aspect ratio.
pub fn place_letterboxed(natural: Point2D, surface: Point2D) -> Placement {
    if natural.x <= 0.0 || natural.y <= 0.0 {
        return Placement::identity(surface);
    }

    let (scale, placed) = if natural.aspect() >= surface.aspect() {
        let scale = surface.x / natural.x;
        (scale, Point2D::new(surface.x, natural.y * scale))
    } else {
        let scale = surface.y / natural.y;
        (scale, Point2D::new(natural.x * scale, surface.y))
    };

    let origin = (surface - placed).mul(0.5);
    Placement {
        boundary: Box2D::from_origin_size(origin, placed),
        scale,
    }
}
