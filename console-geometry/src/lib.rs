// SPDX-License-Identifier: MIT
//! # console-geometry: Coordinate Spaces for Device Preview
//!
//! Value types and pure operations used to move geometry between the three
//! coordinate spaces of a live device preview:
//!
//! 1. **Normalized**: `[0, 1]` on both axes, relative to an image or sensor
//! 2. **Device pixels**: sensor/ROI space as understood by the camera
//! 3. **Surface pixels**: the render target after letterbox placement
//!
//! ## Key Components
//!
//! - [`point`]: `Point2D` with componentwise arithmetic
//! - [`rect`]: `Box2D` (always sorted) and the device `Roi`
//! - [`placement`]: aspect-preserving letterbox/pillarbox placement
//! - [`cpu`]: RGBA scaling into a placed sub-rectangle using fast_image_resize
//!
//! All operations except [`cpu::scale_rgba_into`] are total: no panics, no
//! error values. Degenerate boxes are valid empty boxes.
//!
//! ## Usage Example
//!
//! ```rust
//! use console_geometry::{point::Point2D, rect::{Box2D, Roi}};
//!
//! let sensor = Point2D::new(4056.0, 3040.0);
//! let selection = Box2D::new(Point2D::new(0.5, 0.5), Point2D::new(0.25, 0.0));
//! let roi = Roi::from_normalized(&selection, sensor);
//! assert_eq!(roi.offset, Point2D::new(1014.0, 0.0));
//! ```

pub mod cpu;
pub mod placement;
pub mod point;
pub mod rect;

pub use placement::{Placement, place_letterboxed};
pub use point::Point2D;
pub use rect::{Box2D, Roi};
