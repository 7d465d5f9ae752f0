// # ROI Capture Controls
//
// Pointer-driven selection of a region of interest on a placed drawing.
//
// Only active in `Capture` mode. A press inside the drawing's boundary
// starts a capture; moves update a candidate box clamped to the boundary;
// the release emits the selection normalized to the boundary size (0..1).
// Expanding it back to device pixels is the caller's job
// (`Roi::from_normalized`). Switching modes drops an in-progress capture.

use console_geometry::{Box2D, Point2D};

use super::drawing::Drawing;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControlMode {
    #[default]
    Render,
    Capture,
}

#[derive(Debug, Clone, Copy)]
struct Capture {
    start: Point2D,
    /// Candidate in surface units, clamped to the boundary.
    current: Box2D,
}

#[derive(Debug, Clone, Default)]
pub struct RoiControls {
    mode: ControlMode,
    capture: Option<Capture>,
}

impl RoiControls {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> ControlMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: ControlMode) {
        if mode != self.mode {
            self.capture = None;
        }
        self.mode = mode;
    }

    pub fn is_capturing(&self) -> bool {
        self.capture.is_some()
    }

    /// Candidate box in natural-image units.
    pub fn candidate(&self, drawing: &Drawing) -> Option<Box2D> {
        self.capture
            .map(|capture| drawing.placement().box_to_natural(&capture.current))
    }

    /// Returns whether a capture started.
    pub fn pointer_down(&mut self, at: Point2D, drawing: &Drawing) -> bool {
        if self.mode != ControlMode::Capture || !drawing.boundary.contains(at) {
            return false;
        }
        self.capture = Some(Capture {
            start: at,
            current: Box2D::new(at, at),
        });
        true
    }

    /// Update the candidate; returns it in natural-image units.
    pub fn pointer_move(&mut self, at: Point2D, drawing: &Drawing) -> Option<Box2D> {
        let capture = self.capture.as_mut()?;
        capture.current = Box2D::new(capture.start, at).clamp(&drawing.boundary);
        Some(drawing.placement().box_to_natural(&capture.current))
    }

    /// Finish the capture; returns the selection normalized to the boundary.
    pub fn pointer_up(&mut self, at: Point2D, drawing: &Drawing) -> Option<Box2D> {
        self.pointer_move(at, drawing)?;
        let capture = self.capture.take()?;
        let origin = drawing.boundary.min;
        let size = drawing.boundary.size();
        let normalize = |p: Point2D| {
            let d = p - origin;
            Point2D::new(ratio(d.x, size.x), ratio(d.y, size.y))
        };
        Some(Box2D::new(
            normalize(capture.current.min),
            normalize(capture.current.max),
        ))
    }
}

fn ratio(value: f64, extent: f64) -> f64 {
    if extent == 0.0 { 0.0 } else { value / extent }
}
