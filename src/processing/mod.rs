//! # Render Pipeline
//!
//! Turns drawings into pixels on a host surface and turns pointer input on
//! that surface back into ROI selections.
//!
//! ## Architecture
//!
//! 1. **SurfaceSizer**: content box of the host, resized only on change
//! 2. **preprocess**: `RawDrawing` to `Drawing`, letterboxing the image
//! 3. **compose**: clear, image, boxes and labels, ROI overlay
//! 4. **RoiControls**: pointer-driven capture, emits normalized boxes
//! 5. **RenderPipeline**: owns the canvas and the current drawing and wires
//!    the four together
//!
//! ## Coordinate Spaces
//!
//! Overlay geometry is authored in natural-image units and converted with
//! `p * scale + boundary.min`. Fixed labels are already in surface units.
//! Selections leave the pipeline normalized to the image (0..1); callers
//! expand them with `Roi::from_normalized(selection, sensor)`.

pub mod controls;
pub mod drawing;
pub mod scene;
pub mod surface;

use console_geometry::{Box2D, Point2D};

use crate::error::ConsoleResult;

pub use controls::{ControlMode, RoiControls};
pub use drawing::{Color, Drawing, DrawingElement, RawDrawing, preprocess};
pub use scene::{Canvas, CommandRecorder, DrawCommand, RasterCanvas, compose};
pub use surface::{Padding, SurfaceSizer};

/// Canvas plus the drawing currently shown on it.
pub struct RenderPipeline<C: Canvas> {
    canvas: C,
    sizer: SurfaceSizer,
    controls: RoiControls,
    raw: Option<RawDrawing>,
    drawing: Option<Drawing>,
}

impl<C: Canvas> RenderPipeline<C> {
    pub fn new(canvas: C, padding: Padding) -> Self {
        let mut sizer = SurfaceSizer::new(padding);
        let (w, h) = canvas.size();
        sizer.layout(w + padding.left + padding.right, h + padding.top + padding.bottom);
        Self {
            canvas,
            sizer,
            controls: RoiControls::new(),
            raw: None,
            drawing: None,
        }
    }

    pub fn canvas(&self) -> &C {
        &self.canvas
    }

    pub fn into_canvas(self) -> C {
        self.canvas
    }

    pub fn drawing(&self) -> Option<&Drawing> {
        self.drawing.as_ref()
    }

    pub fn surface_size(&self) -> (u32, u32) {
        self.sizer.size()
    }

    pub fn controls(&self) -> &RoiControls {
        &self.controls
    }

    /// Layout pass of the host. Returns whether the surface was resized.
    pub fn layout(&mut self, host_width: u32, host_height: u32) -> ConsoleResult<bool> {
        let Some((w, h)) = self.sizer.layout(host_width, host_height) else {
            return Ok(false);
        };
        self.canvas.resize(w, h);
        self.rebuild()?;
        Ok(true)
    }

    /// Replace the shown drawing; `None` blanks the surface.
    pub fn set_drawing(&mut self, raw: Option<RawDrawing>) -> ConsoleResult<()> {
        self.raw = raw;
        self.rebuild()
    }

    fn rebuild(&mut self) -> ConsoleResult<()> {
        let (w, h) = self.sizer.size();
        self.drawing = match &self.raw {
            Some(raw) => Some(preprocess(raw.clone(), Point2D::new(w as f64, h as f64))?),
            None => None,
        };
        self.render()
    }

    pub fn render(&mut self) -> ConsoleResult<()> {
        let candidate = self
            .drawing
            .as_ref()
            .and_then(|drawing| self.controls.candidate(drawing));
        compose(&mut self.canvas, self.drawing.as_ref(), candidate)
    }

    pub fn set_mode(&mut self, mode: ControlMode) -> ConsoleResult<()> {
        self.controls.set_mode(mode);
        self.render()
    }

    pub fn pointer_down(&mut self, at: Point2D) -> bool {
        match &self.drawing {
            Some(drawing) => self.controls.pointer_down(at, drawing),
            None => false,
        }
    }

    pub fn pointer_move(&mut self, at: Point2D) -> ConsoleResult<()> {
        let moved = match &self.drawing {
            Some(drawing) => self.controls.pointer_move(at, drawing).is_some(),
            None => false,
        };
        if moved {
            self.render()?;
        }
        Ok(())
    }

    /// Finish a capture; the normalized selection, if one was in progress.
    pub fn pointer_up(&mut self, at: Point2D) -> ConsoleResult<Option<Box2D>> {
        let selection = match &self.drawing {
            Some(drawing) => self.controls.pointer_up(at, drawing),
            None => None,
        };
        if selection.is_some() {
            self.render()?;
        }
        Ok(selection)
    }
}
