// # Scene Composition
//
// Paints a placed `Drawing` onto a `Canvas` in a fixed order:
//
//   clear -> image -> boxes and labels (element order is z-order) -> ROI
//
// The ROI overlay is always last: the ROI box plus a small handle box on
// each corner, five stroked rectangles in the same color and width.
//
// Two canvases are provided. `RasterCanvas` paints into an RGBA raster and
// places the image with fast_image_resize. `CommandRecorder` keeps the
// display list, for UI adapters that paint with their own toolkit.

use console_geometry::cpu::{ScaleError, scale_rgba_into};
use console_geometry::{Box2D, Point2D};
use fast_image_resize::Resizer;
use image::{Rgba, RgbaImage};

use super::drawing::{Color, Drawing, DrawingElement, LABEL_COLOR, ROI_COLOR};
use crate::error::{ConsoleError, ConsoleResult};

/// Edge length of an ROI corner handle, surface pixels.
pub const HANDLE_SIZE: f64 = 8.0;
pub const STROKE_WIDTH: u32 = 2;

/// Drawing target.
pub trait Canvas {
    fn size(&self) -> (u32, u32);

    /// Reallocate the backing store. Clears the content.
    fn resize(&mut self, width: u32, height: u32);

    fn clear(&mut self);

    /// Draw `image` scaled into `placed` (surface units).
    fn draw_image(&mut self, image: &RgbaImage, placed: &Box2D) -> ConsoleResult<()>;

    fn stroke_rect(&mut self, rect: &Box2D, color: Color, width: u32);

    fn fill_text(&mut self, text: &str, at: Point2D, color: Color);
}

/// The ROI box and its four corner handles, in surface units.
pub fn roi_rects(roi: &Box2D) -> [Box2D; 5] {
    let half = Point2D::new(HANDLE_SIZE / 2.0, HANDLE_SIZE / 2.0);
    let handle = |corner: Point2D| Box2D::new(corner - half, corner + half);
    let [a, b, c, d] = roi.corners();
    [*roi, handle(a), handle(b), handle(c), handle(d)]
}

/// Paint `drawing` onto `canvas`.
///
/// `roi_override` (natural units) replaces the drawing's own ROI boxes, e.g.
/// with the candidate box of an ongoing capture.
pub fn compose<C: Canvas + ?Sized>(
    canvas: &mut C,
    drawing: Option<&Drawing>,
    roi_override: Option<Box2D>,
) -> ConsoleResult<()> {
    canvas.clear();
    let Some(drawing) = drawing else {
        return Ok(());
    };
    let placement = drawing.placement();

    if let Some(image) = drawing.image() {
        canvas.draw_image(image, &drawing.boundary)?;
    }

    let mut rois = Vec::new();
    for element in &drawing.elements {
        match element {
            DrawingElement::Box { bbox, color } => {
                canvas.stroke_rect(&placement.box_to_surface(bbox), *color, STROKE_WIDTH);
            }
            DrawingElement::Label { text, anchor, fixed } => {
                let at = if *fixed { *anchor } else { placement.to_surface(*anchor) };
                canvas.fill_text(text, at, LABEL_COLOR);
            }
            DrawingElement::RoiBox(roi) => rois.push(*roi),
            DrawingElement::Image(_) | DrawingElement::NativeImage(_) => {}
        }
    }

    if let Some(roi) = roi_override {
        rois = vec![roi];
    }
    for roi in rois {
        for rect in roi_rects(&placement.box_to_surface(&roi)) {
            canvas.stroke_rect(&rect, ROI_COLOR, STROKE_WIDTH);
        }
    }
    Ok(())
}

/// RGBA raster canvas.
///
/// Text is drawn as a filled plate sized to the text; glyph rendering is
/// left to UI adapters.
pub struct RasterCanvas {
    raster: RgbaImage,
    background: Color,
    resizer: Resizer,
}

impl RasterCanvas {
    pub const GLYPH_WIDTH: u32 = 6;
    pub const GLYPH_HEIGHT: u32 = 10;

    pub fn new(width: u32, height: u32) -> Self {
        let background = [0, 0, 0, 255];
        Self {
            raster: RgbaImage::from_pixel(width, height, Rgba(background)),
            background,
            resizer: Resizer::new(),
        }
    }

    pub fn raster(&self) -> &RgbaImage {
        &self.raster
    }

    pub fn into_raster(self) -> RgbaImage {
        self.raster
    }

    fn fill(&mut self, x0: i64, y0: i64, x1: i64, y1: i64, color: Color) {
        let (w, h) = self.raster.dimensions();
        let xs = x0.max(0)..x1.min(w as i64);
        let ys = y0.max(0)..y1.min(h as i64);
        for y in ys {
            for x in xs.clone() {
                self.raster.put_pixel(x as u32, y as u32, Rgba(color));
            }
        }
    }
}

impl Canvas for RasterCanvas {
    fn size(&self) -> (u32, u32) {
        self.raster.dimensions()
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.raster = RgbaImage::from_pixel(width, height, Rgba(self.background));
    }

    fn clear(&mut self) {
        let background = Rgba(self.background);
        for pixel in self.raster.pixels_mut() {
            *pixel = background;
        }
    }

    fn draw_image(&mut self, image: &RgbaImage, placed: &Box2D) -> ConsoleResult<()> {
        let (dst_w, dst_h) = self.raster.dimensions();
        if dst_w == 0 || dst_h == 0 || image.width() == 0 || image.height() == 0 {
            return Ok(());
        }
        let dst: &mut [u8] = &mut self.raster;
        match scale_rgba_into(
            &mut self.resizer,
            image.as_raw(),
            image.width(),
            image.height(),
            dst,
            dst_w,
            dst_h,
            placed,
        ) {
            Ok(()) => Ok(()),
            // Placed box rounds to no pixel at this surface size.
            Err(ScaleError::EmptyPlacement) => Ok(()),
            Err(e) => Err(ConsoleError::external("fast_image_resize", e)),
        }
    }

    fn stroke_rect(&mut self, rect: &Box2D, color: Color, width: u32) {
        let r = rect.round();
        let (x0, y0, x1, y1) = (r.min.x as i64, r.min.y as i64, r.max.x as i64, r.max.y as i64);
        let w = width.max(1) as i64;
        self.fill(x0, y0, x1, y0 + w, color);
        self.fill(x0, y1 - w, x1, y1, color);
        self.fill(x0, y0, x0 + w, y1, color);
        self.fill(x1 - w, y0, x1, y1, color);
    }

    fn fill_text(&mut self, text: &str, at: Point2D, color: Color) {
        let at = at.round();
        let width = text.chars().count() as i64 * Self::GLYPH_WIDTH as i64;
        let (x, y) = (at.x as i64, at.y as i64);
        self.fill(x, y - Self::GLYPH_HEIGHT as i64, x + width, y, color);
    }
}

/// A recorded canvas call.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Clear,
    Image { size: (u32, u32), placed: Box2D },
    StrokeRect { rect: Box2D, color: Color, width: u32 },
    Text { text: String, at: Point2D, color: Color },
}

/// Canvas that records its calls.
#[derive(Debug, Clone, Default)]
pub struct CommandRecorder {
    size: (u32, u32),
    commands: Vec<DrawCommand>,
}

impl CommandRecorder {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: (width, height),
            commands: Vec::new(),
        }
    }

    /// Calls since the last `clear`, the clear included.
    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn stroke_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|command| matches!(command, DrawCommand::StrokeRect { .. }))
            .count()
    }
}

impl Canvas for CommandRecorder {
    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.size = (width, height);
        self.commands.clear();
    }

    fn clear(&mut self) {
        self.commands.clear();
        self.commands.push(DrawCommand::Clear);
    }

    fn draw_image(&mut self, image: &RgbaImage, placed: &Box2D) -> ConsoleResult<()> {
        self.commands.push(DrawCommand::Image {
            size: image.dimensions(),
            placed: *placed,
        });
        Ok(())
    }

    fn stroke_rect(&mut self, rect: &Box2D, color: Color, width: u32) {
        self.commands.push(DrawCommand::StrokeRect {
            rect: *rect,
            color,
            width,
        });
    }

    fn fill_text(&mut self, text: &str, at: Point2D, color: Color) {
        self.commands.push(DrawCommand::Text {
            text: text.to_string(),
            at,
            color,
        });
    }
}
