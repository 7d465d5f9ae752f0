// # Drawings
//
// A `RawDrawing` is authored content: an optional image plus overlays in
// natural-image units (or surface units for `fixed` labels). Preprocessing
// promotes it to a `Drawing` once the surface size is known, decoding the
// image and deriving where it is placed.

use std::sync::Arc;

use console_geometry::{Box2D, Placement, Point2D, place_letterboxed};
use image::RgbaImage;

use crate::error::{ConsoleError, ConsoleResult};

/// RGBA color.
pub type Color = [u8; 4];

pub const BOX_COLOR: Color = [0, 200, 255, 255];
pub const LABEL_COLOR: Color = [255, 255, 255, 255];
pub const ROI_COLOR: Color = [255, 64, 129, 255];

/// One drawable item.
#[derive(Debug, Clone)]
pub enum DrawingElement {
    /// Encoded image bytes (JPEG, PNG, ...).
    Image(Arc<Vec<u8>>),
    /// Already decoded image.
    NativeImage(Arc<RgbaImage>),
    Box { bbox: Box2D, color: Color },
    /// `anchor` is in surface units when `fixed`, natural-image units
    /// otherwise.
    Label {
        text: String,
        anchor: Point2D,
        fixed: bool,
    },
    /// Region of interest, natural-image units. Always drawn on top.
    RoiBox(Box2D),
}

impl DrawingElement {
    fn is_image(&self) -> bool {
        matches!(self, DrawingElement::Image(_) | DrawingElement::NativeImage(_))
    }
}

/// Drawing content before placement.
#[derive(Debug, Clone, Default)]
pub struct RawDrawing {
    pub elements: Vec<DrawingElement>,
}

impl RawDrawing {
    pub fn new(elements: Vec<DrawingElement>) -> Self {
        Self { elements }
    }

    pub fn push(&mut self, element: DrawingElement) {
        self.elements.push(element);
    }
}

/// A drawing placed on a surface of known size.
///
/// `boundary` is the image's box within the surface and `scale` maps natural
/// units to surface units (`p * scale + boundary.min`). Without an image the
/// boundary is the whole surface at scale 1.
#[derive(Debug, Clone)]
pub struct Drawing {
    pub elements: Vec<DrawingElement>,
    pub boundary: Box2D,
    pub scale: f64,
}

impl Drawing {
    pub fn placement(&self) -> Placement {
        Placement {
            boundary: self.boundary,
            scale: self.scale,
        }
    }

    /// The decoded image, if the drawing has one.
    pub fn image(&self) -> Option<&Arc<RgbaImage>> {
        self.elements.iter().find_map(|element| match element {
            DrawingElement::NativeImage(image) => Some(image),
            _ => None,
        })
    }
}

/// Promote `raw` to a [`Drawing`] for a surface of `surface` size.
///
/// At most one image element is allowed; an encoded image is decoded and
/// replaced by its native form.
pub fn preprocess(raw: RawDrawing, surface: Point2D) -> ConsoleResult<Drawing> {
    let images = raw.elements.iter().filter(|element| element.is_image()).count();
    if images > 1 {
        return Err(ConsoleError::validation(
            "elements",
            "at most one image per drawing",
            images.to_string(),
        ));
    }

    let mut natural: Option<Point2D> = None;
    let mut elements = Vec::with_capacity(raw.elements.len());
    for element in raw.elements {
        let element = match element {
            DrawingElement::Image(bytes) => {
                let decoded = image::load_from_memory(&bytes)?.to_rgba8();
                DrawingElement::NativeImage(Arc::new(decoded))
            }
            other => other,
        };
        if let DrawingElement::NativeImage(image) = &element {
            natural = Some(Point2D::new(image.width() as f64, image.height() as f64));
        }
        elements.push(element);
    }

    let placement = match natural {
        Some(natural) => place_letterboxed(natural, surface),
        None => Placement::identity(surface),
    };

    Ok(Drawing {
        elements,
        boundary: placement.boundary,
        scale: placement.scale,
    })
}
