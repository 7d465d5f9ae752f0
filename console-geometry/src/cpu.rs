// SPDX-License-Identifier: MIT
// CPU scaler built on fast_image_resize (SIMD-accelerated).
// RGBA8 in → RGBA8 out, written into a sub-rectangle of the caller's surface.

use fast_image_resize as fir;
use fir::images::{TypedCroppedImageMut, TypedImage, TypedImageRef};
use fir::pixels::U8x4;
use fir::{ResizeOptions, Resizer};

use crate::rect::Box2D;

#[derive(Debug)]
pub enum ScaleError {
    BufferTooSmall,
    EmptyPlacement,
    Fir(fir::ResizeError),
    ImageBuf(fir::ImageBufferError),
    Crop(fir::CropBoxError),
}

impl From<fir::ResizeError> for ScaleError { fn from(e: fir::ResizeError) -> Self { Self::Fir(e) } }
impl From<fir::ImageBufferError> for ScaleError { fn from(e: fir::ImageBufferError) -> Self { Self::ImageBuf(e) } }
impl From<fir::CropBoxError> for ScaleError { fn from(e: fir::CropBoxError) -> Self { Self::Crop(e) } }

impl std::fmt::Display for ScaleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScaleError::BufferTooSmall => write!(f, "Surface buffer too small"),
            ScaleError::EmptyPlacement => write!(f, "Placement does not intersect the surface"),
            ScaleError::Fir(e) => write!(f, "Fast image resize error: {}", e),
            ScaleError::ImageBuf(e) => write!(f, "Image buffer error: {}", e),
            ScaleError::Crop(e) => write!(f, "Crop error: {}", e),
        }
    }
}

impl std::error::Error for ScaleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScaleError::Fir(e) => Some(e),
            ScaleError::ImageBuf(e) => Some(e),
            ScaleError::Crop(e) => Some(e),
            _ => None,
        }
    }
}

/// Integer pixel rectangle `(x, y, w, h)` of `placed` clipped to a surface.
pub fn pixel_rect(placed: &Box2D, surface_w: u32, surface_h: u32) -> Option<(u32, u32, u32, u32)> {
    let surface = Box2D::new(
        crate::point::Point2D::ZERO,
        crate::point::Point2D::new(surface_w as f64, surface_h as f64),
    );
    let clipped = placed.round().clamp(&surface);
    if clipped.is_empty() {
        return None;
    }
    let size = clipped.size();
    Some((
        clipped.min.x as u32,
        clipped.min.y as u32,
        (size.x as u32).max(1),
        (size.y as u32).max(1),
    ))
}

/// Scale a tightly packed RGBA image into the `placed` region of `dst`.
///
/// `dst` is a tightly packed RGBA surface of `dst_w * dst_h` pixels. Pixels
/// outside the placed region are left untouched.
pub fn scale_rgba_into(
    resizer: &mut Resizer,
    src_rgba: &[u8],
    src_w: u32,
    src_h: u32,
    dst: &mut [u8],
    dst_w: u32,
    dst_h: u32,
    placed: &Box2D,
) -> Result<(), ScaleError> {
    let dst_len = (dst_w as usize) * (dst_h as usize) * 4;
    if dst.len() < dst_len {
        return Err(ScaleError::BufferTooSmall);
    }
    let (x, y, w, h) = pixel_rect(placed, dst_w, dst_h).ok_or(ScaleError::EmptyPlacement)?;

    let src_view = TypedImageRef::<U8x4>::from_buffer(src_w, src_h, src_rgba)?;
    let mut dst_image = TypedImage::<U8x4>::from_buffer(dst_w, dst_h, &mut dst[..dst_len])?;
    let mut roi = TypedCroppedImageMut::from_ref(&mut dst_image, x, y, w, h)?;

    let opts = ResizeOptions::new()
        .resize_alg(fir::ResizeAlg::Convolution(fir::FilterType::Bilinear))
        .use_alpha(false);
    resizer.resize_typed::<U8x4>(&src_view, &mut roi, &opts)?;

    Ok(())
}
