//! # Stream Providers
//!
//! Pluggable frame sources for a device session.
//!
//! ## Architecture
//!
//! 1. **StreamProvider trait**: `init`, `teardown`, `get_next_frame`
//! 2. **InferenceResultProvider**: polls the newest uploaded inference record
//!    (and its paired image)
//! 3. **DirectImageProvider**: asks the device for a capture of the current ROI
//! 4. **ProviderSet**: the static, total mapping from [`StreamingMode`] to a
//!    provider
//!
//! ## Fault Model
//!
//! `get_next_frame` never fails through `Result::Err` propagation to the
//! loop; it yields a [`StreamItem`], which is either a frame or a
//! [`FetchError`] value. Only `init` and `teardown` return `ConsoleResult`.

pub mod direct_image;
pub mod inference_result;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use console_geometry::Roi;
use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::core::StopSignal;
use crate::device::DeviceId;
use crate::error::ConsoleResult;
use crate::inference::{InferenceData, InferenceKind};

pub use direct_image::DirectImageProvider;
pub use inference_result::InferenceResultProvider;

/// What a session streams from the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
pub enum StreamingMode {
    ImageOnly,
    InferenceResult,
    ImageAndInferenceResult,
    /// Low-latency image capture used while editing the ROI.
    Preview,
}

impl StreamingMode {
    pub fn includes_image(self) -> bool {
        !matches!(self, StreamingMode::InferenceResult)
    }

    pub fn includes_inference(self) -> bool {
        matches!(
            self,
            StreamingMode::InferenceResult | StreamingMode::ImageAndInferenceResult
        )
    }

    /// `Mode` argument of the device's upload command:
    /// 0 images only, 1 images and inferences, 2 inferences only.
    pub fn upload_mode(self) -> u8 {
        match self {
            StreamingMode::ImageOnly | StreamingMode::Preview => 0,
            StreamingMode::ImageAndInferenceResult => 1,
            StreamingMode::InferenceResult => 2,
        }
    }
}

/// A decoded frame from a device. Immutable once produced.
#[derive(Debug, Clone)]
pub struct DeviceFrame {
    pub identifier: String,
    pub image: Option<Arc<RgbaImage>>,
    pub inference: Option<InferenceData>,
}

/// A failed fetch, carried through the frame channel as a value.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchError {
    /// The inference output matches no known schema. Terminal.
    UnknownInferenceFormat { detail: String },
    /// The device answered with a non-success result or code.
    Command { code: Option<i64>, message: String },
    /// The reply carried no image.
    MissingImage,
    /// Nothing newer than the last frame is available yet.
    NoNewData,
    /// The backend or device could not be reached.
    Transport { message: String },
    /// Image or payload bytes could not be decoded.
    Decode { message: String },
}

impl FetchError {
    pub fn is_unknown_format(&self) -> bool {
        matches!(self, FetchError::UnknownInferenceFormat { .. })
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::UnknownInferenceFormat { detail } => {
                write!(f, "unknown inference format: {}", detail)
            }
            FetchError::Command { code: Some(code), message } => {
                write!(f, "device returned code {}: {}", code, message)
            }
            FetchError::Command { code: None, message } => write!(f, "device command failed: {}", message),
            FetchError::MissingImage => write!(f, "device response carried no image"),
            FetchError::NoNewData => write!(f, "no new data since the last frame"),
            FetchError::Transport { message } => write!(f, "transport error: {}", message),
            FetchError::Decode { message } => write!(f, "decode error: {}", message),
        }
    }
}

impl std::error::Error for FetchError {}

/// Element type of a device's live sequence.
pub type StreamItem = Result<DeviceFrame, FetchError>;

/// Decode encoded image bytes (JPEG, PNG, ...) into RGBA.
pub fn decode_image(bytes: &[u8]) -> Result<Arc<RgbaImage>, FetchError> {
    image::load_from_memory(bytes)
        .map(|img| Arc::new(img.to_rgba8()))
        .map_err(|e| FetchError::Decode {
            message: e.to_string(),
        })
}

/// Capability every frame source implements.
#[async_trait]
pub trait StreamProvider: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Prepare the device for streaming `mode` over `roi`.
    async fn init(&self, device_id: DeviceId, roi: Roi, mode: StreamingMode) -> ConsoleResult<()>;

    /// Release device-side resources of the session.
    async fn teardown(&self, device_id: DeviceId) -> ConsoleResult<()>;

    /// Fetch one frame. `stop` may be checked between internal steps;
    /// `last_frame` is the newest frame this session already produced.
    async fn get_next_frame(
        &self,
        device_id: DeviceId,
        mode: StreamingMode,
        expected: InferenceKind,
        stop: &StopSignal,
        last_frame: Option<&DeviceFrame>,
    ) -> StreamItem;
}

/// One provider per fetch strategy, selected by mode.
#[derive(Clone)]
pub struct ProviderSet {
    inference: Arc<dyn StreamProvider>,
    direct: Arc<dyn StreamProvider>,
}

impl ProviderSet {
    pub fn new(inference: Arc<dyn StreamProvider>, direct: Arc<dyn StreamProvider>) -> Self {
        Self { inference, direct }
    }

    /// Static and total: every mode maps to exactly one provider.
    pub fn for_mode(&self, mode: StreamingMode) -> Arc<dyn StreamProvider> {
        match mode {
            StreamingMode::ImageOnly | StreamingMode::Preview => self.direct.clone(),
            StreamingMode::InferenceResult | StreamingMode::ImageAndInferenceResult => {
                self.inference.clone()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_flags() {
        assert!(StreamingMode::ImageOnly.includes_image());
        assert!(!StreamingMode::ImageOnly.includes_inference());
        assert!(!StreamingMode::InferenceResult.includes_image());
        assert!(StreamingMode::ImageAndInferenceResult.includes_image());
        assert!(StreamingMode::ImageAndInferenceResult.includes_inference());
        assert_eq!(StreamingMode::InferenceResult.upload_mode(), 2);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(decode_image(b"not an image"), Err(FetchError::Decode { .. })));
    }
}
