// # Inference Result Provider
//
// Streams by polling the newest inference record the device uploaded to the
// console backend. `init` starts the device-side upload over the ROI and
// `teardown` stops it.

use std::sync::Arc;

use async_trait::async_trait;
use console_geometry::Roi;
use log::{debug, info};
use serde_json::json;

use super::{DeviceFrame, FetchError, StreamItem, StreamProvider, StreamingMode, decode_image};
use crate::core::StopSignal;
use crate::device::{CommandExecutor, CommandRequest, DeviceId, InferenceReader};
use crate::error::{ConsoleError, ConsoleResult};
use crate::inference::{InferenceData, InferenceKind};

pub const START_UPLOAD: &str = "StartUploadInferenceData";
pub const STOP_UPLOAD: &str = "StopUploadInferenceData";

/// Provider for `InferenceResult` and `ImageAndInferenceResult` sessions.
pub struct InferenceResultProvider {
    commands: Arc<dyn CommandExecutor>,
    reader: Arc<dyn InferenceReader>,
}

impl InferenceResultProvider {
    pub fn new(commands: Arc<dyn CommandExecutor>, reader: Arc<dyn InferenceReader>) -> Self {
        Self { commands, reader }
    }

    async fn run(&self, device_id: DeviceId, request: CommandRequest) -> ConsoleResult<()> {
        let name = request.command_name.clone();
        let response = self.commands.execute(device_id, request).await?;
        if !response.is_success() {
            return Err(ConsoleError::command(name, None, response.result)
                .with_context(format!("device {}", device_id)));
        }
        Ok(())
    }
}

#[async_trait]
impl StreamProvider for InferenceResultProvider {
    fn name(&self) -> &'static str {
        "inference-result"
    }

    async fn init(&self, device_id: DeviceId, roi: Roi, mode: StreamingMode) -> ConsoleResult<()> {
        info!("Device {}: starting inference upload ({:?})", device_id, mode);
        let request = CommandRequest::new(
            START_UPLOAD,
            json!({
                "CropHOffset": roi.offset.x as i64,
                "CropVOffset": roi.offset.y as i64,
                "CropHSize": roi.size.x as i64,
                "CropVSize": roi.size.y as i64,
                "Mode": mode.upload_mode(),
            }),
        );
        self.run(device_id, request).await
    }

    async fn teardown(&self, device_id: DeviceId) -> ConsoleResult<()> {
        info!("Device {}: stopping inference upload", device_id);
        self.run(device_id, CommandRequest::new(STOP_UPLOAD, json!({}))).await
    }

    async fn get_next_frame(
        &self,
        device_id: DeviceId,
        mode: StreamingMode,
        expected: InferenceKind,
        stop: &StopSignal,
        last_frame: Option<&DeviceFrame>,
    ) -> StreamItem {
        let with_image = mode.includes_image();
        let record = match self.reader.latest(device_id, with_image).await {
            Ok(Some(record)) => record,
            Ok(None) => return Err(FetchError::NoNewData),
            Err(e) => {
                return Err(FetchError::Transport {
                    message: e.to_string(),
                });
            }
        };

        if last_frame.is_some_and(|last| last.identifier == record.id) {
            return Err(FetchError::NoNewData);
        }

        let inference = if mode.includes_inference() {
            let data = InferenceData::from_envelope(&record.inference, expected)
                .map_err(|detail| FetchError::UnknownInferenceFormat { detail })?;
            Some(data)
        } else {
            None
        };

        // The record is already paid for; skip the image round trip if the
        // session is going away.
        if stop.is_raised() {
            return Err(FetchError::NoNewData);
        }

        let image = if with_image {
            let reference = record.image.as_ref().ok_or(FetchError::MissingImage)?;
            let bytes = self
                .reader
                .fetch_image(reference)
                .await
                .map_err(|e| FetchError::Transport {
                    message: e.to_string(),
                })?;
            Some(decode_image(&bytes)?)
        } else {
            None
        };

        debug!("Device {}: inference frame {}", device_id, record.id);
        Ok(DeviceFrame {
            identifier: record.id,
            image,
            inference,
        })
    }
}
