// # Direct Image Provider
//
// Streams by asking the device for a single capture of the current ROI on
// every fetch (`direct_get_image`). The ROI lives in the shared `RoiCache`
// so the capture window survives between calls. `teardown` sends the same
// command with `extra.stop` so the backend ends any pulling loop it runs on
// the device's behalf.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use console_geometry::{Point2D, Roi};
use log::{debug, info};
use serde_json::{Value, json};

use super::{DeviceFrame, FetchError, StreamItem, StreamProvider, StreamingMode, decode_image};
use crate::core::StopSignal;
use crate::device::{CommandExecutor, CommandRequest, DeviceId, RoiCache};
use crate::error::{ConsoleError, ConsoleResult};
use crate::inference::InferenceKind;

pub const DIRECT_GET_IMAGE: &str = "direct_get_image";

/// Provider for `ImageOnly` and `Preview` sessions.
pub struct DirectImageProvider {
    commands: Arc<dyn CommandExecutor>,
    roi_cache: RoiCache,
    sensor: Point2D,
    network_id: String,
    sequence: AtomicU64,
}

impl DirectImageProvider {
    pub fn new(
        commands: Arc<dyn CommandExecutor>,
        roi_cache: RoiCache,
        sensor: Point2D,
        network_id: impl Into<String>,
    ) -> Self {
        Self {
            commands,
            roi_cache,
            sensor,
            network_id: network_id.into(),
            sequence: AtomicU64::new(0),
        }
    }

    pub fn roi_cache(&self) -> &RoiCache {
        &self.roi_cache
    }

    fn capture_request(&self, roi: Roi, preview: bool) -> CommandRequest {
        CommandRequest::new(
            DIRECT_GET_IMAGE,
            json!({
                "crop_h_offset": roi.offset.x as i64,
                "crop_v_offset": roi.offset.y as i64,
                "crop_h_size": roi.size.x as i64,
                "crop_v_size": roi.size.y as i64,
                "network_id": self.network_id,
            }),
        )
        .with_extra(json!({ "preview": preview }))
    }
}

/// `res_info.code`, zero when absent.
fn result_code(body: &Value) -> i64 {
    body.get("res_info")
        .and_then(|info| info.get("code"))
        .and_then(Value::as_i64)
        .unwrap_or(0)
}

#[async_trait]
impl StreamProvider for DirectImageProvider {
    fn name(&self) -> &'static str {
        "direct-image"
    }

    async fn init(&self, device_id: DeviceId, roi: Roi, mode: StreamingMode) -> ConsoleResult<()> {
        info!("Device {}: direct capture over {:?} ({:?})", device_id, roi, mode);
        self.roi_cache.set(device_id, roi);
        Ok(())
    }

    async fn teardown(&self, device_id: DeviceId) -> ConsoleResult<()> {
        let roi = self.roi_cache.get(device_id).unwrap_or(Roi::full(self.sensor));
        let request = self.capture_request(roi, false).with_extra(json!({ "stop": true }));
        let response = self.commands.execute(device_id, request).await?;
        if !response.is_success() {
            return Err(ConsoleError::command(DIRECT_GET_IMAGE, None, response.result)
                .with_operation("teardown"));
        }
        Ok(())
    }

    async fn get_next_frame(
        &self,
        device_id: DeviceId,
        mode: StreamingMode,
        _expected: InferenceKind,
        _stop: &StopSignal,
        _last_frame: Option<&DeviceFrame>,
    ) -> StreamItem {
        let roi = self.roi_cache.get(device_id).unwrap_or(Roi::full(self.sensor));
        let request = self.capture_request(roi, mode == StreamingMode::Preview);

        let response = self
            .commands
            .execute(device_id, request)
            .await
            .map_err(|e| FetchError::Transport {
                message: e.to_string(),
            })?;
        if !response.is_success() {
            return Err(FetchError::Command {
                code: None,
                message: response.result,
            });
        }

        let body = response.command_response.unwrap_or(Value::Null);
        let code = result_code(&body);
        if code != 0 {
            let message = body
                .get("res_info")
                .and_then(|info| info.get("detail_msg"))
                .and_then(Value::as_str)
                .unwrap_or("device rejected the capture")
                .to_string();
            return Err(FetchError::Command {
                code: Some(code),
                message,
            });
        }

        let encoded = body
            .get("image")
            .and_then(Value::as_str)
            .filter(|image| !image.is_empty())
            .ok_or(FetchError::MissingImage)?;
        let bytes = STANDARD.decode(encoded).map_err(|e| FetchError::Decode {
            message: e.to_string(),
        })?;
        let image = decode_image(&bytes)?;

        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        debug!("Device {}: direct frame #{}", device_id, seq);
        Ok(DeviceFrame {
            identifier: format!("{}-{}", device_id, seq),
            image: Some(image),
            inference: None,
        })
    }
}
