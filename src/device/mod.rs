//! # Device Boundary
//!
//! The collaborators the streaming pipeline talks to on a device:
//!
//! - [`CommandExecutor`]: run a named command on a device and get its reply
//! - [`InferenceReader`]: read the newest inference record (and its image)
//! - [`RoiCache`]: last capture window used per device
//!
//! [`http::HttpDeviceClient`] implements both traits against the console
//! backend's REST API. Tests substitute in-memory fakes.

pub mod http;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use console_geometry::Roi;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConsoleResult;

/// Devices are addressed by their numeric id (the backend uses the MQTT port).
pub type DeviceId = u32;

/// A command sent to a device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandRequest {
    pub command_name: String,
    pub parameters: Value,
    /// Data for the backend itself, not forwarded in the device payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
}

impl CommandRequest {
    pub fn new(command_name: impl Into<String>, parameters: Value) -> Self {
        Self {
            command_name: command_name.into(),
            parameters,
            extra: None,
        }
    }

    pub fn with_extra(mut self, extra: Value) -> Self {
        self.extra = Some(extra);
        self
    }
}

/// The backend's reply to a [`CommandRequest`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CommandResponse {
    #[serde(default = "CommandResponse::success_literal")]
    pub result: String,
    #[serde(default)]
    pub command_response: Option<Value>,
}

impl CommandResponse {
    fn success_literal() -> String {
        "SUCCESS".to_string()
    }

    pub fn success(command_response: Value) -> Self {
        Self {
            result: Self::success_literal(),
            command_response: Some(command_response),
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.eq_ignore_ascii_case("SUCCESS")
    }
}

#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(&self, device_id: DeviceId, request: CommandRequest) -> ConsoleResult<CommandResponse>;
}

/// Reference to an image stored by the backend.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ImageRef {
    pub name: String,
    /// Backend-relative download path.
    pub sas_url: String,
}

/// Newest inference record as returned by the backend.
///
/// `inference` is kept as raw JSON; recognising its schema is the
/// provider's job.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceRecord {
    pub id: String,
    pub inference: Value,
    pub image: Option<ImageRef>,
}

#[async_trait]
pub trait InferenceReader: Send + Sync {
    /// The newest record for `device_id`, paired with its image when
    /// `with_image` is set. `None` when nothing has been uploaded yet.
    async fn latest(&self, device_id: DeviceId, with_image: bool) -> ConsoleResult<Option<InferenceRecord>>;

    async fn fetch_image(&self, image: &ImageRef) -> ConsoleResult<Vec<u8>>;
}

/// Last capture window requested per device.
#[derive(Debug, Clone, Default)]
pub struct RoiCache {
    inner: Arc<Mutex<HashMap<DeviceId, Roi>>>,
}

impl RoiCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, device_id: DeviceId) -> Option<Roi> {
        self.lock().get(&device_id).copied()
    }

    pub fn set(&self, device_id: DeviceId, roi: Roi) {
        self.lock().insert(device_id, roi);
    }

    pub fn remove(&self, device_id: DeviceId) -> Option<Roi> {
        self.lock().remove(&device_id)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<DeviceId, Roi>> {
        // A poisoned map still holds valid ROIs.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
