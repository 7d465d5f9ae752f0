// # HTTP Device Client
//
// reqwest implementation of the device boundary against the console backend:
//
// - `POST {base}/devices/{id}/modules/$system/command`
// - `GET  {base}/inferenceresults/devices/{id}?limit=1`
// - `GET  {base}/inferenceresults/devices/{id}/withimage?limit=1`
// - `GET  {base}{sas_url}` for paired images

use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use serde_json::Value;

use super::{
    CommandExecutor, CommandRequest, CommandResponse, DeviceId, ImageRef, InferenceReader,
    InferenceRecord,
};
use crate::error::{ConsoleError, ConsoleResult};

#[derive(Debug, Deserialize)]
struct InferenceElement {
    id: String,
    inference_result: Value,
}

#[derive(Debug, Deserialize)]
struct InferenceList {
    data: Vec<InferenceElement>,
}

#[derive(Debug, Deserialize)]
struct InferenceImagePair {
    id: String,
    inference: InferenceElement,
    image: ImageRef,
}

#[derive(Debug, Deserialize)]
struct InferenceWithImageList {
    data: Vec<InferenceImagePair>,
}

/// Client for the console backend REST API.
#[derive(Debug, Clone)]
pub struct HttpDeviceClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDeviceClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> ConsoleResult<T> {
        let response = self.client.get(self.url(path)).send().await?.error_for_status()?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl CommandExecutor for HttpDeviceClient {
    async fn execute(&self, device_id: DeviceId, request: CommandRequest) -> ConsoleResult<CommandResponse> {
        debug!("Device {}: executing '{}'", device_id, request.command_name);
        let path = format!("/devices/{}/modules/$system/command", device_id);
        let response = self
            .client
            .post(self.url(&path))
            .json(&request)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json::<CommandResponse>().await?)
    }
}

#[async_trait]
impl InferenceReader for HttpDeviceClient {
    async fn latest(&self, device_id: DeviceId, with_image: bool) -> ConsoleResult<Option<InferenceRecord>> {
        if with_image {
            let path = format!("/inferenceresults/devices/{}/withimage?limit=1", device_id);
            let list: InferenceWithImageList = self.get_json(&path).await?;
            Ok(list.data.into_iter().next().map(|pair| InferenceRecord {
                id: pair.id,
                inference: pair.inference.inference_result,
                image: Some(pair.image),
            }))
        } else {
            let path = format!("/inferenceresults/devices/{}?limit=1", device_id);
            let list: InferenceList = self.get_json(&path).await?;
            Ok(list.data.into_iter().next().map(|element| InferenceRecord {
                id: element.id,
                inference: element.inference_result,
                image: None,
            }))
        }
    }

    async fn fetch_image(&self, image: &ImageRef) -> ConsoleResult<Vec<u8>> {
        let url = if image.sas_url.starts_with("http") {
            image.sas_url.clone()
        } else {
            self.url(&image.sas_url)
        };
        let response = self.client.get(&url).send().await?.error_for_status()?;
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(ConsoleError::decode("image", format!("'{}' is empty", image.name)));
        }
        Ok(bytes.to_vec())
    }
}
