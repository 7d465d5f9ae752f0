//! # Inference Payloads
//!
//! Recognition of the inference records a device uploads.
//!
//! A record is an envelope (`DeviceID`, `ModelID`, `Image`, `Inferences`)
//! holding one or more timestamped outputs (`T`, `O`). The output `O` may
//! arrive as a JSON object, as a string containing JSON, or as base64 of
//! JSON. Its shape must match the schema of the expected [`InferenceKind`]:
//!
//! ```text
//! classification: {"perception": {"classification_list": [{"class_id", "score"}]}}
//! detection:      {"perception": {"object_detection_list": [{"class_id", "score",
//!                   "bounding_box": {"left", "top", "right", "bottom"}}]}}
//! generic:        any JSON object
//! ```
//!
//! Anything else is reported as an unknown format, which the preview treats
//! as terminal.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use console_geometry::{Box2D, Point2D};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Schema the preview expects an inference output to follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
pub enum InferenceKind {
    Classification,
    Detection,
    /// Any JSON object; shown raw, nothing drawn.
    Generic,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "DeviceID")]
    device_id: String,
    #[serde(rename = "ModelID")]
    model_id: String,
    #[serde(rename = "Inferences")]
    inferences: Vec<Detail>,
}

#[derive(Debug, Deserialize)]
struct Detail {
    #[serde(rename = "T")]
    timestamp: String,
    #[serde(rename = "O")]
    output: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub class_id: u32,
    pub score: f64,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
struct BoundingBox {
    left: f64,
    top: f64,
    right: f64,
    bottom: f64,
}

#[derive(Debug, Deserialize)]
struct RawDetection {
    class_id: u32,
    score: f64,
    bounding_box: BoundingBox,
}

/// A detected object; `bbox` is in device pixels of the captured image.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub class_id: u32,
    pub score: f64,
    pub bbox: Box2D,
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InferencePayload {
    Classification(Vec<Classification>),
    Detection(Vec<Detection>),
    Generic(Value),
}

/// One decoded inference output.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceData {
    pub device_id: String,
    pub model_id: String,
    pub timestamp: String,
    pub payload: InferencePayload,
}

/// Label for `class_id`, falling back to `"Class N"` past the end of the
/// label table.
pub fn label_for(labels: &[String], class_id: u32) -> String {
    labels
        .get(class_id as usize)
        .cloned()
        .unwrap_or_else(|| format!("Class {}", class_id))
}

impl InferenceData {
    /// Decode the newest output of an envelope as `kind`.
    pub fn from_envelope(envelope: &Value, kind: InferenceKind) -> Result<Self, String> {
        let envelope: Envelope = serde_json::from_value(envelope.clone())
            .map_err(|e| format!("envelope: {}", e))?;
        let detail = envelope
            .inferences
            .last()
            .ok_or_else(|| "envelope carries no inferences".to_string())?;
        let output = decode_output(&detail.output)?;
        let payload = parse_payload(output, kind)?;
        Ok(Self {
            device_id: envelope.device_id,
            model_id: envelope.model_id,
            timestamp: detail.timestamp.clone(),
            payload,
        })
    }

    /// Resolve label text for every item.
    pub fn annotate(&mut self, labels: &[String]) {
        match &mut self.payload {
            InferencePayload::Classification(items) => {
                for item in items {
                    item.label = Some(label_for(labels, item.class_id));
                }
            }
            InferencePayload::Detection(items) => {
                for item in items {
                    item.label = Some(label_for(labels, item.class_id));
                }
            }
            InferencePayload::Generic(_) => {}
        }
    }
}

fn decode_output(output: &Value) -> Result<Value, String> {
    match output {
        Value::Object(_) => Ok(output.clone()),
        Value::String(text) => {
            if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(text) {
                return Ok(value);
            }
            let bytes = STANDARD
                .decode(text.trim())
                .map_err(|_| "output is neither JSON nor base64".to_string())?;
            match serde_json::from_slice::<Value>(&bytes) {
                Ok(value @ Value::Object(_)) => Ok(value),
                _ => Err("base64 output does not hold a JSON object".to_string()),
            }
        }
        other => Err(format!("unsupported output type: {}", other)),
    }
}

fn parse_payload(output: Value, kind: InferenceKind) -> Result<InferencePayload, String> {
    match kind {
        InferenceKind::Generic => Ok(InferencePayload::Generic(output)),
        InferenceKind::Classification => {
            let list = perception_list(&output, "classification_list")?;
            let items: Vec<Classification> =
                serde_json::from_value(list).map_err(|e| format!("classification_list: {}", e))?;
            Ok(InferencePayload::Classification(items))
        }
        InferenceKind::Detection => {
            let list = perception_list(&output, "object_detection_list")?;
            let raw: Vec<RawDetection> =
                serde_json::from_value(list).map_err(|e| format!("object_detection_list: {}", e))?;
            Ok(InferencePayload::Detection(
                raw.into_iter()
                    .map(|d| Detection {
                        class_id: d.class_id,
                        score: d.score,
                        bbox: Box2D::new(
                            Point2D::new(d.bounding_box.left, d.bounding_box.top),
                            Point2D::new(d.bounding_box.right, d.bounding_box.bottom),
                        ),
                        label: None,
                    })
                    .collect(),
            ))
        }
    }
}

fn perception_list(output: &Value, key: &str) -> Result<Value, String> {
    output
        .get("perception")
        .and_then(|p| p.get(key))
        .filter(|list| list.is_array())
        .cloned()
        .ok_or_else(|| format!("missing perception.{}", key))
}
