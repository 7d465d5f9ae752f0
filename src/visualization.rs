//! # Device Preview
//!
//! Per-screen state machine wiring a selected device to the dispatcher and
//! the render pipeline.
//!
//! ## Architecture
//!
//! The component is a plain state object driven by [`Visualization::update`].
//! UI toolkits adapt their callbacks into [`VisualizationEvent`]s; frames from
//! the device arrive the same way through [`Visualization::next_event`].
//!
//! ```text
//!   Disabled --start_preview--> Streaming --stop--> Disabled
//!                                   |
//!                                   +--unknown format--> Error --stop_preview--> Disabled
//! ```
//!
//! ## Outputs
//!
//! - `roi`: replay-latest effective ROI of the selected device
//! - `frames`: every successfully decoded frame, for result panels
//! - `drawings`: the drawing to show, `None` when the surface goes blank
//! - `alerts`: user-visible failures
//!
//! ## Inactivity Policy
//!
//! Errors other than an unknown inference format are measured against the
//! time of the last good frame. Past `blank_after` the drawing is dropped;
//! past `stop_after` the stream is stopped and the user alerted. Unknown
//! formats stop the session on the first occurrence.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use console_geometry::{Box2D, Point2D, Roi};
use log::{debug, error, info, warn};
use tokio::time::Instant;

use crate::capture::{DeviceFrame, FetchError, StreamItem, StreamingMode};
use crate::config::{ConsoleConfig, PreviewPolicy};
use crate::core::{Broadcast, LatestValue, Subscription};
use crate::device::DeviceId;
use crate::inference::{InferenceKind, InferencePayload};
use crate::processing::drawing::BOX_COLOR;
use crate::processing::{DrawingElement, RawDrawing};
use crate::session::{DEFAULT_TARGET_FPS, StreamDispatcher};

const ALERT_CAPACITY: usize = 16;
const OUTPUT_CAPACITY: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisualizationState {
    Disabled,
    Streaming,
    Error,
}

/// User-visible notification.
#[derive(Debug, Clone, PartialEq)]
pub enum Alert {
    /// Session setup or subscription failed.
    StreamFailed { device_id: DeviceId, reason: String },
    /// No image for longer than the stop threshold.
    NoImage { device_id: DeviceId, elapsed_ms: u128 },
    /// The stream was stopped without the user asking.
    PreviewStopped { device_id: DeviceId },
    UnknownFormat { device_id: DeviceId, detail: String },
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Alert::StreamFailed { device_id, reason } => {
                write!(f, "Device {}: failed to stream: {}", device_id, reason)
            }
            Alert::NoImage { device_id, elapsed_ms } => write!(
                f,
                "Device {}: device failed to produce an image after {} ms",
                device_id, elapsed_ms
            ),
            Alert::PreviewStopped { device_id } => write!(f, "Device {}: preview stopped", device_id),
            Alert::UnknownFormat { device_id, detail } => write!(
                f,
                "Device {}: unknown inference format, stopping: {}",
                device_id, detail
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub enum VisualizationEvent {
    SelectDevice(Option<DeviceId>),
    StartPreview,
    StopPreview,
    StopInferenceStream { forced: bool },
    Frame(StreamItem),
    /// The device's sequence ended (session replaced or dropped).
    StreamClosed,
    /// Apply a device-pixel ROI.
    ApplyRoi(Roi),
    /// Apply a selection normalized to the shown image.
    ApplySelection(Box2D),
    ResetRoi,
    SetMode(StreamingMode),
    SetExpected(InferenceKind),
    SetLabels(Vec<String>),
}

pub struct Visualization {
    dispatcher: Arc<StreamDispatcher>,
    policy: PreviewPolicy,
    sensor: Point2D,
    target_fps: u32,
    mode: StreamingMode,
    expected: InferenceKind,
    labels: Vec<String>,

    state: VisualizationState,
    device: Option<DeviceId>,
    rois: HashMap<DeviceId, Roi>,
    subscription: Option<Subscription<StreamItem>>,
    last_good: Option<Instant>,
    current: Option<RawDrawing>,

    roi: LatestValue<Roi>,
    frames: Broadcast<DeviceFrame>,
    drawings: Broadcast<Option<RawDrawing>>,
    alerts: Broadcast<Alert>,
}

impl Visualization {
    pub fn new(dispatcher: Arc<StreamDispatcher>, policy: PreviewPolicy, sensor: Point2D) -> Self {
        Self {
            dispatcher,
            policy,
            sensor,
            target_fps: DEFAULT_TARGET_FPS,
            mode: StreamingMode::ImageAndInferenceResult,
            expected: InferenceKind::Detection,
            labels: Vec::new(),
            state: VisualizationState::Disabled,
            device: None,
            rois: HashMap::new(),
            subscription: None,
            last_good: None,
            current: None,
            roi: LatestValue::new(Roi::full(sensor)),
            frames: Broadcast::new(OUTPUT_CAPACITY),
            drawings: Broadcast::new(OUTPUT_CAPACITY),
            alerts: Broadcast::new(ALERT_CAPACITY),
        }
    }

    pub fn from_config(dispatcher: Arc<StreamDispatcher>, config: &ConsoleConfig) -> Self {
        Self::new(dispatcher, config.policy(), config.sensor_size()).with_target_fps(config.target_fps)
    }

    pub fn with_target_fps(mut self, target_fps: u32) -> Self {
        self.target_fps = target_fps;
        self
    }

    pub fn with_mode(mut self, mode: StreamingMode, expected: InferenceKind) -> Self {
        self.mode = mode;
        self.expected = expected;
        self
    }

    pub fn with_labels(mut self, labels: Vec<String>) -> Self {
        self.labels = labels;
        self
    }

    pub fn state(&self) -> VisualizationState {
        self.state
    }

    pub fn device(&self) -> Option<DeviceId> {
        self.device
    }

    pub fn mode(&self) -> StreamingMode {
        self.mode
    }

    pub fn current_drawing(&self) -> Option<&RawDrawing> {
        self.current.as_ref()
    }

    /// ROI applied to the selected device (full sensor if none was set).
    pub fn effective_roi(&self) -> Roi {
        self.device
            .and_then(|id| self.rois.get(&id).copied())
            .unwrap_or(Roi::full(self.sensor))
    }

    pub fn subscribe_roi(&self) -> tokio::sync::watch::Receiver<Roi> {
        self.roi.subscribe()
    }

    pub fn subscribe_frames(&self) -> Subscription<DeviceFrame> {
        self.frames.subscribe()
    }

    pub fn subscribe_drawings(&self) -> Subscription<Option<RawDrawing>> {
        self.drawings.subscribe()
    }

    pub fn subscribe_alerts(&self) -> Subscription<Alert> {
        self.alerts.subscribe()
    }

    /// Wait for the next element of the attached device sequence. `None`
    /// when nothing is attached.
    pub async fn next_event(&mut self) -> Option<VisualizationEvent> {
        let subscription = self.subscription.as_mut()?;
        Some(match subscription.next().await {
            Some(item) => VisualizationEvent::Frame(item),
            None => VisualizationEvent::StreamClosed,
        })
    }

    /// Process the next device element. Returns `false` when nothing is
    /// attached.
    pub async fn pump(&mut self) -> bool {
        match self.next_event().await {
            Some(event) => {
                self.update(event).await;
                true
            }
            None => false,
        }
    }

    pub async fn update(&mut self, event: VisualizationEvent) {
        match event {
            VisualizationEvent::SelectDevice(device) => self.select_device(device),
            VisualizationEvent::StartPreview => self.start_preview().await,
            VisualizationEvent::StopPreview => self.stop_preview(),
            VisualizationEvent::StopInferenceStream { forced } => self.stop_inference_stream(forced).await,
            VisualizationEvent::Frame(item) => self.on_item(item).await,
            VisualizationEvent::StreamClosed => {
                if let Some(device_id) = self.device {
                    warn!("Device {}: frame sequence closed", device_id);
                }
                self.stop_preview();
            }
            VisualizationEvent::ApplyRoi(roi) => self.apply_roi(roi).await,
            VisualizationEvent::ApplySelection(selection) => {
                self.apply_roi(Roi::from_normalized(&selection, self.sensor)).await
            }
            VisualizationEvent::ResetRoi => self.apply_roi(Roi::full(self.sensor)).await,
            VisualizationEvent::SetMode(mode) => self.mode = mode,
            VisualizationEvent::SetExpected(kind) => self.expected = kind,
            VisualizationEvent::SetLabels(labels) => self.labels = labels,
        }
    }

    fn select_device(&mut self, device: Option<DeviceId>) {
        if device == self.device {
            return;
        }
        self.stop_preview();
        self.device = device;
        self.roi.set(self.effective_roi());

        if let Some(device_id) = device {
            if self.dispatcher.is_device_streaming(device_id) {
                if let Some(mode) = self.dispatcher.get_streaming_mode(device_id) {
                    self.mode = mode;
                }
                match self.dispatcher.get_device_stream_as_frames(device_id) {
                    Ok(subscription) => {
                        info!("Device {}: re-attached to running session", device_id);
                        self.attach(subscription);
                    }
                    Err(e) => warn!("Device {}: cannot re-attach: {}", device_id, e),
                }
            }
        }
    }

    fn attach(&mut self, subscription: Subscription<StreamItem>) {
        self.subscription = Some(subscription);
        self.last_good = Some(Instant::now());
        self.state = VisualizationState::Streaming;
    }

    async fn start_preview(&mut self) {
        let Some(device_id) = self.device else {
            debug!("start_preview without a selected device");
            return;
        };
        if self.state == VisualizationState::Streaming {
            return;
        }
        self.state = VisualizationState::Streaming;

        let roi = self.effective_roi();
        let subscription = match self
            .dispatcher
            .setup_streaming(device_id, roi, self.mode, self.expected, self.target_fps)
            .await
        {
            Ok(()) => self.dispatcher.get_device_stream_as_frames(device_id),
            Err(e) => Err(e),
        };

        match subscription {
            Ok(subscription) => self.attach(subscription),
            Err(e) => {
                self.raise(Alert::StreamFailed {
                    device_id,
                    reason: e.to_string(),
                });
                self.stop_preview();
                self.dispatcher.stop_streaming(device_id).await;
            }
        }
    }

    /// Detach and blank. The device-side session keeps running.
    fn stop_preview(&mut self) {
        self.subscription = None;
        self.last_good = None;
        self.state = VisualizationState::Disabled;
        self.set_drawing(None);
    }

    async fn stop_inference_stream(&mut self, forced: bool) {
        self.stop_preview();
        let Some(device_id) = self.device else {
            return;
        };
        self.dispatcher.stop_streaming(device_id).await;
        if forced {
            self.raise(Alert::PreviewStopped { device_id });
        }
    }

    async fn apply_roi(&mut self, roi: Roi) {
        let Some(device_id) = self.device else {
            return;
        };
        self.rois.insert(device_id, roi);
        self.roi.set(roi);
        if self.state == VisualizationState::Streaming {
            // The capture window is fixed at setup; restart with the new one.
            self.stop_inference_stream(false).await;
            self.start_preview().await;
        }
    }

    async fn on_item(&mut self, item: StreamItem) {
        if self.state != VisualizationState::Streaming {
            return;
        }
        let Some(device_id) = self.device else {
            return;
        };
        match item {
            Ok(frame) => self.on_frame(frame),
            Err(FetchError::UnknownInferenceFormat { detail }) => {
                self.stop_inference_stream(false).await;
                self.state = VisualizationState::Error;
                self.raise(Alert::UnknownFormat { device_id, detail });
            }
            Err(e) => {
                let now = Instant::now();
                let elapsed = now.duration_since(self.last_good.unwrap_or(now));
                debug!("Device {}: {} ({:?} since last frame)", device_id, e, elapsed);
                if elapsed > self.policy.stop_after {
                    self.raise(Alert::NoImage {
                        device_id,
                        elapsed_ms: elapsed.as_millis(),
                    });
                    self.stop_inference_stream(true).await;
                } else if elapsed > self.policy.blank_after && self.current.is_some() {
                    self.set_drawing(None);
                }
            }
        }
    }

    fn on_frame(&mut self, frame: DeviceFrame) {
        self.last_good = Some(Instant::now());
        let mut frame = frame;
        if let Some(inference) = frame.inference.as_mut() {
            inference.annotate(&self.labels);
        }
        let mut drawing = frame_to_drawing(&frame);
        if let Some(image) = &frame.image {
            if let Some(overlay) = roi_overlay(&self.effective_roi(), self.sensor, image.dimensions()) {
                drawing.push(DrawingElement::RoiBox(overlay));
            }
        }
        self.frames.publish(frame);
        self.set_drawing(Some(drawing));
    }

    fn set_drawing(&mut self, drawing: Option<RawDrawing>) {
        if drawing.is_none() && self.current.is_none() {
            return;
        }
        self.current = drawing.clone();
        self.drawings.publish(drawing);
    }

    fn raise(&self, alert: Alert) {
        error!("{}", alert);
        self.alerts.publish(alert);
    }
}

/// Fixed-label layout for classification results, surface pixels.
const CLASS_LABEL_ORIGIN: Point2D = Point2D::new(8.0, 20.0);
const CLASS_LABEL_STEP: f64 = 18.0;

/// Drawing for a frame: its image, then one box and label per detection or
/// one fixed label per classification.
pub fn frame_to_drawing(frame: &DeviceFrame) -> RawDrawing {
    let mut drawing = RawDrawing::default();
    if let Some(image) = &frame.image {
        drawing.push(DrawingElement::NativeImage(image.clone()));
    }
    let Some(inference) = &frame.inference else {
        return drawing;
    };
    match &inference.payload {
        InferencePayload::Detection(items) => {
            for item in items {
                drawing.push(DrawingElement::Box {
                    bbox: item.bbox,
                    color: BOX_COLOR,
                });
                drawing.push(DrawingElement::Label {
                    text: label_text(item.label.as_deref(), item.class_id, item.score),
                    anchor: item.bbox.min,
                    fixed: false,
                });
            }
        }
        InferencePayload::Classification(items) => {
            for (i, item) in items.iter().enumerate() {
                drawing.push(DrawingElement::Label {
                    text: label_text(item.label.as_deref(), item.class_id, item.score),
                    anchor: CLASS_LABEL_ORIGIN + Point2D::new(0.0, CLASS_LABEL_STEP * i as f64),
                    fixed: true,
                });
            }
        }
        InferencePayload::Generic(_) => {}
    }
    drawing
}

/// The applied ROI in natural units of an `image_size` frame, or `None` when
/// the full sensor is in use.
pub fn roi_overlay(roi: &Roi, sensor: Point2D, image_size: (u32, u32)) -> Option<Box2D> {
    if roi.is_full(sensor) {
        return None;
    }
    let (width, height) = image_size;
    Some(roi.to_normalized(sensor).vect_mul(Point2D::new(width as f64, height as f64)))
}

fn label_text(label: Option<&str>, class_id: u32, score: f64) -> String {
    match label {
        Some(label) => format!("{} {:.0}%", label, score * 100.0),
        None => format!("Class {} {:.0}%", class_id, score * 100.0),
    }
}
