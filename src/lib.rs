//! # Edge Console Preview Library
//!
//! Live preview of edge AI camera devices: frames and inference results are
//! pulled from a device at a self-tuned cadence, exposed as a cancellable
//! live sequence, and rendered with box/label overlays and a pointer-driven
//! ROI capture tool.
//!
//! ## Architecture
//!
//! The library is organized into several key modules:
//! - `capture`: stream providers (inference-result and direct-image pullers)
//! - `session`: the stream dispatcher, one paced fetch loop per device
//! - `visualization`: the preview state machine and its inactivity policy
//! - `processing`: surface sizing, drawing preprocessing, scene composition
//!   and ROI capture controls
//! - `core`: stop signal, frame pacing and distribution channels
//! - `device`: the command/inference boundary and its HTTP client
//! - `inference`: recognition of uploaded inference payloads
//! - `config`: configuration loading and validation
//!
//! Geometry (points, boxes, ROIs, letterbox placement, CPU scaling) lives in
//! the `console_geometry` crate.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use edge_console::{PreviewOptions, run_preview};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut options = PreviewOptions::new(1883);
//! options.duration = Duration::from_secs(10);
//! options.output = Some("preview.png".into());
//!
//! let report = run_preview(options).await?;
//! println!("{} frames", report.frames);
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use console_geometry::Roi;
use log::{info, warn};

pub mod capture;
pub mod config;
pub mod core;
pub mod device;
pub mod error;
pub mod inference;
pub mod processing;
pub mod session;
pub mod visualization;

/// Re-export error types for convenience
pub use error::{ConsoleError, ConsoleResult, ErrorSeverity, HasSeverity, Retryable};

pub use capture::{DeviceFrame, FetchError, ProviderSet, StreamItem, StreamProvider, StreamingMode};
pub use config::ConsoleConfig;
pub use device::DeviceId;
pub use inference::InferenceKind;
pub use session::StreamDispatcher;
pub use visualization::{Alert, Visualization, VisualizationEvent, VisualizationState};

use capture::{DirectImageProvider, InferenceResultProvider};
use device::http::HttpDeviceClient;
use device::{CommandExecutor, InferenceReader, RoiCache};
use processing::{Padding, RasterCanvas, RenderPipeline};

/// Parameters of a headless preview run.
#[derive(Debug, Clone)]
pub struct PreviewOptions {
    pub config: ConsoleConfig,
    pub device_id: DeviceId,
    pub mode: StreamingMode,
    pub kind: InferenceKind,
    /// How long to preview before stopping the stream.
    pub duration: Duration,
    /// Class labels, indexed by class id.
    pub labels: Vec<String>,
    /// Capture window; the full sensor when unset.
    pub roi: Option<Roi>,
    /// Render surface size in pixels.
    pub surface: (u32, u32),
    /// Where to write the last rendered surface as PNG.
    pub output: Option<PathBuf>,
}

impl PreviewOptions {
    pub fn new(device_id: DeviceId) -> Self {
        Self {
            config: ConsoleConfig::default(),
            device_id,
            mode: StreamingMode::ImageAndInferenceResult,
            kind: InferenceKind::Detection,
            duration: Duration::from_secs(10),
            labels: Vec::new(),
            roi: None,
            surface: (1280, 720),
            output: None,
        }
    }
}

/// Outcome of a preview run.
#[derive(Debug, Clone)]
pub struct PreviewReport {
    pub frames: u64,
    pub rendered: u64,
    pub alerts: Vec<Alert>,
    pub final_state: VisualizationState,
}

/// Preview a device through the console backend at `options.config.base_url`.
pub async fn run_preview(options: PreviewOptions) -> ConsoleResult<PreviewReport> {
    let client = Arc::new(HttpDeviceClient::new(options.config.base_url.clone()));
    run_preview_with(options, client.clone(), client).await
}

/// Preview a device through the given device boundary.
pub async fn run_preview_with(
    options: PreviewOptions,
    commands: Arc<dyn CommandExecutor>,
    reader: Arc<dyn InferenceReader>,
) -> ConsoleResult<PreviewReport> {
    let config = &options.config;
    config
        .validate()
        .map_err(|reason| ConsoleError::config("config", "", reason))?;

    let providers = ProviderSet::new(
        Arc::new(InferenceResultProvider::new(commands.clone(), reader)),
        Arc::new(DirectImageProvider::new(
            commands,
            RoiCache::new(),
            config.sensor_size(),
            config.network_id.clone(),
        )),
    );
    let dispatcher = Arc::new(StreamDispatcher::from_config(providers, config));
    let mut preview = Visualization::from_config(dispatcher.clone(), config)
        .with_mode(options.mode, options.kind)
        .with_labels(options.labels.clone());

    let (width, height) = options.surface;
    let mut pipeline = RenderPipeline::new(RasterCanvas::new(width, height), Padding::default());
    let mut frames = preview.subscribe_frames();
    let mut drawings = preview.subscribe_drawings();
    let mut alerts = preview.subscribe_alerts();

    let mut report = PreviewReport {
        frames: 0,
        rendered: 0,
        alerts: Vec::new(),
        final_state: VisualizationState::Disabled,
    };

    info!(
        "Previewing device {} ({:?}, {:?}) for {:?}",
        options.device_id, options.mode, options.kind, options.duration
    );
    preview.update(VisualizationEvent::SelectDevice(Some(options.device_id))).await;
    if let Some(roi) = options.roi {
        preview.update(VisualizationEvent::ApplyRoi(roi)).await;
    }
    preview.update(VisualizationEvent::StartPreview).await;

    let deadline = tokio::time::Instant::now() + options.duration;
    loop {
        let attached = tokio::select! {
            _ = tokio::time::sleep_until(deadline) => break,
            attached = preview.pump() => attached,
        };

        while frames.try_next().is_some() {
            report.frames += 1;
        }
        while let Some(drawing) = drawings.try_next() {
            match pipeline.set_drawing(drawing) {
                Ok(()) => report.rendered += 1,
                Err(e) => warn!("Device {}: frame not rendered: {}", options.device_id, e),
            }
        }
        if !attached {
            break;
        }
    }

    report.final_state = preview.state();
    if preview.state() == VisualizationState::Streaming {
        preview.update(VisualizationEvent::StopInferenceStream { forced: false }).await;
    }
    dispatcher.stop_all().await;

    while let Some(alert) = alerts.try_next() {
        report.alerts.push(alert);
    }

    if let Some(path) = &options.output {
        pipeline.canvas().raster().save(path)?;
        info!("Wrote {}", path.display());
    }

    Ok(report)
}
