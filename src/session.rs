//! # Stream Dispatcher
//!
//! Owns one fetch loop per device and hands out the live frame sequence of
//! each bound session.
//!
//! ## Architecture
//!
//! 1. **ProviderSet**: picks the provider for the requested mode
//! 2. **BoundStreamProvider**: the per-device session record. Its presence in
//!    the dispatcher is the only answer to "is this device streaming"
//! 3. **Fetch loop**: an explicit loop per session: check stop, fetch, check
//!    stop, publish, paced sleep
//! 4. **Broadcast**: every consumer of a device subscribes to the same
//!    sequence of [`StreamItem`]s
//!
//! ## Cancellation
//!
//! `stop_streaming` raises the session's [`StopSignal`]. The loop observes it
//! before and after each fetch and while sleeping; a fetch already in flight
//! is allowed to finish and its result is dropped.
//!
//! ## Pacing
//!
//! The delay before the next fetch is `max(0, period - avg)`, where `avg` is
//! the mean duration of the last few fetches. The effective frame period
//! therefore tracks `1 / target_fps` instead of `fetch time + fixed delay`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use console_geometry::Roi;
use futures_util::future::join_all;
use log::{debug, info, warn};
use tokio::time::Instant;

use crate::capture::{DeviceFrame, ProviderSet, StreamItem, StreamProvider, StreamingMode};
use crate::config::ConsoleConfig;
use crate::core::{Broadcast, FramePacer, StopSignal, Subscription};
use crate::device::DeviceId;
use crate::error::{ConsoleError, ConsoleResult};
use crate::inference::InferenceKind;

pub const DEFAULT_TARGET_FPS: u32 = 30;
pub const DEFAULT_PACING_WINDOW: usize = 5;
pub const DEFAULT_CHANNEL_CAPACITY: usize = 16;

/// Active session of one device.
pub struct BoundStreamProvider {
    pub provider: Arc<dyn StreamProvider>,
    pub stream: Broadcast<StreamItem>,
    pub mode: StreamingMode,
    pub stop: StopSignal,
    /// Subscribed before the loop starts; handed to the first consumer so it
    /// sees the session's first item.
    first: Option<Subscription<StreamItem>>,
}

/// Per-device session cache plus the fetch loops behind it.
pub struct StreamDispatcher {
    providers: ProviderSet,
    pacing_window: usize,
    channel_capacity: usize,
    sessions: Mutex<HashMap<DeviceId, BoundStreamProvider>>,
}

impl StreamDispatcher {
    pub fn new(providers: ProviderSet) -> Self {
        Self {
            providers,
            pacing_window: DEFAULT_PACING_WINDOW,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(providers: ProviderSet, config: &ConsoleConfig) -> Self {
        Self::new(providers)
            .with_pacing_window(config.pacing_window)
            .with_channel_capacity(config.frame_channel_capacity)
    }

    pub fn with_pacing_window(mut self, window: usize) -> Self {
        self.pacing_window = window.max(1);
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<DeviceId, BoundStreamProvider>> {
        self.sessions.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Initialise the provider for `mode` and start fetching.
    ///
    /// A second call for a device that is already bound replaces the record
    /// (last call wins). The replaced loop is signalled to stop but its
    /// provider is not torn down again.
    pub async fn setup_streaming(
        &self,
        device_id: DeviceId,
        roi: Roi,
        mode: StreamingMode,
        expected: InferenceKind,
        target_fps: u32,
    ) -> ConsoleResult<()> {
        let provider = self.providers.for_mode(mode);
        provider
            .init(device_id, roi, mode)
            .await
            .map_err(|e| ConsoleError::setup(device_id, e.to_string()).with_operation("init"))?;

        let stream = Broadcast::new(self.channel_capacity);
        let stop = StopSignal::new();
        let session = BoundStreamProvider {
            provider: provider.clone(),
            first: Some(stream.subscribe()),
            stream: stream.clone(),
            mode,
            stop: stop.clone(),
        };

        // Record first, then start fetching: the loop never runs unbound.
        let replaced = self.sessions().insert(device_id, session);
        if let Some(replaced) = replaced {
            replaced.stop.raise();
            warn!(
                "Device {}: setup_streaming called on a bound session, replacing it",
                device_id
            );
        }

        tokio::spawn(run_fetch_loop(
            device_id,
            provider.clone(),
            mode,
            expected,
            stop,
            stream,
            FramePacer::new(target_fps, self.pacing_window),
        ));

        info!(
            "Device {}: streaming {:?} via {} at {} fps",
            device_id,
            mode,
            provider.name(),
            target_fps
        );
        Ok(())
    }

    /// The live sequence of the device's session.
    ///
    /// The first caller after `setup_streaming` receives every item from the
    /// start of the session; later callers see items published after they
    /// subscribed.
    pub fn get_device_stream_as_frames(&self, device_id: DeviceId) -> ConsoleResult<Subscription<StreamItem>> {
        self.sessions()
            .get_mut(&device_id)
            .map(|session| session.first.take().unwrap_or_else(|| session.stream.subscribe()))
            .ok_or_else(|| ConsoleError::not_streaming(device_id))
    }

    /// Cancel the loop, forget the session and tear the provider down.
    /// Teardown failures are logged, never returned.
    pub async fn stop_streaming(&self, device_id: DeviceId) {
        let Some(session) = self.sessions().remove(&device_id) else {
            debug!("Device {}: stop_streaming without a session", device_id);
            return;
        };
        release(device_id, session).await;
    }

    /// Stop every bound session, tearing the providers down concurrently.
    pub async fn stop_all(&self) {
        let sessions: Vec<(DeviceId, BoundStreamProvider)> = self.sessions().drain().collect();
        join_all(
            sessions
                .into_iter()
                .map(|(device_id, session)| release(device_id, session)),
        )
        .await;
    }

    pub fn is_device_streaming(&self, device_id: DeviceId) -> bool {
        self.sessions().contains_key(&device_id)
    }

    pub fn get_streaming_mode(&self, device_id: DeviceId) -> Option<StreamingMode> {
        self.sessions().get(&device_id).map(|session| session.mode)
    }

    pub fn streaming_devices(&self) -> Vec<DeviceId> {
        let mut ids: Vec<DeviceId> = self.sessions().keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

async fn release(device_id: DeviceId, session: BoundStreamProvider) {
    session.stop.raise();
    if let Err(e) = session.provider.teardown(device_id).await {
        warn!("Device {}: teardown via {} failed: {}", device_id, session.provider.name(), e);
    }
    info!("Device {}: streaming stopped", device_id);
}

async fn run_fetch_loop(
    device_id: DeviceId,
    provider: Arc<dyn StreamProvider>,
    mode: StreamingMode,
    expected: InferenceKind,
    stop: StopSignal,
    stream: Broadcast<StreamItem>,
    mut pacer: FramePacer,
) {
    let mut last_frame: Option<DeviceFrame> = None;
    let mut fetched: u64 = 0;

    loop {
        if stop.is_raised() {
            break;
        }

        let started = Instant::now();
        let item = provider
            .get_next_frame(device_id, mode, expected, &stop, last_frame.as_ref())
            .await;
        let took = started.elapsed();

        if stop.is_raised() {
            break;
        }

        fetched += 1;
        match &item {
            Ok(frame) => last_frame = Some(frame.clone()),
            Err(e) => debug!("Device {}: fetch #{} failed: {}", device_id, fetched, e),
        }
        stream.publish(item);

        let delay = pacer.record(took);
        tokio::select! {
            _ = stop.raised() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    debug!(
        "Device {}: fetch loop exited after {} fetches (avg {:?})",
        device_id,
        fetched,
        pacer.average()
    );
}
