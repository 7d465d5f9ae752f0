//! Common test utilities and helpers for the console library tests
//!
//! Mock stream providers and a mock device boundary, so the dispatcher,
//! providers and preview can be exercised without a console backend.

#![allow(dead_code)]

/// Mock stream provider with scripted fetch results
pub mod mock_provider {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use console_geometry::Roi;
    use edge_console::capture::{DeviceFrame, StreamItem, StreamProvider, StreamingMode};
    use edge_console::core::StopSignal;
    use edge_console::device::DeviceId;
    use edge_console::error::{ConsoleError, ConsoleResult};
    use edge_console::inference::InferenceKind;
    use tokio::time::Instant;

    pub struct MockProvider {
        name: &'static str,
        script: Mutex<VecDeque<StreamItem>>,
        fetch_delay: Duration,
        teardown_delay: Duration,
        fail_init: bool,
        fail_teardown: bool,
        init_calls: AtomicUsize,
        teardown_calls: AtomicUsize,
        fetch_calls: AtomicUsize,
        fetch_starts: Mutex<Vec<Instant>>,
        last_roi: Mutex<Option<Roi>>,
    }

    impl MockProvider {
        pub fn new(name: &'static str) -> Self {
            Self {
                name,
                script: Mutex::new(VecDeque::new()),
                fetch_delay: Duration::ZERO,
                teardown_delay: Duration::ZERO,
                fail_init: false,
                fail_teardown: false,
                init_calls: AtomicUsize::new(0),
                teardown_calls: AtomicUsize::new(0),
                fetch_calls: AtomicUsize::new(0),
                fetch_starts: Mutex::new(Vec::new()),
                last_roi: Mutex::new(None),
            }
        }

        /// Every fetch takes `delay` of (tokio) wall-clock time
        pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
            self.fetch_delay = delay;
            self
        }

        /// Every teardown takes `delay`
        pub fn with_teardown_delay(mut self, delay: Duration) -> Self {
            self.teardown_delay = delay;
            self
        }

        /// Items returned before falling back to generated frames
        pub fn with_script(self, items: Vec<StreamItem>) -> Self {
            *self.script.lock().unwrap() = items.into();
            self
        }

        pub fn failing_init(mut self) -> Self {
            self.fail_init = true;
            self
        }

        pub fn failing_teardown(mut self) -> Self {
            self.fail_teardown = true;
            self
        }

        pub fn init_calls(&self) -> usize {
            self.init_calls.load(Ordering::SeqCst)
        }

        pub fn teardown_calls(&self) -> usize {
            self.teardown_calls.load(Ordering::SeqCst)
        }

        pub fn fetch_calls(&self) -> usize {
            self.fetch_calls.load(Ordering::SeqCst)
        }

        pub fn fetch_starts(&self) -> Vec<Instant> {
            self.fetch_starts.lock().unwrap().clone()
        }

        pub fn last_roi(&self) -> Option<Roi> {
            *self.last_roi.lock().unwrap()
        }
    }

    #[async_trait]
    impl StreamProvider for MockProvider {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn init(&self, _device_id: DeviceId, roi: Roi, _mode: StreamingMode) -> ConsoleResult<()> {
            self.init_calls.fetch_add(1, Ordering::SeqCst);
            *self.last_roi.lock().unwrap() = Some(roi);
            if self.fail_init {
                return Err(ConsoleError::command("init", None, "refused by mock"));
            }
            Ok(())
        }

        async fn teardown(&self, _device_id: DeviceId) -> ConsoleResult<()> {
            self.teardown_calls.fetch_add(1, Ordering::SeqCst);
            if !self.teardown_delay.is_zero() {
                tokio::time::sleep(self.teardown_delay).await;
            }
            if self.fail_teardown {
                return Err(ConsoleError::command("teardown", None, "refused by mock"));
            }
            Ok(())
        }

        async fn get_next_frame(
            &self,
            device_id: DeviceId,
            _mode: StreamingMode,
            _expected: InferenceKind,
            _stop: &StopSignal,
            _last_frame: Option<&DeviceFrame>,
        ) -> StreamItem {
            let n = self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            self.fetch_starts.lock().unwrap().push(Instant::now());
            if !self.fetch_delay.is_zero() {
                tokio::time::sleep(self.fetch_delay).await;
            }
            let scripted = self.script.lock().unwrap().pop_front();
            scripted.unwrap_or_else(|| Ok(super::test_frames::frame(&format!("{}-{}", device_id, n))))
        }
    }
}

/// Mock device boundary recording every command
pub mod mock_device {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use edge_console::device::{
        CommandExecutor, CommandRequest, CommandResponse, DeviceId, ImageRef, InferenceReader,
        InferenceRecord,
    };
    use edge_console::error::{ConsoleError, ConsoleResult};
    use serde_json::json;

    type Responder = Box<dyn Fn(&CommandRequest) -> ConsoleResult<CommandResponse> + Send + Sync>;

    pub struct MockDevice {
        requests: Mutex<Vec<(DeviceId, CommandRequest)>>,
        responder: Responder,
        latest: Mutex<Option<InferenceRecord>>,
        image: Mutex<Option<Vec<u8>>>,
        fail_reads: bool,
    }

    impl MockDevice {
        /// Answers every command with an empty success
        pub fn new() -> Self {
            Self::with_responder(|_| Ok(CommandResponse::success(json!({}))))
        }

        pub fn with_responder(
            responder: impl Fn(&CommandRequest) -> ConsoleResult<CommandResponse> + Send + Sync + 'static,
        ) -> Self {
            Self {
                requests: Mutex::new(Vec::new()),
                responder: Box::new(responder),
                latest: Mutex::new(None),
                image: Mutex::new(None),
                fail_reads: false,
            }
        }

        /// Answers `direct_get_image` with `encoded` as base64 and code 0
        pub fn serving_image(encoded: Vec<u8>) -> Self {
            let image = STANDARD.encode(encoded);
            Self::with_responder(move |_| {
                Ok(CommandResponse::success(json!({
                    "res_info": {"res_id": "1", "code": 0, "detail_msg": "ok"},
                    "image": image,
                })))
            })
        }

        pub fn failing_reads(mut self) -> Self {
            self.fail_reads = true;
            self
        }

        pub fn set_latest(&self, record: Option<InferenceRecord>) {
            *self.latest.lock().unwrap() = record;
        }

        pub fn set_image(&self, bytes: Option<Vec<u8>>) {
            *self.image.lock().unwrap() = bytes;
        }

        pub fn requests(&self) -> Vec<CommandRequest> {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .map(|(_, request)| request.clone())
                .collect()
        }
    }

    #[async_trait]
    impl CommandExecutor for MockDevice {
        async fn execute(&self, device_id: DeviceId, request: CommandRequest) -> ConsoleResult<CommandResponse> {
            let response = (self.responder)(&request);
            self.requests.lock().unwrap().push((device_id, request));
            response
        }
    }

    #[async_trait]
    impl InferenceReader for MockDevice {
        async fn latest(&self, _device_id: DeviceId, _with_image: bool) -> ConsoleResult<Option<InferenceRecord>> {
            if self.fail_reads {
                return Err(ConsoleError::network("latest inference", None));
            }
            Ok(self.latest.lock().unwrap().clone())
        }

        async fn fetch_image(&self, image: &ImageRef) -> ConsoleResult<Vec<u8>> {
            self.image
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| ConsoleError::decode("image", format!("{} not stored", image.name)))
        }
    }
}

/// Test frame utilities and constants
pub mod test_frames {
    use std::io::Cursor;
    use std::sync::Arc;

    use console_geometry::Point2D;
    use edge_console::capture::DeviceFrame;
    use edge_console::device::{ImageRef, InferenceRecord};
    use image::{ImageFormat, Rgba, RgbaImage};
    use serde_json::{Value, json};

    pub const SENSOR: Point2D = Point2D::new(4056.0, 3040.0);

    /// Encoded PNG of a solid color image
    pub fn png(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
        let mut bytes = Vec::new();
        RgbaImage::from_pixel(width, height, Rgba(color))
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    /// Image-only frame with a 4x3 gray image
    pub fn frame(identifier: &str) -> DeviceFrame {
        DeviceFrame {
            identifier: identifier.to_string(),
            image: Some(Arc::new(RgbaImage::from_pixel(4, 3, Rgba([128, 128, 128, 255])))),
            inference: None,
        }
    }

    pub fn envelope(output: Value) -> Value {
        json!({
            "DeviceID": "Aid-00010001-0000-2000-9002-000000000000",
            "ModelID": "0300000000000100",
            "Image": true,
            "Inferences": [{"T": "20240326110151828", "O": output}]
        })
    }

    pub fn detection_output() -> Value {
        json!({"perception": {"object_detection_list": [
            {"class_id": 0, "score": 0.8,
             "bounding_box": {"left": 10, "top": 20, "right": 110, "bottom": 220}},
            {"class_id": 7, "score": 0.4,
             "bounding_box": {"left": 0, "top": 0, "right": 5, "bottom": 5}}
        ]}})
    }

    pub fn record(id: &str, inference: Value, with_image: bool) -> InferenceRecord {
        InferenceRecord {
            id: id.to_string(),
            inference,
            image: with_image.then(|| ImageRef {
                name: format!("{}.jpg", id),
                sas_url: format!("/images/devices/1883/image/{}.jpg", id),
            }),
        }
    }
}
