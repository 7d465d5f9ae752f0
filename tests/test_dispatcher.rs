//! Integration tests for the stream dispatcher
//!
//! Session lifecycle, mode routing, adaptive pacing and cooperative
//! cancellation, driven on a paused tokio clock.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::mock_provider::MockProvider;
use common::test_frames::SENSOR;
use console_geometry::Roi;
use edge_console::capture::{FetchError, ProviderSet, StreamingMode};
use edge_console::error::ConsoleError;
use edge_console::inference::InferenceKind;
use edge_console::session::StreamDispatcher;

const DEVICE: u32 = 1883;

fn dispatcher(inference: &Arc<MockProvider>, direct: &Arc<MockProvider>) -> StreamDispatcher {
    StreamDispatcher::new(ProviderSet::new(inference.clone(), direct.clone()))
}

fn providers() -> (Arc<MockProvider>, Arc<MockProvider>) {
    (
        Arc::new(MockProvider::new("inference")),
        Arc::new(MockProvider::new("direct")),
    )
}

#[tokio::test(start_paused = true)]
async fn test_stream_of_unbound_device_is_rejected() {
    let (inference, direct) = providers();
    let dispatcher = dispatcher(&inference, &direct);

    let result = dispatcher.get_device_stream_as_frames(DEVICE);
    assert!(matches!(result, Err(ConsoleError::NotStreaming { device_id: DEVICE, .. })));
    assert!(!dispatcher.is_device_streaming(DEVICE));
    assert_eq!(dispatcher.get_streaming_mode(DEVICE), None);
}

#[tokio::test(start_paused = true)]
async fn test_stop_streaming_tears_down_exactly_once() {
    let (inference, direct) = providers();
    let dispatcher = dispatcher(&inference, &direct);

    dispatcher
        .setup_streaming(DEVICE, Roi::full(SENSOR), StreamingMode::ImageOnly, InferenceKind::Generic, 30)
        .await
        .unwrap();
    assert!(dispatcher.is_device_streaming(DEVICE));
    assert_eq!(dispatcher.get_streaming_mode(DEVICE), Some(StreamingMode::ImageOnly));

    dispatcher.stop_streaming(DEVICE).await;
    assert!(!dispatcher.is_device_streaming(DEVICE));
    assert_eq!(direct.teardown_calls(), 1);

    // A second stop finds no session and does nothing
    dispatcher.stop_streaming(DEVICE).await;
    assert_eq!(direct.teardown_calls(), 1);
    assert_eq!(inference.teardown_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_image_only_routes_to_direct_provider() {
    let (inference, direct) = providers();
    let dispatcher = dispatcher(&inference, &direct);

    dispatcher
        .setup_streaming(DEVICE, Roi::full(SENSOR), StreamingMode::ImageOnly, InferenceKind::Generic, 30)
        .await
        .unwrap();
    let mut frames = dispatcher.get_device_stream_as_frames(DEVICE).unwrap();
    for _ in 0..3 {
        assert!(frames.next().await.unwrap().is_ok());
    }
    dispatcher.stop_streaming(DEVICE).await;

    assert_eq!(direct.init_calls(), 1);
    assert!(direct.fetch_calls() >= 3);
    assert_eq!(inference.init_calls(), 0);
    assert_eq!(inference.fetch_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_inference_result_routes_to_inference_provider() {
    let (inference, direct) = providers();
    let dispatcher = dispatcher(&inference, &direct);

    dispatcher
        .setup_streaming(
            DEVICE,
            Roi::full(SENSOR),
            StreamingMode::InferenceResult,
            InferenceKind::Detection,
            30,
        )
        .await
        .unwrap();
    let mut frames = dispatcher.get_device_stream_as_frames(DEVICE).unwrap();
    for _ in 0..3 {
        frames.next().await.unwrap().unwrap();
    }
    dispatcher.stop_streaming(DEVICE).await;

    assert!(inference.fetch_calls() >= 3);
    assert_eq!(inference.teardown_calls(), 1);
    assert_eq!(direct.fetch_calls(), 0);
    assert_eq!(direct.teardown_calls(), 0);
}

fn gaps(provider: &MockProvider) -> Vec<Duration> {
    provider
        .fetch_starts()
        .windows(2)
        .map(|pair| pair[1] - pair[0])
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_pacing_compensates_fetch_time() {
    let inference = Arc::new(MockProvider::new("inference"));
    let direct = Arc::new(MockProvider::new("direct").with_fetch_delay(Duration::from_millis(30)));
    let dispatcher = dispatcher(&inference, &direct);

    // 10 fps: 100 ms period, 30 ms fetch, 70 ms delay
    dispatcher
        .setup_streaming(DEVICE, Roi::full(SENSOR), StreamingMode::ImageOnly, InferenceKind::Generic, 10)
        .await
        .unwrap();
    let mut frames = dispatcher.get_device_stream_as_frames(DEVICE).unwrap();
    for _ in 0..6 {
        frames.next().await.unwrap().unwrap();
    }
    dispatcher.stop_streaming(DEVICE).await;

    let gaps = gaps(&direct);
    assert!(gaps.len() >= 5);
    for gap in gaps {
        assert!(
            gap >= Duration::from_millis(99) && gap <= Duration::from_millis(101),
            "fetch period {:?} should track 100ms",
            gap
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_slow_fetches_run_back_to_back() {
    let inference = Arc::new(MockProvider::new("inference"));
    let direct = Arc::new(MockProvider::new("direct").with_fetch_delay(Duration::from_millis(150)));
    let dispatcher = dispatcher(&inference, &direct);

    dispatcher
        .setup_streaming(DEVICE, Roi::full(SENSOR), StreamingMode::ImageOnly, InferenceKind::Generic, 10)
        .await
        .unwrap();
    let mut frames = dispatcher.get_device_stream_as_frames(DEVICE).unwrap();
    for _ in 0..4 {
        frames.next().await.unwrap().unwrap();
    }
    dispatcher.stop_streaming(DEVICE).await;

    for gap in gaps(&direct) {
        assert!(gap >= Duration::from_millis(150) && gap <= Duration::from_millis(151));
    }
}

#[tokio::test(start_paused = true)]
async fn test_in_flight_fetch_is_discarded_on_stop() {
    let inference = Arc::new(MockProvider::new("inference"));
    let direct = Arc::new(MockProvider::new("direct").with_fetch_delay(Duration::from_millis(50)));
    let dispatcher = dispatcher(&inference, &direct);

    dispatcher
        .setup_streaming(DEVICE, Roi::full(SENSOR), StreamingMode::Preview, InferenceKind::Generic, 30)
        .await
        .unwrap();
    let mut frames = dispatcher.get_device_stream_as_frames(DEVICE).unwrap();

    // Let the first fetch start, then stop while it is in flight
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(direct.fetch_calls(), 1);
    dispatcher.stop_streaming(DEVICE).await;

    // The loop drops the result and exits, closing the sequence
    assert!(frames.next().await.is_none());
    assert_eq!(direct.fetch_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_errors_flow_through_the_sequence() {
    let inference = Arc::new(MockProvider::new("inference").with_script(vec![
        Err(FetchError::NoNewData),
        Err(FetchError::Transport {
            message: "connection refused".into(),
        }),
    ]));
    let direct = Arc::new(MockProvider::new("direct"));
    let dispatcher = dispatcher(&inference, &direct);

    dispatcher
        .setup_streaming(
            DEVICE,
            Roi::full(SENSOR),
            StreamingMode::ImageAndInferenceResult,
            InferenceKind::Detection,
            30,
        )
        .await
        .unwrap();
    let mut frames = dispatcher.get_device_stream_as_frames(DEVICE).unwrap();

    assert_eq!(frames.next().await.unwrap().unwrap_err(), FetchError::NoNewData);
    assert!(matches!(frames.next().await.unwrap(), Err(FetchError::Transport { .. })));
    assert!(frames.next().await.unwrap().is_ok());
    dispatcher.stop_streaming(DEVICE).await;
}

#[tokio::test(start_paused = true)]
async fn test_second_setup_replaces_the_session() {
    let (inference, direct) = providers();
    let dispatcher = dispatcher(&inference, &direct);

    dispatcher
        .setup_streaming(DEVICE, Roi::full(SENSOR), StreamingMode::ImageOnly, InferenceKind::Generic, 30)
        .await
        .unwrap();
    dispatcher
        .setup_streaming(
            DEVICE,
            Roi::full(SENSOR),
            StreamingMode::InferenceResult,
            InferenceKind::Detection,
            30,
        )
        .await
        .unwrap();

    assert_eq!(dispatcher.get_streaming_mode(DEVICE), Some(StreamingMode::InferenceResult));
    assert_eq!(dispatcher.streaming_devices(), vec![DEVICE]);

    dispatcher.stop_streaming(DEVICE).await;
    assert_eq!(inference.teardown_calls(), 1);
    assert_eq!(direct.teardown_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_failed_init_binds_nothing() {
    let inference = Arc::new(MockProvider::new("inference"));
    let direct = Arc::new(MockProvider::new("direct").failing_init());
    let dispatcher = dispatcher(&inference, &direct);

    let result = dispatcher
        .setup_streaming(DEVICE, Roi::full(SENSOR), StreamingMode::ImageOnly, InferenceKind::Generic, 30)
        .await;
    assert!(matches!(result, Err(ConsoleError::Setup { device_id: DEVICE, .. })));
    assert!(!dispatcher.is_device_streaming(DEVICE));
    assert_eq!(direct.fetch_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_teardown_failure_is_swallowed() {
    let inference = Arc::new(MockProvider::new("inference"));
    let direct = Arc::new(MockProvider::new("direct").failing_teardown());
    let dispatcher = dispatcher(&inference, &direct);

    dispatcher
        .setup_streaming(DEVICE, Roi::full(SENSOR), StreamingMode::ImageOnly, InferenceKind::Generic, 30)
        .await
        .unwrap();
    dispatcher.stop_streaming(DEVICE).await;

    assert!(!dispatcher.is_device_streaming(DEVICE));
    assert_eq!(direct.teardown_calls(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_first_item_reaches_first_subscriber() {
    for _ in 0..50 {
        let (inference, direct) = providers();
        let dispatcher = dispatcher(&inference, &direct);

        dispatcher
            .setup_streaming(DEVICE, Roi::full(SENSOR), StreamingMode::ImageOnly, InferenceKind::Generic, 30)
            .await
            .unwrap();
        assert!(dispatcher.is_device_streaming(DEVICE));

        let mut frames = dispatcher.get_device_stream_as_frames(DEVICE).unwrap();
        let first = frames.next().await.unwrap().unwrap();
        assert_eq!(first.identifier, format!("{}-0", DEVICE));

        dispatcher.stop_streaming(DEVICE).await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_later_subscriber_sees_only_new_items() {
    let (inference, direct) = providers();
    let dispatcher = dispatcher(&inference, &direct);

    dispatcher
        .setup_streaming(DEVICE, Roi::full(SENSOR), StreamingMode::ImageOnly, InferenceKind::Generic, 10)
        .await
        .unwrap();
    let mut first = dispatcher.get_device_stream_as_frames(DEVICE).unwrap();
    assert_eq!(first.next().await.unwrap().unwrap().identifier, format!("{}-0", DEVICE));

    let mut late = dispatcher.get_device_stream_as_frames(DEVICE).unwrap();
    assert_eq!(late.next().await.unwrap().unwrap().identifier, format!("{}-1", DEVICE));
    dispatcher.stop_streaming(DEVICE).await;
}

#[tokio::test(start_paused = true)]
async fn test_stop_all_tears_down_concurrently() {
    let inference = Arc::new(MockProvider::new("inference").with_teardown_delay(Duration::from_millis(200)));
    let direct = Arc::new(MockProvider::new("direct").with_teardown_delay(Duration::from_millis(200)));
    let dispatcher = dispatcher(&inference, &direct);

    dispatcher
        .setup_streaming(1, Roi::full(SENSOR), StreamingMode::ImageOnly, InferenceKind::Generic, 30)
        .await
        .unwrap();
    dispatcher
        .setup_streaming(2, Roi::full(SENSOR), StreamingMode::Preview, InferenceKind::Generic, 30)
        .await
        .unwrap();
    dispatcher
        .setup_streaming(3, Roi::full(SENSOR), StreamingMode::InferenceResult, InferenceKind::Detection, 30)
        .await
        .unwrap();
    assert_eq!(dispatcher.streaming_devices(), vec![1, 2, 3]);

    let started = tokio::time::Instant::now();
    dispatcher.stop_all().await;
    let took = started.elapsed();

    assert!(dispatcher.streaming_devices().is_empty());
    assert_eq!(direct.teardown_calls(), 2);
    assert_eq!(inference.teardown_calls(), 1);
    assert!(
        took < Duration::from_millis(400),
        "three 200ms teardowns took {:?}",
        took
    );
}
