use std::collections::VecDeque;
use std::fs::File;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tiff::decoder::Decoder;

use crate::acquisition::camera::types::IDENTITY_MATRIX;
use crate::acquisition::camera::{
    Camera, CameraProperties, CameraSdk, CameraSettings, FilterPhase, Frame, SensorType,
    SimulatedCameraConfig, SimulatedSdk,
};
use crate::acquisition::color::{ChannelOrder, ColorProcessor, ColorProcessorParams, ColorProcessorSdk};
use crate::acquisition::config::{ExportConfig, LiveConfig};
use crate::acquisition::convert::{Normalization, PixelLayout, ProcessedImage};
use crate::acquisition::modes::{describe_cameras, export, live_view_with_sink};
use crate::acquisition::sink::{ExportFormat, FrameSink, SinkSpec};
use crate::acquisition::{
    AcquisitionError, AcquisitionLoop, Result, RunMode, Session, SessionOptions, Stage, StopSignal,
};

type Log = Arc<Mutex<Vec<String>>>;

const TEARDOWN_EVENTS: [&str; 6] = [
    "camera.disarm",
    "sink.release",
    "processor.dispose",
    "color_sdk.dispose",
    "camera.close",
    "sdk.dispose",
];

fn record(log: &Log, event: &str) {
    log.lock().unwrap().push(event.to_string());
}

fn teardown_events(log: &Log) -> Vec<String> {
    log.lock()
        .unwrap()
        .iter()
        .filter(|e| TEARDOWN_EVENTS.contains(&e.as_str()))
        .cloned()
        .collect()
}

fn count(log: &Log, event: &str) -> usize {
    log.lock().unwrap().iter().filter(|e| *e == event).count()
}

#[derive(Clone, Default)]
struct Failures {
    open_camera: bool,
    camera_close: bool,
    sdk_dispose: bool,
}

struct MockSdk {
    log: Log,
    cameras: Vec<String>,
    properties: CameraProperties,
    polls: Vec<Option<Frame>>,
    failures: Failures,
}

impl CameraSdk for MockSdk {
    type Camera = MockCamera;

    fn discover_cameras(&mut self) -> Result<Vec<String>> {
        record(&self.log, "sdk.discover");
        Ok(self.cameras.clone())
    }

    fn open_camera(&mut self, _camera_id: &str) -> Result<MockCamera> {
        if self.failures.open_camera {
            return Err(AcquisitionError::Camera("Mock open error".to_string()));
        }
        record(&self.log, "camera.open");
        Ok(MockCamera {
            log: self.log.clone(),
            properties: self.properties.clone(),
            polls: std::mem::take(&mut self.polls).into(),
            close_fails: self.failures.camera_close,
        })
    }

    fn dispose(self) -> Result<()> {
        record(&self.log, "sdk.dispose");
        if self.failures.sdk_dispose {
            return Err(AcquisitionError::Camera("Mock dispose error".to_string()));
        }
        Ok(())
    }
}

struct MockCamera {
    log: Log,
    properties: CameraProperties,
    polls: VecDeque<Option<Frame>>,
    close_fails: bool,
}

impl Camera for MockCamera {
    fn properties(&self) -> &CameraProperties {
        &self.properties
    }

    fn configure(&mut self, _settings: &CameraSettings) -> Result<()> {
        record(&self.log, "camera.configure");
        Ok(())
    }

    fn arm(&mut self, _buffer_depth: u32) -> Result<()> {
        record(&self.log, "camera.arm");
        Ok(())
    }

    fn issue_software_trigger(&mut self) -> Result<()> {
        record(&self.log, "camera.trigger");
        Ok(())
    }

    fn poll_frame(&mut self, _timeout: Duration) -> Result<Option<Frame>> {
        // An exhausted script fails instead of looping forever
        self.polls
            .pop_front()
            .ok_or_else(|| AcquisitionError::Camera("Mock poll script exhausted".to_string()))
    }

    fn disarm(&mut self) -> Result<()> {
        record(&self.log, "camera.disarm");
        Ok(())
    }

    fn close(self) -> Result<()> {
        record(&self.log, "camera.close");
        if self.close_fails {
            return Err(AcquisitionError::Camera("Mock close error".to_string()));
        }
        Ok(())
    }
}

struct MockColorSdk {
    log: Log,
}

impl ColorProcessorSdk for MockColorSdk {
    type Processor = MockProcessor;

    fn create_processor(&mut self, _params: &ColorProcessorParams) -> Result<MockProcessor> {
        record(&self.log, "color_sdk.create");
        Ok(MockProcessor {
            log: self.log.clone(),
            order: ChannelOrder::Rgb,
        })
    }

    fn dispose(self) -> Result<()> {
        record(&self.log, "color_sdk.dispose");
        Ok(())
    }
}

struct MockProcessor {
    log: Log,
    order: ChannelOrder,
}

impl ColorProcessor for MockProcessor {
    fn set_output_order(&mut self, order: ChannelOrder) {
        self.order = order;
    }

    fn output_order(&self) -> ChannelOrder {
        self.order
    }

    fn transform_to_24(&mut self, raw: &[u16], width: usize, height: usize) -> Result<Vec<u8>> {
        assert_eq!(raw.len(), width * height);
        Ok(vec![7u8; width * height * 3])
    }

    fn dispose(self) -> Result<()> {
        record(&self.log, "processor.dispose");
        Ok(())
    }
}

struct MockSink {
    log: Log,
    written: Arc<Mutex<Vec<ProcessedImage>>>,
    stop_after: Option<(usize, StopSignal)>,
    stop_on_idle: Option<StopSignal>,
}

impl FrameSink for MockSink {
    fn write(&mut self, image: &ProcessedImage) -> Result<()> {
        record(&self.log, "sink.write");
        let mut written = self.written.lock().unwrap();
        written.push(image.clone());
        if let Some((limit, stop)) = &self.stop_after
            && written.len() >= *limit
        {
            stop.raise();
        }
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        record(&self.log, "sink.release");
        Ok(())
    }

    fn idle(&mut self) -> Result<()> {
        record(&self.log, "sink.idle");
        if let Some(stop) = &self.stop_on_idle {
            stop.raise();
        }
        Ok(())
    }
}

fn properties(sensor_type: SensorType) -> CameraProperties {
    CameraProperties {
        model: "MOCK".to_string(),
        serial: "M001".to_string(),
        width: 4,
        height: 2,
        bit_depth: 12,
        frame_rate_hz: 30.0,
        sensor_type,
        filter_phase: FilterPhase::BayerRed,
        color_correction_matrix: IDENTITY_MATRIX,
        default_white_balance_matrix: IDENTITY_MATRIX,
    }
}

fn frame(number: u64) -> Frame {
    Frame {
        width: 4,
        height: 2,
        data: (0..8).map(|i| (i * 512 + number as u16) % 4096).collect(),
        bit_depth: 12,
        frame_number: number,
    }
}

fn frames(n: u64) -> Vec<Option<Frame>> {
    (0..n).map(|i| Some(frame(i))).collect()
}

fn mock_sdk(log: &Log, sensor_type: SensorType, polls: Vec<Option<Frame>>) -> MockSdk {
    MockSdk {
        log: log.clone(),
        cameras: vec!["M001".to_string()],
        properties: properties(sensor_type),
        polls,
        failures: Failures::default(),
    }
}

struct Harness {
    log: Log,
    written: Arc<Mutex<Vec<ProcessedImage>>>,
}

impl Harness {
    fn new() -> Self {
        Self {
            log: Arc::new(Mutex::new(Vec::new())),
            written: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn open(
        &self,
        sdk: MockSdk,
        options: &SessionOptions,
        sink_fails: bool,
        stop_after: Option<(usize, StopSignal)>,
    ) -> Result<Session<MockSdk, MockColorSdk, MockSink>> {
        let log = self.log.clone();
        let written = self.written.clone();
        Session::open(
            sdk,
            options,
            || Ok(MockColorSdk { log: self.log.clone() }),
            move |_spec: &SinkSpec| {
                if sink_fails {
                    return Err(AcquisitionError::SinkWrite("Mock sink open error".to_string()));
                }
                record(&log, "sink.open");
                Ok(MockSink {
                    log,
                    written,
                    stop_after,
                    stop_on_idle: None,
                })
            },
        )
    }
}

fn bounded(n: usize) -> AcquisitionLoop {
    AcquisitionLoop::new(RunMode::Bounded(n), Duration::from_millis(10))
}

fn unbounded() -> AcquisitionLoop {
    AcquisitionLoop::new(RunMode::Unbounded, Duration::from_millis(10))
}

#[test]
fn test_bounded_run_writes_exactly_n_frames() {
    let harness = Harness::new();
    let sdk = mock_sdk(&harness.log, SensorType::Monochrome, frames(5));

    let session = harness.open(sdk, &SessionOptions::default(), false, None).unwrap();
    assert!(!session.has_color_processor());

    let summary = session.run_and_close(&bounded(3), &StopSignal::new()).unwrap();

    assert_eq!(summary.frames_delivered, 3);
    assert_eq!(count(&harness.log, "sink.write"), 3);
    assert_eq!(
        teardown_events(&harness.log),
        ["camera.disarm", "sink.release", "camera.close", "sdk.dispose"]
    );
    assert_eq!(count(&harness.log, "color_sdk.create"), 0);
}

#[test]
fn test_bounded_zero_frames_writes_nothing() {
    let harness = Harness::new();
    let sdk = mock_sdk(&harness.log, SensorType::Monochrome, Vec::new());

    let session = harness.open(sdk, &SessionOptions::default(), false, None).unwrap();
    let summary = session.run_and_close(&bounded(0), &StopSignal::new()).unwrap();

    assert_eq!(summary.frames_delivered, 0);
    assert_eq!(count(&harness.log, "sink.write"), 0);
    assert_eq!(count(&harness.log, "sdk.dispose"), 1);
}

#[test]
fn test_open_order_arms_after_sink() {
    let harness = Harness::new();
    let sdk = mock_sdk(&harness.log, SensorType::Monochrome, Vec::new());

    let session = harness.open(sdk, &SessionOptions::default(), false, None).unwrap();
    assert_eq!(
        session.stages(),
        [Stage::CameraSdk, Stage::Camera, Stage::Sink, Stage::Armed]
    );
    drop(session);

    let log = harness.log.lock().unwrap().clone();
    assert_eq!(
        &log[..6],
        [
            "sdk.discover",
            "camera.open",
            "camera.configure",
            "sink.open",
            "camera.arm",
            "camera.trigger"
        ]
    );
}

#[test]
fn test_color_sensor_gets_processor_and_full_teardown() {
    let harness = Harness::new();
    let sdk = mock_sdk(&harness.log, SensorType::Bayer, frames(2));

    let session = harness.open(sdk, &SessionOptions::default(), false, None).unwrap();
    assert!(session.has_color_processor());
    assert_eq!(session.policy().layout(), PixelLayout::Bgr8);

    session.run_and_close(&bounded(2), &StopSignal::new()).unwrap();

    assert_eq!(count(&harness.log, "color_sdk.create"), 1);
    assert_eq!(teardown_events(&harness.log), TEARDOWN_EVENTS);
    let written = harness.written.lock().unwrap();
    assert!(written.iter().all(|image| image.layout == PixelLayout::Bgr8));
    assert_eq!(written[0].data.len(), 4 * 2 * 3);
}

#[test]
fn test_mono_sensor_uses_selected_normalization() {
    let harness = Harness::new();
    let sdk = mock_sdk(&harness.log, SensorType::Monochrome, frames(1));
    let options = SessionOptions {
        normalization: Normalization::MinMax,
        ..SessionOptions::default()
    };

    let session = harness.open(sdk, &options, false, None).unwrap();
    session.run_and_close(&bounded(1), &StopSignal::new()).unwrap();

    let written = harness.written.lock().unwrap();
    assert_eq!(written[0].layout, PixelLayout::Gray8);
    assert_eq!(written[0].data.iter().min(), Some(&0));
    assert_eq!(written[0].data.iter().max(), Some(&255));
}

#[test]
fn test_timeout_before_target_is_fatal() {
    let harness = Harness::new();
    let mut polls = frames(2);
    polls.push(None);
    let sdk = mock_sdk(&harness.log, SensorType::Monochrome, polls);

    let session = harness.open(sdk, &SessionOptions::default(), false, None).unwrap();
    let result = session.run_and_close(&bounded(5), &StopSignal::new());

    assert!(matches!(
        result,
        Err(AcquisitionError::FrameTimeout { frames_written: 2, .. })
    ));
    assert_eq!(count(&harness.log, "sink.write"), 2);
    assert_eq!(
        teardown_events(&harness.log),
        ["camera.disarm", "sink.release", "camera.close", "sdk.dispose"]
    );
}

#[test]
fn test_unbounded_skips_empty_polls() {
    let harness = Harness::new();
    let stop = StopSignal::new();
    let polls = vec![None, Some(frame(0)), None, None, Some(frame(1)), Some(frame(2))];
    let sdk = mock_sdk(&harness.log, SensorType::Monochrome, polls);

    let session = harness
        .open(sdk, &SessionOptions::default(), false, Some((3, stop.clone())))
        .unwrap();
    let summary = session.run_and_close(&unbounded(), &stop).unwrap();

    assert_eq!(summary.frames_delivered, 3);
    assert_eq!(summary.empty_polls, 3);
    assert_eq!(count(&harness.log, "sink.write"), 3);
    assert_eq!(count(&harness.log, "sdk.dispose"), 1);
}

#[test]
fn test_interrupt_in_bounded_mode() {
    let harness = Harness::new();
    let stop = StopSignal::new();
    let sdk = mock_sdk(&harness.log, SensorType::Bayer, frames(10));

    let session = harness
        .open(sdk, &SessionOptions::default(), false, Some((2, stop.clone())))
        .unwrap();
    let result = session.run_and_close(&bounded(10), &stop);

    assert!(matches!(
        result,
        Err(AcquisitionError::Interrupted { frames_written: 2 })
    ));
    assert_eq!(teardown_events(&harness.log), TEARDOWN_EVENTS);
}

#[test]
fn test_interrupt_in_unbounded_mode_is_clean() {
    let harness = Harness::new();
    let stop = StopSignal::new();
    stop.raise();
    let sdk = mock_sdk(&harness.log, SensorType::Monochrome, Vec::new());

    let session = harness.open(sdk, &SessionOptions::default(), false, None).unwrap();
    let summary = session.run_and_close(&unbounded(), &stop).unwrap();

    assert_eq!(summary.frames_delivered, 0);
    assert_eq!(count(&harness.log, "camera.disarm"), 1);
    assert_eq!(
        teardown_events(&harness.log),
        ["camera.disarm", "sink.release", "camera.close", "sdk.dispose"]
    );
}

#[test]
fn test_unbounded_run_stops_from_sink_while_camera_is_silent() {
    let harness = Harness::new();
    let stop = StopSignal::new();
    let sdk = mock_sdk(&harness.log, SensorType::Monochrome, vec![None, None, None]);

    let log = harness.log.clone();
    let idle_stop = stop.clone();
    let session = Session::open(
        sdk,
        &SessionOptions::default(),
        || Ok(MockColorSdk { log: harness.log.clone() }),
        move |_spec: &SinkSpec| {
            record(&log, "sink.open");
            Ok(MockSink {
                log,
                written: Arc::new(Mutex::new(Vec::new())),
                stop_after: None,
                stop_on_idle: Some(idle_stop),
            })
        },
    )
    .unwrap();
    let summary = session.run_and_close(&unbounded(), &stop).unwrap();

    assert_eq!(summary.frames_delivered, 0);
    assert_eq!(summary.empty_polls, 1);
    assert_eq!(count(&harness.log, "sink.idle"), 1);
    assert_eq!(count(&harness.log, "sink.write"), 0);
    assert_eq!(
        teardown_events(&harness.log),
        ["camera.disarm", "sink.release", "camera.close", "sdk.dispose"]
    );
}

#[test]
fn test_no_camera_detected() {
    let harness = Harness::new();
    let mut sdk = mock_sdk(&harness.log, SensorType::Monochrome, Vec::new());
    sdk.cameras.clear();

    let result = harness.open(sdk, &SessionOptions::default(), false, None);

    assert!(matches!(result, Err(AcquisitionError::DeviceNotFound)));
    assert_eq!(count(&harness.log, "camera.arm"), 0);
    assert_eq!(teardown_events(&harness.log), ["sdk.dispose"]);
}

#[test]
fn test_camera_open_failure_disposes_sdk() {
    let harness = Harness::new();
    let mut sdk = mock_sdk(&harness.log, SensorType::Monochrome, Vec::new());
    sdk.failures.open_camera = true;

    let result = harness.open(sdk, &SessionOptions::default(), false, None);

    assert!(matches!(result, Err(AcquisitionError::Camera(_))));
    assert_eq!(teardown_events(&harness.log), ["sdk.dispose"]);
}

#[test]
fn test_sink_open_failure_releases_only_acquired_stages() {
    let harness = Harness::new();
    let sdk = mock_sdk(&harness.log, SensorType::Bayer, Vec::new());

    let result = harness.open(sdk, &SessionOptions::default(), true, None);

    assert!(matches!(result, Err(AcquisitionError::SinkWrite(_))));
    assert_eq!(count(&harness.log, "camera.arm"), 0);
    assert_eq!(
        teardown_events(&harness.log),
        ["processor.dispose", "color_sdk.dispose", "camera.close", "sdk.dispose"]
    );
}

#[test]
fn test_disposal_failure_keeps_loop_error() {
    let harness = Harness::new();
    let mut sdk = mock_sdk(&harness.log, SensorType::Monochrome, vec![None]);
    sdk.failures.camera_close = true;
    sdk.failures.sdk_dispose = true;

    let session = harness.open(sdk, &SessionOptions::default(), false, None).unwrap();
    let result = session.run_and_close(&bounded(1), &StopSignal::new());

    assert!(matches!(result, Err(AcquisitionError::FrameTimeout { .. })));
    assert_eq!(
        teardown_events(&harness.log),
        ["camera.disarm", "sink.release", "camera.close", "sdk.dispose"]
    );
}

#[test]
fn test_close_reports_disposal_failures() {
    let harness = Harness::new();
    let mut sdk = mock_sdk(&harness.log, SensorType::Bayer, Vec::new());
    sdk.failures.camera_close = true;

    let session = harness.open(sdk, &SessionOptions::default(), false, None).unwrap();
    let report = session.close();

    assert!(!report.is_clean());
    assert_eq!(
        report.released,
        [
            Stage::Armed,
            Stage::Sink,
            Stage::ColorProcessor,
            Stage::ColorSdk,
            Stage::Camera,
            Stage::CameraSdk
        ]
    );
    assert_eq!(report.failures.len(), 1);
    assert!(matches!(
        report.failures[0],
        (Stage::Camera, AcquisitionError::DisposalFailure { resource: "camera", .. })
    ));
    assert_eq!(count(&harness.log, "sdk.dispose"), 1);
}

#[test]
fn test_dropped_session_releases_resources() {
    let harness = Harness::new();
    let sdk = mock_sdk(&harness.log, SensorType::Monochrome, Vec::new());

    let session = harness.open(sdk, &SessionOptions::default(), false, None).unwrap();
    drop(session);

    assert_eq!(
        teardown_events(&harness.log),
        ["camera.disarm", "sink.release", "camera.close", "sdk.dispose"]
    );
}

#[test]
fn test_frame_dimension_mismatch_is_rejected() {
    let harness = Harness::new();
    let mut odd = frame(0);
    odd.width = 2;
    odd.data.truncate(4);
    let sdk = mock_sdk(&harness.log, SensorType::Monochrome, vec![Some(odd)]);

    let session = harness.open(sdk, &SessionOptions::default(), false, None).unwrap();
    let result = session.run_and_close(&bounded(1), &StopSignal::new());

    assert!(matches!(result, Err(AcquisitionError::InvalidDimensions(2, 2))));
    assert_eq!(count(&harness.log, "sink.write"), 0);
}

fn count_pages(path: &Path) -> usize {
    let mut decoder = Decoder::new(File::open(path).unwrap()).unwrap();
    let mut pages = 1;
    while decoder.more_images() {
        decoder.next_image().unwrap();
        pages += 1;
    }
    pages
}

fn fast_camera(sensor_type: SensorType) -> SimulatedCameraConfig {
    SimulatedCameraConfig::builder()
        .dimensions(16, 8)
        .frame_rate_hz(500.0)
        .sensor_type(sensor_type)
        .build()
}

#[test]
fn test_export_simulated_camera_to_tiff() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("capture.tif");
    let config = ExportConfig::builder()
        .frame_count(4)
        .output(&output)
        .format(ExportFormat::TiffStack)
        .build();

    let sdk = SimulatedSdk::new(vec![fast_camera(SensorType::Monochrome)]);
    let summary = export(sdk, &config, &StopSignal::new()).unwrap();
    assert_eq!(summary.frames_delivered, 4);
    assert_eq!(count_pages(&output), 4);

    // A second run replaces the file
    let config = ExportConfig { frame_count: 2, ..config };
    let sdk = SimulatedSdk::new(vec![fast_camera(SensorType::Monochrome)]);
    export(sdk, &config, &StopSignal::new()).unwrap();
    assert_eq!(count_pages(&output), 2);
}

#[test]
fn test_export_color_camera_to_tiff() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("color.tif");
    let config = ExportConfig::builder()
        .frame_count(3)
        .output(&output)
        .format(ExportFormat::TiffStack)
        .build();

    let sdk = SimulatedSdk::new(vec![fast_camera(SensorType::Bayer)]);
    let summary = export(sdk, &config, &StopSignal::new()).unwrap();

    assert_eq!(summary.frames_delivered, 3);
    assert_eq!(count_pages(&output), 3);
}

#[test]
fn test_export_without_camera() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("none.tif");
    let config = ExportConfig::builder()
        .output(&output)
        .format(ExportFormat::TiffStack)
        .build();

    let result = export(SimulatedSdk::new(Vec::new()), &config, &StopSignal::new());

    assert!(matches!(result, Err(AcquisitionError::DeviceNotFound)));
    assert!(!output.exists());
}

#[cfg(not(feature = "mp4"))]
#[test]
fn test_mp4_export_requires_feature() {
    use crate::acquisition::sink::VideoCodec;

    let dir = tempfile::tempdir().unwrap();
    let config = ExportConfig::builder()
        .output(dir.path().join("video.mp4"))
        .format(ExportFormat::Mp4(VideoCodec::Mpeg4Part2))
        .build();

    let sdk = SimulatedSdk::new(vec![fast_camera(SensorType::Monochrome)]);
    let result = export(sdk, &config, &StopSignal::new());

    assert!(matches!(result, Err(AcquisitionError::UnsupportedFormat(_))));
}

#[test]
fn test_live_view_normalizes_until_stopped() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let written = Arc::new(Mutex::new(Vec::new()));
    let stop = StopSignal::new();
    let config = LiveConfig {
        frame_rate: 200.0,
        ..LiveConfig::default()
    };

    let sink = MockSink {
        log: log.clone(),
        written: written.clone(),
        stop_after: Some((2, stop.clone())),
        stop_on_idle: None,
    };
    let sdk = SimulatedSdk::new(vec![fast_camera(SensorType::Monochrome)]);
    let summary = live_view_with_sink(sdk, &config, &stop, |_| Ok(sink)).unwrap();

    assert_eq!(summary.frames_delivered, 2);
    assert_eq!(count(&log, "sink.release"), 1);
    for image in written.lock().unwrap().iter() {
        assert_eq!(image.layout, PixelLayout::Gray8);
        assert_eq!(image.data.iter().min(), Some(&0));
        assert_eq!(image.data.iter().max(), Some(&255));
    }
}

#[test]
fn test_describe_cameras() {
    let sdk = SimulatedSdk::new(vec![
        SimulatedCameraConfig::builder().serial("A1").build(),
        SimulatedCameraConfig::builder()
            .serial("B2")
            .sensor_type(SensorType::Bayer)
            .build(),
    ]);

    let cameras = describe_cameras(sdk).unwrap();

    assert_eq!(cameras.len(), 2);
    assert_eq!(cameras[0].serial, "A1");
    assert_eq!(cameras[1].sensor_type, SensorType::Bayer);
}
