//! Acquisition session
//!
//! A session owns every resource of one acquisition run: the camera SDK, the
//! camera, the optional color processor with its SDK, and the sink. Each
//! resource is recorded on a stage stack as it is acquired. Teardown pops the
//! stack, so partial openings only release what they acquired and a full
//! session always unwinds as
//!
//! disarm → release sink → dispose color processor → dispose color SDK →
//! close camera → dispose camera SDK.

use std::fmt;

use tracing::{debug, error, info, instrument, warn};

use crate::acquisition::acquisition_loop::{AcquisitionLoop, LoopSummary};
use crate::acquisition::camera::{Camera, CameraProperties, CameraSdk, CameraSettings};
use crate::acquisition::color::{ChannelOrder, ColorProcessor, ColorProcessorParams, ColorProcessorSdk};
use crate::acquisition::common::error::{AcquisitionError, Result};
use crate::acquisition::common::stop::StopSignal;
use crate::acquisition::convert::{ConversionPolicy, Normalization};
use crate::acquisition::sink::{FrameSink, SinkSpec};

/// A resource held by a session, in acquisition order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    CameraSdk,
    Camera,
    ColorSdk,
    ColorProcessor,
    Sink,
    Armed,
}

impl Stage {
    pub fn resource(self) -> &'static str {
        match self {
            Stage::CameraSdk => "camera sdk",
            Stage::Camera => "camera",
            Stage::ColorSdk => "color processor sdk",
            Stage::ColorProcessor => "color processor",
            Stage::Sink => "sink",
            Stage::Armed => "camera acquisition",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.resource())
    }
}

/// Outcome of unwinding a session.
#[derive(Debug, Default)]
pub struct TeardownReport {
    /// Stages in the order they were released
    pub released: Vec<Stage>,
    pub failures: Vec<(Stage, AcquisitionError)>,
}

impl TeardownReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// How a session configures the camera and converts its frames.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub settings: CameraSettings,
    /// Used for monochrome sensors only
    pub normalization: Normalization,
    /// Used for color sensors only
    pub channel_order: ChannelOrder,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            settings: CameraSettings::default(),
            normalization: Normalization::BitShift,
            channel_order: ChannelOrder::Bgr,
        }
    }
}

pub struct Session<S: CameraSdk, C: ColorProcessorSdk, K: FrameSink> {
    sdk: Option<S>,
    camera: Option<S::Camera>,
    color_sdk: Option<C>,
    processor: Option<C::Processor>,
    sink: Option<K>,
    properties: Option<CameraProperties>,
    policy: ConversionPolicy,
    stages: Vec<Stage>,
}

impl<S: CameraSdk, C: ColorProcessorSdk, K: FrameSink> Session<S, C, K> {
    /// Opens the first discovered camera, arms it and issues a software trigger.
    ///
    /// `make_color_sdk` is only called for color sensors. `open_sink` receives the
    /// frame geometry and rate once the camera is known. On any failure the
    /// stages acquired so far are released before the error is returned.
    #[instrument(skip_all)]
    pub fn open<F, G>(sdk: S, options: &SessionOptions, make_color_sdk: F, open_sink: G) -> Result<Self>
    where
        F: FnOnce() -> Result<C>,
        G: FnOnce(&SinkSpec) -> Result<K>,
    {
        let mut session = Self {
            sdk: Some(sdk),
            camera: None,
            color_sdk: None,
            processor: None,
            sink: None,
            properties: None,
            policy: ConversionPolicy::Mono(options.normalization),
            stages: vec![Stage::CameraSdk],
        };

        match session.acquire(options, make_color_sdk, open_sink) {
            Ok(()) => Ok(session),
            Err(e) => {
                error!("Failed to open session: {}", e);
                session.teardown();
                Err(e)
            }
        }
    }

    fn acquire<F, G>(&mut self, options: &SessionOptions, make_color_sdk: F, open_sink: G) -> Result<()>
    where
        F: FnOnce() -> Result<C>,
        G: FnOnce(&SinkSpec) -> Result<K>,
    {
        let sdk = self
            .sdk
            .as_mut()
            .ok_or_else(|| AcquisitionError::Camera("camera sdk already disposed".to_string()))?;

        let cameras = sdk.discover_cameras()?;
        let Some(camera_id) = cameras.first() else {
            error!("Error: no cameras detected!");
            return Err(AcquisitionError::DeviceNotFound);
        };
        info!(camera = %camera_id, available = cameras.len(), "Opening camera");

        let camera = self.camera.insert(sdk.open_camera(camera_id)?);
        self.stages.push(Stage::Camera);

        camera.configure(&options.settings)?;
        let properties = camera.properties().clone();
        self.policy = ConversionPolicy::for_sensor(
            properties.sensor_type,
            options.normalization,
            options.channel_order,
        );
        info!(
            model = %properties.model,
            width = properties.width,
            height = properties.height,
            bit_depth = properties.bit_depth,
            sensor = %properties.sensor_type,
            policy = ?self.policy,
            "Camera configured"
        );

        if properties.sensor_type.is_color() {
            let color_sdk = self.color_sdk.insert(make_color_sdk()?);
            self.stages.push(Stage::ColorSdk);

            let mut processor =
                color_sdk.create_processor(&ColorProcessorParams::from_properties(&properties))?;
            processor.set_output_order(options.channel_order);
            self.processor = Some(processor);
            self.stages.push(Stage::ColorProcessor);
        }

        let spec = SinkSpec {
            width: properties.width,
            height: properties.height,
            frame_rate_hz: options
                .settings
                .frame_rate_control
                .unwrap_or(properties.frame_rate_hz),
            is_color: properties.sensor_type.is_color(),
        };
        self.sink = Some(open_sink(&spec)?);
        self.stages.push(Stage::Sink);

        camera.arm(options.settings.buffer_depth)?;
        self.stages.push(Stage::Armed);
        camera.issue_software_trigger()?;

        self.properties = Some(properties);
        Ok(())
    }

    pub fn properties(&self) -> Option<&CameraProperties> {
        self.properties.as_ref()
    }

    pub fn policy(&self) -> ConversionPolicy {
        self.policy
    }

    pub fn has_color_processor(&self) -> bool {
        self.processor.is_some()
    }

    /// Stages currently held, in acquisition order.
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Runs the loop over this session's camera, processor and sink.
    pub fn run(&mut self, acquisition: &AcquisitionLoop, stop: &StopSignal) -> Result<LoopSummary> {
        if self.stages.last() != Some(&Stage::Armed) {
            return Err(AcquisitionError::Camera("session is not armed".to_string()));
        }
        let (Some(camera), Some(sink)) = (self.camera.as_mut(), self.sink.as_mut()) else {
            return Err(AcquisitionError::Camera("session is closed".to_string()));
        };
        acquisition.run(camera, self.policy, self.processor.as_mut(), sink, stop)
    }

    /// Runs the loop, then tears the session down whatever the outcome.
    ///
    /// Teardown failures are logged and never replace the loop's result.
    pub fn run_and_close(mut self, acquisition: &AcquisitionLoop, stop: &StopSignal) -> Result<LoopSummary> {
        let result = self.run(acquisition, stop);
        let report = self.teardown();
        if !report.is_clean() {
            warn!(failures = report.failures.len(), "Session closed with disposal failures");
        }
        result
    }

    /// Releases every held stage in reverse acquisition order.
    pub fn close(mut self) -> TeardownReport {
        self.teardown()
    }

    fn teardown(&mut self) -> TeardownReport {
        let mut report = TeardownReport::default();

        while let Some(stage) = self.stages.pop() {
            let result = match stage {
                Stage::Armed => self.camera.as_mut().map_or(Ok(()), |camera| camera.disarm()),
                Stage::Sink => self.sink.take().map_or(Ok(()), |mut sink| sink.release()),
                Stage::ColorProcessor => self.processor.take().map_or(Ok(()), |p| p.dispose()),
                Stage::ColorSdk => self.color_sdk.take().map_or(Ok(()), |sdk| sdk.dispose()),
                Stage::Camera => self.camera.take().map_or(Ok(()), |camera| camera.close()),
                Stage::CameraSdk => self.sdk.take().map_or(Ok(()), |sdk| sdk.dispose()),
            };

            match result {
                Ok(()) => debug!(resource = stage.resource(), "Released"),
                Err(e) => {
                    let failure = match e {
                        e @ AcquisitionError::DisposalFailure { .. } => e,
                        other => AcquisitionError::disposal(stage.resource(), other),
                    };
                    warn!("{}", failure);
                    report.failures.push((stage, failure));
                }
            }
            report.released.push(stage);
        }

        report
    }
}

impl<S: CameraSdk, C: ColorProcessorSdk, K: FrameSink> Drop for Session<S, C, K> {
    fn drop(&mut self) {
        if !self.stages.is_empty() {
            warn!("Session dropped without close, releasing resources");
            self.teardown();
        }
    }
}
