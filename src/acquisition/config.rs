//! Acquisition configuration types

use std::path::PathBuf;
use std::time::Duration;

use crate::acquisition::acquisition_loop::{AcquisitionLoop, RunMode};
use crate::acquisition::camera::CameraSettings;
use crate::acquisition::color::ChannelOrder;
use crate::acquisition::convert::Normalization;
use crate::acquisition::session::SessionOptions;
use crate::acquisition::sink::{ExportFormat, TiffCompression};
#[cfg(feature = "mp4")]
use crate::acquisition::sink::VideoCodec;

const DEFAULT_FRAME_COUNT: usize = 200;
const DEFAULT_EXPORT_TIMEOUT: Duration = Duration::from_millis(2000);
const DEFAULT_LIVE_TIMEOUT: Duration = Duration::from_millis(1000);
const DEFAULT_BUFFER_DEPTH: u32 = 2;
const DEFAULT_LIVE_EXPOSURE_US: u32 = 1000;
const DEFAULT_LIVE_FRAME_RATE: f64 = 10.0;

#[cfg(feature = "mp4")]
const DEFAULT_EXPORT_FORMAT: ExportFormat = ExportFormat::Mp4(VideoCodec::Mpeg4Part2);
#[cfg(feature = "mp4")]
const DEFAULT_EXPORT_FILENAME: &str = "video.mp4";
#[cfg(not(feature = "mp4"))]
const DEFAULT_EXPORT_FORMAT: ExportFormat = ExportFormat::TiffStack;
#[cfg(not(feature = "mp4"))]
const DEFAULT_EXPORT_FILENAME: &str = "video.tif";

/// Configuration for a bounded capture written to a file
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Number of frames to capture
    pub frame_count: usize,
    /// Output file; an existing file is replaced
    pub output: PathBuf,
    pub format: ExportFormat,
    /// Compression for TIFF stacks
    pub compression: TiffCompression,
    /// Predictor for TIFF compression (2 for horizontal differencing)
    pub predictor: Option<u16>,
    /// A poll exceeding this aborts the export
    pub poll_timeout: Duration,
    pub buffer_depth: u32,
    /// Playback rate override; defaults to the camera frame rate
    pub frame_rate: Option<f64>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            frame_count: DEFAULT_FRAME_COUNT,
            output: PathBuf::from(DEFAULT_EXPORT_FILENAME),
            format: DEFAULT_EXPORT_FORMAT,
            compression: TiffCompression::None,
            predictor: None,
            poll_timeout: DEFAULT_EXPORT_TIMEOUT,
            buffer_depth: DEFAULT_BUFFER_DEPTH,
            frame_rate: None,
        }
    }
}

impl ExportConfig {
    pub fn builder() -> ExportConfigBuilder {
        ExportConfigBuilder::default()
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            settings: CameraSettings {
                exposure_time_us: None,
                frames_per_trigger: 0,
                frame_rate_control: self.frame_rate,
                buffer_depth: self.buffer_depth,
            },
            normalization: Normalization::BitShift,
            channel_order: ChannelOrder::Bgr,
        }
    }

    pub fn acquisition_loop(&self) -> AcquisitionLoop {
        AcquisitionLoop::new(RunMode::Bounded(self.frame_count), self.poll_timeout)
    }
}

/// Builder for ExportConfig
#[derive(Default)]
pub struct ExportConfigBuilder {
    frame_count: Option<usize>,
    output: Option<PathBuf>,
    format: Option<ExportFormat>,
    compression: Option<TiffCompression>,
    predictor: Option<Option<u16>>,
    poll_timeout: Option<Duration>,
    buffer_depth: Option<u32>,
    frame_rate: Option<Option<f64>>,
}

impl ExportConfigBuilder {
    pub fn frame_count(mut self, frame_count: usize) -> Self {
        self.frame_count = Some(frame_count);
        self
    }

    pub fn output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn format(mut self, format: ExportFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn compression(mut self, compression: TiffCompression) -> Self {
        self.compression = Some(compression);
        self
    }

    pub fn predictor(mut self, predictor: Option<u16>) -> Self {
        self.predictor = Some(predictor);
        self
    }

    pub fn poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = Some(timeout);
        self
    }

    pub fn buffer_depth(mut self, depth: u32) -> Self {
        self.buffer_depth = Some(depth);
        self
    }

    pub fn frame_rate(mut self, frame_rate: Option<f64>) -> Self {
        self.frame_rate = Some(frame_rate);
        self
    }

    pub fn build(self) -> ExportConfig {
        let default = ExportConfig::default();
        ExportConfig {
            frame_count: self.frame_count.unwrap_or(default.frame_count),
            output: self.output.unwrap_or(default.output),
            format: self.format.unwrap_or(default.format),
            compression: self.compression.unwrap_or(default.compression),
            predictor: self.predictor.unwrap_or(default.predictor),
            poll_timeout: self.poll_timeout.unwrap_or(default.poll_timeout),
            buffer_depth: self.buffer_depth.unwrap_or(default.buffer_depth),
            frame_rate: self.frame_rate.unwrap_or(default.frame_rate),
        }
    }
}

/// Configuration for the unbounded live view
#[derive(Debug, Clone)]
pub struct LiveConfig {
    pub exposure_time_us: u32,
    pub frame_rate: f64,
    /// An empty poll is logged and skipped
    pub poll_timeout: Duration,
    pub buffer_depth: u32,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            exposure_time_us: DEFAULT_LIVE_EXPOSURE_US,
            frame_rate: DEFAULT_LIVE_FRAME_RATE,
            poll_timeout: DEFAULT_LIVE_TIMEOUT,
            buffer_depth: DEFAULT_BUFFER_DEPTH,
        }
    }
}

impl LiveConfig {
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            settings: CameraSettings {
                exposure_time_us: Some(self.exposure_time_us),
                frames_per_trigger: 0,
                frame_rate_control: Some(self.frame_rate),
                buffer_depth: self.buffer_depth,
            },
            normalization: Normalization::MinMax,
            channel_order: ChannelOrder::Rgb,
        }
    }

    pub fn acquisition_loop(&self) -> AcquisitionLoop {
        AcquisitionLoop::new(RunMode::Unbounded, self.poll_timeout)
    }
}
