//! Replay camera backed by a directory of RAW files.
//!
//! Every file `rawloader` can decode (ARW, CR2, NEF, DNG, ...) becomes one
//! frame. Files are played in lexical order and the sequence loops, so an
//! export longer than the directory repeats it.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rawloader::{RawImage, RawImageData as RawloaderImageData};
use tracing::{debug, info};

use crate::acquisition::camera::cadence::FrameCadence;
use crate::acquisition::camera::sdk::{Camera, CameraSdk};
use crate::acquisition::camera::types::{
    CameraProperties, CameraSettings, FilterPhase, Frame, IDENTITY_MATRIX, SensorType,
};
use crate::acquisition::common::error::{AcquisitionError, Result};

/// Default bit depth when no white level information is available from the RAW file.
const DEFAULT_BITS_PER_SAMPLE: u32 = 16;

/// The bit width of the u16 data type, used for calculating actual bits per sample.
const U16_BITS: u32 = 16;

const DEFAULT_REPLAY_RATE_HZ: f64 = 10.0;

/// rawloader CFA color indices
const CFA_RED: usize = 0;
const CFA_BLUE: usize = 2;

/// SDK whose single camera replays the RAW files of one directory.
pub struct RawReplaySdk {
    directory: PathBuf,
    frame_rate_hz: f64,
}

impl RawReplaySdk {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            frame_rate_hz: DEFAULT_REPLAY_RATE_HZ,
        }
    }

    pub fn with_frame_rate(mut self, frame_rate_hz: f64) -> Self {
        self.frame_rate_hz = frame_rate_hz;
        self
    }

    fn camera_id(&self) -> String {
        self.directory.display().to_string()
    }
}

impl CameraSdk for RawReplaySdk {
    type Camera = RawReplayCamera;

    fn discover_cameras(&mut self) -> Result<Vec<String>> {
        if !self.directory.is_dir() || list_frames(&self.directory)?.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![self.camera_id()])
    }

    fn open_camera(&mut self, camera_id: &str) -> Result<RawReplayCamera> {
        if camera_id != self.camera_id() {
            return Err(AcquisitionError::Camera(format!("unknown camera {}", camera_id)));
        }
        if self.frame_rate_hz <= 0.0 {
            return Err(AcquisitionError::Camera(format!(
                "invalid frame rate {}",
                self.frame_rate_hz
            )));
        }

        let files = list_frames(&self.directory)?;
        let first = files
            .first()
            .ok_or(AcquisitionError::DeviceNotFound)?;
        let image = decode(first)?;
        let properties = properties_from_raw(&image, camera_id, self.frame_rate_hz)?;

        info!(
            directory = %self.directory.display(),
            frames = files.len(),
            width = properties.width,
            height = properties.height,
            bit_depth = properties.bit_depth,
            sensor = %properties.sensor_type,
            "Opened RAW replay camera"
        );

        Ok(RawReplayCamera {
            properties,
            files,
            cursor: 0,
            frames_emitted: 0,
            frames_this_trigger: 0,
            settings: CameraSettings::default(),
            armed: false,
            triggered: false,
            cadence: FrameCadence::new(self.frame_rate_hz),
        })
    }

    fn dispose(self) -> Result<()> {
        Ok(())
    }
}

pub struct RawReplayCamera {
    properties: CameraProperties,
    files: Vec<PathBuf>,
    cursor: usize,
    frames_emitted: u64,
    frames_this_trigger: u32,
    settings: CameraSettings,
    armed: bool,
    triggered: bool,
    cadence: FrameCadence,
}

impl RawReplayCamera {
    fn next_frame(&mut self) -> Result<Frame> {
        let path = &self.files[self.cursor];
        let image = decode(path)?;
        if image.width != self.properties.width || image.height != self.properties.height {
            return Err(AcquisitionError::InvalidDimensions(image.width, image.height));
        }

        let frame = Frame {
            width: image.width,
            height: image.height,
            data: samples_from_raw(&image, self.properties.bit_depth),
            bit_depth: self.properties.bit_depth,
            frame_number: self.frames_emitted,
        };

        self.cursor = (self.cursor + 1) % self.files.len();
        self.frames_emitted += 1;
        self.frames_this_trigger += 1;
        Ok(frame)
    }
}

impl Camera for RawReplayCamera {
    fn properties(&self) -> &CameraProperties {
        &self.properties
    }

    fn configure(&mut self, settings: &CameraSettings) -> Result<()> {
        if self.armed {
            return Err(AcquisitionError::Camera(
                "cannot change settings while armed".to_string(),
            ));
        }
        if let Some(rate) = settings.frame_rate_control {
            if rate <= 0.0 {
                return Err(AcquisitionError::Camera(format!("invalid frame rate {}", rate)));
            }
            self.cadence.set_rate(rate);
        }
        if settings.exposure_time_us.is_some() {
            debug!("Exposure is fixed by the recorded files, ignoring");
        }
        self.settings = settings.clone();
        Ok(())
    }

    fn arm(&mut self, buffer_depth: u32) -> Result<()> {
        if self.armed {
            return Err(AcquisitionError::Camera("camera is already armed".to_string()));
        }
        debug!(buffer_depth, "Replay camera armed");
        self.armed = true;
        Ok(())
    }

    fn issue_software_trigger(&mut self) -> Result<()> {
        if !self.armed {
            return Err(AcquisitionError::Camera(
                "software trigger issued before arming".to_string(),
            ));
        }
        self.triggered = true;
        self.frames_this_trigger = 0;
        self.cadence.start();
        Ok(())
    }

    fn poll_frame(&mut self, timeout: Duration) -> Result<Option<Frame>> {
        if !self.armed {
            return Err(AcquisitionError::Camera("camera is not armed".to_string()));
        }
        let exhausted = self.settings.frames_per_trigger > 0
            && self.frames_this_trigger >= self.settings.frames_per_trigger;
        if !self.triggered || exhausted {
            std::thread::sleep(timeout);
            return Ok(None);
        }
        if !self.cadence.wait_next(timeout) {
            return Ok(None);
        }
        self.next_frame().map(Some)
    }

    fn disarm(&mut self) -> Result<()> {
        if !self.armed {
            return Err(AcquisitionError::Camera("camera is not armed".to_string()));
        }
        self.armed = false;
        self.triggered = false;
        self.cadence.stop();
        Ok(())
    }

    fn close(self) -> Result<()> {
        if self.armed {
            return Err(AcquisitionError::Camera("camera closed while armed".to_string()));
        }
        Ok(())
    }
}

fn list_frames(directory: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(directory)? {
        let path = entry?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn decode(path: &Path) -> Result<RawImage> {
    debug!(path = %path.display(), "Decoding RAW frame");
    rawloader::decode_file(path)
        .map_err(|e| AcquisitionError::Camera(format!("{}: {}", path.display(), e)))
}

/// Actual sensor bit depth, derived from the white level above black.
///
/// e.g. a white level of 4095 (0xFFF) gives 12 bits, 16383 (0x3FFF) gives 14.
fn bits_per_sample(image: &RawImage) -> u32 {
    let white = image.whitelevels.iter().max().copied().unwrap_or(u16::MAX);
    let black = image.blacklevels.iter().min().copied().unwrap_or(0);
    let range = white.saturating_sub(black);
    if range == 0 {
        DEFAULT_BITS_PER_SAMPLE
    } else {
        (U16_BITS - range.leading_zeros()).max(8)
    }
}

fn filter_phase(image: &RawImage) -> FilterPhase {
    match (image.cfa.color_at(0, 0), image.cfa.color_at(0, 1)) {
        (CFA_RED, _) => FilterPhase::BayerRed,
        (CFA_BLUE, _) => FilterPhase::BayerBlue,
        (_, CFA_RED) => FilterPhase::GreenLeftOfRed,
        _ => FilterPhase::GreenLeftOfBlue,
    }
}

/// Diagonal white balance matrix from the file's as-shot coefficients,
/// normalized so that green has unit gain.
fn white_balance_matrix(image: &RawImage) -> [f32; 9] {
    let [r, g, b, _] = image.wb_coeffs;
    if !(r.is_finite() && g.is_finite() && b.is_finite()) || g <= 0.0 || r <= 0.0 || b <= 0.0 {
        return IDENTITY_MATRIX;
    }
    [r / g, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, b / g]
}

fn properties_from_raw(image: &RawImage, serial: &str, frame_rate_hz: f64) -> Result<CameraProperties> {
    if image.cpp != 1 {
        return Err(AcquisitionError::UnsupportedFormat(format!(
            "{} components per pixel",
            image.cpp
        )));
    }
    if image.width == 0 || image.height == 0 {
        return Err(AcquisitionError::InvalidDimensions(image.width, image.height));
    }

    let sensor_type = if image.cfa.name.is_empty() {
        SensorType::Monochrome
    } else {
        SensorType::Bayer
    };

    Ok(CameraProperties {
        model: format!("{} {} (replay)", image.clean_make, image.clean_model),
        serial: serial.to_string(),
        width: image.width,
        height: image.height,
        bit_depth: bits_per_sample(image),
        frame_rate_hz,
        sensor_type,
        filter_phase: filter_phase(image),
        color_correction_matrix: IDENTITY_MATRIX,
        default_white_balance_matrix: white_balance_matrix(image),
    })
}

/// Converts decoded sensor data to black-subtracted samples within `bit_depth`.
///
/// Integer data is offset and clamped; float data (normalized 0.0-1.0) is
/// scaled to the full range.
fn samples_from_raw(image: &RawImage, bit_depth: u32) -> Vec<u16> {
    let black = image.blacklevels[0];
    let max_value = ((1u32 << bit_depth) - 1) as u16;
    match &image.data {
        RawloaderImageData::Integer(values) => values
            .iter()
            .map(|&v| v.saturating_sub(black).min(max_value))
            .collect(),
        RawloaderImageData::Float(values) => values
            .iter()
            .map(|&v| (v.clamp(0.0, 1.0) * max_value as f32) as u16)
            .collect(),
    }
}
