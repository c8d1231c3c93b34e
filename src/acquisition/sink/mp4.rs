//! MP4 writer on a GStreamer pipeline
//!
//! appsrc -> videoconvert -> encoder -> mp4mux -> filesink. Frames are pushed
//! with timestamps derived from the camera frame rate, so playback speed does
//! not depend on how fast they were acquired.

use std::path::{Path, PathBuf};

use gstreamer::prelude::*;
use gstreamer_app::AppSrc;
use tracing::{debug, error, info};

use crate::acquisition::common::error::{AcquisitionError, Result};
use crate::acquisition::convert::{PixelLayout, ProcessedImage};
use crate::acquisition::sink::frame_sink::{FrameSink, SinkSpec, prepare_output_path};
use crate::acquisition::sink::types::VideoCodec;

/// Seconds to wait for the muxer to finish the file after EOS
const EOS_TIMEOUT_SECS: u64 = 10;

pub struct Mp4Writer {
    path: PathBuf,
    spec: SinkSpec,
    pipeline: gstreamer::Pipeline,
    appsrc: AppSrc,
    frame_duration_ns: u64,
    frames_pushed: u64,
    released: bool,
}

fn make_element(factory: &str) -> Result<gstreamer::Element> {
    gstreamer::ElementFactory::make(factory)
        .build()
        .map_err(|e| AcquisitionError::SinkWrite(format!("Failed to create {}: {}", factory, e)))
}

fn encoder_for(codec: VideoCodec) -> Result<gstreamer::Element> {
    match codec {
        VideoCodec::Mpeg4Part2 => make_element("avenc_mpeg4"),
        VideoCodec::H264 => make_element("x264enc"),
    }
}

/// Rows of GStreamer raw video are padded to a multiple of 4 bytes.
fn padded_stride(row_bytes: usize) -> usize {
    (row_bytes + 3) & !3
}

impl Mp4Writer {
    /// Opens `path`, replacing any existing file.
    pub fn create(path: impl AsRef<Path>, spec: SinkSpec, codec: VideoCodec) -> Result<Self> {
        let path = path.as_ref();
        if spec.width == 0 || spec.height == 0 {
            return Err(AcquisitionError::InvalidDimensions(spec.width, spec.height));
        }
        if spec.frame_rate_hz <= 0.0 {
            return Err(AcquisitionError::UnsupportedFormat(format!(
                "frame rate {}",
                spec.frame_rate_hz
            )));
        }
        prepare_output_path(path)?;

        gstreamer::init()
            .map_err(|e| AcquisitionError::SinkWrite(format!("GStreamer init failed: {}", e)))?;

        let pipeline = gstreamer::Pipeline::new();
        let appsrc = make_element("appsrc")?;
        let videoconvert = make_element("videoconvert")?;
        let encoder = encoder_for(codec)?;
        let muxer = make_element("mp4mux")?;
        let filesink = make_element("filesink")?;
        filesink.set_property("location", path.to_string_lossy().as_ref());

        let appsrc = appsrc
            .downcast::<AppSrc>()
            .map_err(|_| AcquisitionError::SinkWrite("Failed to downcast to AppSrc".into()))?;

        // Millihertz precision keeps fractional camera rates such as 29.97
        let rate_mhz = (spec.frame_rate_hz * 1000.0).round() as i32;
        let caps = gstreamer::Caps::builder("video/x-raw")
            .field("format", if spec.is_color { "BGR" } else { "GRAY8" })
            .field("width", spec.width as i32)
            .field("height", spec.height as i32)
            .field("framerate", gstreamer::Fraction::new(rate_mhz, 1000))
            .build();
        appsrc.set_caps(Some(&caps));
        appsrc.set_format(gstreamer::Format::Time);

        pipeline
            .add_many([appsrc.upcast_ref(), &videoconvert, &encoder, &muxer, &filesink])
            .map_err(|e| AcquisitionError::SinkWrite(format!("Failed to add elements: {}", e)))?;
        gstreamer::Element::link_many([appsrc.upcast_ref(), &videoconvert, &encoder, &muxer, &filesink])
            .map_err(|e| AcquisitionError::SinkWrite(format!("Failed to link elements: {}", e)))?;

        pipeline
            .set_state(gstreamer::State::Playing)
            .map_err(|e| AcquisitionError::SinkWrite(format!("Failed to start pipeline: {}", e)))?;

        info!(
            path = %path.display(),
            codec = codec.fourcc(),
            width = spec.width,
            height = spec.height,
            fps = spec.frame_rate_hz,
            "Opened MP4 writer"
        );

        Ok(Self {
            path: path.to_path_buf(),
            spec,
            pipeline,
            appsrc,
            frame_duration_ns: (1_000_000_000.0 / spec.frame_rate_hz) as u64,
            frames_pushed: 0,
            released: false,
        })
    }

    fn padded_frame(&self, image: &ProcessedImage) -> Vec<u8> {
        let row_bytes = image.width * image.layout.channels();
        let stride = padded_stride(row_bytes);
        if stride == row_bytes {
            return image.data.clone();
        }
        let mut data = vec![0u8; stride * image.height];
        for (dst, src) in data.chunks_exact_mut(stride).zip(image.data.chunks_exact(row_bytes)) {
            dst[..row_bytes].copy_from_slice(src);
        }
        data
    }
}

impl FrameSink for Mp4Writer {
    fn write(&mut self, image: &ProcessedImage) -> Result<()> {
        if self.released {
            return Err(AcquisitionError::SinkWrite("MP4 writer already released".to_string()));
        }
        if image.width != self.spec.width || image.height != self.spec.height {
            return Err(AcquisitionError::InvalidDimensions(image.width, image.height));
        }
        let expected = if self.spec.is_color { PixelLayout::Bgr8 } else { PixelLayout::Gray8 };
        if image.layout != expected {
            return Err(AcquisitionError::UnsupportedFormat(format!(
                "{:?} frame, writer expects {:?}",
                image.layout, expected
            )));
        }

        let data = self.padded_frame(image);
        let mut buffer = gstreamer::Buffer::with_size(data.len())
            .map_err(|e| AcquisitionError::SinkWrite(format!("Failed to create buffer: {}", e)))?;
        {
            let buffer_ref = buffer
                .get_mut()
                .ok_or_else(|| AcquisitionError::SinkWrite("Failed to get mutable buffer reference".into()))?;
            buffer_ref.set_pts(gstreamer::ClockTime::from_nseconds(
                self.frames_pushed * self.frame_duration_ns,
            ));
            buffer_ref.set_duration(gstreamer::ClockTime::from_nseconds(self.frame_duration_ns));
            let mut map = buffer_ref
                .map_writable()
                .map_err(|e| AcquisitionError::SinkWrite(format!("Failed to map buffer: {}", e)))?;
            map.copy_from_slice(&data);
        }

        self.appsrc
            .push_buffer(buffer)
            .map_err(|e| AcquisitionError::SinkWrite(format!("Failed to push frame: {:?}", e)))?;
        self.frames_pushed += 1;
        if self.frames_pushed % 100 == 0 {
            debug!(frames = self.frames_pushed, "MP4 frames pushed");
        }
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;

        self.appsrc
            .end_of_stream()
            .map_err(|e| AcquisitionError::SinkWrite(format!("Failed to send EOS: {:?}", e)))?;

        let mut result = Ok(());
        if let Some(bus) = self.pipeline.bus() {
            let msg = bus.timed_pop_filtered(
                gstreamer::ClockTime::from_seconds(EOS_TIMEOUT_SECS),
                &[gstreamer::MessageType::Eos, gstreamer::MessageType::Error],
            );
            if let Some(msg) = msg
                && let gstreamer::MessageView::Error(err) = msg.view()
            {
                result = Err(AcquisitionError::SinkWrite(format!(
                    "Encoder error: {}",
                    err.error()
                )));
            }
        }

        self.pipeline
            .set_state(gstreamer::State::Null)
            .map_err(|e| AcquisitionError::SinkWrite(format!("Failed to stop pipeline: {}", e)))?;

        info!(path = %self.path.display(), frames = self.frames_pushed, "Closed MP4 writer");
        result
    }
}

impl Drop for Mp4Writer {
    fn drop(&mut self) {
        if let Err(e) = self.pipeline.set_state(gstreamer::State::Null) {
            error!(?e, "Failed to set pipeline to Null on drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::padded_stride;

    #[test]
    fn test_rows_padded_to_four_bytes() {
        assert_eq!(padded_stride(640), 640);
        assert_eq!(padded_stride(3 * 5), 16);
        assert_eq!(padded_stride(1), 4);
    }
}
