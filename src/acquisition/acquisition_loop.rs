use std::time::Duration;

use tracing::{error, info, instrument, warn};

use crate::acquisition::camera::Camera;
use crate::acquisition::color::ColorProcessor;
use crate::acquisition::common::error::{AcquisitionError, Result};
use crate::acquisition::common::stop::StopSignal;
use crate::acquisition::convert::{ConversionPolicy, convert_frame};
use crate::acquisition::sink::FrameSink;
use crate::acquisition::timing::{LoopTimings, Timer};

/// When the loop stops on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Stop after this many frames; a poll timeout is fatal
    Bounded(usize),
    /// Run until interrupted; a poll timeout is skipped
    Unbounded,
}

impl RunMode {
    fn should_continue(self, frames_delivered: usize) -> bool {
        match self {
            RunMode::Bounded(target) => frames_delivered < target,
            RunMode::Unbounded => true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoopSummary {
    pub frames_delivered: usize,
    pub empty_polls: u64,
    pub timings: LoopTimings,
}

/// Poll → convert → sink, one frame at a time.
#[derive(Debug, Clone, Copy)]
pub struct AcquisitionLoop {
    mode: RunMode,
    poll_timeout: Duration,
}

impl AcquisitionLoop {
    pub fn new(mode: RunMode, poll_timeout: Duration) -> Self {
        Self { mode, poll_timeout }
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    pub fn poll_timeout(&self) -> Duration {
        self.poll_timeout
    }

    #[instrument(skip_all, fields(mode = ?self.mode, timeout_ms = self.poll_timeout.as_millis() as u64))]
    pub fn run<C, P, K>(
        &self,
        camera: &mut C,
        policy: ConversionPolicy,
        mut processor: Option<&mut P>,
        sink: &mut K,
        stop: &StopSignal,
    ) -> Result<LoopSummary>
    where
        C: Camera + ?Sized,
        P: ColorProcessor,
        K: FrameSink + ?Sized,
    {
        let (width, height) = (camera.properties().width, camera.properties().height);
        let mut timings = LoopTimings::new();
        let mut frames_delivered = 0usize;
        let mut empty_polls = 0u64;

        info!("Starting acquisition");

        while self.mode.should_continue(frames_delivered) {
            if stop.is_raised() {
                match self.mode {
                    RunMode::Unbounded => {
                        info!("Stop requested");
                        break;
                    }
                    RunMode::Bounded(_) => {
                        warn!(frames_delivered, "Interrupted before reaching the frame target");
                        return Err(AcquisitionError::Interrupted {
                            frames_written: frames_delivered,
                        });
                    }
                }
            }

            let timer = Timer::start("poll");
            let frame = {
                let _span = tracing::info_span!("poll").entered();
                camera.poll_frame(self.poll_timeout)?
            };
            let (name, duration) = timer.stop();
            timings.add(name, duration);

            let Some(frame) = frame else {
                match self.mode {
                    RunMode::Bounded(_) => {
                        error!(frames_delivered, "Timeout was reached while polling for a frame");
                        return Err(AcquisitionError::frame_timeout(
                            self.poll_timeout,
                            frames_delivered,
                        ));
                    }
                    RunMode::Unbounded => {
                        empty_polls += 1;
                        warn!("{}", AcquisitionError::NoFrameAvailable);
                        sink.idle()?;
                        continue;
                    }
                }
            };

            if frame.width != width || frame.height != height {
                return Err(AcquisitionError::InvalidDimensions(frame.width, frame.height));
            }

            let timer = Timer::start("convert");
            let image = {
                let _span = tracing::info_span!("convert", frame = frame.frame_number).entered();
                convert_frame(&frame, policy, processor.as_deref_mut())?
            };
            let (name, duration) = timer.stop();
            timings.add(name, duration);

            let timer = Timer::start("sink");
            {
                let _span = tracing::info_span!("sink", frame = frame.frame_number).entered();
                sink.write(&image)?;
            }
            let (name, duration) = timer.stop();
            timings.add(name, duration);

            frames_delivered += 1;
        }

        info!(frames_delivered, empty_polls, "Acquisition finished");
        timings.log_summary();

        Ok(LoopSummary {
            frames_delivered,
            empty_polls,
            timings,
        })
    }
}
