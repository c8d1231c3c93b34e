//! Camera acquisition module
//!
//! This module drives a scientific camera through one acquisition run: open
//! the SDK and camera, optionally attach a color processor, poll frames,
//! convert them to 8-bit images and hand them to a sink. Sessions release
//! everything they acquired in reverse order, on success and on failure.

pub mod camera;
pub mod color;
pub mod common;
pub mod config;
pub mod convert;
pub mod modes;
pub mod session;
pub mod sink;
mod acquisition_loop;
mod timing;

#[cfg(test)]
mod tests;

pub use common::{
    AcquisitionError,
    Result,
    StopSignal,
};

pub use acquisition_loop::{
    AcquisitionLoop,
    LoopSummary,
    RunMode,
};

pub use timing::{
    LoopTimings,
    StageTiming,
};

pub use session::{
    Session,
    SessionOptions,
    Stage,
    TeardownReport,
};

pub use config::{
    ExportConfig,
    ExportConfigBuilder,
    LiveConfig,
};

pub use convert::{
    ConversionPolicy,
    Normalization,
    PixelLayout,
    ProcessedImage,
};

pub use modes::{
    describe_cameras,
    export,
    live_view,
};
