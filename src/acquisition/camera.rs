//! Camera module
//!
//! This module defines the camera collaborator contract and the frame sources
//! that implement it: a synthetic camera for bench work and a replay camera
//! that streams RAW files from disk.

mod cadence;
mod sdk;
mod simulated;
mod raw_replay;
pub mod types;

pub use sdk::{Camera, CameraSdk};
pub use simulated::{SimulatedCamera, SimulatedCameraConfig, SimulatedSdk};
pub use raw_replay::{RawReplayCamera, RawReplaySdk};
pub use types::{CameraProperties, CameraSettings, FilterPhase, Frame, SensorType};
