//! Common utilities module
//!
//! This module contains shared utilities used across the acquisition pipeline.

pub mod error;
pub mod stop;

pub use error::{AcquisitionError, Result};
pub use stop::StopSignal;
