//! Color processing module
//!
//! Turns Bayer-pattern sensor data into interleaved 8-bit color images.

mod processor;
mod bayer_processor;

pub use processor::{ChannelOrder, ColorProcessor, ColorProcessorParams, ColorProcessorSdk};
pub use bayer_processor::{BayerColorProcessor, BayerColorSdk};
