//! Acquisition modes
//!
//! Each mode wires a camera SDK, the color processor SDK and a sink into a
//! session and runs it to completion.

mod export;
mod list;
mod live;

pub use export::{export, open_export_sink};
pub use list::describe_cameras;
pub use live::{live_view, live_view_with_sink};
