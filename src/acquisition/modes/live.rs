use tracing::{info, instrument};

use crate::acquisition::acquisition_loop::LoopSummary;
use crate::acquisition::camera::CameraSdk;
use crate::acquisition::color::BayerColorSdk;
use crate::acquisition::common::error::Result;
use crate::acquisition::common::stop::StopSignal;
use crate::acquisition::config::LiveConfig;
use crate::acquisition::session::Session;
use crate::acquisition::sink::{FrameSink, SinkSpec, TerminalDisplay};

/// Shows min-max normalized frames in the terminal until `stop` is raised.
pub fn live_view<S: CameraSdk>(sdk: S, config: &LiveConfig, stop: &StopSignal) -> Result<LoopSummary> {
    let display_stop = stop.clone();
    live_view_with_sink(sdk, config, stop, |_| TerminalDisplay::open(display_stop))
}

/// Live view into a caller-provided sink.
#[instrument(skip_all, fields(exposure_us = config.exposure_time_us, fps = config.frame_rate))]
pub fn live_view_with_sink<S, K, G>(
    sdk: S,
    config: &LiveConfig,
    stop: &StopSignal,
    open_sink: G,
) -> Result<LoopSummary>
where
    S: CameraSdk,
    K: FrameSink,
    G: FnOnce(&SinkSpec) -> Result<K>,
{
    let session = Session::open(
        sdk,
        &config.session_options(),
        || Ok(BayerColorSdk::new()),
        open_sink,
    )?;

    let summary = session.run_and_close(&config.acquisition_loop(), stop)?;
    info!(
        frames = summary.frames_delivered,
        empty_polls = summary.empty_polls,
        "Live view closed"
    );
    Ok(summary)
}
