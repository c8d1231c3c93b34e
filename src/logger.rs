pub use tracing::{debug, error, info, warn, trace, instrument};
use std::fs::File;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt::{self, format::FmtSpan}};

fn env_filter() -> (EnvFilter, bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let is_debug = env_filter.to_string().contains("debug") ||
                   std::env::var("RUST_LOG").unwrap_or_default().contains("debug");

    (env_filter, is_debug)
}

fn span_events(is_debug: bool) -> FmtSpan {
    if is_debug {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    }
}

/// Logs to stderr, filtered by `RUST_LOG` (default `info`).
pub fn init() {
    let (env_filter, is_debug) = env_filter();

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_timer(fmt::time::uptime())
        .with_span_events(span_events(is_debug));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

/// Logs to `path` instead of the terminal, for modes that draw on it.
pub fn init_with_file(path: &Path) -> std::io::Result<()> {
    let file = File::create(path)?;
    let (env_filter, is_debug) = env_filter();

    let fmt_layer = fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .with_timer(fmt::time::uptime())
        .with_span_events(span_events(is_debug));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
    Ok(())
}
