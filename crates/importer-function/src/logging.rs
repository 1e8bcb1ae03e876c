//! Tracing setup
//!
//! Logs go to stderr; stdout carries only the response document.

use crate::cli::LogFormat;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber
///
/// `RUST_LOG` wins when set, otherwise `debug` or `info` depending on the flag.
pub fn init_tracing(debug: bool, format: LogFormat) {
    let level = if debug { "debug" } else { "info" };
    let filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|_| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(filter);
    let _ = match format {
        LogFormat::Text => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
    };
}
