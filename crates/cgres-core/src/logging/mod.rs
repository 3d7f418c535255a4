//! Structured logging foundation for cgres-core.
//!
//! The detection subsystem itself only ever logs at `trace` (per-file read
//! failures) or `debug` (initialization summary, containerization reason) per
//! the subsystem's error-handling design: it never emits `warn` or above.
//! `info`/`warn` are reserved for the CLI binary's own lifecycle messages.

use std::io::IsTerminal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the logging subsystem.
///
/// Must be called once at startup before any logging occurs. Respects
/// `CGRES_LOG` and `RUST_LOG`.
pub fn init_logging() {
    let filter = EnvFilter::try_from_env("CGRES_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("cgres_core=info"));

    let use_ansi = std::io::stderr().is_terminal();
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_ansi(use_ansi);

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}
