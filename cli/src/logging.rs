//! Global tracing subscriber setup for the CLI.

use std::io::IsTerminal;
use std::str::FromStr;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::GlobalOptions;

/// Install the process-wide subscriber. The returned guard must be kept
/// alive for the duration of the process; dropping it flushes the
/// non-blocking writer.
pub fn init(global: &GlobalOptions) -> WorkerGuard {
    let level = log_level(global);
    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let (non_blocking, guard) = tracing_appender::non_blocking(std::io::stderr());

    let fmt_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(std::io::stderr().is_terminal() && !global.no_color)
        .with_target(false)
        .without_time();

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .init();

    guard
}

fn log_level(global: &GlobalOptions) -> LevelFilter {
    match global.quiet {
        0 => {}
        1 => return LevelFilter::WARN,
        _ => return LevelFilter::ERROR,
    }

    if let Ok(rust_log) = std::env::var(EnvFilter::DEFAULT_ENV) {
        if let Ok(level) = LevelFilter::from_str(&rust_log) {
            return level;
        }
    }

    match global.verbose {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}
