use super::*;
use std::io::{stderr, stdout};
use tracing::Level;
use tracing_subscriber::{filter::LevelFilter, prelude::*, EnvFilter};

/// Environment variable holding an `EnvFilter` directive that overrides the default level.
pub const LOG_FILTER_ENV: &str = "FIRESITE_LOG";

/// Installs the global subscriber. Safe to call more than once: later calls
/// are ignored, which lets every test call it.
#[inline]
pub fn init_logger(package: &str) {
    let default_level = if cfg!(debug_assertions) {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let writer = stderr
        .with_max_level(Level::WARN)
        .or_else(stdout.with_max_level(default_level));

    let directive = std::env::var(LOG_FILTER_ENV).unwrap_or_else(|_| {
        format!(
            "firesite_core={default_level},firesite_widget={default_level},{}={default_level}",
            package.replace('-', "_")
        )
    });
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .parse_lossy(directive);

    let layer = tracing_subscriber::fmt::layer()
        .map_writer(move |_| writer)
        .map_event_format(|e| FiresiteFormatter {
            fallback: e.with_timer(LogTime),
        })
        .with_filter(NoiseFilter);

    let _ = tracing_subscriber::registry().with(env_filter).with(layer).try_init();
}
