use tracing::{subscriber::Interest, Level, Metadata};
use tracing_subscriber::layer::{Context, Filter};

/// Drops chatty transport crates below INFO, and everything below INFO in release builds.
pub struct NoiseFilter;

const TRANSPORT_PREFIX: [&str; 4] = ["hyper::", "rustls::", "h2::", "reqwest::"];

impl NoiseFilter {
    fn is_transport(metadata: &Metadata<'_>) -> bool {
        TRANSPORT_PREFIX
            .iter()
            .any(|prefix| metadata.target().starts_with(prefix))
    }

    fn is_enabled(&self, metadata: &Metadata<'_>) -> bool {
        let noisy = Self::is_transport(metadata) && *metadata.level() > Level::INFO;

        if cfg!(debug_assertions) {
            return !noisy;
        }
        *metadata.level() <= Level::INFO && !noisy
    }
}

impl<S> Filter<S> for NoiseFilter {
    fn enabled(&self, metadata: &Metadata<'_>, _: &Context<'_, S>) -> bool {
        self.is_enabled(metadata)
    }

    fn callsite_enabled(&self, metadata: &'static Metadata<'static>) -> Interest {
        if self.is_enabled(metadata) {
            Interest::always()
        } else {
            Interest::never()
        }
    }
}
