//! Logging initialization and configuration.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::error::{Error, Result};

/// Filter used when `RUST_LOG` is not set.
const DEFAULT_FILTER: &str = "info,trigon_renderer=debug,trigon_rhi=info";

fn build_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Initialize the logging system with tracing.
///
/// This sets up tracing-subscriber with:
/// - Environment-based filtering (RUST_LOG)
/// - Target and thread id on every line
///
/// Panics if a global subscriber is already installed; use
/// [`try_init_logging`] where that can happen.
///
/// # Example
/// ```
/// trigon_core::init_logging();
/// tracing::info!("Engine initialized");
/// ```
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(build_filter())
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .init();
}

/// Like [`init_logging`], but reports an already-installed subscriber as an error.
pub fn try_init_logging() -> Result<()> {
    tracing_subscriber::registry()
        .with(build_filter())
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .try_init()
        .map_err(|e| Error::Logging(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_parses() {
        assert!(DEFAULT_FILTER.parse::<EnvFilter>().is_ok());
    }

    #[test]
    fn test_second_init_is_an_error() {
        let _ = try_init_logging();
        assert!(matches!(try_init_logging(), Err(Error::Logging(_))));
    }
}
