//! Tracing subscriber initialisation.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialise a `fmt` subscriber filtered by `RUST_LOG`.
///
/// `default_directive` (e.g. `"info"` or `"formvault=debug"`) applies when
/// `RUST_LOG` is unset or invalid.
///
/// # Errors
///
/// Returns error if a global subscriber is already installed.
pub fn init_tracing(default_directive: &str) -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))?;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_level(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}
