//! Logging setup for hosts embedding the kernels

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "weatherbot=info";

/// Install the global tracing subscriber.
///
/// `json` switches to one JSON object per event. Fails if a subscriber is
/// already installed.
pub fn init_tracing(json: bool) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| anyhow!("failed to install tracing subscriber: {}", e))
}
