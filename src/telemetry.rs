// 📝 Telemetry - shared tracing subscriber for the CLI and the API server

use crate::error::{EtlError, Result};
use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

/// Default filter when RUST_LOG is unset
pub const DEFAULT_FILTER: &str = "medallion_etl=info";

/// Install the global fmt subscriber. `RUST_LOG` wins over `default_filter`.
/// Fails with a configuration error when a subscriber is already installed.
pub fn init_tracing(default_filter: &str) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    SubscriberBuilder::default()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| EtlError::Configuration(format!("failed to initialize tracing: {}", e)))
}

/// Filter for a `-v` count: 0 = info, 1 = debug, 2+ = trace
pub fn filter_for_verbosity(verbose: u8) -> String {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    format!("medallion_etl={},medallion={}", level, level)
}
