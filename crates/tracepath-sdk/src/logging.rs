//! Logging setup
//!
//! Installs a `tracing` subscriber for applications that do not bring their
//! own. `RUST_LOG` takes precedence over the level passed in.

use tracepath_core::SdkConfig;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,tracepath={}", level)))
}

/// Install a human-readable subscriber
///
/// Returns false if a global subscriber was already installed.
pub fn init(level: &str) -> bool {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter(level))
        .try_init()
        .is_ok()
}

/// Install a JSON-lines subscriber
pub fn init_json(level: &str) -> bool {
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(filter(level))
        .try_init()
        .is_ok()
}

pub fn init_from_config(config: &SdkConfig) -> bool {
    init(&config.sdk.log_level)
}
