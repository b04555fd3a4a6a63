// Copyright @ 2023 - 2024, R3E Network
// All Rights Reserved

//! Logging initialization

use anyhow::{anyhow, Result};
use onyx_config::{LogFormat, LoggingSettings};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// `RUST_LOG` when set, otherwise the configured level.
fn filter(settings: &LoggingSettings) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.level))
}

/// Installs the global subscriber.
pub fn init(settings: &LoggingSettings) -> Result<()> {
    let registry = tracing_subscriber::registry().with(filter(settings));

    match settings.format {
        LogFormat::Text => registry
            .with(fmt::layer().with_target(true))
            .try_init()
            .map_err(|e| anyhow!("logging init: {e}"))?,
        LogFormat::Compact => registry
            .with(fmt::layer().compact().with_target(false))
            .try_init()
            .map_err(|e| anyhow!("logging init: {e}"))?,
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(true))
            .try_init()
            .map_err(|e| anyhow!("logging init: {e}"))?,
    }

    tracing::info!(level = %settings.level, format = ?settings.format, "logging initialized");
    Ok(())
}
