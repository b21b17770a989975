// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! Process-wide `tracing` subscriber setup
//!
//! The library crates only emit events; a host that wants them printed calls
//! [`init`] once at startup.

use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::config::{CompilerConfig, ConfigError};

/// Install a formatting subscriber filtered by `filter`
///
/// Returns `Ok(false)` when a global subscriber is already installed, in
/// which case the existing one is kept.
pub fn init(filter: &str) -> Result<bool, ConfigError> {
    let env_filter = EnvFilter::try_new(filter).map_err(|e| ConfigError::LogFilter {
        filter: filter.to_string(),
        reason: e.to_string(),
    })?;
    install(env_filter)
}

/// Install a subscriber using the configured `logFilter`
pub fn init_from_config(config: &CompilerConfig) -> Result<bool, ConfigError> {
    install(config.env_filter()?)
}

/// Install a subscriber filtered by `RUST_LOG`
pub fn init_from_env() -> bool {
    install(EnvFilter::from_default_env()).unwrap_or(false)
}

fn install(filter: EnvFilter) -> Result<bool, ConfigError> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();

    Ok(tracing::subscriber::set_global_default(subscriber).is_ok())
}
