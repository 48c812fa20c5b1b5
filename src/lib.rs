//! Splitpoint - split large audio files at frame-accurate boundaries
//!
//! This library crate exposes the configuration layer for integration testing.
//! Format parsing lives in the `splitpoint-format` crate.

pub mod config;

use splitpoint_format::FormatStrategyManager;

/// Build a strategy manager with the built-in formats and the configured limits.
pub fn manager_from_config(config: &config::Config) -> FormatStrategyManager {
    FormatStrategyManager::with_defaults(config.limits)
}
