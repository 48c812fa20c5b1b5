mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Smallest header window that still covers the `RIFF....WAVE` preamble.
const MIN_HEADER_WINDOW: usize = 12;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./splitpoint.toml",
        "~/.config/splitpoint/config.toml",
        "/etc/splitpoint/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            tracing::debug!("Using config file {:?}", path);
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    let limits = &config.limits;

    let windows = [
        ("header_window", limits.header_window as u64),
        ("frame_search_window", limits.frame_search_window as u64),
        ("wav_scan_limit", limits.wav_scan_limit as u64),
        ("chunk_payload_cap", limits.chunk_payload_cap as u64),
        ("split_window_radius", limits.split_window_radius),
        ("boundary_search_range", limits.boundary_search_range as u64),
    ];
    for (name, value) in windows {
        if value == 0 {
            anyhow::bail!("limits.{} cannot be 0", name);
        }
    }

    if limits.header_window < MIN_HEADER_WINDOW {
        anyhow::bail!(
            "limits.header_window must be at least {} bytes, got {}",
            MIN_HEADER_WINDOW,
            limits.header_window
        );
    }

    // fmt chunks of WAVE_FORMAT_EXTENSIBLE files are 40 bytes
    if limits.chunk_payload_cap < 40 {
        tracing::warn!(
            "limits.chunk_payload_cap of {} bytes truncates extensible fmt chunks",
            limits.chunk_payload_cap
        );
    }

    let target = config.split.target_duration_secs;
    if !target.is_finite() || target <= 0.0 {
        anyhow::bail!("split.target_duration_secs must be positive, got {}", target);
    }

    if config.split.max_segment_bytes == Some(0) {
        anyhow::bail!("split.max_segment_bytes cannot be 0; omit it to disable the cap");
    }

    Ok(())
}
