use serde::{Deserialize, Serialize};
use splitpoint_format::ParseLimits;

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Read bounds passed to every strategy.
    #[serde(default)]
    pub limits: ParseLimits,

    #[serde(default)]
    pub split: SplitConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SplitConfig {
    /// Target duration of each planned segment, in seconds (default: 600)
    #[serde(default = "default_target_duration")]
    pub target_duration_secs: f64,

    /// Cut earlier when a segment would exceed this many bytes
    #[serde(default)]
    pub max_segment_bytes: Option<u64>,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            target_duration_secs: default_target_duration(),
            max_segment_bytes: None,
        }
    }
}

fn default_target_duration() -> f64 {
    splitpoint_format::plan::DEFAULT_TARGET_DURATION_SECS
}
