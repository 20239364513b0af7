use serde::Deserialize;

/// Detection tuning: window accounting and the expirer sweep period.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct DetectionConfig {
    /// SYN count strictly exceeding this within one window triggers the
    /// threshold branch. Range `[1, 1_000_000]`.
    /// Default: 200
    #[serde(default = "default_syn_threshold")]
    pub syn_threshold: u32,
    /// Window duration in milliseconds. Range `[1, 60_000]`.
    /// Default: 1000 (1 second)
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
    /// Expirer sweep period in seconds. Range `[1, 3600]`.
    /// Default: 5
    #[serde(default = "default_check_interval_s")]
    pub proc_check_interval_s: u64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            syn_threshold: default_syn_threshold(),
            window_ms: default_window_ms(),
            proc_check_interval_s: default_check_interval_s(),
        }
    }
}

fn default_syn_threshold() -> u32 {
    200
}

fn default_window_ms() -> u64 {
    1000
}

fn default_check_interval_s() -> u64 {
    5
}
