use serde::Deserialize;

/// Blacklist backend configuration: TTL and kernel-set identity.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct EnforcementConfig {
    /// TTL given to backend entries, in seconds. Range `[1, 86_400]`.
    /// Default: 300 (5 minutes)
    #[serde(default = "default_block_duration_s")]
    pub block_duration_s: u64,
    /// Non-empty identifier for the backend set (e.g. an ipset name).
    /// Default: "synguard-blacklist"
    #[serde(default = "default_ipset_name")]
    pub ipset_name: String,
}

impl Default for EnforcementConfig {
    fn default() -> Self {
        Self { block_duration_s: default_block_duration_s(), ipset_name: default_ipset_name() }
    }
}

fn default_block_duration_s() -> u64 {
    300
}

fn default_ipset_name() -> String {
    "synguard-blacklist".to_string()
}
