use serde::Deserialize;

/// Source-map sizing: capacity and bucket count.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct LimitsConfig {
    /// Source-map capacity (upper bound on live entries before LRU eviction
    /// kicks in). Range `[1, 10_000_000]`.
    /// Default: 10_000
    #[serde(default = "default_max_tracked_ips")]
    pub max_tracked_ips: u32,
    /// Source-map bucket count. Must be a positive power of two.
    /// Default: 16_384
    #[serde(default = "default_hash_buckets")]
    pub hash_buckets: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self { max_tracked_ips: default_max_tracked_ips(), hash_buckets: default_hash_buckets() }
    }
}

fn default_max_tracked_ips() -> u32 {
    10_000
}

fn default_hash_buckets() -> u32 {
    16_384
}
