use serde::Deserialize;

/// Whitelist file location.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct WhitelistConfig {
    /// Path to the whitelist file (one CIDR per line, `#` comments allowed).
    /// If unset, the whitelist starts empty and reload has nothing to reread.
    #[serde(default)]
    pub file: Option<String>,
}
