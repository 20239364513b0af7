use serde::Deserialize;

/// Logging and metrics-endpoint configuration.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// One of `{debug, info, warn, error}`.
    /// Default: "info"
    #[serde(default = "default_level")]
    pub level: String,
    /// Enables structured journal output in addition to stderr.
    /// Default: false
    #[serde(default)]
    pub syslog: bool,
    /// Path for the metrics endpoint (a Unix domain socket path).
    /// Default: "/run/synguard/metrics.sock"
    #[serde(default = "default_metrics_socket")]
    pub metrics_socket: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            syslog: false,
            metrics_socket: default_metrics_socket(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

fn default_metrics_socket() -> String {
    "/run/synguard/metrics.sock".to_string()
}
