use thiserror::Error;

/// Configuration-load and validation failures. Fatal at startup; ignored
/// (prior config retained) during a reload.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io { path: String, source: std::io::Error },

    #[error("failed to parse config file {path}: {source}")]
    Parse { path: String, source: toml::de::Error },

    #[error("invalid value for {key}: {detail}")]
    OutOfRange { key: String, detail: String },
}

/// Top-level errors: the handful of conditions that abort startup or the
/// capture loop. Per-packet error *kinds* (capacity, backend, probe, parse)
/// are never represented here — they are counter increments, not
/// propagated results, per the detector's no-crash contract.
#[derive(Error, Debug)]
pub enum SynGuardError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("blacklist backend error: {0}")]
    Backend(String),

    #[error("capture source error: {0}")]
    Capture(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SynGuardError>;
