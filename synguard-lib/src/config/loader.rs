use std::fs;
use std::path::Path;

use crate::config::root::Config;
use crate::config::validator::validate;
use crate::error::{ConfigError, Result};

/// Reads, parses, and validates a configuration document.
///
/// Parse and validate are kept as separate steps (mirroring how malformed
/// TOML and an out-of-range-but-well-typed value are distinct failure
/// modes) so callers can tell them apart if they need to.
pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let config: Config = toml::from_str(&text).map_err(|e| ConfigError::Parse {
        path: path.display().to_string(),
        source: e,
    })?;
    validate(&config)?;
    Ok(config)
}
