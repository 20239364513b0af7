use crate::config::root::Config;
use crate::error::{ConfigError, Result};

/// Validates every range and constraint from §6's option table.
///
/// Deserialization alone only enforces types; this pass enforces the
/// documented bounds so an out-of-range value fails initialization instead
/// of silently misbehaving at runtime.
pub fn validate(config: &Config) -> Result<()> {
    let d = &config.detection;
    in_range("detection.syn_threshold", d.syn_threshold as u64, 1, 1_000_000)?;
    in_range("detection.window_ms", d.window_ms, 1, 60_000)?;
    in_range("detection.proc_check_interval_s", d.proc_check_interval_s, 1, 3600)?;

    let e = &config.enforcement;
    in_range("enforcement.block_duration_s", e.block_duration_s, 1, 86_400)?;
    if e.ipset_name.trim().is_empty() {
        return Err(ConfigError::OutOfRange {
            key: "enforcement.ipset_name".to_string(),
            detail: "must be non-empty".to_string(),
        }
        .into());
    }

    let l = &config.limits;
    in_range("limits.max_tracked_ips", l.max_tracked_ips as u64, 1, 10_000_000)?;
    if l.hash_buckets == 0 || !l.hash_buckets.is_power_of_two() {
        return Err(ConfigError::OutOfRange {
            key: "limits.hash_buckets".to_string(),
            detail: format!("must be a positive power of two, got {}", l.hash_buckets),
        }
        .into());
    }

    match config.logging.level.as_str() {
        "debug" | "info" | "warn" | "error" => {}
        other => {
            return Err(ConfigError::OutOfRange {
                key: "logging.level".to_string(),
                detail: format!("must be one of debug/info/warn/error, got '{other}'"),
            }
            .into())
        }
    }

    Ok(())
}

fn in_range(key: &str, value: u64, min: u64, max: u64) -> Result<()> {
    if value < min || value > max {
        return Err(ConfigError::OutOfRange {
            key: key.to_string(),
            detail: format!("must be in [{min}, {max}], got {value}"),
        }
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        validate(&Config::default()).expect("defaults must satisfy all bounds");
    }

    #[test]
    fn rejects_zero_threshold() {
        let mut cfg = Config::default();
        cfg.detection.syn_threshold = 0;
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn rejects_non_power_of_two_buckets() {
        let mut cfg = Config::default();
        cfg.limits.hash_buckets = 100;
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn rejects_empty_ipset_name() {
        let mut cfg = Config::default();
        cfg.enforcement.ipset_name = "  ".to_string();
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn rejects_unknown_log_level() {
        let mut cfg = Config::default();
        cfg.logging.level = "verbose".to_string();
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn rejects_window_ms_over_max() {
        let mut cfg = Config::default();
        cfg.detection.window_ms = 60_001;
        assert!(validate(&cfg).is_err());
    }
}
