use serde::Deserialize;

use super::capture::CaptureConfig;
use super::detection::DetectionConfig;
use super::enforcement::EnforcementConfig;
use super::limits::LimitsConfig;
use super::logging::LoggingConfig;
use super::whitelist::WhitelistConfig;

/// Root configuration document: one section per §6 table group.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct Config {
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub enforcement: EnforcementConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub whitelist: WhitelistConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}
