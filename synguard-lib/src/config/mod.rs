mod capture;
mod detection;
mod enforcement;
mod limits;
mod loader;
mod logging;
mod root;
mod validator;
mod whitelist;

pub use capture::CaptureConfig;
pub use detection::DetectionConfig;
pub use enforcement::EnforcementConfig;
pub use limits::LimitsConfig;
pub use loader::load_from_path;
pub use logging::LoggingConfig;
pub use root::Config;
pub use validator::validate;
pub use whitelist::WhitelistConfig;
