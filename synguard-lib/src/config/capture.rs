use serde::Deserialize;

/// Packet acquisition mode selection.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct CaptureConfig {
    /// Queue index for the netfilter-queue capture mode, if selected.
    #[serde(default)]
    pub nfqueue_num: Option<u16>,
    /// Switches to the raw-socket capture mode (the default and the only
    /// mode this build implements end to end; see `capture::raw_socket`).
    /// Default: true
    #[serde(default = "default_true")]
    pub use_raw_socket: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self { nfqueue_num: None, use_raw_socket: default_true() }
    }
}

fn default_true() -> bool {
    true
}
