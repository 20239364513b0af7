use std::sync::Arc;

use tracing::warn;

use crate::detector::Detector;

/// Periodic sweep that lifts blocks whose TTL has passed (§4.G). Run on
/// its own thread by the supervisor; each tick is independent of the
/// capture and corroboration paths so a slow backend call here never
/// stalls packet processing.
pub struct Expirer {
    detector: Arc<Detector>,
}

impl Expirer {
    pub fn new(detector: Arc<Detector>) -> Self {
        Self { detector }
    }

    /// One sweep: finds every address past its `block_expiry` and asks the
    /// detector to unblock it. Returns the count successfully lifted.
    pub fn sweep(&self, map: &crate::source_map::SourceMap, now: u64, cap: usize) -> usize {
        let due = map.expired_blocks(now, cap);
        let mut lifted = 0;
        for addr in due {
            if self.detector.unblock(addr) {
                lifted += 1;
            } else {
                warn!(%addr, "failed to lift expired block");
            }
        }
        lifted
    }
}
