use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::blacklist::BlacklistView;
use crate::clock::MonotonicClock;
use crate::config::Config;
use crate::detector::Detector;
use crate::metrics::Metrics;
use crate::probe::KernelProbe;
use crate::source_map::SourceMap;
use crate::whitelist::Whitelist;

/// Everything the capture, expiry and metrics threads share, bundled into
/// one explicit value instead of reached for through global statics (§9
/// design notes: the original keeps all of this in file-scope globals
/// guarded ad hoc; every lifetime and lock here is visible at the call
/// site instead).
pub struct Context {
    pub config: Arc<ArcSwap<Config>>,
    pub map: Arc<SourceMap>,
    pub whitelist: Arc<ArcSwap<Whitelist>>,
    pub backend: Arc<dyn BlacklistView>,
    pub clock: Arc<dyn MonotonicClock>,
    pub metrics: Arc<Metrics>,
    pub detector: Arc<Detector>,
    shutdown: Arc<AtomicBool>,
}

impl Context {
    pub fn new(
        config: Config,
        backend: Arc<dyn BlacklistView>,
        probe: Arc<dyn KernelProbe>,
        clock: Arc<dyn MonotonicClock>,
        whitelist: Whitelist,
    ) -> Self {
        let map = Arc::new(SourceMap::new(config.limits.hash_buckets, config.limits.max_tracked_ips));
        let whitelist = Arc::new(ArcSwap::from_pointee(whitelist));
        let metrics = Arc::new(Metrics::new());
        let config = Arc::new(ArcSwap::from_pointee(config));
        let detector = Arc::new(Detector::new(
            config.clone(),
            map.clone(),
            whitelist.clone(),
            backend.clone(),
            probe,
            clock.clone(),
            metrics.clone(),
        ));

        Self {
            config,
            map,
            whitelist,
            backend,
            clock,
            metrics,
            detector,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    pub fn shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }
}
