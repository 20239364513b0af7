use std::net::Ipv4Addr;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::{info, warn};

use crate::blacklist::BlacklistView;
use crate::clock::MonotonicClock;
use crate::config::Config;
use crate::metrics::Metrics;
use crate::probe::KernelProbe;
use crate::source_map::SourceMap;
use crate::whitelist::Whitelist;

/// Outcome of handing one observed SYN to the detector (§4.F).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Source is whitelisted; never tracked.
    Allowed,
    /// Source is already under an active block.
    AlreadyBlocked,
    /// Tracked normally, under threshold.
    Tracked,
    /// Crossed the rate threshold and the kernel's half-open table
    /// corroborated it; the source was just blocked.
    Blocked,
    /// Crossed the rate threshold but the kernel's half-open table did not
    /// corroborate it (§4.F step 6.3, `SUSPICIOUS`).
    Suspicious,
}

/// The core per-packet pipeline (§4.F): whitelist gate, window accounting,
/// threshold test, and — inline, on the same call — kernel-state
/// corroboration before any block is installed. Splitting corroboration
/// onto a separate timer would violate the spec's ordering guarantee that
/// `SUSPICIOUS` packets keep re-entering the threshold branch within the
/// same window, so it stays synchronous with the packet that tripped it.
pub struct Detector {
    config: Arc<ArcSwap<Config>>,
    map: Arc<SourceMap>,
    whitelist: Arc<ArcSwap<Whitelist>>,
    backend: Arc<dyn BlacklistView>,
    probe: Arc<dyn KernelProbe>,
    clock: Arc<dyn MonotonicClock>,
    metrics: Arc<Metrics>,
}

impl Detector {
    /// `config` is shared with the supervisor's reload path (§4.H): tuning
    /// values (threshold, window, block TTL) are read fresh on every packet
    /// rather than cached at construction, so a `SIGHUP` reload takes effect
    /// on the very next packet without rebuilding the detector.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Arc<ArcSwap<Config>>,
        map: Arc<SourceMap>,
        whitelist: Arc<ArcSwap<Whitelist>>,
        backend: Arc<dyn BlacklistView>,
        probe: Arc<dyn KernelProbe>,
        clock: Arc<dyn MonotonicClock>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self { config, map, whitelist, backend, probe, clock, metrics }
    }

    /// Handles one observed SYN from `addr`. Mirrors §4.F's numbered
    /// algorithm exactly, including the integer-truncated corroboration
    /// divisor and the rule that a `SUSPICIOUS` verdict does not reset the
    /// window counter.
    pub fn observe_syn(&self, addr: Ipv4Addr) -> Verdict {
        if self.whitelist.load().contains(addr) {
            self.metrics.record_verdict(Verdict::Allowed);
            return Verdict::Allowed;
        }

        let now = self.clock.now_ns();
        let Some(state) = self.map.get_or_create(addr, now) else {
            self.metrics.record_alloc_failure();
            return Verdict::Tracked;
        };

        if state.blocked && state.block_expiry > now {
            self.metrics.record_verdict(Verdict::AlreadyBlocked);
            return Verdict::AlreadyBlocked;
        }

        let cfg = self.config.load();
        let window_ns = cfg.detection.window_ms * 1_000_000;
        let mut syn_count = 0u32;
        let mut already_blocked = false;
        self.map.update(addr, |entry| {
            if now.saturating_sub(entry.window_start) > window_ns {
                entry.window_start = now;
                entry.syn_count = 1;
            } else {
                entry.syn_count += 1;
            }
            entry.last_seen = now;
            syn_count = entry.syn_count;
            already_blocked = entry.blocked;
        });

        if syn_count <= cfg.detection.syn_threshold || already_blocked {
            self.metrics.record_verdict(Verdict::Tracked);
            return Verdict::Tracked;
        }

        let half_open = self.probe.count_half_open_from(addr);
        let corroboration_floor = cfg.detection.syn_threshold / 2;

        if half_open > corroboration_floor {
            match self.backend.block(addr) {
                Ok(()) => {
                    let expiry = now + cfg.enforcement.block_duration_s * 1_000_000_000;
                    self.map.update(addr, |entry| {
                        entry.blocked = true;
                        entry.block_expiry = expiry;
                    });
                    info!(%addr, syn_count, half_open, "BLOCKED");
                    self.metrics.record_blocks(1);
                    self.metrics.record_verdict(Verdict::Blocked);
                    Verdict::Blocked
                }
                Err(e) => {
                    warn!(%addr, error = %e, "backend block failed, will retry on next packet");
                    self.metrics.record_backend_error();
                    self.metrics.record_verdict(Verdict::Suspicious);
                    Verdict::Suspicious
                }
            }
        } else {
            info!(%addr, syn_count, half_open, "SUSPICIOUS");
            self.metrics.record_verdict(Verdict::Suspicious);
            Verdict::Suspicious
        }
    }

    /// Reverses a block: used by the expirer once `block_expiry` has
    /// passed, and by the supervisor on an explicit unblock request.
    pub fn unblock(&self, addr: Ipv4Addr) -> bool {
        match self.backend.unblock(addr) {
            Ok(()) => {
                self.map.update(addr, |entry| {
                    entry.blocked = false;
                    entry.block_expiry = 0;
                });
                info!(%addr, "UNBLOCKED");
                true
            }
            Err(e) => {
                warn!(%addr, error = %e, "backend unblock failed, will retry next sweep");
                self.metrics.record_backend_error();
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blacklist::FakeBlacklist;
    use crate::clock::FakeClock;
    use crate::probe::FakeProbe;

    struct Harness {
        detector: Detector,
        clock: Arc<FakeClock>,
        backend: Arc<FakeBlacklist>,
        probe: Arc<FakeProbe>,
        whitelist: Arc<ArcSwap<Whitelist>>,
        map: Arc<SourceMap>,
    }

    fn harness(threshold: u32, window_ms: u64) -> Harness {
        let clock = Arc::new(FakeClock::new());
        let backend = Arc::new(FakeBlacklist::new());
        let probe = Arc::new(FakeProbe::new());
        let mut config = Config::default();
        config.detection.syn_threshold = threshold;
        config.detection.window_ms = window_ms;
        config.enforcement.block_duration_s = 300;
        let config = Arc::new(ArcSwap::from_pointee(config));
        let map = Arc::new(SourceMap::new(64, 1024));
        let whitelist = Arc::new(ArcSwap::from_pointee(Whitelist::new()));
        let metrics = Arc::new(Metrics::new());
        let detector = Detector::new(
            config,
            map.clone(),
            whitelist.clone(),
            backend.clone(),
            probe.clone(),
            clock.clone() as Arc<dyn MonotonicClock>,
            metrics,
        );
        Harness { detector, clock, backend, probe, whitelist, map }
    }

    fn ip(s: &str) -> Ipv4Addr {
        s.parse().unwrap()
    }

    #[test]
    fn whitelisted_source_is_always_allowed_and_untracked() {
        let h = harness(2, 1000);
        let wl = Whitelist::from_cidrs(["10.0.0.0/8"]).unwrap();
        h.whitelist.store(Arc::new(wl));
        let addr = ip("10.1.2.3");
        for _ in 0..100 {
            assert_eq!(h.detector.observe_syn(addr), Verdict::Allowed);
        }
        assert!(h.map.get(addr).is_none());
    }

    #[test]
    fn under_threshold_stays_tracked() {
        let h = harness(5, 1000);
        let addr = ip("1.2.3.4");
        for _ in 0..5 {
            assert_eq!(h.detector.observe_syn(addr), Verdict::Tracked);
        }
        assert_eq!(h.map.get(addr).unwrap().syn_count, 5);
    }

    #[test]
    fn syn_count_exactly_at_threshold_does_not_trigger() {
        let h = harness(3, 1000);
        let addr = ip("1.2.3.4");
        for _ in 0..3 {
            h.detector.observe_syn(addr);
        }
        assert_eq!(h.map.get(addr).unwrap().syn_count, 3);
        assert!(!h.backend.contains(addr));
    }

    #[test]
    fn crossing_threshold_without_corroboration_is_suspicious() {
        let h = harness(3, 1000);
        let addr = ip("1.2.3.4");
        for _ in 0..3 {
            h.detector.observe_syn(addr);
        }
        h.probe.set_count(addr, 1); // threshold/2 == 1, 1 is not > 1
        assert_eq!(h.detector.observe_syn(addr), Verdict::Suspicious);
        assert!(!h.backend.contains(addr));
    }

    #[test]
    fn crossing_threshold_with_corroboration_blocks() {
        let h = harness(3, 1000);
        let addr = ip("1.2.3.4");
        for _ in 0..3 {
            h.detector.observe_syn(addr);
        }
        h.probe.set_count(addr, 5);
        assert_eq!(h.detector.observe_syn(addr), Verdict::Blocked);
        assert!(h.backend.contains(addr));
        assert!(h.map.get(addr).unwrap().blocked);
    }

    #[test]
    fn suspicious_verdict_does_not_reset_window_and_reenters_next_packet() {
        let h = harness(2, 10_000_000_000);
        let addr = ip("1.2.3.4");
        h.detector.observe_syn(addr);
        h.detector.observe_syn(addr);
        assert_eq!(h.detector.observe_syn(addr), Verdict::Suspicious);
        h.probe.set_count(addr, 5);
        assert_eq!(h.detector.observe_syn(addr), Verdict::Blocked);
    }

    #[test]
    fn once_blocked_further_syns_report_already_blocked() {
        let h = harness(1, 1000);
        let addr = ip("1.2.3.4");
        h.detector.observe_syn(addr);
        h.probe.set_count(addr, 10);
        assert_eq!(h.detector.observe_syn(addr), Verdict::Blocked);
        assert_eq!(h.detector.observe_syn(addr), Verdict::AlreadyBlocked);
    }

    #[test]
    fn unblock_clears_state_and_backend() {
        let h = harness(1, 1000);
        let addr = ip("1.2.3.4");
        h.detector.observe_syn(addr);
        h.probe.set_count(addr, 10);
        h.detector.observe_syn(addr);
        assert!(h.detector.unblock(addr));
        assert!(!h.backend.contains(addr));
        assert!(!h.map.get(addr).unwrap().blocked);
    }

    #[test]
    fn reloaded_threshold_takes_effect_on_the_next_packet() {
        let h = harness(100, 1000);
        let addr = ip("1.2.3.4");
        for _ in 0..3 {
            assert_eq!(h.detector.observe_syn(addr), Verdict::Tracked);
        }

        let mut tightened = (**h.detector.config.load()).clone();
        tightened.detection.syn_threshold = 2;
        h.detector.config.store(Arc::new(tightened));

        h.probe.set_count(addr, 5);
        assert_eq!(h.detector.observe_syn(addr), Verdict::Blocked);
    }

    #[test]
    fn window_reset_after_expiry_restarts_count_at_one() {
        let h = harness(5, 1000);
        let addr = ip("1.2.3.4");
        h.detector.observe_syn(addr);
        h.detector.observe_syn(addr);
        h.clock.advance(2_000_000_000);
        h.detector.observe_syn(addr);
        assert_eq!(h.map.get(addr).unwrap().syn_count, 1);
    }
}
