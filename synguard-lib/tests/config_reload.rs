use std::net::Ipv4Addr;
use std::sync::Arc;

use arc_swap::ArcSwap;
use synguard_lib::blacklist::{BlacklistView, FakeBlacklist};
use synguard_lib::clock::MonotonicClock;
use synguard_lib::config::Config;
use synguard_lib::detector::{Detector, Verdict};
use synguard_lib::probe::FakeProbe;
use synguard_lib::source_map::SourceMap;
use synguard_lib::whitelist::Whitelist;

fn addr(s: &str) -> Ipv4Addr {
    s.parse().unwrap()
}

/// §4.H's reload protocol: "threshold / window / TTL changes take effect on
/// subsequent packets; the map and backend are not flushed." A tightened
/// threshold swapped into the shared config slot applies on the very next
/// packet, with no detector rebuild and no disturbance to already-tracked
/// state.
#[test]
fn tightened_threshold_applies_on_next_packet_without_flushing_tracked_state() {
    let clock = Arc::new(synguard_lib::clock::FakeClock::new());
    let backend = Arc::new(FakeBlacklist::new());
    let probe = Arc::new(FakeProbe::new());
    let map = Arc::new(SourceMap::new(64, 1024));
    let whitelist = Arc::new(ArcSwap::from_pointee(Whitelist::new()));
    let metrics = Arc::new(synguard_lib::metrics::Metrics::new());

    let mut initial = Config::default();
    initial.detection.syn_threshold = 1_000;
    initial.detection.window_ms = 10_000;
    let config = Arc::new(ArcSwap::from_pointee(initial));

    let detector = Detector::new(
        config.clone(),
        map.clone(),
        whitelist,
        backend.clone(),
        probe.clone(),
        clock as Arc<dyn MonotonicClock>,
        metrics,
    );

    let source = addr("203.0.113.9");
    for _ in 0..10 {
        assert_eq!(detector.observe_syn(source), Verdict::Tracked);
    }
    assert_eq!(map.get(source).unwrap().syn_count, 10);

    // Simulate a SIGHUP reload that tightens the threshold, as `Supervisor::reload`
    // does by storing a freshly loaded `Config` into the same shared slot.
    let mut tightened = (**config.load()).clone();
    tightened.detection.syn_threshold = 5;
    config.store(Arc::new(tightened));

    probe.set_count(source, 10);
    assert_eq!(
        detector.observe_syn(source),
        Verdict::Blocked,
        "the new threshold must apply on the next packet, not after a restart"
    );
    assert!(backend.contains(source));
    // The window counter kept accumulating across the reload; it was not reset.
    assert_eq!(map.get(source).unwrap().syn_count, 11);
}
