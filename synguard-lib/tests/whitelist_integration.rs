use std::io::Write;
use std::net::Ipv4Addr;
use std::sync::Arc;

use arc_swap::ArcSwap;
use synguard_lib::blacklist::{BlacklistView, FakeBlacklist};
use synguard_lib::clock::{FakeClock, MonotonicClock};
use synguard_lib::config::Config;
use synguard_lib::detector::{Detector, Verdict};
use synguard_lib::probe::FakeProbe;
use synguard_lib::source_map::SourceMap;
use synguard_lib::whitelist::Whitelist;

fn addr(s: &str) -> Ipv4Addr {
    s.parse().unwrap()
}

/// Scenario 2 (§8): a whitelisted heavy talker is never tracked and never
/// reaches the backend, no matter how many SYNs it sends.
#[test]
fn whitelisted_heavy_talker_is_never_tracked() {
    let clock = Arc::new(FakeClock::new());
    let backend = Arc::new(FakeBlacklist::new());
    let probe = Arc::new(FakeProbe::new());
    let map = Arc::new(SourceMap::new(1024, 10_000));
    let whitelist = Whitelist::from_cidrs(["10.0.0.0/8"]).unwrap();
    let whitelist = Arc::new(ArcSwap::from_pointee(whitelist));
    let metrics = Arc::new(synguard_lib::metrics::Metrics::new());
    let mut config = Config::default();
    config.detection.syn_threshold = 50;
    config.detection.window_ms = 1_000;
    config.enforcement.block_duration_s = 5;
    let config = Arc::new(ArcSwap::from_pointee(config));
    let detector = Detector::new(
        config,
        map.clone(),
        whitelist,
        backend.clone(),
        probe,
        clock as Arc<dyn MonotonicClock>,
        metrics,
    );

    let heavy_talker = addr("10.1.2.3");
    let mut allowed_count = 0;
    for _ in 0..10_000 {
        if detector.observe_syn(heavy_talker) == Verdict::Allowed {
            allowed_count += 1;
        }
    }

    assert_eq!(allowed_count, 10_000);
    assert!(map.get(heavy_talker).is_none());
    assert!(!backend.contains(heavy_talker));
}

/// Scenario 6 (§8): reloading the whitelist mid-attack routes subsequent
/// packets from the now-whitelisted source through the allow branch,
/// while an existing block already installed is left untouched until its
/// own TTL — reload only swaps the whitelist pointer, it never flushes
/// the map or the backend.
#[test]
fn reload_whitelists_source_without_disturbing_existing_block() {
    let clock = Arc::new(FakeClock::new());
    let backend = Arc::new(FakeBlacklist::new());
    let probe = Arc::new(FakeProbe::new());
    let map = Arc::new(SourceMap::new(1024, 10_000));
    let whitelist_slot = Arc::new(ArcSwap::from_pointee(Whitelist::new()));
    let metrics = Arc::new(synguard_lib::metrics::Metrics::new());
    let mut config = Config::default();
    config.detection.syn_threshold = 2;
    config.detection.window_ms = 1_000;
    config.enforcement.block_duration_s = 300;
    let config = Arc::new(ArcSwap::from_pointee(config));
    let detector = Detector::new(
        config,
        map.clone(),
        whitelist_slot.clone(),
        backend.clone(),
        probe.clone(),
        clock as Arc<dyn MonotonicClock>,
        metrics,
    );

    let attacker = addr("198.51.100.50");
    probe.set_count(attacker, 10);
    detector.observe_syn(attacker);
    detector.observe_syn(attacker);
    assert_eq!(detector.observe_syn(attacker), Verdict::Blocked);
    assert!(backend.contains(attacker));

    let mut whitelist_file = tempfile::NamedTempFile::new().unwrap();
    writeln!(whitelist_file, "{attacker}/32").unwrap();
    let text = std::fs::read_to_string(whitelist_file.path()).unwrap();
    let (reloaded, skipped) = Whitelist::from_file_text(&text);
    assert!(skipped.is_empty());
    whitelist_slot.store(Arc::new(reloaded));

    assert_eq!(detector.observe_syn(attacker), Verdict::Allowed);
    assert!(backend.contains(attacker), "reload must not flush an existing block");
}
