use std::io::Write;
use std::net::{TcpListener, TcpStream};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};
use tracing::{info, warn};

use crate::detector::Verdict;
use crate::source_map::SourceMap;

/// Counters and gauges exposed on the metrics surface (§4.I), registered
/// against a private `prometheus::Registry` rather than the process-wide
/// default one so unit tests can build as many `Metrics` instances as they
/// like without colliding.
pub struct Metrics {
    registry: Registry,
    pub syns_observed: IntCounter,
    pub syns_allowed_whitelisted: IntCounter,
    pub syns_already_blocked: IntCounter,
    pub sources_suspicious: IntCounter,
    pub sources_blocked: IntCounter,
    pub blocks_expired: IntCounter,
    pub probe_errors: IntCounter,
    pub backend_errors: IntCounter,
    pub packets_total: IntCounter,
    pub parse_errors: IntCounter,
    pub alloc_failures: IntCounter,
    tracked_sources: IntGauge,
    blocked_sources: IntGauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        macro_rules! counter {
            ($name:literal, $help:literal) => {{
                let c = IntCounter::new($name, $help).expect("static metric name/help is valid");
                registry.register(Box::new(c.clone())).expect("metric name is unique in this registry");
                c
            }};
        }
        macro_rules! gauge {
            ($name:literal, $help:literal) => {{
                let g = IntGauge::new($name, $help).expect("static metric name/help is valid");
                registry.register(Box::new(g.clone())).expect("metric name is unique in this registry");
                g
            }};
        }

        Self {
            syns_observed: counter!("synguard_syns_observed_total", "Total SYNs observed"),
            syns_allowed_whitelisted: counter!(
                "synguard_syns_allowed_whitelisted_total",
                "SYNs from whitelisted sources"
            ),
            syns_already_blocked: counter!(
                "synguard_syns_already_blocked_total",
                "SYNs from sources already under block"
            ),
            sources_suspicious: counter!(
                "synguard_sources_suspicious_total",
                "SYNs that crossed the rate threshold without kernel corroboration"
            ),
            sources_blocked: counter!("synguard_sources_blocked_total", "Sources blocked after corroboration"),
            blocks_expired: counter!("synguard_blocks_expired_total", "Blocks lifted after TTL"),
            probe_errors: counter!("synguard_probe_errors_total", "Kernel state probe failures"),
            backend_errors: counter!("synguard_backend_errors_total", "Blacklist backend call failures"),
            packets_total: counter!("synguard_packets_total", "Total packets read off the capture socket"),
            parse_errors: counter!("synguard_parse_errors_total", "Packets too malformed to parse an IPv4/TCP header from"),
            alloc_failures: counter!(
                "synguard_alloc_failures_total",
                "Source map lookups that failed (e.g. a poisoned lock)"
            ),
            tracked_sources: gauge!("synguard_tracked_sources", "Currently tracked sources"),
            blocked_sources: gauge!("synguard_blocked_sources", "Currently blocked sources"),
            registry,
        }
    }

    pub fn record_verdict(&self, verdict: Verdict) {
        self.syns_observed.inc();
        match verdict {
            Verdict::Allowed => self.syns_allowed_whitelisted.inc(),
            Verdict::AlreadyBlocked => self.syns_already_blocked.inc(),
            Verdict::Suspicious => self.sources_suspicious.inc(),
            // `Blocked` is counted via `record_blocks`, called alongside the backend
            // call that actually installs the block, not from the verdict alone.
            Verdict::Blocked | Verdict::Tracked => {}
        }
    }

    pub fn record_blocks(&self, count: u64) {
        self.sources_blocked.inc_by(count);
    }

    pub fn record_expired(&self, count: u64) {
        self.blocks_expired.inc_by(count);
    }

    pub fn record_probe_error(&self) {
        self.probe_errors.inc();
    }

    pub fn record_packet(&self) {
        self.packets_total.inc();
    }

    pub fn record_parse_error(&self) {
        self.parse_errors.inc();
    }

    pub fn record_alloc_failure(&self) {
        self.alloc_failures.inc();
    }

    pub fn record_backend_error(&self) {
        self.backend_errors.inc();
    }

    /// Refreshes the live gauges from `map` and renders the Prometheus text
    /// exposition format.
    pub fn render(&self, map: &SourceMap) -> String {
        let (tracked, blocked) = map.stats();
        self.tracked_sources.set(tracked as i64);
        self.blocked_sources.set(blocked as i64);

        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        let families = self.registry.gather();
        encoder.encode(&families, &mut buffer).expect("in-memory buffer write cannot fail");
        String::from_utf8(buffer).expect("prometheus text encoder always emits valid utf8")
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// One-request-per-connection text server (§10.3): a Unix domain socket at
/// `socket_path`, falling back to loopback TCP on port 9273 if the socket
/// path's parent directory doesn't exist (e.g. running outside a proper
/// install). Every accepted connection gets one rendered snapshot and is
/// then closed; there's no persistent per-client state to leak.
pub fn serve(
    socket_path: &str,
    metrics: Arc<Metrics>,
    map: Arc<SourceMap>,
    shutdown: Arc<AtomicBool>,
) -> std::io::Result<()> {
    if Path::new(socket_path).parent().is_some_and(Path::exists) {
        let _ = std::fs::remove_file(socket_path);
        let listener = UnixListener::bind(socket_path)?;
        listener.set_nonblocking(true)?;
        info!(path = socket_path, "metrics endpoint listening on unix socket");
        accept_loop_unix(listener, metrics, map, shutdown)
    } else {
        let listener = TcpListener::bind(("127.0.0.1", 9273))?;
        listener.set_nonblocking(true)?;
        warn!("metrics socket directory missing, falling back to tcp 127.0.0.1:9273");
        accept_loop_tcp(listener, metrics, map, shutdown)
    }
}

fn accept_loop_unix(
    listener: UnixListener,
    metrics: Arc<Metrics>,
    map: Arc<SourceMap>,
    shutdown: Arc<AtomicBool>,
) -> std::io::Result<()> {
    while !shutdown.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, _)) => handle_unix(stream, &metrics, &map),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(std::time::Duration::from_millis(100));
            }
            Err(e) => warn!(error = %e, "metrics accept failed"),
        }
    }
    Ok(())
}

fn accept_loop_tcp(
    listener: TcpListener,
    metrics: Arc<Metrics>,
    map: Arc<SourceMap>,
    shutdown: Arc<AtomicBool>,
) -> std::io::Result<()> {
    while !shutdown.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, _)) => handle_tcp(stream, &metrics, &map),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(std::time::Duration::from_millis(100));
            }
            Err(e) => warn!(error = %e, "metrics accept failed"),
        }
    }
    Ok(())
}

fn handle_unix(mut stream: UnixStream, metrics: &Metrics, map: &SourceMap) {
    let body = metrics.render(map);
    if let Err(e) = stream.write_all(body.as_bytes()) {
        warn!(error = %e, "metrics write failed");
    }
}

fn handle_tcp(mut stream: TcpStream, metrics: &Metrics, map: &SourceMap) {
    let body = metrics.render(map);
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain; version=0.0.4\r\nContent-Length: {}\r\n\r\n{}",
        body.len(),
        body
    );
    if let Err(e) = stream.write_all(response.as_bytes()) {
        warn!(error = %e, "metrics write failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_includes_all_counters_and_gauges() {
        let metrics = Metrics::new();
        let map = SourceMap::new(16, 10);
        metrics.record_verdict(Verdict::Suspicious);
        metrics.record_blocks(1);
        let text = metrics.render(&map);
        assert!(text.contains("synguard_syns_observed_total 1"));
        assert!(text.contains("synguard_sources_suspicious_total 1"));
        assert!(text.contains("synguard_sources_blocked_total 1"));
        assert!(text.contains("synguard_tracked_sources 0"));
    }

    #[test]
    fn record_verdict_allowed_does_not_count_as_observed_block() {
        let metrics = Metrics::new();
        metrics.record_verdict(Verdict::Allowed);
        assert_eq!(metrics.syns_allowed_whitelisted.get(), 1);
        assert_eq!(metrics.sources_blocked.get(), 0);
    }

    #[test]
    fn capture_and_allocation_counters_are_independent_of_verdicts() {
        let metrics = Metrics::new();
        metrics.record_packet();
        metrics.record_packet();
        metrics.record_parse_error();
        metrics.record_alloc_failure();
        assert_eq!(metrics.packets_total.get(), 2);
        assert_eq!(metrics.parse_errors.get(), 1);
        assert_eq!(metrics.alloc_failures.get(), 1);
    }
}
