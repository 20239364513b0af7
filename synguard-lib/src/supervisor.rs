use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::blacklist::BlacklistView;
use crate::capture::{ParseOutcome, RawSocketCapture};
use crate::clock::MonotonicClock;
use crate::config::{self, Config};
use crate::context::Context;
use crate::probe::KernelProbe;
use crate::signals::{self, SignalFlags};
use crate::whitelist::Whitelist;

/// Drives the daemon's whole lifecycle (§4.H): build the context in
/// dependency order (clock, whitelist, backend, probe, metrics, expirer —
/// all before the detector starts seeing packets), spawn the capture,
/// expiry and metrics threads, then block on signals until shutdown.
pub struct Supervisor {
    config_path: String,
    context: Arc<Context>,
    signals: SignalFlags,
}

impl Supervisor {
    /// `backend_for` and `probe_for` build the blacklist backend and
    /// kernel-state probe from the loaded config (the backend needs
    /// `enforcement.ipset_name`, neither of which is known until the
    /// config file is read).
    pub fn bootstrap(
        config_path: &str,
        clock: Arc<dyn MonotonicClock>,
        backend_for: impl FnOnce(&Config) -> Arc<dyn BlacklistView>,
        probe_for: impl FnOnce(&Config) -> Arc<dyn KernelProbe>,
    ) -> crate::error::Result<Self> {
        let config = config::load_from_path(config_path)?;
        let backend = backend_for(&config);
        let probe = probe_for(&config);
        let whitelist = load_whitelist(&config);
        let context = Arc::new(Context::new(config, backend, probe, clock, whitelist));
        let signals = signals::register().map_err(crate::error::SynGuardError::Io)?;

        Ok(Self { config_path: config_path.to_string(), context, signals })
    }

    pub fn context(&self) -> Arc<Context> {
        self.context.clone()
    }

    /// Spawns the worker threads and blocks the calling thread polling for
    /// `SIGHUP` (reload) and `SIGTERM`/`SIGINT` (shutdown) until shutdown is
    /// requested, then waits for every worker to exit before returning.
    pub fn run(&self) -> crate::error::Result<()> {
        let shutdown = self.context.shutdown_flag();

        let capture_handle = {
            let context = self.context.clone();
            let shutdown = shutdown.clone();
            std::thread::spawn(move || capture_thread(context, shutdown))
        };

        let expirer_handle = {
            let context = self.context.clone();
            let shutdown = shutdown.clone();
            std::thread::spawn(move || expirer_thread(context, shutdown))
        };

        let metrics_handle = {
            let context = self.context.clone();
            let shutdown = shutdown.clone();
            std::thread::spawn(move || metrics_thread(context, shutdown))
        };

        while !self.signals.shutdown.load(Ordering::SeqCst) {
            if self.signals.reload.swap(false, Ordering::SeqCst) {
                self.reload();
            }
            std::thread::sleep(Duration::from_millis(200));
        }

        info!("shutdown signal received, stopping workers");
        self.context.request_shutdown();

        for (name, handle) in [("capture", capture_handle), ("expirer", expirer_handle), ("metrics", metrics_handle)] {
            if handle.join().is_err() {
                error!(thread = name, "worker thread panicked");
            }
        }

        Ok(())
    }

    /// `SIGHUP` handling (§4.H reload protocol): re-reads the whitelist
    /// file and swaps it atomically. Config values that size the source
    /// map or pick the capture mode are intentionally NOT re-applied here;
    /// those require a restart, since the data structures they size are
    /// already allocated. The existing block set and tracked sources are
    /// left untouched, per the reload scenario in §8.
    fn reload(&self) {
        info!(path = %self.config_path, "reload requested, re-reading whitelist");
        match config::load_from_path(&self.config_path) {
            Ok(new_config) => {
                let whitelist = load_whitelist(&new_config);
                self.context.whitelist.store(Arc::new(whitelist));
                self.context.config.store(Arc::new(new_config));
                info!("reload complete");
            }
            Err(e) => {
                warn!(error = %e, "reload failed, keeping previous configuration");
            }
        }
    }
}

fn load_whitelist(config: &Config) -> Whitelist {
    let Some(path) = &config.whitelist.file else {
        return Whitelist::new();
    };
    match std::fs::read_to_string(path) {
        Ok(text) => {
            let (whitelist, skipped) = Whitelist::from_file_text(&text);
            for line in &skipped {
                warn!(line = line.lineno, error = %line.error, "skipped invalid whitelist entry");
            }
            whitelist
        }
        Err(e) => {
            warn!(path, error = %e, "failed to read whitelist file, starting with an empty whitelist");
            Whitelist::new()
        }
    }
}

fn capture_thread(context: Arc<Context>, shutdown: Arc<AtomicBool>) {
    let socket = match RawSocketCapture::open() {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "failed to open raw capture socket, capture thread exiting");
            return;
        }
    };

    let result = socket.run(shutdown, |outcome| {
        context.metrics.record_packet();
        match outcome {
            ParseOutcome::Syn(addr) => {
                context.detector.observe_syn(addr);
            }
            ParseOutcome::Malformed => context.metrics.record_parse_error(),
            ParseOutcome::NotSyn => {}
        }
    });

    if let Err(e) = result {
        error!(error = %e, "capture loop exited with error");
    }
}

/// Sleeps in short slices so `shutdown` is observed promptly (§5) rather
/// than blocking for the whole sweep period in one call.
fn expirer_thread(context: Arc<Context>, shutdown: Arc<AtomicBool>) {
    let expirer = crate::expirer::Expirer::new(context.detector.clone());
    let mut next_tick = Duration::ZERO;

    while !shutdown.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(500));
        next_tick = next_tick.saturating_sub(Duration::from_millis(500));
        if !next_tick.is_zero() {
            continue;
        }

        let now = context.clock.now_ns();
        let lifted = expirer.sweep(&context.map, now, 4096);
        if lifted > 0 {
            context.metrics.record_expired(lifted as u64);
        }

        let interval = context.config.load().detection.proc_check_interval_s.max(1);
        next_tick = Duration::from_secs(interval);
    }
}

fn metrics_thread(context: Arc<Context>, shutdown: Arc<AtomicBool>) {
    let socket_path = context.config.load().logging.metrics_socket.clone();
    if let Err(e) = crate::metrics::serve(&socket_path, context.metrics.clone(), context.map.clone(), shutdown) {
        error!(error = %e, "metrics server exited with error");
    }
}
