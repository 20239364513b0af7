use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use signal_hook::consts::{SIGHUP, SIGINT, SIGTERM};
use signal_hook::flag;

/// Flags flipped by signal handlers, polled by the supervisor loop. The
/// handlers themselves only ever touch an `AtomicBool` (`signal_hook::flag`
/// guarantees this), satisfying the async-signal-safety constraint a
/// hand-rolled `libc::signal` handler would make easy to violate (§4.H).
pub struct SignalFlags {
    pub shutdown: Arc<AtomicBool>,
    pub reload: Arc<AtomicBool>,
}

/// Registers `SIGTERM`/`SIGINT` to set `shutdown` and `SIGHUP` to set
/// `reload`. Returns an error only if the underlying `sigaction` call
/// fails, which in practice means the process lacks permission to install
/// handlers at all.
pub fn register() -> std::io::Result<SignalFlags> {
    let shutdown = Arc::new(AtomicBool::new(false));
    let reload = Arc::new(AtomicBool::new(false));

    flag::register(SIGTERM, shutdown.clone())?;
    flag::register(SIGINT, shutdown.clone())?;
    flag::register(SIGHUP, reload.clone())?;

    Ok(SignalFlags { shutdown, reload })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    #[test]
    fn flags_start_clear() {
        let flags = register().expect("signal registration should succeed under test");
        assert!(!flags.shutdown.load(Ordering::SeqCst));
        assert!(!flags.reload.load(Ordering::SeqCst));
    }
}
