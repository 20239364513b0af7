use std::time::Instant;

/// A source of monotonic nanosecond timestamps that never decreases across
/// calls on the same process. All window and expiry arithmetic in the
/// detector uses this instead of wall-clock time.
pub trait MonotonicClock: Send + Sync {
    fn now_ns(&self) -> u64;
}

/// The real clock, backed by `std::time::Instant`.
#[derive(Debug, Default)]
pub struct SystemClock {
    epoch: once_cell_epoch::Epoch,
}

impl SystemClock {
    pub fn new() -> Self {
        Self { epoch: once_cell_epoch::Epoch::new() }
    }
}

impl MonotonicClock for SystemClock {
    fn now_ns(&self) -> u64 {
        self.epoch.elapsed_ns()
    }
}

/// A tiny lazily-initialized epoch so `now_ns()` can be a plain `u64`
/// without threading an `Instant` through every call site.
mod once_cell_epoch {
    use std::sync::OnceLock;
    use std::time::Instant;

    #[derive(Debug, Default)]
    pub struct Epoch {
        start: OnceLock<Instant>,
    }

    impl Epoch {
        pub fn new() -> Self {
            Self { start: OnceLock::new() }
        }

        pub fn elapsed_ns(&self) -> u64 {
            let start = self.start.get_or_init(Instant::now);
            start.elapsed().as_nanos() as u64
        }
    }
}

/// A deterministic fake clock for tests: advances only when told to.
#[derive(Debug, Default)]
pub struct FakeClock {
    now: std::sync::atomic::AtomicU64,
}

impl FakeClock {
    pub fn new() -> Self {
        Self { now: std::sync::atomic::AtomicU64::new(0) }
    }

    pub fn advance(&self, ns: u64) {
        self.now.fetch_add(ns, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn set(&self, ns: u64) {
        self.now.store(ns, std::sync::atomic::Ordering::SeqCst);
    }
}

impl MonotonicClock for FakeClock {
    fn now_ns(&self) -> u64 {
        self.now.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_never_decreases() {
        let clock = SystemClock::new();
        let a = clock.now_ns();
        let b = clock.now_ns();
        assert!(b >= a);
    }

    #[test]
    fn fake_clock_advances_on_demand() {
        let clock = FakeClock::new();
        assert_eq!(clock.now_ns(), 0);
        clock.advance(1_000);
        assert_eq!(clock.now_ns(), 1_000);
        clock.set(5);
        assert_eq!(clock.now_ns(), 5);
    }
}
