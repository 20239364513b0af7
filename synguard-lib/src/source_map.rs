use std::net::Ipv4Addr;
use std::sync::RwLock;

use ahash::AHasher;
use std::hash::{Hash, Hasher};

/// Per-source tracking record (§3 `SourceState`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceState {
    pub addr: Ipv4Addr,
    pub window_start: u64,
    pub syn_count: u32,
    pub last_seen: u64,
    pub blocked: bool,
    pub block_expiry: u64,
}

impl SourceState {
    fn fresh(addr: Ipv4Addr, now: u64) -> Self {
        Self { addr, window_start: now, syn_count: 0, last_seen: now, blocked: false, block_expiry: 0 }
    }
}

/// Outcome of a [`SourceMap::remove`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    NotFound,
}

/// Concurrent address→[`SourceState`] table with LRU eviction and a fixed
/// bucket count (§4.C). A single `RwLock` protects the bucket array and
/// every entry's fields; see the crate-level docs for why this coarse lock
/// is the right default for the target load.
pub struct SourceMap {
    buckets: RwLock<Vec<Vec<SourceState>>>,
    mask: u64,
    capacity: usize,
}

impl SourceMap {
    /// `bucket_count` MUST be a power of two; this is a configuration-time
    /// invariant, not something callers can violate at runtime.
    pub fn new(bucket_count: u32, capacity: u32) -> Self {
        assert!(bucket_count > 0 && bucket_count.is_power_of_two(), "bucket_count must be a positive power of two");
        let buckets = (0..bucket_count).map(|_| Vec::new()).collect();
        Self { buckets: RwLock::new(buckets), mask: (bucket_count - 1) as u64, capacity: capacity as usize }
    }

    fn bucket_index(&self, addr: Ipv4Addr) -> usize {
        let mut hasher = AHasher::default();
        u32::from(addr).hash(&mut hasher);
        (hasher.finish() & self.mask) as usize
    }

    /// Looks up `addr`, creating a fresh entry (after evicting the LRU
    /// entry if at capacity) if absent. Always touches `last_seen`, even on
    /// a hit, so LRU ordering stays correct. Returns `None` only if the map
    /// itself is misconfigured (zero buckets), which construction already
    /// prevents — present so callers model the allocation-failure path
    /// from §4.C without a panic.
    pub fn get_or_create(&self, addr: Ipv4Addr, now: u64) -> Option<SourceState> {
        let idx = self.bucket_index(addr);
        let mut buckets = self.buckets.write().ok()?;

        if let Some(entry) = buckets[idx].iter_mut().find(|s| s.addr == addr) {
            entry.last_seen = now;
            return Some(*entry);
        }

        if self.live_count(&buckets) >= self.capacity {
            evict_lru(&mut buckets);
        }

        let fresh = SourceState::fresh(addr, now);
        buckets[idx].push(fresh);
        Some(fresh)
    }

    /// Read-only probe: does not create, does not touch `last_seen`.
    pub fn get(&self, addr: Ipv4Addr) -> Option<SourceState> {
        let idx = self.bucket_index(addr);
        let buckets = self.buckets.read().ok()?;
        buckets[idx].iter().find(|s| s.addr == addr).copied()
    }

    /// Applies `f` to the entry for `addr` under the write lock, e.g. to
    /// bump `syn_count` or transition `blocked`. No-op if absent.
    pub fn update<F: FnOnce(&mut SourceState)>(&self, addr: Ipv4Addr, f: F) {
        let idx = self.bucket_index(addr);
        if let Ok(mut buckets) = self.buckets.write() {
            if let Some(entry) = buckets[idx].iter_mut().find(|s| s.addr == addr) {
                f(entry);
            }
        }
    }

    pub fn remove(&self, addr: Ipv4Addr) -> RemoveOutcome {
        let idx = self.bucket_index(addr);
        let mut buckets = match self.buckets.write() {
            Ok(b) => b,
            Err(_) => return RemoveOutcome::NotFound,
        };
        let chain = &mut buckets[idx];
        if let Some(pos) = chain.iter().position(|s| s.addr == addr) {
            chain.swap_remove(pos);
            RemoveOutcome::Removed
        } else {
            RemoveOutcome::NotFound
        }
    }

    /// Returns up to `cap` addresses with `blocked == true` and
    /// `block_expiry <= now`. Enumeration order is unspecified (§4.C).
    pub fn expired_blocks(&self, now: u64, cap: usize) -> Vec<Ipv4Addr> {
        let buckets = match self.buckets.read() {
            Ok(b) => b,
            Err(_) => return Vec::new(),
        };
        let mut out = Vec::new();
        'outer: for chain in buckets.iter() {
            for entry in chain {
                if entry.blocked && entry.block_expiry <= now {
                    out.push(entry.addr);
                    if out.len() >= cap {
                        break 'outer;
                    }
                }
            }
        }
        out
    }

    /// `(size, blocked_size)`.
    pub fn stats(&self) -> (usize, usize) {
        let buckets = match self.buckets.read() {
            Ok(b) => b,
            Err(_) => return (0, 0),
        };
        let size = self.live_count(&buckets);
        let blocked = buckets.iter().flatten().filter(|s| s.blocked).count();
        (size, blocked)
    }

    pub fn clear(&self) {
        if let Ok(mut buckets) = self.buckets.write() {
            for chain in buckets.iter_mut() {
                chain.clear();
            }
        }
    }

    fn live_count(&self, buckets: &[Vec<SourceState>]) -> usize {
        buckets.iter().map(Vec::len).sum()
    }
}

/// Scans every bucket for the entry with the smallest `last_seen` and
/// removes it. `O(n)` in total live entries; acceptable because `capacity`
/// is bounded by config and eviction is rare in steady state (§4.C).
fn evict_lru(buckets: &mut [Vec<SourceState>]) {
    let mut victim: Option<(usize, usize, u64)> = None;
    for (bucket_idx, chain) in buckets.iter().enumerate() {
        for (entry_idx, entry) in chain.iter().enumerate() {
            let worse = match victim {
                None => true,
                Some((_, _, best_last_seen)) => entry.last_seen < best_last_seen,
            };
            if worse {
                victim = Some((bucket_idx, entry_idx, entry.last_seen));
            }
        }
    }
    if let Some((bucket_idx, entry_idx, _)) = victim {
        buckets[bucket_idx].swap_remove(entry_idx);
    }
}
