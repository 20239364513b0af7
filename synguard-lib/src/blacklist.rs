use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::process::Command;
use std::sync::Mutex;

use crate::error::{Result, SynGuardError};

/// Kernel-resident timed blacklist (§4.E). Implementations must be
/// idempotent: adding an already-present address or removing an absent one
/// is a success, not an error, since the detector and the expirer can both
/// race to mutate the same entry.
pub trait BlacklistView: Send + Sync {
    fn block(&self, addr: Ipv4Addr) -> Result<()>;
    fn unblock(&self, addr: Ipv4Addr) -> Result<()>;
    fn contains(&self, addr: Ipv4Addr) -> bool;
}

/// Drives the `ipset` command-line tool directly, one process per
/// mutation. Always invokes via an argument vector (`Command::arg`, never
/// a shell string) so no attacker-controlled octet can be interpreted as
/// shell syntax.
pub struct IpsetBackend {
    set_name: String,
}

impl IpsetBackend {
    pub fn new(set_name: impl Into<String>) -> Self {
        Self { set_name: set_name.into() }
    }

    fn run(&self, args: &[&str]) -> Result<std::process::Output> {
        Command::new("ipset")
            .args(args)
            .output()
            .map_err(|e| SynGuardError::Backend(format!("failed to spawn ipset: {e}")))
    }
}

impl BlacklistView for IpsetBackend {
    fn block(&self, addr: Ipv4Addr) -> Result<()> {
        let addr_str = addr.to_string();
        let output = self.run(&["add", &self.set_name, &addr_str, "-exist"])?;
        if output.status.success() {
            Ok(())
        } else {
            Err(SynGuardError::Backend(format!(
                "ipset add {addr_str} failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )))
        }
    }

    fn unblock(&self, addr: Ipv4Addr) -> Result<()> {
        let addr_str = addr.to_string();
        let output = self.run(&["del", &self.set_name, &addr_str, "-exist"])?;
        if output.status.success() {
            Ok(())
        } else {
            Err(SynGuardError::Backend(format!(
                "ipset del {addr_str} failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )))
        }
    }

    fn contains(&self, addr: Ipv4Addr) -> bool {
        let addr_str = addr.to_string();
        match self.run(&["test", &self.set_name, &addr_str]) {
            Ok(output) => output.status.success(),
            Err(_) => false,
        }
    }
}

/// In-memory double for tests: no subprocess, no kernel dependency.
#[derive(Default)]
pub struct FakeBlacklist {
    blocked: Mutex<HashSet<Ipv4Addr>>,
}

impl FakeBlacklist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn blocked_snapshot(&self) -> HashSet<Ipv4Addr> {
        self.blocked.lock().unwrap().clone()
    }
}

impl BlacklistView for FakeBlacklist {
    fn block(&self, addr: Ipv4Addr) -> Result<()> {
        self.blocked.lock().unwrap().insert(addr);
        Ok(())
    }

    fn unblock(&self, addr: Ipv4Addr) -> Result<()> {
        self.blocked.lock().unwrap().remove(&addr);
        Ok(())
    }

    fn contains(&self, addr: Ipv4Addr) -> bool {
        self.blocked.lock().unwrap().contains(&addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> Ipv4Addr {
        s.parse().unwrap()
    }

    #[test]
    fn fake_blacklist_block_then_contains() {
        let bl = FakeBlacklist::new();
        assert!(!bl.contains(ip("1.2.3.4")));
        bl.block(ip("1.2.3.4")).unwrap();
        assert!(bl.contains(ip("1.2.3.4")));
    }

    #[test]
    fn fake_blacklist_unblock_is_idempotent() {
        let bl = FakeBlacklist::new();
        bl.unblock(ip("1.2.3.4")).unwrap();
        bl.block(ip("1.2.3.4")).unwrap();
        bl.unblock(ip("1.2.3.4")).unwrap();
        bl.unblock(ip("1.2.3.4")).unwrap();
        assert!(!bl.contains(ip("1.2.3.4")));
    }

    #[test]
    fn fake_blacklist_double_block_is_idempotent() {
        let bl = FakeBlacklist::new();
        bl.block(ip("1.2.3.4")).unwrap();
        bl.block(ip("1.2.3.4")).unwrap();
        assert_eq!(bl.blocked_snapshot().len(), 1);
    }
}
