use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::sync::Mutex;

/// Injectable corroboration source for the detector's threshold branch
/// (§4.F step 6.1): opens, reads, and closes the underlying table on every
/// call, with no state carried between calls.
pub trait KernelProbe: Send + Sync {
    fn count_half_open_from(&self, addr: Ipv4Addr) -> u32;
}

/// Reads `/proc/net/tcp` (or a configured equivalent path) fresh on every
/// call. A read failure is a probe error (§7): treated as `count == 0`
/// rather than propagated, since the detector must still render a verdict.
pub struct ProcNetTcpProbe {
    path: String,
}

impl ProcNetTcpProbe {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl Default for ProcNetTcpProbe {
    fn default() -> Self {
        Self::new("/proc/net/tcp")
    }
}

impl KernelProbe for ProcNetTcpProbe {
    fn count_half_open_from(&self, addr: Ipv4Addr) -> u32 {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => count_half_open_from(&text, addr),
            Err(_) => 0,
        }
    }
}

/// A scripted double for tests: returns a fixed count per address, set by
/// [`FakeProbe::set_count`], defaulting to 0.
#[derive(Default)]
pub struct FakeProbe {
    counts: Mutex<std::collections::HashMap<Ipv4Addr, u32>>,
}

impl FakeProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_count(&self, addr: Ipv4Addr, count: u32) {
        self.counts.lock().unwrap().insert(addr, count);
    }
}

impl KernelProbe for FakeProbe {
    fn count_half_open_from(&self, addr: Ipv4Addr) -> u32 {
        self.counts.lock().unwrap().get(&addr).copied().unwrap_or(0)
    }
}

/// `TCP_SYN_RECV`, the `st` field value `/proc/net/tcp` uses for a
/// half-open connection still waiting on the final ACK of the handshake.
const TCP_SYN_RECV: u32 = 0x03;

/// Kernel half-open connection-table corroboration (§4.D). Parses the
/// `/proc/net/tcp`-style text format rather than calling into the kernel
/// directly, so the parser itself is pure and unit-testable; the caller
/// supplies the already-read file contents.
///
/// Counts every `SYN_RECV` row across the table.
pub fn count_half_open_total(proc_net_tcp: &str) -> u32 {
    rows(proc_net_tcp).filter(|row| row.state == TCP_SYN_RECV).count() as u32
}

/// Counts `SYN_RECV` rows whose local (listening) address matches
/// `local_addr`, or whose *remote* address is `local_addr` if the table is
/// keyed from the attacker's perspective — §6 specifies counting by the
/// connecting peer's address, so this counts by `remote`.
pub fn count_half_open_from(proc_net_tcp: &str, remote_addr: Ipv4Addr) -> u32 {
    rows(proc_net_tcp)
        .filter(|row| row.state == TCP_SYN_RECV && row.remote_addr == remote_addr)
        .count() as u32
}

/// Returns the set of remote addresses with at least one `SYN_RECV` row.
pub fn half_open_sources(proc_net_tcp: &str) -> HashSet<Ipv4Addr> {
    rows(proc_net_tcp)
        .filter(|row| row.state == TCP_SYN_RECV)
        .map(|row| row.remote_addr)
        .collect()
}

struct Row {
    remote_addr: Ipv4Addr,
    state: u32,
}

/// Parses the body of `/proc/net/tcp`: a header line followed by
/// fixed-column rows, `local_address` and `rem_address` as
/// `XXXXXXXX:PPPP` with the address in little-endian hex (§6). Malformed
/// rows are skipped rather than failing the whole parse — a single
/// truncated line should not blind the detector to every other connection.
fn rows(text: &str) -> impl Iterator<Item = Row> + '_ {
    text.lines().skip(1).filter_map(parse_row)
}

fn parse_row(line: &str) -> Option<Row> {
    let mut fields = line.split_whitespace();
    let _sl = fields.next()?;
    let _local = fields.next()?;
    let remote_field = fields.next()?;
    let state_field = fields.next()?;

    let (remote_hex, _port_hex) = remote_field.split_once(':')?;
    let remote_addr = parse_le_hex_addr(remote_hex)?;
    let state = u32::from_str_radix(state_field, 16).ok()?;

    Some(Row { remote_addr, state })
}

/// `/proc/net/tcp` addresses are stored as the 32-bit value in host byte
/// order, printed as 8 hex digits. On a little-endian host (the only kind
/// this daemon targets) that means the hex string's *byte* order is
/// reversed relative to dotted-decimal octet order.
fn parse_le_hex_addr(hex: &str) -> Option<Ipv4Addr> {
    if hex.len() != 8 {
        return None;
    }
    let raw = u32::from_str_radix(hex, 16).ok()?;
    Some(Ipv4Addr::from(raw.to_le_bytes()))
}
