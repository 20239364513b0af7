use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};
use tracing::warn;

const TCP_FLAG_SYN: u8 = 0x02;
const TCP_FLAG_ACK: u8 = 0x10;

/// Result of classifying one captured packet. Distinguishes a bare SYN from
/// ordinary traffic the detector has no interest in, and both of those from
/// a packet too short or too malformed to even parse an IPv4/TCP header out
/// of — so callers can count `parse_errors_total` without treating routine
/// non-SYN traffic as an error (§4.B, §3 ambient metrics).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseOutcome {
    Syn(Ipv4Addr),
    NotSyn,
    Malformed,
}

/// Parses a captured IPv4 packet. A single bad packet must never interrupt
/// capture (§4.B): malformed input yields [`ParseOutcome::Malformed`], never
/// a propagated error.
pub fn parse_packet(packet: &[u8]) -> ParseOutcome {
    if packet.len() < 20 {
        return ParseOutcome::Malformed;
    }
    let version = packet[0] >> 4;
    if version != 4 {
        return ParseOutcome::Malformed;
    }
    let ihl = (packet[0] & 0x0f) as usize * 4;
    if ihl < 20 || packet.len() < ihl + 20 {
        return ParseOutcome::Malformed;
    }
    let protocol = packet[9];
    if protocol != 6 {
        return ParseOutcome::NotSyn;
    }

    let Ok(src): Result<[u8; 4], _> = packet[12..16].try_into() else {
        return ParseOutcome::Malformed;
    };
    let tcp = &packet[ihl..];
    let Some(&flags) = tcp.get(13) else {
        return ParseOutcome::Malformed;
    };
    if flags & TCP_FLAG_SYN == 0 || flags & TCP_FLAG_ACK != 0 {
        return ParseOutcome::NotSyn;
    }

    ParseOutcome::Syn(Ipv4Addr::from(src))
}

/// Convenience wrapper over [`parse_packet`] for callers that only care
/// about the recognized-SYN case.
pub fn parse_syn_source(packet: &[u8]) -> Option<Ipv4Addr> {
    match parse_packet(packet) {
        ParseOutcome::Syn(addr) => Some(addr),
        _ => None,
    }
}

/// A raw `IPPROTO_TCP` socket capturing every inbound TCP segment on the
/// host (§4.B, §10.1 `capture.use_raw_socket`). Requires `CAP_NET_RAW`.
pub struct RawSocketCapture {
    socket: Socket,
}

impl RawSocketCapture {
    pub fn open() -> std::io::Result<Self> {
        let socket = Socket::new(Domain::IPV4, Type::RAW, Some(Protocol::TCP))?;
        socket.set_read_timeout(Some(Duration::from_millis(200)))?;
        Ok(Self { socket })
    }

    /// Reads packets until `shutdown` is set, calling `on_packet` with the
    /// classification of every packet read (including non-SYN and malformed
    /// ones), so the caller can feed `packets_total`/`parse_errors_total`
    /// as well as the detector. Read timeouts are expected (they're how the
    /// loop notices shutdown promptly) and are not logged as errors.
    pub fn run(&self, shutdown: Arc<AtomicBool>, mut on_packet: impl FnMut(ParseOutcome)) -> std::io::Result<()> {
        let mut buf = [std::mem::MaybeUninit::uninit(); 65536];
        while !shutdown.load(Ordering::SeqCst) {
            match self.socket.recv(&mut buf) {
                Ok(n) => {
                    let bytes: Vec<u8> =
                        buf[..n].iter().map(|b| unsafe { b.assume_init() }).collect();
                    on_packet(parse_packet(&bytes));
                }
                Err(e) if matches!(e.kind(), std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut) => {}
                Err(e) => {
                    warn!(error = %e, "raw socket read failed");
                }
            }
        }
        Ok(())
    }
}
