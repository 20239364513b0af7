use std::net::Ipv4Addr;

use ipnet::Ipv4Net;

/// A set of IPv4 CIDR prefixes checked by longest-prefix-match union: an
/// address is contained iff *any* stored prefix covers it.
///
/// Deliberately a flat `Vec` scanned linearly rather than a trie: the
/// expected prefix count is small (tens, not millions) and a linear scan
/// over `ipnet`'s prefix containment check is trivially correct, which is
/// the whole point after the source's unsound trie-with-DFS-fallback (see
/// design notes).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Whitelist {
    prefixes: Vec<Ipv4Net>,
}

impl Whitelist {
    pub fn new() -> Self {
        Self { prefixes: Vec::new() }
    }

    /// Parses `cidr` (`a.b.c.d` or `a.b.c.d/n`) and adds it. A bare address
    /// without `/n` is treated as `/32`. Rejects unparseable addresses and
    /// prefix lengths outside `[0, 32]`.
    pub fn add_cidr(&mut self, cidr: &str) -> Result<(), WhitelistParseError> {
        let net = parse_cidr(cidr)?;
        self.prefixes.push(net);
        Ok(())
    }

    /// Builds a whitelist from CIDR strings, rejecting on the first invalid
    /// entry. Use [`Whitelist::from_file_text`] for the skip-and-warn
    /// behavior the whitelist *file* format requires.
    pub fn from_cidrs<'a, I: IntoIterator<Item = &'a str>>(
        cidrs: I,
    ) -> Result<Self, WhitelistParseError> {
        let mut whitelist = Self::new();
        for cidr in cidrs {
            whitelist.add_cidr(cidr)?;
        }
        Ok(whitelist)
    }

    /// Parses a whitelist file: one CIDR per line, `#` introduces a line
    /// comment, blank lines and leading whitespace are tolerated. Invalid
    /// lines are skipped (not fatal) and returned alongside the whitelist
    /// so the caller can log a warning per skipped line.
    pub fn from_file_text(text: &str) -> (Self, Vec<SkippedLine>) {
        let mut whitelist = Self::new();
        let mut skipped = Vec::new();
        for (lineno, raw_line) in text.lines().enumerate() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let line = match line.split_once('#') {
                Some((before, _)) => before.trim(),
                None => line,
            };
            if line.is_empty() {
                continue;
            }
            match whitelist.add_cidr(line) {
                Ok(()) => {}
                Err(err) => skipped.push(SkippedLine { lineno: lineno + 1, error: err }),
            }
        }
        (whitelist, skipped)
    }

    /// Returns true iff `addr` matches any stored prefix.
    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        self.prefixes.iter().any(|net| net.contains(&addr))
    }

    pub fn len(&self) -> usize {
        self.prefixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }
}

fn parse_cidr(cidr: &str) -> Result<Ipv4Net, WhitelistParseError> {
    let cidr = cidr.trim();
    if let Ok(net) = cidr.parse::<Ipv4Net>() {
        return Ok(net);
    }
    // No `/n` suffix: treat as a bare /32 address.
    let addr: Ipv4Addr = cidr.parse().map_err(|_| WhitelistParseError::InvalidAddress(cidr.to_string()))?;
    Ipv4Net::new(addr, 32).map_err(|_| WhitelistParseError::InvalidPrefixLen(cidr.to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WhitelistParseError {
    #[error("invalid IPv4 address '{0}'")]
    InvalidAddress(String),
    #[error("invalid prefix length in '{0}', must be in [0, 32]")]
    InvalidPrefixLen(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedLine {
    pub lineno: usize,
    pub error: WhitelistParseError,
}
