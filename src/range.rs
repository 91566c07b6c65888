use std::net::Ipv4Addr;

use ipnet::Ipv4Net;

use crate::config::clamp_prefix;
use crate::error::ScanError;

/// Usable host addresses of an IPv4 subnet, network and broadcast excluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressRange {
    network: Ipv4Addr,
    prefix: u8,
    host_count: u64,
}

impl AddressRange {
    /// Build the range for a dotted-quad base address and caller-supplied
    /// prefix. The prefix is clamped into `[1, 30]` first.
    pub fn compute(base: &str, prefix: i64) -> Result<Self, ScanError> {
        let addr = parse_ipv4(base)?;
        Self::new(addr, clamp_prefix(prefix))
    }

    /// Range for `base/prefix` with no clamping. Prefixes of 31 and 32 have no
    /// usable hosts.
    pub fn new(base: Ipv4Addr, prefix: u8) -> Result<Self, ScanError> {
        let net = Ipv4Net::new(base, prefix).map_err(|_| ScanError::NoUsableHosts { prefix })?;
        let host_bits = 32 - u32::from(prefix);
        let host_count = (1u64 << host_bits).saturating_sub(2);
        if host_count == 0 {
            return Err(ScanError::NoUsableHosts { prefix });
        }
        Ok(Self {
            network: net.network(),
            prefix,
            host_count,
        })
    }

    pub fn network(&self) -> Ipv4Addr {
        self.network
    }

    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    pub fn host_count(&self) -> u64 {
        self.host_count
    }

    /// Hosts in ascending numeric order. Each call starts from the first host.
    pub fn hosts(&self) -> Hosts {
        Hosts {
            base: u32::from(self.network),
            next: 1,
            last: self.host_count,
        }
    }
}

/// Lazy iterator over the hosts of an [`AddressRange`].
#[derive(Debug, Clone)]
pub struct Hosts {
    base: u32,
    next: u64,
    last: u64,
}

impl Iterator for Hosts {
    type Item = Ipv4Addr;

    fn next(&mut self) -> Option<Ipv4Addr> {
        if self.next > self.last {
            return None;
        }
        // stays below the broadcast address, so no overflow
        let addr = Ipv4Addr::from(self.base + self.next as u32);
        self.next += 1;
        Some(addr)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (self.last + 1).saturating_sub(self.next) as usize;
        (left, Some(left))
    }
}

impl ExactSizeIterator for Hosts {}

/// Parse a dotted-quad address: exactly four dot-separated decimal octets,
/// each one to three digits and at most 255.
pub fn parse_ipv4(input: &str) -> Result<Ipv4Addr, ScanError> {
    let invalid = || ScanError::InvalidAddress {
        input: input.to_string(),
    };
    let mut octets = [0u8; 4];
    let mut parts = input.split('.');
    for slot in octets.iter_mut() {
        let part = parts.next().ok_or_else(invalid)?;
        if part.is_empty() || part.len() > 3 || !part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        *slot = part.parse::<u8>().map_err(|_| invalid())?;
    }
    if parts.next().is_some() {
        return Err(invalid());
    }
    Ok(Ipv4Addr::from(octets))
}
