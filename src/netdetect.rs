use anyhow::Result;
use if_addrs::{get_if_addrs, IfAddr};
use std::net::Ipv4Addr;

/// Address used to prefill the base address when nothing better is known.
pub const FALLBACK_BASE: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 1);

/// Detect the first non-loopback IPv4 address on this machine.
///
/// Addresses are compared numerically so the pick is stable across calls.
pub fn detect_local_ipv4() -> Result<Option<Ipv4Addr>> {
    let mut found: Vec<Ipv4Addr> = get_if_addrs()?
        .into_iter()
        .filter_map(|iface| match iface.addr {
            IfAddr::V4(v4) => Some(v4.ip),
            IfAddr::V6(_) => None,
        })
        .filter(|ip| is_scan_base_candidate(*ip))
        .collect();
    found.sort_by_key(|ip| u32::from(*ip));
    Ok(found.into_iter().next())
}

/// Local address to scan around, falling back to [`FALLBACK_BASE`].
pub fn default_base_address() -> Ipv4Addr {
    match detect_local_ipv4() {
        Ok(Some(ip)) => ip,
        Ok(None) => FALLBACK_BASE,
        Err(e) => {
            tracing::warn!("failed to detect local networks: {e}");
            FALLBACK_BASE
        }
    }
}

fn is_scan_base_candidate(ip: Ipv4Addr) -> bool {
    !ip.is_loopback() && !ip.is_unspecified() && !ip.is_link_local()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loopback_and_link_local_are_skipped() {
        assert!(!is_scan_base_candidate(Ipv4Addr::LOCALHOST));
        assert!(!is_scan_base_candidate(Ipv4Addr::new(169, 254, 3, 4)));
        assert!(!is_scan_base_candidate(Ipv4Addr::UNSPECIFIED));
        assert!(is_scan_base_candidate(Ipv4Addr::new(192, 168, 0, 12)));
    }

    #[test]
    fn default_base_is_never_loopback() {
        assert!(!default_base_address().is_loopback());
    }
}
