use std::time::Duration;

pub const DEFAULT_PORT: u16 = 25565;
pub const DEFAULT_TIMEOUT_MS: u64 = 200;
pub const DEFAULT_WORKERS: usize = 50;
pub const DEFAULT_DRAIN_MS: u64 = 50;
pub const DEFAULT_PREFIX: u8 = 24;
pub const MIN_PREFIX: u8 = 1;
pub const MAX_PREFIX: u8 = 30;

/// Tunables shared by every scan a coordinator runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanConfig {
    /// Service port probed on every host.
    pub port: u16,
    /// Per-probe connect timeout.
    pub timeout: Duration,
    /// Maximum number of probes in flight.
    pub workers: usize,
    /// Period of the update consumer's drain cycle.
    pub drain_period: Duration,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            workers: DEFAULT_WORKERS,
            drain_period: Duration::from_millis(DEFAULT_DRAIN_MS),
        }
    }
}

/// Parse prefix text the way the input field does: any integer is accepted,
/// anything else falls back to /24, and the result is clamped to `[1, 30]`.
pub fn parse_prefix(text: &str) -> u8 {
    let raw = text.trim().parse::<i64>().unwrap_or(DEFAULT_PREFIX as i64);
    clamp_prefix(raw)
}

pub fn clamp_prefix(prefix: i64) -> u8 {
    prefix.clamp(MIN_PREFIX as i64, MAX_PREFIX as i64) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_defaults_when_unparsable() {
        assert_eq!(parse_prefix(""), 24);
        assert_eq!(parse_prefix("abc"), 24);
        assert_eq!(parse_prefix(" 16 "), 16);
    }

    #[test]
    fn prefix_is_clamped() {
        assert_eq!(parse_prefix("0"), 1);
        assert_eq!(parse_prefix("-5"), 1);
        assert_eq!(parse_prefix("31"), 30);
        assert_eq!(parse_prefix("99"), 30);
    }

    #[test]
    fn defaults_match_scanner_constants() {
        let c = ScanConfig::default();
        assert_eq!(c.port, 25565);
        assert_eq!(c.timeout, Duration::from_millis(200));
        assert_eq!(c.workers, 50);
    }
}
