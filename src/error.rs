use thiserror::Error;

use crate::types::Endpoint;

/// Failures surfaced by the scanning core.
///
/// The `Display` text of each variant doubles as the status message shown to
/// whoever drives the coordinator.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Base address is not four dot-separated octets in `0..=255`.
    #[error("Invalid IP address format")]
    InvalidAddress { input: String },

    /// The (clamped) prefix leaves no usable host addresses.
    #[error("Prefix too large (no usable hosts)")]
    NoUsableHosts { prefix: u8 },

    /// A single probe could not connect. Never surfaced past the prober.
    #[error("probe of {endpoint} failed: {reason}")]
    ProbeFailure { endpoint: Endpoint, reason: String },

    /// The scan was stopped by the caller.
    #[error("Scanning stopped")]
    Cancelled,
}
