use std::fmt;
use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

/// One discovered service endpoint. Identity is the `(host, port)` pair.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub host: Ipv4Addr,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: Ipv4Addr, port: u16) -> Self {
        Self { host, port }
    }

    /// Display name used when listing found servers.
    pub fn label(&self) -> String {
        format!("Server #{}", self.host)
    }

    /// `host:port` form suitable for a server list entry.
    pub fn address(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Lifecycle of the coordinator.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScanState {
    #[default]
    Idle,
    Running,
    Stopping,
    Completed,
}

/// Progress counters for a single scan. `total` is fixed once the scan starts.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgressSnapshot {
    pub processed: u64,
    pub total: u64,
}

impl ProgressSnapshot {
    /// Percentage done, for display only.
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.processed as f64 / self.total as f64 * 100.0
    }

    pub fn status_line(&self) -> String {
        format!(
            "Scanning: {:.1}% ({}/{})",
            self.percent(),
            self.processed,
            self.total
        )
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// Updates delivered to the single consumer through the update channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    Progress(ProgressSnapshot),
    ResultsChanged { results: Vec<Endpoint> },
    Status { message: String, severity: Severity },
    Completed { found: usize },
    Stopped,
}
