use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::time;

use crate::error::ScanError;
use crate::types::Endpoint;

/// A single bounded-time connectivity check against one endpoint.
///
/// Implementations never fail outward: every failure mode is reported as
/// `false`. There are no retries.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, endpoint: Endpoint, timeout: Duration) -> bool;
}

/// Probe by plain TCP connect. A completed handshake counts as open.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpProber;

impl TcpProber {
    /// Attempt the connection, keeping the reason on failure.
    pub async fn connect(endpoint: Endpoint, timeout: Duration) -> Result<(), ScanError> {
        let addr = SocketAddr::from((endpoint.host, endpoint.port));
        match time::timeout(timeout, TcpStream::connect(addr)).await {
            Ok(Ok(_stream)) => Ok(()),
            Ok(Err(e)) => Err(ScanError::ProbeFailure {
                endpoint,
                reason: e.to_string(),
            }),
            Err(_) => Err(ScanError::ProbeFailure {
                endpoint,
                reason: format!("timed out after {}ms", timeout.as_millis()),
            }),
        }
    }
}

#[async_trait]
impl Prober for TcpProber {
    async fn probe(&self, endpoint: Endpoint, timeout: Duration) -> bool {
        match Self::connect(endpoint, timeout).await {
            Ok(()) => true,
            Err(e) => {
                tracing::trace!("{e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn open_port_is_detected() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let ep = Endpoint::new(Ipv4Addr::LOCALHOST, port);
        assert!(TcpProber.probe(ep, Duration::from_millis(500)).await);
    }

    #[tokio::test]
    async fn closed_port_is_negative() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let ep = Endpoint::new(Ipv4Addr::LOCALHOST, port);
        assert!(!TcpProber.probe(ep, Duration::from_millis(500)).await);
        assert!(matches!(
            TcpProber::connect(ep, Duration::from_millis(500)).await,
            Err(ScanError::ProbeFailure { .. })
        ));
    }
}
