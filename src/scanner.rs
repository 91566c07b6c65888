use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::ScanConfig;
use crate::error::ScanError;
use crate::pool::{PoolHandle, WorkerPool};
use crate::probe::{Prober, TcpProber};
use crate::progress::ProgressTracker;
use crate::range::AddressRange;
use crate::results::ResultSet;
use crate::types::{Endpoint, ProgressSnapshot, ScanEvent, ScanState, Severity};
use crate::updates::{self, LiveScan, UpdateReceiver, UpdateSender};

/// What a call to [`ScanCoordinator::start`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A new scan is running over `total` hosts.
    Started { scan: u64, total: u64 },
    /// A scan was already running, so the call stopped it instead.
    Stopped,
}

/// Owns the scan lifecycle: computes the range, feeds one probe task per host
/// into a fresh worker pool, and reports through the update channel.
///
/// `start` spawns onto the current tokio runtime and must be called from
/// inside one.
pub struct ScanCoordinator {
    inner: Arc<Inner>,
}

struct Inner {
    config: ScanConfig,
    prober: Arc<dyn Prober>,
    updates: UpdateSender,
    live: LiveScan,
    session: Mutex<Session>,
    // serializes result/progress publication so the consumer sees them in
    // the order they happened
    publish: Mutex<()>,
}

#[derive(Default)]
struct Session {
    state: ScanState,
    generation: u64,
    pool: Option<PoolHandle>,
    results: Arc<ResultSet>,
    progress: Option<Arc<ProgressTracker>>,
}

impl ScanCoordinator {
    /// Coordinator probing with plain TCP connects.
    pub fn new(config: ScanConfig) -> (Self, UpdateReceiver) {
        Self::with_prober(config, Arc::new(TcpProber))
    }

    pub fn with_prober(config: ScanConfig, prober: Arc<dyn Prober>) -> (Self, UpdateReceiver) {
        let live = LiveScan::default();
        let (updates, receiver) = updates::channel(live.clone());
        let inner = Inner {
            config,
            prober,
            updates,
            live,
            session: Mutex::new(Session::default()),
            publish: Mutex::new(()),
        };
        (
            Self {
                inner: Arc::new(inner),
            },
            receiver,
        )
    }

    pub fn config(&self) -> &ScanConfig {
        &self.inner.config
    }

    pub fn state(&self) -> ScanState {
        self.inner.session.lock().state
    }

    /// Progress of the current (or last) scan.
    pub fn progress(&self) -> ProgressSnapshot {
        self.inner
            .session
            .lock()
            .progress
            .as_ref()
            .map(|p| p.snapshot())
            .unwrap_or_default()
    }

    /// Discovered endpoints in discovery order.
    pub fn results(&self) -> Vec<Endpoint> {
        self.inner.session.lock().results.snapshot()
    }

    /// Start scanning `address/prefix`, or stop the running scan.
    ///
    /// The prefix is clamped into `[1, 30]`. On invalid input a status update
    /// is queued, the error is returned, and nothing else changes.
    pub fn start(&self, address: &str, prefix: i64) -> Result<StartOutcome, ScanError> {
        let inner = &self.inner;
        let mut session = inner.session.lock();
        if session.state == ScanState::Running {
            inner.stop_locked(&mut session);
            return Ok(StartOutcome::Stopped);
        }

        let range = match AddressRange::compute(address.trim(), prefix) {
            Ok(range) => range,
            Err(e) => {
                warn!("rejected scan request {address:?}/{prefix}: {e}");
                inner.updates.status(e.to_string(), Severity::Error);
                return Err(e);
            }
        };

        session.generation += 1;
        let scan = session.generation;
        let total = range.host_count();
        let results = Arc::new(ResultSet::new());
        let progress = Arc::new(ProgressTracker::new(total));
        let pool = WorkerPool::new(inner.config.workers);

        session.state = ScanState::Running;
        session.pool = Some(pool.handle());
        session.results = results.clone();
        session.progress = Some(progress.clone());
        inner.live.set(scan);

        inner.updates.send_for(scan, ScanEvent::ResultsChanged { results: Vec::new() });
        inner.updates.send_for(scan, ScanEvent::Progress(progress.snapshot()));
        debug!(
            scan,
            network = %range.network(),
            prefix = range.prefix(),
            hosts = total,
            port = inner.config.port,
            "scan started"
        );

        let task = ScanTask {
            inner: inner.clone(),
            scan,
            results,
            progress,
            cancel: pool.handle(),
        };
        tokio::spawn(task.drive(pool, range));

        Ok(StartOutcome::Started { scan, total })
    }

    /// Cancel the running scan. Returns `false` (and does nothing) when no
    /// scan is running.
    pub fn stop(&self) -> bool {
        let mut session = self.inner.session.lock();
        self.inner.stop_locked(&mut session)
    }

    /// Remove an endpoint the collaborator has acted on.
    pub fn consume_result(&self, endpoint: &Endpoint) -> bool {
        let session = self.inner.session.lock();
        let _order = self.inner.publish.lock();
        if !session.results.remove(endpoint) {
            return false;
        }
        self.inner.updates.send(ScanEvent::ResultsChanged {
            results: session.results.snapshot(),
        });
        true
    }
}

impl Drop for ScanCoordinator {
    fn drop(&mut self) {
        if let Some(pool) = self.inner.session.lock().pool.take() {
            pool.cancel_all();
        }
    }
}

impl Inner {
    fn stop_locked(&self, session: &mut Session) -> bool {
        if session.state != ScanState::Running {
            return false;
        }
        session.state = ScanState::Stopping;
        if let Some(pool) = session.pool.take() {
            // no task is between its cancel check and its last publish
            let _order = self.publish.lock();
            pool.cancel_all();
        }
        self.live.clear();
        session.state = ScanState::Idle;
        debug!(scan = session.generation, "scan stopped");

        self.updates.send(ScanEvent::Stopped);
        self.updates
            .status(ScanError::Cancelled.to_string(), Severity::Warning);
        true
    }

    fn complete(&self, scan: u64) {
        let mut session = self.session.lock();
        if session.generation != scan || session.state != ScanState::Running {
            return;
        }
        session.state = ScanState::Completed;
        session.pool = None;

        let _order = self.publish.lock();
        let results = session.results.snapshot();
        let found = results.len();
        info!(scan, found, "scan complete");
        // untagged: a restart right after completion must not swallow these
        self.updates.send(ScanEvent::ResultsChanged { results });
        self.updates.send(ScanEvent::Completed { found });
        self.updates.status(
            format!("Scan complete! Found {found} servers"),
            Severity::Success,
        );
    }
}

/// Per-scan state shared by the submission loop and every probe task.
#[derive(Clone)]
struct ScanTask {
    inner: Arc<Inner>,
    scan: u64,
    results: Arc<ResultSet>,
    progress: Arc<ProgressTracker>,
    cancel: PoolHandle,
}

impl ScanTask {
    async fn drive(self, mut pool: WorkerPool, range: AddressRange) {
        let port = self.inner.config.port;
        let timeout = self.inner.config.timeout;
        for host in range.hosts() {
            let task = self.clone().probe(Endpoint::new(host, port), timeout);
            if !pool.submit(task).await {
                break;
            }
        }
        pool.join().await;

        if pool.is_cancelled() {
            debug!(scan = self.scan, "probe tasks abandoned");
            return;
        }
        self.inner.complete(self.scan);
    }

    async fn probe(self, endpoint: Endpoint, timeout: Duration) {
        let open = self.inner.prober.probe(endpoint, timeout).await;
        if self.cancel.is_cancelled() {
            return;
        }

        let _order = self.inner.publish.lock();
        if self.cancel.is_cancelled() {
            return;
        }
        if open && self.results.insert(endpoint) {
            info!(%endpoint, "found server");
            self.inner.updates.send_for(
                self.scan,
                ScanEvent::ResultsChanged {
                    results: self.results.snapshot(),
                },
            );
        }
        let processed = self.progress.increment();
        self.inner.updates.send_for(
            self.scan,
            ScanEvent::Progress(ProgressSnapshot {
                processed,
                total: self.progress.total(),
            }),
        );
    }
}
