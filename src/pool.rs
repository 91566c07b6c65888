use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Upper bound on concurrent probes, whatever the configuration says.
pub const MAX_WORKERS: usize = 5_000;

/// Fixed-size executor for probe tasks. One pool per scan; once cancelled it
/// is not reused.
///
/// - A `Semaphore` caps how many tasks run at once. `submit` waits for a free
///   slot, so submission order is execution start order.
/// - Every task races the pool's `CancellationToken`; cancelling abandons a
///   task at its next await point instead of waiting for it to finish.
#[derive(Debug)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    tasks: JoinSet<()>,
    cancel: CancellationToken,
}

/// Cancellation handle held by whoever owns the scan.
#[derive(Debug, Clone)]
pub struct PoolHandle {
    cancel: CancellationToken,
}

impl PoolHandle {
    /// Stop accepting tasks and abandon the ones in flight.
    pub fn cancel_all(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl WorkerPool {
    pub fn new(workers: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(workers.clamp(1, MAX_WORKERS))),
            tasks: JoinSet::new(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn handle(&self) -> PoolHandle {
        PoolHandle {
            cancel: self.cancel.clone(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Wait for a free worker slot and start `task` on it.
    ///
    /// Returns `false` without running the task once the pool is cancelled.
    pub async fn submit<F>(&mut self, task: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let permit = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return false,
            permit = self.permits.clone().acquire_owned() => match permit {
                Ok(p) => p,
                Err(_) => return false,
            },
        };

        let cancel = self.cancel.clone();
        self.tasks.spawn(async move {
            let _permit = permit;
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {}
                _ = task => {}
            }
        });

        while let Some(res) = self.tasks.try_join_next() {
            log_join_error(res);
        }
        true
    }

    /// Wait for every submitted task to finish or be abandoned.
    pub async fn join(&mut self) {
        while let Some(res) = self.tasks.join_next().await {
            log_join_error(res);
        }
    }
}

fn log_join_error(res: Result<(), tokio::task::JoinError>) {
    if let Err(e) = res {
        if e.is_panic() {
            tracing::error!("probe task panicked: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn runs_every_task() {
        let mut pool = WorkerPool::new(4);
        let done = Arc::new(AtomicUsize::new(0));
        for _ in 0..20 {
            let done = done.clone();
            assert!(
                pool.submit(async move {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    done.fetch_add(1, Ordering::SeqCst);
                })
                .await
            );
        }
        pool.join().await;
        assert_eq!(done.load(Ordering::SeqCst), 20);
    }

    #[tokio::test]
    async fn never_exceeds_worker_count() {
        let mut pool = WorkerPool::new(3);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        for _ in 0..15 {
            let running = running.clone();
            let peak = peak.clone();
            pool.submit(async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                running.fetch_sub(1, Ordering::SeqCst);
            })
            .await;
        }
        pool.join().await;
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn cancel_rejects_new_and_abandons_in_flight() {
        let mut pool = WorkerPool::new(2);
        let finished = Arc::new(AtomicUsize::new(0));
        for _ in 0..2 {
            let finished = finished.clone();
            pool.submit(async move {
                tokio::time::sleep(Duration::from_secs(30)).await;
                finished.fetch_add(1, Ordering::SeqCst);
            })
            .await;
        }
        pool.handle().cancel_all();
        assert!(!pool.submit(async {}).await);

        tokio::time::timeout(Duration::from_secs(1), pool.join())
            .await
            .expect("cancelled tasks are abandoned promptly");
        assert_eq!(finished.load(Ordering::SeqCst), 0);
        assert!(pool.is_cancelled());
    }

    #[tokio::test]
    async fn submit_waiting_for_slot_returns_on_cancel() {
        let mut pool = WorkerPool::new(1);
        pool.submit(tokio::time::sleep(Duration::from_secs(30))).await;
        let handle = pool.handle();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            handle.cancel_all();
        });
        let accepted = tokio::time::timeout(Duration::from_secs(1), pool.submit(async {}))
            .await
            .expect("submit unblocks on cancel");
        assert!(!accepted);
    }
}
