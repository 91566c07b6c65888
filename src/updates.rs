//! Update channel between scan producers and the single event consumer.
//!
//! Workers and the coordinator enqueue [`ScanEvent`]s without ever blocking;
//! one consumer drains the whole queue on a fixed period and applies events in
//! enqueue order. Events produced on behalf of a scan are tagged with its id,
//! and the consumer drops them once that scan is no longer live.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::types::{Endpoint, ProgressSnapshot, ScanEvent, Severity};

/// Callback surface of the presentation layer. Every method runs on the
/// consumer, one event at a time.
pub trait ScanListener {
    fn on_progress(&mut self, _progress: ProgressSnapshot) {}
    fn on_results_changed(&mut self, _results: &[Endpoint]) {}
    fn on_status(&mut self, _message: &str, _severity: Severity) {}
    fn on_complete(&mut self, _found: usize) {}
    fn on_stopped(&mut self) {}
}

/// Route one event to the matching listener callback.
pub fn dispatch<L: ScanListener + ?Sized>(listener: &mut L, event: &ScanEvent) {
    match event {
        ScanEvent::Progress(p) => listener.on_progress(*p),
        ScanEvent::ResultsChanged { results } => listener.on_results_changed(results),
        ScanEvent::Status { message, severity } => listener.on_status(message, *severity),
        ScanEvent::Completed { found } => listener.on_complete(*found),
        ScanEvent::Stopped => listener.on_stopped(),
    }
}

/// Id of the scan whose events may still be applied. Zero means none.
#[derive(Debug, Clone, Default)]
pub struct LiveScan(Arc<AtomicU64>);

impl LiveScan {
    pub fn set(&self, scan: u64) {
        self.0.store(scan, Ordering::Release);
    }

    pub fn clear(&self) {
        self.0.store(0, Ordering::Release);
    }

    pub fn get(&self) -> Option<u64> {
        match self.0.load(Ordering::Acquire) {
            0 => None,
            id => Some(id),
        }
    }

    pub fn is_live(&self, scan: u64) -> bool {
        self.get() == Some(scan)
    }
}

#[derive(Debug)]
struct Update {
    scan: Option<u64>,
    event: ScanEvent,
}

/// Producer side. Cheap to clone; sending never blocks.
#[derive(Debug, Clone)]
pub struct UpdateSender {
    tx: UnboundedSender<Update>,
}

impl UpdateSender {
    /// Enqueue an event not tied to any scan. It is always delivered.
    pub fn send(&self, event: ScanEvent) {
        self.push(None, event);
    }

    /// Enqueue an event produced by `scan`.
    pub fn send_for(&self, scan: u64, event: ScanEvent) {
        self.push(Some(scan), event);
    }

    pub fn status(&self, message: impl Into<String>, severity: Severity) {
        self.send(ScanEvent::Status {
            message: message.into(),
            severity,
        });
    }

    fn push(&self, scan: Option<u64>, event: ScanEvent) {
        if self.tx.send(Update { scan, event }).is_err() {
            tracing::trace!("update consumer is gone; event dropped");
        }
    }
}

/// Consumer side. There is exactly one per channel.
#[derive(Debug)]
pub struct UpdateReceiver {
    rx: UnboundedReceiver<Update>,
    live: LiveScan,
    closed: bool,
}

/// Create an update channel whose consumer filters on `live`.
pub fn channel(live: LiveScan) -> (UpdateSender, UpdateReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        UpdateSender { tx },
        UpdateReceiver {
            rx,
            live,
            closed: false,
        },
    )
}

impl UpdateReceiver {
    /// Take every queued event, in enqueue order, skipping stale scan events.
    pub fn drain(&mut self) -> Vec<ScanEvent> {
        let mut out = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(update) => {
                    if let Some(scan) = update.scan {
                        if !self.live.is_live(scan) {
                            continue;
                        }
                    }
                    out.push(update.event);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.closed = true;
                    break;
                }
            }
        }
        out
    }

    /// One drain cycle: apply all queued events to `listener`.
    pub fn apply<L: ScanListener + ?Sized>(&mut self, listener: &mut L) -> usize {
        let events = self.drain();
        for event in &events {
            dispatch(listener, event);
        }
        events.len()
    }

    /// `true` once every sender is dropped and the queue is empty.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Run drain cycles every `period` until `shutdown` fires or all senders
    /// are gone. Hands the listener back when done.
    pub async fn run<L: ScanListener>(
        mut self,
        period: Duration,
        mut listener: L,
        shutdown: CancellationToken,
    ) -> L {
        let mut ticker = time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    self.apply(&mut listener);
                    if self.closed {
                        break;
                    }
                }
            }
        }
        listener
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        progress: Vec<u64>,
        statuses: Vec<String>,
        stopped: usize,
    }

    impl ScanListener for Recorder {
        fn on_progress(&mut self, p: ProgressSnapshot) {
            self.progress.push(p.processed);
        }
        fn on_status(&mut self, message: &str, _severity: Severity) {
            self.statuses.push(message.to_string());
        }
        fn on_stopped(&mut self) {
            self.stopped += 1;
        }
    }

    fn progress(n: u64) -> ScanEvent {
        ScanEvent::Progress(ProgressSnapshot { processed: n, total: 10 })
    }

    #[test]
    fn drain_keeps_enqueue_order() {
        let live = LiveScan::default();
        live.set(1);
        let (tx, mut rx) = channel(live);
        for n in 1..=5 {
            tx.send_for(1, progress(n));
        }
        let mut rec = Recorder::default();
        assert_eq!(rx.apply(&mut rec), 5);
        assert_eq!(rec.progress, vec![1, 2, 3, 4, 5]);
        assert_eq!(rx.apply(&mut rec), 0);
    }

    #[test]
    fn stale_scan_events_are_dropped() {
        let live = LiveScan::default();
        live.set(7);
        let (tx, mut rx) = channel(live.clone());
        tx.send_for(7, progress(1));
        tx.send_for(6, progress(2));
        live.clear();
        tx.send(ScanEvent::Stopped);
        let events = rx.drain();
        assert_eq!(events, vec![ScanEvent::Stopped]);
    }

    #[tokio::test]
    async fn run_exits_when_senders_are_dropped() {
        let (tx, rx) = channel(LiveScan::default());
        tx.status("hello", Severity::Info);
        tx.send(ScanEvent::Stopped);
        drop(tx);
        let rec = tokio::time::timeout(
            Duration::from_secs(1),
            rx.run(Duration::from_millis(5), Recorder::default(), CancellationToken::new()),
        )
        .await
        .expect("consumer stops once the channel closes");
        assert_eq!(rec.statuses, vec!["hello".to_string()]);
        assert_eq!(rec.stopped, 1);
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let (_tx, rx) = channel(LiveScan::default());
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(rx.run(Duration::from_millis(5), Recorder::default(), shutdown.clone()));
        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("consumer honours shutdown")
            .unwrap();
    }
}
