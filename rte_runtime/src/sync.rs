//! Persistence synchronizer.
//!
//! Turns snapshots into records and pushes them without ever blocking the
//! caller. Every push gets the next per-launch sequence number; the last
//! dispatched record is authoritative.
//!
//! Failed pushes are retried with exponential backoff, up to the
//! configured attempt count, unless a newer push of the same kind has been
//! dispatched in the meantime. Pushes made while the page is being left
//! get a single attempt.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use rte_kernel::domain::ProgressSnapshot;
use rte_kernel::hashing::snapshot_fingerprint;

use crate::backend::ProgressBackend;
use crate::config::RetryConfig;
use crate::error::BackendError;
use crate::records::{CompletionRecord, ProgressRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushKind {
    Progress,
    Completion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Retry transient failures with backoff.
    Retry,
    /// One attempt only.
    SingleAttempt,
}

/// Counters since the synchronizer was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub dispatched: u64,
    pub delivered: u64,
    pub failed: u64,
    pub retried: u64,
    pub superseded: u64,
    pub skipped_unchanged: u64,
}

enum Payload {
    Progress {
        record: ProgressRecord,
        fingerprint: String,
    },
    Completion(CompletionRecord),
}

impl Payload {
    fn kind(&self) -> PushKind {
        match self {
            Payload::Progress { .. } => PushKind::Progress,
            Payload::Completion(_) => PushKind::Completion,
        }
    }
}

#[derive(Default)]
struct Counters {
    dispatched: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
    retried: AtomicU64,
    superseded: AtomicU64,
    skipped_unchanged: AtomicU64,
}

struct Shared {
    launch_id: String,
    backend: Arc<dyn ProgressBackend>,
    retry: RetryConfig,
    sequence: AtomicU64,
    latest_progress: AtomicU64,
    latest_completion: AtomicU64,
    delivered_fingerprint: Mutex<Option<String>>,
    counters: Counters,
}

pub struct Synchronizer {
    shared: Arc<Shared>,
    in_flight: Mutex<Vec<JoinHandle<()>>>,
    runtime: Handle,
}

impl Synchronizer {
    pub fn new(
        launch_id: impl Into<String>,
        backend: Arc<dyn ProgressBackend>,
        retry: RetryConfig,
        runtime: Handle,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                launch_id: launch_id.into(),
                backend,
                retry,
                sequence: AtomicU64::new(0),
                latest_progress: AtomicU64::new(0),
                latest_completion: AtomicU64::new(0),
                delivered_fingerprint: Mutex::new(None),
                counters: Counters::default(),
            }),
            in_flight: Mutex::new(Vec::new()),
            runtime,
        }
    }

    pub fn launch_id(&self) -> &str {
        &self.shared.launch_id
    }

    /// Dispatch a progress record. Returns its sequence.
    pub fn push_progress(
        &self,
        snapshot: &ProgressSnapshot,
        recorded_at: DateTime<Utc>,
        delivery: Delivery,
    ) -> u64 {
        let sequence = self.next_sequence();
        let record =
            ProgressRecord::from_snapshot(&self.shared.launch_id, sequence, snapshot, recorded_at);
        let payload = Payload::Progress {
            record,
            fingerprint: snapshot_fingerprint(snapshot),
        };
        self.dispatch(payload, sequence, delivery);
        sequence
    }

    /// Dispatch the completion record. Returns its sequence.
    pub fn push_completion(
        &self,
        snapshot: &ProgressSnapshot,
        recorded_at: DateTime<Utc>,
        delivery: Delivery,
    ) -> u64 {
        let sequence = self.next_sequence();
        let record =
            CompletionRecord::from_snapshot(&self.shared.launch_id, sequence, snapshot, recorded_at);
        self.dispatch(Payload::Completion(record), sequence, delivery);
        sequence
    }

    /// True if `snapshot` has the same content as the last delivered progress.
    pub fn is_unchanged(&self, snapshot: &ProgressSnapshot) -> bool {
        let fingerprint = snapshot_fingerprint(snapshot);
        self.shared.delivered_fingerprint.lock().as_deref() == Some(fingerprint.as_str())
    }

    pub fn note_skipped(&self) {
        self.shared
            .counters
            .skipped_unchanged
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Wait for in-flight pushes. Returns false if `timeout` ran out first;
    /// unfinished pushes keep running detached.
    pub async fn drain(&self, timeout: Duration) -> bool {
        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.in_flight.lock());
        let pending = handles.len();
        let all = async move {
            for handle in handles {
                let _ = handle.await;
            }
        };
        let drained = tokio::time::timeout(timeout, all).await.is_ok();
        debug!(pending, drained, "synchronizer drained");
        drained
    }

    pub fn stats(&self) -> SyncStats {
        let c = &self.shared.counters;
        SyncStats {
            dispatched: c.dispatched.load(Ordering::Relaxed),
            delivered: c.delivered.load(Ordering::Relaxed),
            failed: c.failed.load(Ordering::Relaxed),
            retried: c.retried.load(Ordering::Relaxed),
            superseded: c.superseded.load(Ordering::Relaxed),
            skipped_unchanged: c.skipped_unchanged.load(Ordering::Relaxed),
        }
    }

    fn next_sequence(&self) -> u64 {
        self.shared.sequence.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn dispatch(&self, payload: Payload, sequence: u64, delivery: Delivery) {
        self.shared.latest(payload.kind()).fetch_max(sequence, Ordering::SeqCst);
        self.shared
            .counters
            .dispatched
            .fetch_add(1, Ordering::Relaxed);

        let shared = Arc::clone(&self.shared);
        let handle = self
            .runtime
            .spawn(async move { shared.deliver(payload, sequence, delivery).await });

        let mut in_flight = self.in_flight.lock();
        in_flight.retain(|h| !h.is_finished());
        in_flight.push(handle);
    }
}

impl Shared {
    fn latest(&self, kind: PushKind) -> &AtomicU64 {
        match kind {
            PushKind::Progress => &self.latest_progress,
            PushKind::Completion => &self.latest_completion,
        }
    }

    fn is_superseded(&self, kind: PushKind, sequence: u64) -> bool {
        self.latest(kind).load(Ordering::SeqCst) > sequence
    }

    async fn deliver(&self, payload: Payload, sequence: u64, delivery: Delivery) {
        let kind = payload.kind();
        let max_attempts = match delivery {
            Delivery::Retry => self.retry.max_attempts.max(1),
            Delivery::SingleAttempt => 1,
        };

        let mut attempt = 0u32;
        loop {
            if attempt > 0 && self.is_superseded(kind, sequence) {
                self.counters.superseded.fetch_add(1, Ordering::Relaxed);
                debug!(?kind, sequence, "retry abandoned; newer push dispatched");
                return;
            }

            match self.send(&payload).await {
                Ok(()) => {
                    self.counters.delivered.fetch_add(1, Ordering::Relaxed);
                    if let Payload::Progress { fingerprint, .. } = &payload {
                        if !self.is_superseded(kind, sequence) {
                            *self.delivered_fingerprint.lock() = Some(fingerprint.clone());
                        }
                    }
                    debug!(?kind, sequence, attempt, "push delivered");
                    return;
                }
                Err(e) => {
                    attempt += 1;
                    if attempt >= max_attempts || !e.is_retryable() {
                        self.counters.failed.fetch_add(1, Ordering::Relaxed);
                        warn!(?kind, sequence, attempt, "push failed: {}", e);
                        return;
                    }
                    self.counters.retried.fetch_add(1, Ordering::Relaxed);
                    let delay = self.retry.delay(attempt - 1);
                    debug!(?kind, sequence, attempt, ?delay, "push failed, retrying: {}", e);
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn send(&self, payload: &Payload) -> Result<(), BackendError> {
        match payload {
            Payload::Progress { record, .. } => self.backend.push_progress(record).await,
            Payload::Completion(record) => self.backend.push_completion(record).await,
        }
    }
}
