//! Offline mutation queue.
//!
//! Writes that could not reach the remote store are buffered here and replayed in
//! insertion order once connectivity returns. Items leave the queue only after the
//! sink confirmed them, so delivery is at-least-once and relies on upsert idempotency.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::{QueueItem, QueuedWrite};
use crate::ports::PortResult;

/// Destination of a flush, usually the remote store.
#[async_trait]
pub trait QueueSink: Send + Sync {
    async fn deliver(&self, write: &QueuedWrite) -> PortResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    Empty,
    HasPending,
    Draining,
}

/// Outcome of one flush pass.
#[derive(Debug, Default)]
pub struct FlushReport {
    pub delivered: usize,
    /// Items whose delivery failed in this pass. They are still queued.
    pub failed: Vec<QueueItem>,
    /// Items not attempted because an earlier write to the same key failed.
    pub deferred: usize,
    pub cancelled: bool,
    /// Another pass was already draining the queue.
    pub skipped: bool,
    /// Writes not attempted because the remote progress could not be loaded first.
    pub held: usize,
}

impl FlushReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
            && self.deferred == 0
            && self.held == 0
            && !self.cancelled
            && !self.skipped
    }
}

#[derive(Debug, Default)]
struct Inner {
    items: VecDeque<QueueItem>,
    next_seq: u64,
    draining: bool,
}

#[derive(Debug, Default)]
pub struct OfflineSyncQueue {
    inner: Mutex<Inner>,
}

/// Clears the draining flag even when the flush future is dropped mid-pass.
struct DrainGuard<'a> {
    queue: &'a OfflineSyncQueue,
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.queue.lock().draining = false;
    }
}

impl OfflineSyncQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a write and returns its sequence number.
    pub fn enqueue(&self, write: QueuedWrite) -> u64 {
        let mut inner = self.lock();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        debug!(seq, kind = write.kind(), "Queued write for later delivery");
        inner.items.push_back(QueueItem {
            seq,
            enqueued_at: Utc::now(),
            write,
        });
        seq
    }

    pub fn pending_count(&self) -> usize {
        self.lock().items.len()
    }

    pub fn state(&self) -> QueueState {
        let inner = self.lock();
        if inner.draining {
            QueueState::Draining
        } else if inner.items.is_empty() {
            QueueState::Empty
        } else {
            QueueState::HasPending
        }
    }

    /// Copy of the queued items, oldest first.
    pub fn pending(&self) -> Vec<QueueItem> {
        self.lock().items.iter().cloned().collect()
    }

    /// Drops every queued write matching `predicate`. Returns how many were removed.
    pub fn discard(&self, predicate: impl Fn(&QueuedWrite) -> bool) -> usize {
        let mut inner = self.lock();
        let before = inner.items.len();
        inner.items.retain(|item| !predicate(&item.write));
        before - inner.items.len()
    }

    fn remove(&self, seq: u64) {
        let mut inner = self.lock();
        if let Some(position) = inner.items.iter().position(|item| item.seq == seq) {
            inner.items.remove(position);
        }
    }

    /// Delivers the queued items in FIFO order.
    ///
    /// A failed item stays where it is and blocks later items with the same key for
    /// the rest of the pass; items with other keys are still attempted. Items enqueued
    /// while the pass runs are left for the next flush.
    pub async fn flush(&self, sink: &dyn QueueSink, cancel: &CancellationToken) -> FlushReport {
        let batch: Vec<QueueItem> = {
            let mut inner = self.lock();
            if inner.draining {
                return FlushReport {
                    skipped: true,
                    ..FlushReport::default()
                };
            }
            if inner.items.is_empty() {
                return FlushReport::default();
            }
            inner.draining = true;
            inner.items.iter().cloned().collect()
        };
        let _guard = DrainGuard { queue: self };

        info!(pending = batch.len(), "Flushing offline queue");
        let mut report = FlushReport::default();
        let mut blocked = HashSet::new();

        for item in batch {
            let key = item.write.key();
            if blocked.contains(&key) {
                report.deferred += 1;
                continue;
            }

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                result = sink.deliver(&item.write) => Some(result),
            };

            match outcome {
                None => {
                    report.cancelled = true;
                    break;
                }
                Some(Ok(())) => {
                    self.remove(item.seq);
                    report.delivered += 1;
                }
                Some(Err(e)) => {
                    warn!(seq = item.seq, kind = item.write.kind(), "Queued write failed: {}", e);
                    blocked.insert(key);
                    report.failed.push(item);
                }
            }
        }

        info!(
            delivered = report.delivered,
            failed = report.failed.len(),
            deferred = report.deferred,
            cancelled = report.cancelled,
            "Offline queue flush finished"
        );
        report
    }
}
