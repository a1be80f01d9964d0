//! crates/vocab_progress_core/src/coordinator.rs
//!
//! The façade the learning screen talks to. Local state changes are applied
//! synchronously and never wait on the network; every write goes through the
//! offline queue, which a background task drains while the store is reachable.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::domain::{
    ConnectivityEvent, LearningSession, ProgressStats, QueuedWrite, ReviewOutcome,
    StudyDirection, WordId, WordProgress,
};
use crate::mastery::apply_review;
use crate::ports::{ConnectivitySignal, PortError, PortResult, ProgressRepository};
use crate::scheduler::rank_due;
use crate::session::SessionTracker;
use crate::stats::compute_stats;
use crate::store::ProgressStore;
use crate::sync_queue::{FlushReport, OfflineSyncQueue, QueueSink, QueueState};

/// Connectivity and persistence state surfaced for user-facing messaging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncStatus {
    pub is_online: bool,
    pub has_offline_changes: bool,
    pub pending_count: usize,
    pub queue_state: QueueState,
    pub last_load_error: Option<String>,
}

/// An answer given before the remote progress was loaded.
#[derive(Debug, Clone, Copy)]
struct HeldReview {
    word_id: WordId,
    correct: bool,
    at: DateTime<Utc>,
}

struct LocalState {
    store: ProgressStore,
    sessions: SessionTracker,
    /// The remote progress has been merged into the store.
    loaded: bool,
    /// Replayed on top of the remote records by the next successful load.
    held: Vec<HeldReview>,
    last_load_error: Option<String>,
}

/// Replays queued writes against the repository.
struct RepositorySink<'a> {
    repository: &'a dyn ProgressRepository,
}

#[async_trait]
impl QueueSink for RepositorySink<'_> {
    async fn deliver(&self, write: &QueuedWrite) -> PortResult<()> {
        match write {
            QueuedWrite::ProgressUpsert { user_id, progress } => {
                self.repository.upsert_progress(*user_id, progress).await
            }
            QueuedWrite::SessionUpsert { user_id, session } => {
                self.repository.upsert_session(*user_id, session).await
            }
        }
    }
}

/// Progress engine of one user identity.
pub struct ProgressCoordinator {
    user_id: Uuid,
    repository: Arc<dyn ProgressRepository>,
    connectivity: Arc<dyn ConnectivitySignal>,
    local: Mutex<LocalState>,
    queue: OfflineSyncQueue,
    flush_cancel: Mutex<CancellationToken>,
    load_gate: tokio::sync::Mutex<()>,
}

impl ProgressCoordinator {
    pub fn new(
        user_id: Uuid,
        repository: Arc<dyn ProgressRepository>,
        connectivity: Arc<dyn ConnectivitySignal>,
    ) -> Self {
        Self {
            user_id,
            repository,
            connectivity,
            local: Mutex::new(LocalState {
                store: ProgressStore::for_user(user_id),
                sessions: SessionTracker::new(),
                loaded: false,
                held: Vec::new(),
                last_load_error: None,
            }),
            queue: OfflineSyncQueue::new(),
            flush_cancel: Mutex::new(CancellationToken::new()),
            load_gate: tokio::sync::Mutex::new(()),
        }
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    fn local(&self) -> MutexGuard<'_, LocalState> {
        self.local.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn sink(&self) -> RepositorySink<'_> {
        RepositorySink {
            repository: self.repository.as_ref(),
        }
    }

    fn ensure_signed_in(&self) -> PortResult<()> {
        match self.local().store.identity() {
            Some(_) => Ok(()),
            None => Err(PortError::Unauthorized),
        }
    }

    //=====================================================================================
    // Loading
    //=====================================================================================

    pub fn is_loaded(&self) -> bool {
        self.local().loaded
    }

    /// Rehydrates the local store from the remote one.
    ///
    /// Answers given before the first successful load are replayed on top of the
    /// remote records and queued. On failure local records are kept, the error is
    /// remembered in [`SyncStatus::last_load_error`] and writes stay held.
    pub async fn load(&self) -> PortResult<usize> {
        let _gate = self.load_gate.lock().await;
        self.load_locked().await
    }

    /// Loads on first use. Once an attempt has failed, later calls retry in the
    /// background instead of waiting on the store again.
    pub async fn ensure_loaded(self: &Arc<Self>) {
        let attempted = {
            let local = self.local();
            if local.loaded {
                return;
            }
            local.last_load_error.is_some()
        };
        if attempted {
            self.sync_in_background();
            return;
        }

        let _gate = self.load_gate.lock().await;
        {
            let local = self.local();
            if local.loaded || local.last_load_error.is_some() {
                return;
            }
        }
        if let Err(e) = self.load_locked().await {
            warn!(user_id = %self.user_id, "Continuing with unloaded progress: {}", e);
        }
    }

    async fn load_locked(&self) -> PortResult<usize> {
        match self.repository.query_progress(self.user_id).await {
            Ok(records) => Ok(self.merge_remote(records)),
            Err(e) => {
                error!(user_id = %self.user_id, "Failed to load progress: {}", e);
                self.local().last_load_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    fn merge_remote(&self, records: Vec<WordProgress>) -> usize {
        let mut local = self.local();
        let mut merged: HashMap<WordId, WordProgress> =
            records.into_iter().map(|p| (p.word_id, p)).collect();

        if local.loaded {
            for (word_id, progress) in local.store.snapshot() {
                let newer = merged
                    .get(&word_id)
                    .map_or(true, |remote| progress.last_practiced > remote.last_practiced);
                if newer {
                    merged.insert(word_id, progress);
                }
            }
        }
        // Undelivered writes are newer than anything the remote store returned.
        for item in self.queue.pending() {
            if let QueuedWrite::ProgressUpsert { progress, .. } = item.write {
                merged.insert(progress.word_id, progress);
            }
        }

        let held = std::mem::take(&mut local.held);
        let replayed = held.len();
        for review in held {
            let progress =
                apply_review(merged.get(&review.word_id), review.word_id, review.correct, review.at);
            merged.insert(review.word_id, progress.clone());
            self.queue.enqueue(QueuedWrite::ProgressUpsert {
                user_id: self.user_id,
                progress,
            });
        }

        let words = merged.len();
        local.store.replace_all(merged.into_values());
        local.loaded = true;
        local.last_load_error = None;
        info!(user_id = %self.user_id, words, replayed, "Progress loaded");
        words
    }

    //=====================================================================================
    // Reviews
    //=====================================================================================

    /// Applies one answer locally and hands its persistence to the background.
    ///
    /// Only fails when the identity was signed out.
    pub fn record_outcome(self: &Arc<Self>, outcome: ReviewOutcome) -> PortResult<WordProgress> {
        self.record_outcome_at(outcome, Utc::now())
    }

    pub fn record_outcome_at(
        self: &Arc<Self>,
        outcome: ReviewOutcome,
        at: DateTime<Utc>,
    ) -> PortResult<WordProgress> {
        let progress = {
            let mut local = self.local();
            if local.store.identity().is_none() {
                return Err(PortError::Unauthorized);
            }
            let progress = apply_review(
                local.store.get(outcome.word_id),
                outcome.word_id,
                outcome.correct,
                at,
            );
            local.store.upsert(progress.clone());
            local.sessions.record(outcome.correct);
            if local.loaded {
                self.queue.enqueue(QueuedWrite::ProgressUpsert {
                    user_id: self.user_id,
                    progress: progress.clone(),
                });
            } else {
                local.held.push(HeldReview {
                    word_id: outcome.word_id,
                    correct: outcome.correct,
                    at,
                });
            }
            progress
        };

        debug!(
            user_id = %self.user_id,
            word_id = outcome.word_id,
            correct = outcome.correct,
            level = progress.mastery_level,
            response_time_ms = ?outcome.response_time_ms,
            difficulty = ?outcome.difficulty,
            "Recorded review"
        );
        self.sync_in_background();
        Ok(progress)
    }

    /// Spawns a sync unless the signal reports offline.
    fn sync_in_background(self: &Arc<Self>) {
        if !self.connectivity.is_online() {
            return;
        }
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            coordinator.retry_sync().await;
        });
    }

    //=====================================================================================
    // Queries
    //=====================================================================================

    pub fn progress(&self, word_id: WordId) -> Option<WordProgress> {
        self.local().store.get(word_id).cloned()
    }

    pub fn snapshot(&self) -> HashMap<WordId, WordProgress> {
        self.local().store.snapshot()
    }

    pub fn get_stats(&self) -> ProgressStats {
        compute_stats(&self.snapshot())
    }

    /// Due candidates in study priority order.
    pub fn get_due_words(&self, candidates: &[WordId]) -> Vec<WordId> {
        self.get_due_words_at(candidates, Utc::now())
    }

    pub fn get_due_words_at(&self, candidates: &[WordId], now: DateTime<Utc>) -> Vec<WordId> {
        rank_due(candidates, &self.snapshot(), now)
    }

    //=====================================================================================
    // Sessions
    //=====================================================================================

    /// Opens a new session, replacing an open one.
    pub async fn start_session(&self, direction: StudyDirection) -> PortResult<LearningSession> {
        self.ensure_signed_in()?;
        let started_at = Utc::now();

        let remote_id = if self.connectivity.is_online() {
            match self
                .repository
                .insert_session(self.user_id, direction, started_at)
                .await
            {
                Ok(id) => Some(id),
                Err(e) => {
                    warn!(user_id = %self.user_id, "Creating session failed, queueing: {}", e);
                    None
                }
            }
        } else {
            None
        };

        let session = LearningSession::new(
            remote_id.unwrap_or_else(Uuid::new_v4),
            direction,
            started_at,
        );
        if remote_id.is_none() {
            self.queue.enqueue(QueuedWrite::SessionUpsert {
                user_id: self.user_id,
                session: session.clone(),
            });
        }

        if let Some(replaced) = self.local().sessions.start(session.clone()) {
            warn!(
                session_id = %replaced.id,
                words_studied = replaced.words_studied,
                "Replaced a session that was never ended"
            );
        }
        info!(user_id = %self.user_id, session_id = %session.id, %direction, "Session started");
        Ok(session)
    }

    /// Closes the open session and queues its aggregate. `None` when nothing was open.
    pub fn end_session(self: &Arc<Self>) -> Option<LearningSession> {
        let session = self.local().sessions.end(Utc::now())?;
        info!(
            session_id = %session.id,
            words_studied = session.words_studied,
            correct_answers = session.correct_answers,
            "Session ended"
        );
        self.queue.enqueue(QueuedWrite::SessionUpsert {
            user_id: self.user_id,
            session: session.clone(),
        });
        self.sync_in_background();
        Some(session)
    }

    pub fn current_session(&self) -> Option<LearningSession> {
        self.local().sessions.current().cloned()
    }

    //=====================================================================================
    // Synchronization
    //=====================================================================================

    pub fn sync_status(&self) -> SyncStatus {
        let (held, last_load_error) = {
            let local = self.local();
            (local.held.len(), local.last_load_error.clone())
        };
        let pending_count = self.queue.pending_count() + held;
        let queue_state = match self.queue.state() {
            QueueState::Empty if held > 0 => QueueState::HasPending,
            state => state,
        };
        SyncStatus {
            is_online: self.connectivity.is_online(),
            has_offline_changes: pending_count > 0,
            pending_count,
            queue_state,
            last_load_error,
        }
    }

    /// Writes not yet confirmed by the remote store, held answers included.
    pub fn pending_writes(&self) -> usize {
        self.queue.pending_count() + self.local().held.len()
    }

    fn flush_token(&self) -> CancellationToken {
        let mut token = self
            .flush_cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if token.is_cancelled() {
            *token = CancellationToken::new();
        }
        token.clone()
    }

    fn cancel_flush(&self) {
        self.flush_cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .cancel();
    }

    /// Loads the remote progress if that has not succeeded yet, then drains the
    /// offline queue. Passes are repeated while they succeed and writes keep arriving.
    pub async fn retry_sync(&self) -> FlushReport {
        if !self.is_loaded() {
            let _gate = self.load_gate.lock().await;
            if !self.is_loaded() && self.load_locked().await.is_err() {
                return FlushReport {
                    held: self.pending_writes(),
                    ..FlushReport::default()
                };
            }
        }

        let token = self.flush_token();
        let sink = self.sink();
        let mut total = FlushReport::default();
        loop {
            let report = self.queue.flush(&sink, &token).await;
            let again = report.is_clean() && self.queue.pending_count() > 0;
            total.delivered += report.delivered;
            total.deferred += report.deferred;
            total.failed.extend(report.failed);
            total.cancelled |= report.cancelled;
            total.skipped |= report.skipped;
            if !again {
                return total;
            }
        }
    }

    pub async fn handle_connectivity(&self, event: ConnectivityEvent) {
        match event {
            ConnectivityEvent::Online => {
                info!(user_id = %self.user_id, pending = self.pending_writes(), "Back online");
                self.retry_sync().await;
            }
            ConnectivityEvent::Offline => {
                info!(user_id = %self.user_id, "Went offline, interrupting queue flush");
                self.cancel_flush();
            }
        }
    }

    /// Reacts to connectivity transitions until the signal ends or the coordinator
    /// is dropped. Flushes run on their own task so that going offline can
    /// interrupt them.
    pub fn watch_connectivity(self: &Arc<Self>) -> JoinHandle<()> {
        let mut events = self.connectivity.subscribe();
        let coordinator = Arc::downgrade(self);
        tokio::spawn(async move {
            while let Some(event) = events.next().await {
                let Some(coordinator) = coordinator.upgrade() else {
                    break;
                };
                match event {
                    ConnectivityEvent::Online => {
                        tokio::spawn(async move { coordinator.handle_connectivity(event).await });
                    }
                    ConnectivityEvent::Offline => coordinator.handle_connectivity(event).await,
                }
            }
        })
    }

    //=====================================================================================
    // Identity
    //=====================================================================================

    /// Explicit user-data reset. Remote records are deleted first; local progress,
    /// held answers and queued progress writes are dropped only once that succeeded.
    pub async fn reset_progress(&self) -> PortResult<u64> {
        self.ensure_signed_in()?;
        let user_id = self.user_id;
        let deleted = self.repository.delete_progress(user_id).await?;

        let dropped = self.queue.discard(|write| {
            matches!(write, QueuedWrite::ProgressUpsert { user_id: owner, .. } if *owner == user_id)
        });
        let mut local = self.local();
        local.store.reset();
        local.held.clear();
        local.loaded = true;
        local.last_load_error = None;
        info!(%user_id, deleted, dropped, "Progress reset");
        Ok(deleted)
    }

    /// Clears the local view of the identity. Queued writes and held answers are
    /// kept and can still be delivered by [`retry_sync`](Self::retry_sync).
    pub fn sign_out(&self) {
        let mut local = self.local();
        if let Some(abandoned) = local.sessions.abandon() {
            debug!(session_id = %abandoned.id, "Abandoned open session on sign-out");
        }
        local.store.clear();
        info!(user_id = %self.user_id, "Signed out");
    }

    pub fn is_signed_out(&self) -> bool {
        self.local().store.identity().is_none()
    }

    /// Restores the identity after [`sign_out`](Self::sign_out). Progress is
    /// reloaded on next use, on top of whatever is still queued.
    pub fn resume(&self) {
        let mut local = self.local();
        if local.store.identity().is_some() {
            return;
        }
        local.store = ProgressStore::for_user(self.user_id);
        local.loaded = false;
        local.last_load_error = None;
        info!(user_id = %self.user_id, "Signed back in");
    }
}
