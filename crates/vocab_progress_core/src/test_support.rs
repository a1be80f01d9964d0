//! Fakes shared by the unit tests of this crate.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::{watch, Notify};
use uuid::Uuid;

use crate::domain::{
    ConnectivityEvent, LearningSession, QueuedWrite, StudyDirection, WordId, WordProgress,
};
use crate::ports::{
    ConnectivitySignal, ConnectivityStream, PortError, PortResult, ProgressRepository,
};
use crate::sync_queue::QueueSink;

pub fn progress_write(user_id: Uuid, word_id: WordId, level: u8) -> QueuedWrite {
    QueuedWrite::ProgressUpsert {
        user_id,
        progress: WordProgress {
            word_id,
            correct_count: u32::from(level),
            wrong_count: 0,
            mastery_level: level,
            last_practiced: Utc::now(),
        },
    }
}

/// Sink that records delivered writes and fails chosen words on demand.
#[derive(Default)]
pub struct RecordingSink {
    delivered: Mutex<Vec<QueuedWrite>>,
    failing: Mutex<HashSet<WordId>>,
    attempts: AtomicUsize,
}

impl RecordingSink {
    pub fn fail_word(&self, word_id: WordId) {
        self.failing.lock().unwrap().insert(word_id);
    }

    pub fn recover(&self) {
        self.failing.lock().unwrap().clear();
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn delivered_words(&self) -> Vec<WordId> {
        self.delivered
            .lock()
            .unwrap()
            .iter()
            .filter_map(|write| match write {
                QueuedWrite::ProgressUpsert { progress, .. } => Some(progress.word_id),
                QueuedWrite::SessionUpsert { .. } => None,
            })
            .collect()
    }
}

#[async_trait]
impl QueueSink for RecordingSink {
    async fn deliver(&self, write: &QueuedWrite) -> PortResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if let QueuedWrite::ProgressUpsert { progress, .. } = write {
            if self.failing.lock().unwrap().contains(&progress.word_id) {
                return Err(PortError::Unavailable("sink refused".to_string()));
            }
        }
        self.delivered.lock().unwrap().push(write.clone());
        Ok(())
    }
}

/// Sink whose every delivery waits until the test releases it.
#[derive(Default)]
pub struct BlockingSink {
    started: Notify,
    released: Notify,
    delivered: Mutex<Vec<WordId>>,
}

impl BlockingSink {
    /// Resolves once a delivery is waiting for release.
    pub async fn started(&self) {
        self.started.notified().await;
    }

    pub fn release(&self) {
        self.released.notify_one();
    }

    pub fn delivered_words(&self) -> Vec<WordId> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueueSink for BlockingSink {
    async fn deliver(&self, write: &QueuedWrite) -> PortResult<()> {
        self.started.notify_one();
        self.released.notified().await;
        if let QueuedWrite::ProgressUpsert { progress, .. } = write {
            self.delivered.lock().unwrap().push(progress.word_id);
        }
        Ok(())
    }
}

/// In-memory repository whose reachability can be switched off.
#[derive(Default)]
pub struct FakeRepository {
    progress: Mutex<HashMap<(Uuid, WordId), WordProgress>>,
    sessions: Mutex<HashMap<Uuid, LearningSession>>,
    unreachable: AtomicBool,
    writes: AtomicUsize,
    holding_writes: AtomicBool,
    write_started: Notify,
    write_released: Notify,
}

impl FakeRepository {
    pub fn set_reachable(&self, reachable: bool) {
        self.unreachable.store(!reachable, Ordering::SeqCst);
    }

    /// Makes progress upserts wait for [`release_write`](Self::release_write).
    pub fn hold_writes(&self, hold: bool) {
        self.holding_writes.store(hold, Ordering::SeqCst);
    }

    /// Resolves once a held upsert is waiting.
    pub async fn write_started(&self) {
        self.write_started.notified().await;
    }

    pub fn release_write(&self) {
        self.write_released.notify_one();
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn stored_progress(&self, user_id: Uuid, word_id: WordId) -> Option<WordProgress> {
        self.progress.lock().unwrap().get(&(user_id, word_id)).cloned()
    }

    pub fn stored_session(&self, session_id: Uuid) -> Option<LearningSession> {
        self.sessions.lock().unwrap().get(&session_id).cloned()
    }

    pub fn seed(&self, user_id: Uuid, progress: WordProgress) {
        self.progress
            .lock()
            .unwrap()
            .insert((user_id, progress.word_id), progress);
    }

    fn check(&self) -> PortResult<()> {
        if self.unreachable.load(Ordering::SeqCst) {
            Err(PortError::Unavailable("store unreachable".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ProgressRepository for FakeRepository {
    async fn upsert_progress(&self, user_id: Uuid, progress: &WordProgress) -> PortResult<()> {
        self.check()?;
        if self.holding_writes.load(Ordering::SeqCst) {
            self.write_started.notify_one();
            self.write_released.notified().await;
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.seed(user_id, progress.clone());
        Ok(())
    }

    async fn upsert_session(&self, _user_id: Uuid, session: &LearningSession) -> PortResult<()> {
        self.check()?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.sessions
            .lock()
            .unwrap()
            .insert(session.id, session.clone());
        Ok(())
    }

    async fn query_progress(&self, user_id: Uuid) -> PortResult<Vec<WordProgress>> {
        self.check()?;
        Ok(self
            .progress
            .lock()
            .unwrap()
            .iter()
            .filter(|((owner, _), _)| *owner == user_id)
            .map(|(_, p)| p.clone())
            .collect())
    }

    async fn insert_session(
        &self,
        _user_id: Uuid,
        direction: StudyDirection,
        started_at: DateTime<Utc>,
    ) -> PortResult<Uuid> {
        self.check()?;
        let session = LearningSession::new(Uuid::new_v4(), direction, started_at);
        let id = session.id;
        self.sessions.lock().unwrap().insert(id, session);
        Ok(id)
    }

    async fn delete_progress(&self, user_id: Uuid) -> PortResult<u64> {
        self.check()?;
        let mut progress = self.progress.lock().unwrap();
        let before = progress.len();
        progress.retain(|(owner, _), _| *owner != user_id);
        Ok((before - progress.len()) as u64)
    }

    async fn ping(&self) -> PortResult<()> {
        self.check()
    }
}

/// Connectivity signal driven by the test.
pub struct ManualConnectivity {
    state: watch::Sender<bool>,
}

impl ManualConnectivity {
    pub fn new(online: bool) -> Self {
        let (state, _) = watch::channel(online);
        Self { state }
    }

    pub fn set_online(&self, online: bool) {
        self.state.send_replace(online);
    }
}

impl ConnectivitySignal for ManualConnectivity {
    fn is_online(&self) -> bool {
        *self.state.borrow()
    }

    fn subscribe(&self) -> ConnectivityStream {
        let rx = self.state.subscribe();
        Box::pin(stream::unfold(rx, |mut rx| async move {
            rx.changed().await.ok()?;
            let event = if *rx.borrow_and_update() {
                ConnectivityEvent::Online
            } else {
                ConnectivityEvent::Offline
            };
            Some((event, rx))
        }))
    }
}
