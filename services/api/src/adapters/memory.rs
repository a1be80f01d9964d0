//! services/api/src/adapters/memory.rs
//!
//! An in-process implementation of the `ProgressRepository` port, used when no
//! database is configured and by the router tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;
use vocab_progress_core::domain::{LearningSession, StudyDirection, WordId, WordProgress};
use vocab_progress_core::ports::{PortError, PortResult, ProgressRepository};

#[derive(Default)]
struct Tables {
    progress: HashMap<(Uuid, WordId), WordProgress>,
    sessions: HashMap<Uuid, (Uuid, LearningSession)>,
}

/// Volatile repository. Can be switched unavailable to exercise the offline path.
#[derive(Default)]
pub struct MemoryProgressRepository {
    tables: Mutex<Tables>,
    unavailable: AtomicBool,
}

impl MemoryProgressRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    pub fn session(&self, session_id: Uuid) -> Option<LearningSession> {
        self.tables()
            .sessions
            .get(&session_id)
            .map(|(_, session)| session.clone())
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check(&self) -> PortResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(PortError::Unavailable("memory store switched off".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ProgressRepository for MemoryProgressRepository {
    async fn upsert_progress(&self, user_id: Uuid, progress: &WordProgress) -> PortResult<()> {
        self.check()?;
        self.tables()
            .progress
            .insert((user_id, progress.word_id), progress.clone());
        Ok(())
    }

    async fn upsert_session(&self, user_id: Uuid, session: &LearningSession) -> PortResult<()> {
        self.check()?;
        self.tables()
            .sessions
            .insert(session.id, (user_id, session.clone()));
        Ok(())
    }

    async fn query_progress(&self, user_id: Uuid) -> PortResult<Vec<WordProgress>> {
        self.check()?;
        Ok(self
            .tables()
            .progress
            .iter()
            .filter(|((owner, _), _)| *owner == user_id)
            .map(|(_, progress)| progress.clone())
            .collect())
    }

    async fn insert_session(
        &self,
        user_id: Uuid,
        direction: StudyDirection,
        started_at: DateTime<Utc>,
    ) -> PortResult<Uuid> {
        self.check()?;
        let session = LearningSession::new(Uuid::new_v4(), direction, started_at);
        let id = session.id;
        self.tables().sessions.insert(id, (user_id, session));
        Ok(id)
    }

    async fn delete_progress(&self, user_id: Uuid) -> PortResult<u64> {
        self.check()?;
        let mut tables = self.tables();
        let before = tables.progress.len();
        tables.progress.retain(|(owner, _), _| *owner != user_id);
        Ok((before - tables.progress.len()) as u64)
    }

    async fn ping(&self) -> PortResult<()> {
        self.check()
    }
}
