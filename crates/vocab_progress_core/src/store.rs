//! In-memory authoritative view of one user's word progress.

use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::{WordId, WordProgress};

/// Progress-per-word for the current identity. Durability is layered on top by
/// the coordinator and the offline queue.
#[derive(Debug, Default)]
pub struct ProgressStore {
    identity: Option<Uuid>,
    entries: HashMap<WordId, WordProgress>,
}

impl ProgressStore {
    pub fn for_user(user_id: Uuid) -> Self {
        Self {
            identity: Some(user_id),
            entries: HashMap::new(),
        }
    }

    /// The identity this store is scoped to, `None` after sign-out.
    pub fn identity(&self) -> Option<Uuid> {
        self.identity
    }

    pub fn get(&self, word_id: WordId) -> Option<&WordProgress> {
        self.entries.get(&word_id)
    }

    /// Inserts or replaces the record of `progress.word_id`. Ignored without identity.
    pub fn upsert(&mut self, progress: WordProgress) {
        if self.identity.is_none() {
            return;
        }
        self.entries.insert(progress.word_id, progress);
    }

    pub fn snapshot(&self) -> HashMap<WordId, WordProgress> {
        self.entries.clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replaces the whole content, as done when rehydrating from the remote store.
    pub fn replace_all(&mut self, records: impl IntoIterator<Item = WordProgress>) {
        self.entries.clear();
        if self.identity.is_none() {
            return;
        }
        self.entries
            .extend(records.into_iter().map(|p| (p.word_id, p)));
    }

    /// Drops all records but keeps the identity.
    pub fn reset(&mut self) {
        self.entries.clear();
    }

    /// Drops all records and the identity.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.identity = None;
    }
}
