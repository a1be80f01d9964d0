//! crates/vocab_progress_core/src/domain.rs
//!
//! Defines the pure, core data structures for the progress engine.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Externally assigned, stable identifier of a vocabulary word.
pub type WordId = i64;

/// Learning progress of one user on one word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordProgress {
    pub word_id: WordId,
    pub correct_count: u32,
    pub wrong_count: u32,
    /// Leitner box index in `0..=5`.
    pub mastery_level: u8,
    pub last_practiced: DateTime<Utc>,
}

impl WordProgress {
    pub fn total_answers(&self) -> u32 {
        self.correct_count + self.wrong_count
    }
}

/// Self-reported difficulty of a review, on the usual four-point scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DifficultyRating {
    Again,
    Hard,
    Good,
    Easy,
}

/// A single answer given by the learner. Consumed once by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewOutcome {
    pub word_id: WordId,
    pub correct: bool,
    pub response_time_ms: Option<u32>,
    pub difficulty: Option<DifficultyRating>,
}

impl ReviewOutcome {
    pub fn new(word_id: WordId, correct: bool) -> Self {
        Self {
            word_id,
            correct,
            response_time_ms: None,
            difficulty: None,
        }
    }
}

/// Which translation direction a session practiced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StudyDirection {
    NativeToForeign,
    ForeignToNative,
}

impl StudyDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            StudyDirection::NativeToForeign => "native_to_foreign",
            StudyDirection::ForeignToNative => "foreign_to_native",
        }
    }
}

impl fmt::Display for StudyDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown study direction: {0}")]
pub struct UnknownDirection(pub String);

impl FromStr for StudyDirection {
    type Err = UnknownDirection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "native_to_foreign" => Ok(StudyDirection::NativeToForeign),
            "foreign_to_native" => Ok(StudyDirection::ForeignToNative),
            other => Err(UnknownDirection(other.to_string())),
        }
    }
}

/// A bounded run of reviews with aggregate counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LearningSession {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub words_studied: u32,
    pub correct_answers: u32,
    pub direction: StudyDirection,
}

impl LearningSession {
    pub fn new(id: Uuid, direction: StudyDirection, started_at: DateTime<Utc>) -> Self {
        Self {
            id,
            started_at,
            ended_at: None,
            words_studied: 0,
            correct_answers: 0,
            direction,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.ended_at.is_some()
    }
}

/// A persistence write that could not reach the remote store yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueuedWrite {
    ProgressUpsert { user_id: Uuid, progress: WordProgress },
    SessionUpsert { user_id: Uuid, session: LearningSession },
}

/// The conflict key a queued write upserts against at the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteKey {
    Word(Uuid, WordId),
    Session(Uuid),
}

impl QueuedWrite {
    pub fn kind(&self) -> &'static str {
        match self {
            QueuedWrite::ProgressUpsert { .. } => "progress-upsert",
            QueuedWrite::SessionUpsert { .. } => "session-upsert",
        }
    }

    pub fn key(&self) -> WriteKey {
        match self {
            QueuedWrite::ProgressUpsert { user_id, progress } => {
                WriteKey::Word(*user_id, progress.word_id)
            }
            QueuedWrite::SessionUpsert { session, .. } => WriteKey::Session(session.id),
        }
    }
}

/// An entry of the offline queue. `seq` is assigned by the queue on insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueItem {
    pub seq: u64,
    pub enqueued_at: DateTime<Utc>,
    pub write: QueuedWrite,
}

/// Aggregate statistics derived from the local progress snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressStats {
    pub total_studied: usize,
    pub total_correct: u64,
    pub total_wrong: u64,
    /// Percentage of correct answers, `0.0` when nothing was answered yet.
    pub accuracy: f64,
    pub mastered_count: usize,
    pub in_progress_count: usize,
    pub streak: usize,
}

/// Connectivity transitions reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityEvent {
    Online,
    Offline,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_parses_its_own_representation() {
        for direction in [StudyDirection::NativeToForeign, StudyDirection::ForeignToNative] {
            assert_eq!(direction.as_str().parse::<StudyDirection>(), Ok(direction));
        }
        assert!("sideways".parse::<StudyDirection>().is_err());
    }

    #[test]
    fn queued_writes_are_keyed_by_their_upsert_target() {
        let user_id = Uuid::new_v4();
        let progress = WordProgress {
            word_id: 42,
            correct_count: 1,
            wrong_count: 0,
            mastery_level: 1,
            last_practiced: Utc::now(),
        };
        let write = QueuedWrite::ProgressUpsert { user_id, progress };
        assert_eq!(write.kind(), "progress-upsert");
        assert_eq!(write.key(), WriteKey::Word(user_id, 42));

        let session = LearningSession::new(Uuid::new_v4(), StudyDirection::NativeToForeign, Utc::now());
        let session_id = session.id;
        let write = QueuedWrite::SessionUpsert { user_id, session };
        assert_eq!(write.kind(), "session-upsert");
        assert_eq!(write.key(), WriteKey::Session(session_id));
    }
}
