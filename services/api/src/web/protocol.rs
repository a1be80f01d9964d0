//! services/api/src/web/protocol.rs
//!
//! Defines the JSON payloads exchanged between clients and the progress API,
//! and their conversions from the core domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use vocab_progress_core::coordinator::SyncStatus;
use vocab_progress_core::domain::{
    DifficultyRating, LearningSession, ProgressStats, ReviewOutcome, StudyDirection, WordProgress,
};
use vocab_progress_core::scheduler::next_due_date;
use vocab_progress_core::sync_queue::{FlushReport, QueueState};

//=========================================================================================
// Requests
//=========================================================================================

#[derive(Debug, Clone, Copy, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Again,
    Hard,
    Good,
    Easy,
}

impl From<Difficulty> for DifficultyRating {
    fn from(value: Difficulty) -> Self {
        match value {
            Difficulty::Again => DifficultyRating::Again,
            Difficulty::Hard => DifficultyRating::Hard,
            Difficulty::Good => DifficultyRating::Good,
            Difficulty::Easy => DifficultyRating::Easy,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    NativeToForeign,
    ForeignToNative,
}

impl From<Direction> for StudyDirection {
    fn from(value: Direction) -> Self {
        match value {
            Direction::NativeToForeign => StudyDirection::NativeToForeign,
            Direction::ForeignToNative => StudyDirection::ForeignToNative,
        }
    }
}

impl From<StudyDirection> for Direction {
    fn from(value: StudyDirection) -> Self {
        match value {
            StudyDirection::NativeToForeign => Direction::NativeToForeign,
            StudyDirection::ForeignToNative => Direction::ForeignToNative,
        }
    }
}

/// One answer given by the learner.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct RecordReviewRequest {
    pub word_id: i64,
    pub correct: bool,
    pub response_time_ms: Option<u32>,
    pub difficulty: Option<Difficulty>,
}

impl From<RecordReviewRequest> for ReviewOutcome {
    fn from(req: RecordReviewRequest) -> Self {
        ReviewOutcome {
            word_id: req.word_id,
            correct: req.correct,
            response_time_ms: req.response_time_ms,
            difficulty: req.difficulty.map(DifficultyRating::from),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct DueWordsRequest {
    pub candidate_ids: Vec<i64>,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct StartSessionRequest {
    pub direction: Direction,
}

//=========================================================================================
// Responses
//=========================================================================================

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct WordProgressResponse {
    pub word_id: i64,
    pub correct_count: u32,
    pub wrong_count: u32,
    pub mastery_level: u8,
    pub last_practiced: DateTime<Utc>,
    pub next_due: DateTime<Utc>,
}

impl From<WordProgress> for WordProgressResponse {
    fn from(p: WordProgress) -> Self {
        Self {
            next_due: next_due_date(p.mastery_level, p.last_practiced),
            word_id: p.word_id,
            correct_count: p.correct_count,
            wrong_count: p.wrong_count,
            mastery_level: p.mastery_level,
            last_practiced: p.last_practiced,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct StatsResponse {
    pub total_studied: usize,
    pub total_correct: u64,
    pub total_wrong: u64,
    pub accuracy: f64,
    pub mastered_count: usize,
    pub in_progress_count: usize,
    pub streak: usize,
}

impl From<ProgressStats> for StatsResponse {
    fn from(s: ProgressStats) -> Self {
        Self {
            total_studied: s.total_studied,
            total_correct: s.total_correct,
            total_wrong: s.total_wrong,
            accuracy: s.accuracy,
            mastered_count: s.mastered_count,
            in_progress_count: s.in_progress_count,
            streak: s.streak,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct DueWordsResponse {
    /// Due word ids, highest study priority first.
    pub due: Vec<i64>,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct SessionResponse {
    pub id: Uuid,
    pub direction: Direction,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub words_studied: u32,
    pub correct_answers: u32,
}

impl From<LearningSession> for SessionResponse {
    fn from(s: LearningSession) -> Self {
        Self {
            id: s.id,
            direction: s.direction.into(),
            started_at: s.started_at,
            ended_at: s.ended_at,
            words_studied: s.words_studied,
            correct_answers: s.correct_answers,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct SyncStatusResponse {
    pub is_online: bool,
    pub has_offline_changes: bool,
    pub pending_count: usize,
    /// One of `empty`, `has_pending`, `draining`.
    pub queue_state: String,
    pub last_load_error: Option<String>,
}

impl From<SyncStatus> for SyncStatusResponse {
    fn from(s: SyncStatus) -> Self {
        let queue_state = match s.queue_state {
            QueueState::Empty => "empty",
            QueueState::HasPending => "has_pending",
            QueueState::Draining => "draining",
        };
        Self {
            is_online: s.is_online,
            has_offline_changes: s.has_offline_changes,
            pending_count: s.pending_count,
            queue_state: queue_state.to_string(),
            last_load_error: s.last_load_error,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct RetrySyncResponse {
    pub delivered: usize,
    pub failed: usize,
    pub deferred: usize,
    pub cancelled: bool,
    pub skipped: bool,
    /// Writes held back because the stored progress could not be loaded.
    pub held: usize,
    pub pending_count: usize,
}

impl RetrySyncResponse {
    pub fn new(report: FlushReport, pending_count: usize) -> Self {
        Self {
            delivered: report.delivered,
            failed: report.failed.len(),
            deferred: report.deferred,
            cancelled: report.cancelled,
            skipped: report.skipped,
            held: report.held,
            pending_count,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct ResetProgressResponse {
    pub deleted: u64,
}
