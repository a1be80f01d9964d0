//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `ProgressRepository` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use vocab_progress_core::domain::{LearningSession, StudyDirection, WordProgress};
use vocab_progress_core::mastery::{legacy_level_from_counts, MAX_LEVEL};
use vocab_progress_core::ports::{PortError, PortResult, ProgressRepository};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `ProgressRepository` port.
#[derive(Clone)]
pub struct PgProgressRepository {
    pool: PgPool,
}

impl PgProgressRepository {
    /// Creates a new `PgProgressRepository`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

/// Connection-level failures are transient and worth retrying from the queue.
fn map_sqlx_error(e: sqlx::Error) -> PortError {
    match e {
        sqlx::Error::RowNotFound => PortError::NotFound(e.to_string()),
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => PortError::Unavailable(e.to_string()),
        _ => PortError::Unexpected(e.to_string()),
    }
}

fn to_column(value: u32, column: &str) -> PortResult<i32> {
    i32::try_from(value)
        .map_err(|_| PortError::Unexpected(format!("{} value {} does not fit the column", column, value)))
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct ProgressRecord {
    word_id: i64,
    correct_count: i32,
    wrong_count: i32,
    mastery_level: Option<i16>,
    last_practiced: DateTime<Utc>,
}

impl ProgressRecord {
    fn to_domain(self) -> PortResult<WordProgress> {
        let correct_count = u32::try_from(self.correct_count).map_err(|_| {
            PortError::Unexpected(format!("negative correct_count for word {}", self.word_id))
        })?;
        let wrong_count = u32::try_from(self.wrong_count).map_err(|_| {
            PortError::Unexpected(format!("negative wrong_count for word {}", self.word_id))
        })?;
        let mastery_level = match self.mastery_level {
            Some(level) => u8::try_from(level)
                .ok()
                .filter(|level| *level <= MAX_LEVEL)
                .ok_or_else(|| {
                    PortError::Unexpected(format!(
                        "mastery level {} out of range for word {}",
                        level, self.word_id
                    ))
                })?,
            None => legacy_level_from_counts(correct_count, wrong_count),
        };

        Ok(WordProgress {
            word_id: self.word_id,
            correct_count,
            wrong_count,
            mastery_level,
            last_practiced: self.last_practiced,
        })
    }
}

//=========================================================================================
// `ProgressRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl ProgressRepository for PgProgressRepository {
    async fn upsert_progress(&self, user_id: Uuid, progress: &WordProgress) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO word_progress (user_id, word_id, correct_count, wrong_count, mastery_level, last_practiced)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (user_id, word_id) DO UPDATE SET
                correct_count = EXCLUDED.correct_count,
                wrong_count = EXCLUDED.wrong_count,
                mastery_level = EXCLUDED.mastery_level,
                last_practiced = EXCLUDED.last_practiced,
                updated_at = now()",
        )
        .bind(user_id)
        .bind(progress.word_id)
        .bind(to_column(progress.correct_count, "correct_count")?)
        .bind(to_column(progress.wrong_count, "wrong_count")?)
        .bind(i16::from(progress.mastery_level))
        .bind(progress.last_practiced)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn upsert_session(&self, user_id: Uuid, session: &LearningSession) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO learning_sessions (id, user_id, direction, started_at, ended_at, words_studied, correct_answers)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (id) DO UPDATE SET
                ended_at = EXCLUDED.ended_at,
                words_studied = EXCLUDED.words_studied,
                correct_answers = EXCLUDED.correct_answers",
        )
        .bind(session.id)
        .bind(user_id)
        .bind(session.direction.as_str())
        .bind(session.started_at)
        .bind(session.ended_at)
        .bind(to_column(session.words_studied, "words_studied")?)
        .bind(to_column(session.correct_answers, "correct_answers")?)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn query_progress(&self, user_id: Uuid) -> PortResult<Vec<WordProgress>> {
        let records = sqlx::query_as::<_, ProgressRecord>(
            "SELECT word_id, correct_count, wrong_count, mastery_level, last_practiced
             FROM word_progress WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn insert_session(
        &self,
        user_id: Uuid,
        direction: StudyDirection,
        started_at: DateTime<Utc>,
    ) -> PortResult<Uuid> {
        sqlx::query_scalar::<_, Uuid>(
            "INSERT INTO learning_sessions (id, user_id, direction, started_at)
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(direction.as_str())
        .bind(started_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)
    }

    async fn delete_progress(&self, user_id: Uuid) -> PortResult<u64> {
        let result = sqlx::query("DELETE FROM word_progress WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected())
    }

    async fn ping(&self) -> PortResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }
}
