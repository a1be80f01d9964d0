//! crates/vocab_progress_core/src/ports.rs
//!
//! Defines the service contracts (traits) the progress engine depends on.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the concrete remote store and of the platform's
//! connectivity detection.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use std::pin::Pin;
use uuid::Uuid;

use crate::domain::{ConnectivityEvent, LearningSession, StudyDirection, WordProgress};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, Clone, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// The remote store could not be reached. Writes failing this way are retried later.
    #[error("Service unavailable: {0}")]
    Unavailable(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// Stream of connectivity transitions handed out by a [`ConnectivitySignal`].
pub type ConnectivityStream = Pin<Box<dyn Stream<Item = ConnectivityEvent> + Send>>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// The durable remote store. Every write is an upsert and must be idempotent under replay.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Inserts or overwrites the record keyed by `(user_id, progress.word_id)`.
    async fn upsert_progress(&self, user_id: Uuid, progress: &WordProgress) -> PortResult<()>;

    /// Inserts or overwrites the session keyed by `session.id`.
    async fn upsert_session(&self, user_id: Uuid, session: &LearningSession) -> PortResult<()>;

    /// Full scan of one user's progress, used to rehydrate the local store.
    async fn query_progress(&self, user_id: Uuid) -> PortResult<Vec<WordProgress>>;

    /// Creates a session row and returns its id.
    async fn insert_session(
        &self,
        user_id: Uuid,
        direction: StudyDirection,
        started_at: DateTime<Utc>,
    ) -> PortResult<Uuid>;

    /// Deletes every progress record of a user. Returns the number of removed rows.
    async fn delete_progress(&self, user_id: Uuid) -> PortResult<u64>;

    /// Cheap reachability check.
    async fn ping(&self) -> PortResult<()>;
}

/// The platform's view of network connectivity, injected instead of queried globally.
pub trait ConnectivitySignal: Send + Sync {
    fn is_online(&self) -> bool;

    /// Subscribes to future transitions. The current state is not replayed.
    fn subscribe(&self) -> ConnectivityStream;
}
