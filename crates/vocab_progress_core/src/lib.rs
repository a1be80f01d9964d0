pub mod coordinator;
pub mod domain;
pub mod mastery;
pub mod ports;
pub mod scheduler;
pub mod session;
pub mod stats;
pub mod store;
pub mod sync_queue;

#[cfg(test)]
pub(crate) mod test_support;

pub use coordinator::{ProgressCoordinator, SyncStatus};
pub use domain::{
    ConnectivityEvent, DifficultyRating, LearningSession, ProgressStats, QueueItem, QueuedWrite,
    ReviewOutcome, StudyDirection, WordId, WordProgress,
};
pub use ports::{
    ConnectivitySignal, ConnectivityStream, PortError, PortResult, ProgressRepository,
};
pub use sync_queue::{FlushReport, QueueState};
