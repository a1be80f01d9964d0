//! Tracks the single open learning session of a coordinator.

use chrono::{DateTime, Utc};

use crate::domain::LearningSession;

#[derive(Debug, Default)]
pub struct SessionTracker {
    current: Option<LearningSession>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens `session`. An already open session is replaced and returned unfinished;
    /// the tracker never closes it on the caller's behalf.
    pub fn start(&mut self, session: LearningSession) -> Option<LearningSession> {
        self.current.replace(session)
    }

    pub fn is_open(&self) -> bool {
        self.current.is_some()
    }

    pub fn current(&self) -> Option<&LearningSession> {
        self.current.as_ref()
    }

    /// Counts one answer towards the open session. No-op when closed.
    pub fn record(&mut self, correct: bool) {
        if let Some(session) = self.current.as_mut() {
            session.words_studied += 1;
            if correct {
                session.correct_answers += 1;
            }
        }
    }

    /// Closes the open session and returns its final aggregate.
    pub fn end(&mut self, at: DateTime<Utc>) -> Option<LearningSession> {
        let mut session = self.current.take()?;
        session.ended_at = Some(at.max(session.started_at));
        Some(session)
    }

    /// Forgets the open session without finalizing it.
    pub fn abandon(&mut self) -> Option<LearningSession> {
        self.current.take()
    }
}
