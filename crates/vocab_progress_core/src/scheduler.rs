//! Review scheduling on top of the mastery levels.

use chrono::{DateTime, Duration, Utc};
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::domain::{WordId, WordProgress};

/// Days until the next review, indexed by mastery level.
pub const INTERVAL_DAYS: [i64; 6] = [1, 3, 7, 14, 30, 90];

/// Review interval for a level. Levels past the table use its last entry.
pub fn interval_for(level: u8) -> Duration {
    let index = usize::from(level).min(INTERVAL_DAYS.len() - 1);
    Duration::days(INTERVAL_DAYS[index])
}

pub fn next_due_date(level: u8, last_reviewed: DateTime<Utc>) -> DateTime<Utc> {
    last_reviewed + interval_for(level)
}

/// A word without progress is always due.
pub fn is_due(progress: Option<&WordProgress>, now: DateTime<Utc>) -> bool {
    match progress {
        Some(p) => now >= next_due_date(p.mastery_level, p.last_practiced),
        None => true,
    }
}

/// Keeps the due candidates, in candidate order.
pub fn filter_due(
    candidates: &[WordId],
    progress: &HashMap<WordId, WordProgress>,
    now: DateTime<Utc>,
) -> Vec<WordId> {
    candidates
        .iter()
        .copied()
        .filter(|id| is_due(progress.get(id), now))
        .collect()
}

/// Due candidates ordered for study: unseen words first, then lower levels,
/// then the longest-unpracticed. Remaining ties keep candidate order.
pub fn rank_due(
    candidates: &[WordId],
    progress: &HashMap<WordId, WordProgress>,
    now: DateTime<Utc>,
) -> Vec<WordId> {
    let mut due = filter_due(candidates, progress, now);
    due.sort_by(|a, b| compare_priority(progress.get(a), progress.get(b)));
    due
}

fn compare_priority(a: Option<&WordProgress>, b: Option<&WordProgress>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => a
            .mastery_level
            .cmp(&b.mastery_level)
            .then_with(|| a.last_practiced.cmp(&b.last_practiced)),
    }
}
