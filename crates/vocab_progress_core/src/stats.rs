//! Aggregate statistics over a progress snapshot.

use std::collections::HashMap;

use crate::domain::{ProgressStats, WordId, WordProgress};
use crate::mastery::MAX_LEVEL;

/// Number of most recently practiced words the streak looks at.
pub const STREAK_WINDOW: usize = 10;

pub fn compute_stats(snapshot: &HashMap<WordId, WordProgress>) -> ProgressStats {
    let total_correct: u64 = snapshot.values().map(|p| u64::from(p.correct_count)).sum();
    let total_wrong: u64 = snapshot.values().map(|p| u64::from(p.wrong_count)).sum();
    let answered = total_correct + total_wrong;
    let accuracy = if answered == 0 {
        0.0
    } else {
        total_correct as f64 / answered as f64 * 100.0
    };
    let mastered_count = snapshot
        .values()
        .filter(|p| p.mastery_level == MAX_LEVEL)
        .count();

    ProgressStats {
        total_studied: snapshot.len(),
        total_correct,
        total_wrong,
        accuracy,
        mastered_count,
        in_progress_count: snapshot.len() - mastered_count,
        streak: recent_streak(snapshot),
    }
}

/// Consecutive net-positive words, starting from the most recently practiced one.
fn recent_streak(snapshot: &HashMap<WordId, WordProgress>) -> usize {
    let mut recent: Vec<&WordProgress> = snapshot.values().collect();
    recent.sort_by(|a, b| {
        b.last_practiced
            .cmp(&a.last_practiced)
            .then_with(|| a.word_id.cmp(&b.word_id))
    });
    recent
        .into_iter()
        .take(STREAK_WINDOW)
        .take_while(|p| p.correct_count > p.wrong_count)
        .count()
}
