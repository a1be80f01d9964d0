//! Leitner-style mastery transitions.
//!
//! A correct answer promotes a word by one box, a wrong answer demotes it by two.

use chrono::{DateTime, Utc};

use crate::domain::{WordId, WordProgress};

pub const MIN_LEVEL: u8 = 0;
pub const MAX_LEVEL: u8 = 5;

const DEMOTION_STEP: u8 = 2;

/// Computes the level following an answer.
///
/// # Panics
///
/// Panics if `current` is outside `MIN_LEVEL..=MAX_LEVEL`. Such a level can only
/// come from a caller that bypassed validation.
pub fn next_level(current: u8, correct: bool) -> u8 {
    assert!(
        current <= MAX_LEVEL,
        "mastery level {current} is outside {MIN_LEVEL}..={MAX_LEVEL}"
    );
    if correct {
        (current + 1).min(MAX_LEVEL)
    } else {
        current.saturating_sub(DEMOTION_STEP)
    }
}

/// Applies one answer to the previous record of a word, or to an empty record
/// at level 0 when the word was never reviewed.
pub fn apply_review(
    previous: Option<&WordProgress>,
    word_id: WordId,
    correct: bool,
    at: DateTime<Utc>,
) -> WordProgress {
    let (correct_count, wrong_count, level, last_practiced) = match previous {
        Some(p) => (p.correct_count, p.wrong_count, p.mastery_level, p.last_practiced.max(at)),
        None => (0, 0, MIN_LEVEL, at),
    };

    WordProgress {
        word_id,
        correct_count: correct_count + u32::from(correct),
        wrong_count: wrong_count + u32::from(!correct),
        mastery_level: next_level(level, correct),
        last_practiced,
    }
}

/// Reinterprets a legacy record that only carries answer counts.
///
/// Older data derived mastery from the cumulative success rate instead of the
/// incremental box transitions. This is only used to fill in a missing level when
/// such records are loaded; new writes always go through [`next_level`].
pub fn legacy_level_from_counts(correct: u32, wrong: u32) -> u8 {
    let total = correct + wrong;
    if total == 0 {
        return MIN_LEVEL;
    }
    let rate = f64::from(correct) / f64::from(total);
    match (rate, total) {
        (r, t) if r >= 0.9 && t >= 10 => 5,
        (r, t) if r >= 0.8 && t >= 7 => 4,
        (r, t) if r >= 0.7 && t >= 5 => 3,
        (r, t) if r >= 0.6 && t >= 3 => 2,
        (r, _) if r >= 0.4 => 1,
        _ => MIN_LEVEL,
    }
}
