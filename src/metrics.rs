use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::session::TypingSession;
use crate::util::round_to;

/// One "word" is five correctly typed characters
pub const CHARS_PER_WORD: f64 = 5.0;
/// Floor on the elapsed minutes so near-instant completions stay finite
pub const MIN_MINUTES: f64 = 0.01;

/// Performance snapshot of a typing session.
///
/// `wpm` and `accuracy` are rounded to one decimal place; `elapsed` is seconds.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub wpm: f64,
    pub accuracy: f64,
    pub elapsed: f64,
    pub errors: usize,
    pub characters_typed: usize,
    pub total_keystrokes: usize,
}

impl Metrics {
    pub fn from_session(session: &TypingSession, now: SystemTime) -> Self {
        let elapsed = session.elapsed_at(now).as_secs_f64();
        let characters_typed = session.cursor();
        let total_keystrokes = session.keystrokes().len();
        let errors = session.error_count();

        Self {
            wpm: round_to(words_per_minute(characters_typed, elapsed), 1),
            accuracy: round_to(accuracy(total_keystrokes, errors), 1),
            elapsed,
            errors,
            characters_typed,
            total_keystrokes,
        }
    }
}

pub fn words_per_minute(matched_chars: usize, elapsed_secs: f64) -> f64 {
    let minutes = (elapsed_secs.max(0.0) / 60.0).max(MIN_MINUTES);
    (matched_chars as f64 / CHARS_PER_WORD) / minutes
}

/// Share of keystrokes that were correct, as a percentage
pub fn accuracy(total_keystrokes: usize, errors: usize) -> f64 {
    if total_keystrokes == 0 {
        return 100.0;
    }
    let correct = total_keystrokes.saturating_sub(errors);
    100.0 * correct as f64 / total_keystrokes as f64
}
