use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use serde::Serialize;

use crate::clock::{Clock, SystemClock};
use crate::error::SessionError;
use crate::metrics::{Metrics, CHARS_PER_WORD};

/// Bounds of the advisory countdown shown while typing, in seconds
const MIN_ESTIMATED_SECS: f64 = 20.0;
const MAX_ESTIMATED_SECS: f64 = 300.0;
/// Seconds budgeted per word of reference text
const SECS_PER_WORD: f64 = 1.5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    Created,
    Active,
    Complete,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Correct,
    Incorrect,
}

/// One processed keystroke
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Keystroke {
    pub char: char,
    pub outcome: Outcome,
    pub timestamp: SystemTime,
}

/// Immediate answer to a single keystroke.
///
/// `valid` is always `true`: it is reserved for future input validation
/// (e.g. rejecting control characters) and consumers may rely on it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct KeystrokeResult {
    pub valid: bool,
    pub error: bool,
    pub complete: bool,
    pub cursor: usize,
    pub remaining: usize,
}

/// A single attempt at typing a reference text.
///
/// Created → Active (after [`TypingSession::start`]) → Complete. The cursor only
/// advances on a correct keystroke; a mismatch is recorded against the current
/// cursor position and must be retried.
pub struct TypingSession {
    reference: Vec<char>,
    owner_id: String,
    phase: SessionPhase,
    cursor: usize,
    error_count: usize,
    error_positions: Vec<usize>,
    keystrokes: Vec<Keystroke>,
    start_time: Option<SystemTime>,
    end_time: Option<SystemTime>,
    clock: Arc<dyn Clock>,
}

impl TypingSession {
    pub fn new(reference_text: &str, owner_id: impl Into<String>) -> Self {
        Self::with_clock(reference_text, owner_id, Arc::new(SystemClock))
    }

    pub fn with_clock(
        reference_text: &str,
        owner_id: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            reference: reference_text.chars().collect(),
            owner_id: owner_id.into(),
            phase: SessionPhase::Created,
            cursor: 0,
            error_count: 0,
            error_positions: Vec::new(),
            keystrokes: Vec::new(),
            start_time: None,
            end_time: None,
            clock,
        }
    }

    /// Arm the timer. Only valid once, from `Created`.
    ///
    /// An empty reference text has nothing left to type, so starting it
    /// completes the session on the spot.
    pub fn start(&mut self) -> Result<(), SessionError> {
        if self.phase != SessionPhase::Created {
            return Err(SessionError::invalid_state("start", self.phase));
        }

        let now = self.clock.now();
        self.start_time = Some(now);
        self.phase = SessionPhase::Active;

        if self.reference.is_empty() {
            self.end_time = Some(now);
            self.phase = SessionPhase::Complete;
        }

        Ok(())
    }

    pub fn process_keystroke(&mut self, c: char) -> Result<KeystrokeResult, SessionError> {
        if self.phase != SessionPhase::Active {
            return Err(SessionError::invalid_state(
                "process a keystroke",
                self.phase,
            ));
        }

        let now = self.clock.now();
        let outcome = match self.expected_char() {
            Some(expected) if expected == c => Outcome::Correct,
            _ => Outcome::Incorrect,
        };

        self.keystrokes.push(Keystroke {
            char: c,
            outcome,
            timestamp: now,
        });

        match outcome {
            Outcome::Correct => self.cursor += 1,
            Outcome::Incorrect => {
                self.error_count += 1;
                self.error_positions.push(self.cursor);
            }
        }

        let complete = self.cursor == self.reference.len();
        if complete && self.end_time.is_none() {
            self.end_time = Some(now);
            self.phase = SessionPhase::Complete;
        }

        Ok(KeystrokeResult {
            valid: true,
            error: outcome == Outcome::Incorrect,
            complete,
            cursor: self.cursor,
            remaining: self.remaining(),
        })
    }

    /// Snapshot of the session's performance at this instant
    pub fn metrics(&self) -> Metrics {
        Metrics::from_session(self, self.clock.now())
    }

    /// Time between start and completion (or now, while still typing)
    pub fn elapsed_at(&self, now: SystemTime) -> Duration {
        match self.start_time {
            Some(start) => self
                .end_time
                .unwrap_or(now)
                .duration_since(start)
                .unwrap_or_default(),
            None => Duration::ZERO,
        }
    }

    /// Advisory time budget for this text, in seconds.
    ///
    /// Informational only: running out of time never completes a session.
    pub fn estimated_duration(&self) -> f64 {
        let words = self.reference.len() as f64 / CHARS_PER_WORD;
        (words * SECS_PER_WORD).clamp(MIN_ESTIMATED_SECS, MAX_ESTIMATED_SECS)
    }

    pub fn time_remaining(&self) -> f64 {
        let elapsed = self.elapsed_at(self.clock.now()).as_secs_f64();
        (self.estimated_duration() - elapsed).max(0.0)
    }

    pub fn expected_char(&self) -> Option<char> {
        self.reference.get(self.cursor).copied()
    }

    pub fn remaining(&self) -> usize {
        self.reference.len() - self.cursor
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn has_started(&self) -> bool {
        self.start_time.is_some()
    }

    pub fn is_complete(&self) -> bool {
        self.phase == SessionPhase::Complete
    }

    pub fn reference_text(&self) -> &[char] {
        &self.reference
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn error_positions(&self) -> &[usize] {
        &self.error_positions
    }

    pub fn keystrokes(&self) -> &[Keystroke] {
        &self.keystrokes
    }

    pub fn last_keystroke(&self) -> Option<&Keystroke> {
        self.keystrokes.last()
    }

    pub fn start_time(&self) -> Option<SystemTime> {
        self.start_time
    }

    pub fn end_time(&self) -> Option<SystemTime> {
        self.end_time
    }
}

impl fmt::Debug for TypingSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypingSession")
            .field("owner_id", &self.owner_id)
            .field("phase", &self.phase)
            .field("cursor", &self.cursor)
            .field("len", &self.reference.len())
            .field("error_count", &self.error_count)
            .field("keystrokes", &self.keystrokes.len())
            .finish_non_exhaustive()
    }
}
