use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::TrainerError;
use crate::exercise::{Exercise, ExerciseManager};
use crate::metrics::Metrics;
use crate::profile::ProfileStore;
use crate::session::{KeystrokeResult, TypingSession};
use crate::store::{lock_session, Attempt, SessionId, SessionStore};

pub type Result<T> = std::result::Result<T, TrainerError>;

/// Which exercise a new session should use
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExerciseSelection {
    /// Uniform pick across every level
    Random,
    /// Uniform pick within one level
    Level(String),
    Exact { level: String, id: String },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StartedSession {
    pub session_id: SessionId,
    pub exercise: Exercise,
    pub level: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct KeystrokeOutcome {
    pub result: KeystrokeResult,
    /// Final metrics, present only on the keystroke that completed the session
    pub metrics: Option<Metrics>,
    /// Whether the completed session reached the profile store
    pub recorded: bool,
}

/// A session that finished, and whether its result reached the profile store
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Completion {
    pub metrics: Metrics,
    pub recorded: bool,
}

/// Wires the exercise catalog, live sessions and profile history together.
///
/// This is what a front end talks to: it picks exercises, owns session
/// lifetimes through the injected [`SessionStore`] and hands every completed
/// session to the [`ProfileStore`] exactly once.
pub struct Trainer {
    catalog: ExerciseManager,
    sessions: Arc<dyn SessionStore>,
    profiles: Box<dyn ProfileStore>,
    clock: Arc<dyn Clock>,
}

impl Trainer {
    pub fn new(
        catalog: ExerciseManager,
        sessions: Arc<dyn SessionStore>,
        profiles: Box<dyn ProfileStore>,
    ) -> Self {
        Self::with_clock(catalog, sessions, profiles, Arc::new(SystemClock))
    }

    pub fn with_clock(
        catalog: ExerciseManager,
        sessions: Arc<dyn SessionStore>,
        profiles: Box<dyn ProfileStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            catalog,
            sessions,
            profiles,
            clock,
        }
    }

    pub fn catalog(&self) -> &ExerciseManager {
        &self.catalog
    }

    pub fn profiles(&self) -> &dyn ProfileStore {
        self.profiles.as_ref()
    }

    pub fn sessions(&self) -> &dyn SessionStore {
        self.sessions.as_ref()
    }

    /// Create an armed session. The timer starts with [`Trainer::begin`].
    ///
    /// A selection that misses the catalog still yields a session, built on
    /// the sentinel exercise so the front end can show why.
    pub fn start_session(&self, owner_id: &str, selection: &ExerciseSelection) -> StartedSession {
        let (exercise, level) = match selection {
            ExerciseSelection::Random => {
                let exercise = self.catalog.random_exercise();
                let level = self.catalog.level_of(&exercise.id).map(str::to_string);
                (exercise, level)
            }
            ExerciseSelection::Level(level) => (
                self.catalog
                    .random_in_level_with(level, &mut rand::thread_rng()),
                Some(level.clone()),
            ),
            ExerciseSelection::Exact { level, id } => {
                (self.catalog.get_exercise(level, id), Some(level.clone()))
            }
        };

        self.start_with_exercise(owner_id, exercise, level)
    }

    pub fn start_with_exercise(
        &self,
        owner_id: &str,
        exercise: Exercise,
        level: Option<String>,
    ) -> StartedSession {
        let session = TypingSession::with_clock(&exercise.text, owner_id, Arc::clone(&self.clock));
        let session_id = self
            .sessions
            .insert(Attempt::new(session, exercise.clone(), level.clone()));

        info!(session = %session_id, owner = owner_id, exercise = %exercise.id, "session created");

        StartedSession {
            session_id,
            exercise,
            level,
        }
    }

    /// Arm the timer once the front end is ready to accept keystrokes.
    ///
    /// An empty text completes on the spot; it is recorded here and the
    /// completion is returned.
    pub fn begin(&self, id: &SessionId) -> Result<Option<Completion>> {
        let handle = self.handle(id)?;
        let mut attempt = lock_session(&handle);

        attempt.session.start()?;
        debug!(session = %id, "session timer started");

        if !attempt.session.is_complete() {
            return Ok(None);
        }

        let metrics = attempt.session.metrics();
        info!(session = %id, "empty text, session complete on start");
        let recorded = self.record(id, &mut attempt, &metrics);
        Ok(Some(Completion { metrics, recorded }))
    }

    pub fn keystroke(&self, id: &SessionId, c: char) -> Result<KeystrokeOutcome> {
        let handle = self.handle(id)?;
        let mut attempt = lock_session(&handle);

        let result = attempt.session.process_keystroke(c)?;
        debug!(session = %id, ?c, error = result.error, cursor = result.cursor, "keystroke");

        if !result.complete {
            return Ok(KeystrokeOutcome {
                result,
                metrics: None,
                recorded: false,
            });
        }

        let metrics = attempt.session.metrics();
        info!(
            session = %id,
            wpm = metrics.wpm,
            accuracy = metrics.accuracy,
            elapsed = metrics.elapsed,
            "session complete"
        );
        let recorded = self.record(id, &mut attempt, &metrics);

        Ok(KeystrokeOutcome {
            result,
            metrics: Some(metrics),
            recorded,
        })
    }

    /// Retry handing a completed session to the profile store.
    ///
    /// Returns `Ok(true)` once the session is recorded; a session that was
    /// already recorded is not recorded again.
    pub fn record_pending(&self, id: &SessionId) -> Result<bool> {
        let handle = self.handle(id)?;
        let mut attempt = lock_session(&handle);

        if attempt.recorded || !attempt.session.is_complete() {
            return Ok(attempt.recorded);
        }

        let metrics = attempt.session.metrics();
        Ok(self.record(id, &mut attempt, &metrics))
    }

    pub fn metrics(&self, id: &SessionId) -> Result<Metrics> {
        self.with_session(id, TypingSession::metrics)
    }

    /// Read a live session under its lock
    pub fn with_session<R>(&self, id: &SessionId, f: impl FnOnce(&TypingSession) -> R) -> Result<R> {
        let handle = self.handle(id)?;
        let attempt = lock_session(&handle);
        Ok(f(&attempt.session))
    }

    /// Drop a session without recording it
    pub fn abandon(&self, id: &SessionId) -> bool {
        let removed = self.sessions.remove(id).is_some();
        if removed {
            debug!(session = %id, "session abandoned");
        }
        removed
    }

    pub fn purge_expired(&self) -> usize {
        self.sessions.purge_expired()
    }

    fn handle(&self, id: &SessionId) -> Result<crate::store::SessionHandle> {
        self.sessions
            .get(id)
            .ok_or_else(|| TrainerError::SessionNotFound(id.clone()))
    }

    /// Hand a completed attempt to the profile store. On success the session
    /// leaves the store; on failure it stays so the caller can retry.
    fn record(&self, id: &SessionId, attempt: &mut Attempt, metrics: &Metrics) -> bool {
        if attempt.recorded {
            return true;
        }
        if attempt.exercise.is_sentinel() {
            debug!(session = %id, exercise = %attempt.exercise.id, "not recording sentinel session");
            return false;
        }

        match self.profiles.record_session(
            attempt.session.owner_id(),
            &attempt.exercise.id,
            metrics.wpm,
            metrics.accuracy,
            metrics.elapsed,
        ) {
            Ok(_) => {
                attempt.recorded = true;
                self.sessions.remove(id);
                info!(session = %id, exercise = %attempt.exercise.id, "session recorded");
                true
            }
            Err(e) => {
                warn!(session = %id, error = %e, "failed to record session, keeping it for retry");
                false
            }
        }
    }
}
