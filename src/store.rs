use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::exercise::Exercise;
use crate::session::TypingSession;

/// Sessions idle for longer than this are dropped
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(30 * 60);

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A live session together with the exercise it was built from
#[derive(Debug)]
pub struct Attempt {
    pub session: TypingSession,
    pub exercise: Exercise,
    pub level: Option<String>,
    /// Set once the result has been handed to the profile store
    pub recorded: bool,
}

impl Attempt {
    pub fn new(session: TypingSession, exercise: Exercise, level: Option<String>) -> Self {
        Self {
            session,
            exercise,
            level,
            recorded: false,
        }
    }
}

/// Shared handle to a live attempt; the mutex serializes keystrokes per session
pub type SessionHandle = Arc<Mutex<Attempt>>;

/// Lock a session handle, recovering the attempt if a holder panicked
pub fn lock_session(handle: &SessionHandle) -> MutexGuard<'_, Attempt> {
    handle.lock().unwrap_or_else(|e| e.into_inner())
}

/// Live typing sessions keyed by id.
///
/// Owns the expiry policy: entries not touched within the store's TTL are
/// treated as abandoned.
pub trait SessionStore: Send + Sync {
    fn insert(&self, attempt: Attempt) -> SessionId;
    /// Look up a session and refresh its idle timer
    fn get(&self, id: &SessionId) -> Option<SessionHandle>;
    fn remove(&self, id: &SessionId) -> Option<SessionHandle>;
    /// Drop every expired session, returning how many went
    fn purge_expired(&self) -> usize;
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct Entry {
    handle: SessionHandle,
    last_access: SystemTime,
}

pub struct InMemorySessionStore {
    entries: Mutex<HashMap<SessionId, Entry>>,
    next_id: AtomicU64,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl InMemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            ttl,
            clock,
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<SessionId, Entry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn is_expired(&self, entry: &Entry, now: SystemTime) -> bool {
        now.duration_since(entry.last_access).unwrap_or_default() > self.ttl
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_TTL)
    }
}

impl fmt::Debug for InMemorySessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemorySessionStore")
            .field("sessions", &self.len())
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl SessionStore for InMemorySessionStore {
    fn insert(&self, attempt: Attempt) -> SessionId {
        let seq = self.next_id.fetch_add(1, Ordering::Relaxed);
        let id = SessionId(format!("{}-{seq}", attempt.session.owner_id()));

        let entry = Entry {
            handle: Arc::new(Mutex::new(attempt)),
            last_access: self.clock.now(),
        };
        self.entries().insert(id.clone(), entry);
        debug!(session = %id, "session stored");
        id
    }

    fn get(&self, id: &SessionId) -> Option<SessionHandle> {
        let now = self.clock.now();
        let mut entries = self.entries();

        let expired = match entries.get(id) {
            Some(entry) => self.is_expired(entry, now),
            None => return None,
        };
        if expired {
            entries.remove(id);
            debug!(session = %id, "session expired on lookup");
            return None;
        }

        entries.get_mut(id).map(|entry| {
            entry.last_access = now;
            Arc::clone(&entry.handle)
        })
    }

    fn remove(&self, id: &SessionId) -> Option<SessionHandle> {
        self.entries().remove(id).map(|entry| entry.handle)
    }

    fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, entry| !self.is_expired(entry, now));
        let purged = before - entries.len();
        if purged > 0 {
            debug!(purged, "expired sessions purged");
        }
        purged
    }

    fn len(&self) -> usize {
        self.entries().len()
    }
}
