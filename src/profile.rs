use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Local};
use itertools::Itertools;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::app_dirs::AppDirs;
use crate::error::ProfileError;
use crate::time_series::{ProgressData, ProgressPoint};
use crate::util::{mean, round_to};

pub type Result<T> = std::result::Result<T, ProfileError>;

/// A completed typing session as stored in a profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub timestamp: DateTime<Local>,
    pub exercise_id: String,
    pub wpm: f64,
    pub accuracy: f64,
    pub time_elapsed: f64,
}

/// Running aggregates over every recorded session of one owner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileStats {
    pub best_wpm: f64,
    pub average_wpm: f64,
    pub total_time: f64,
    pub exercises_completed: usize,
    pub accuracy: f64,
}

impl Default for ProfileStats {
    fn default() -> Self {
        Self {
            best_wpm: 0.0,
            average_wpm: 0.0,
            total_time: 0.0,
            exercises_completed: 0,
            accuracy: 100.0,
        }
    }
}

impl ProfileStats {
    pub fn from_sessions(sessions: &[SessionRecord]) -> Self {
        if sessions.is_empty() {
            return Self::default();
        }

        let wpms: Vec<f64> = sessions.iter().map(|s| s.wpm).collect();
        let accuracies: Vec<f64> = sessions.iter().map(|s| s.accuracy).collect();

        Self {
            best_wpm: wpms.iter().copied().fold(0.0, f64::max),
            average_wpm: mean(&wpms).map_or(0.0, |m| round_to(m, 2)),
            total_time: sessions.iter().map(|s| s.time_elapsed).sum(),
            exercises_completed: sessions.len(),
            accuracy: mean(&accuracies).map_or(100.0, |m| round_to(m, 2)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProfileSummary {
    pub owner_id: String,
    pub created_at: DateTime<Local>,
    pub last_active: DateTime<Local>,
    pub stats: ProfileStats,
}

/// Per-owner performance history.
///
/// Implementations only need to append and list sessions; aggregates and chart
/// data are derived from the session list unless an implementation can do
/// better.
pub trait ProfileStore {
    fn record_session(
        &self,
        owner_id: &str,
        exercise_id: &str,
        wpm: f64,
        accuracy: f64,
        time_elapsed: f64,
    ) -> Result<SessionRecord>;

    /// All sessions of an owner, oldest first
    fn sessions(&self, owner_id: &str) -> Result<Vec<SessionRecord>>;

    /// Creation and last-activity times, `None` for an owner never seen
    fn summary(&self, owner_id: &str) -> Result<Option<ProfileSummary>>;

    fn stats(&self, owner_id: &str) -> Result<ProfileStats> {
        Ok(ProfileStats::from_sessions(&self.sessions(owner_id)?))
    }

    /// Most recent sessions first
    fn recent_sessions(&self, owner_id: &str, limit: usize) -> Result<Vec<SessionRecord>> {
        Ok(self
            .sessions(owner_id)?
            .into_iter()
            .rev()
            .sorted_by(|a, b| b.timestamp.cmp(&a.timestamp))
            .take(limit)
            .collect())
    }

    fn progress(&self, owner_id: &str) -> Result<ProgressData> {
        let sessions = self
            .sessions(owner_id)?
            .into_iter()
            .sorted_by_key(|s| s.timestamp)
            .collect::<Vec<_>>();

        let point = |s: &SessionRecord, value: f64| {
            ProgressPoint::new(s.timestamp.timestamp_millis() as f64, value)
        };

        Ok(ProgressData {
            wpm: sessions.iter().map(|s| point(s, s.wpm)).collect(),
            accuracy: sessions.iter().map(|s| point(s, s.accuracy)).collect(),
        })
    }

    /// Write the owner's session history as CSV, oldest first
    fn export_csv(&self, owner_id: &str, path: &Path) -> Result<usize> {
        let sessions = self.sessions(owner_id)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut writer = csv::Writer::from_path(path)?;
        for session in &sessions {
            writer.serialize(session)?;
        }
        writer.flush()?;
        Ok(sessions.len())
    }
}

/// SQLite-backed profile store
#[derive(Debug)]
pub struct SqliteProfileStore {
    conn: Connection,
}

impl SqliteProfileStore {
    /// Open the store at the default state location
    pub fn open_default() -> Result<Self> {
        let path = AppDirs::db_path().unwrap_or_else(|| PathBuf::from("kasongo_profiles.db"));
        Self::open(path)
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?)
    }

    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS profiles (
                owner_id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL,
                last_active TEXT NOT NULL
            )
            "#,
            [],
        )?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                owner_id TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                exercise_id TEXT NOT NULL,
                wpm REAL NOT NULL,
                accuracy REAL NOT NULL,
                time_elapsed REAL NOT NULL
            )
            "#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_sessions_owner ON sessions(owner_id)",
            [],
        )?;

        Ok(Self { conn })
    }
}

fn parse_timestamp(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Local>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Local))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e)))
}

impl ProfileStore for SqliteProfileStore {
    fn record_session(
        &self,
        owner_id: &str,
        exercise_id: &str,
        wpm: f64,
        accuracy: f64,
        time_elapsed: f64,
    ) -> Result<SessionRecord> {
        let record = SessionRecord {
            timestamp: Local::now(),
            exercise_id: exercise_id.to_string(),
            wpm,
            accuracy,
            time_elapsed,
        };
        let stamp = record.timestamp.to_rfc3339();

        // profile activity and the session row land together or not at all
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            r#"
            INSERT INTO profiles (owner_id, created_at, last_active) VALUES (?1, ?2, ?2)
            ON CONFLICT(owner_id) DO UPDATE SET last_active = excluded.last_active
            "#,
            params![owner_id, stamp],
        )?;

        tx.execute(
            r#"
            INSERT INTO sessions (owner_id, timestamp, exercise_id, wpm, accuracy, time_elapsed)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![owner_id, stamp, exercise_id, wpm, accuracy, time_elapsed],
        )?;
        tx.commit()?;

        Ok(record)
    }

    fn sessions(&self, owner_id: &str) -> Result<Vec<SessionRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT timestamp, exercise_id, wpm, accuracy, time_elapsed
            FROM sessions
            WHERE owner_id = ?1
            ORDER BY id ASC
            "#,
        )?;

        let rows = stmt.query_map([owner_id], |row| {
            let raw: String = row.get(0)?;
            Ok(SessionRecord {
                timestamp: parse_timestamp(0, &raw)?,
                exercise_id: row.get(1)?,
                wpm: row.get(2)?,
                accuracy: row.get(3)?,
                time_elapsed: row.get(4)?,
            })
        })?;

        let mut sessions = Vec::new();
        for session in rows {
            sessions.push(session?);
        }
        Ok(sessions)
    }

    fn summary(&self, owner_id: &str) -> Result<Option<ProfileSummary>> {
        let times = self
            .conn
            .query_row(
                "SELECT created_at, last_active FROM profiles WHERE owner_id = ?1",
                [owner_id],
                |row| {
                    let created: String = row.get(0)?;
                    let active: String = row.get(1)?;
                    Ok((parse_timestamp(0, &created)?, parse_timestamp(1, &active)?))
                },
            )
            .optional()?;

        match times {
            Some((created_at, last_active)) => Ok(Some(ProfileSummary {
                owner_id: owner_id.to_string(),
                created_at,
                last_active,
                stats: self.stats(owner_id)?,
            })),
            None => Ok(None),
        }
    }

    fn stats(&self, owner_id: &str) -> Result<ProfileStats> {
        let (count, best, avg_wpm, total, avg_acc): (i64, Option<f64>, Option<f64>, Option<f64>, Option<f64>) =
            self.conn.query_row(
                r#"
                SELECT COUNT(*), MAX(wpm), AVG(wpm), SUM(time_elapsed), AVG(accuracy)
                FROM sessions
                WHERE owner_id = ?1
                "#,
                [owner_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
            )?;

        if count == 0 {
            return Ok(ProfileStats::default());
        }

        Ok(ProfileStats {
            best_wpm: best.unwrap_or(0.0).max(0.0),
            average_wpm: round_to(avg_wpm.unwrap_or(0.0), 2),
            total_time: total.unwrap_or(0.0),
            exercises_completed: count as usize,
            accuracy: round_to(avg_acc.unwrap_or(100.0), 2),
        })
    }

    fn recent_sessions(&self, owner_id: &str, limit: usize) -> Result<Vec<SessionRecord>> {
        let mut sessions = self.sessions(owner_id)?;
        sessions.reverse();
        sessions.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        sessions.truncate(limit);
        Ok(sessions)
    }
}

#[derive(Debug, Clone)]
struct MemoryProfile {
    created_at: DateTime<Local>,
    last_active: DateTime<Local>,
    sessions: Vec<SessionRecord>,
}

/// Volatile profile store, mainly for tests and throwaway runs
#[derive(Debug, Default)]
pub struct MemoryProfileStore {
    profiles: Mutex<HashMap<String, MemoryProfile>>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProfileStore for MemoryProfileStore {
    fn record_session(
        &self,
        owner_id: &str,
        exercise_id: &str,
        wpm: f64,
        accuracy: f64,
        time_elapsed: f64,
    ) -> Result<SessionRecord> {
        let now = Local::now();
        let record = SessionRecord {
            timestamp: now,
            exercise_id: exercise_id.to_string(),
            wpm,
            accuracy,
            time_elapsed,
        };

        let mut profiles = self.profiles.lock().unwrap_or_else(|e| e.into_inner());
        let profile = profiles
            .entry(owner_id.to_string())
            .or_insert_with(|| MemoryProfile {
                created_at: now,
                last_active: now,
                sessions: Vec::new(),
            });
        profile.last_active = now;
        profile.sessions.push(record.clone());

        Ok(record)
    }

    fn sessions(&self, owner_id: &str) -> Result<Vec<SessionRecord>> {
        let profiles = self.profiles.lock().unwrap_or_else(|e| e.into_inner());
        Ok(profiles
            .get(owner_id)
            .map(|p| p.sessions.clone())
            .unwrap_or_default())
    }

    fn summary(&self, owner_id: &str) -> Result<Option<ProfileSummary>> {
        let profiles = self.profiles.lock().unwrap_or_else(|e| e.into_inner());
        Ok(profiles.get(owner_id).map(|p| ProfileSummary {
            owner_id: owner_id.to_string(),
            created_at: p.created_at,
            last_active: p.last_active,
            stats: ProfileStats::from_sessions(&p.sessions),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn fill(store: &dyn ProfileStore) {
        store.record_session("ada", "b1", 40.0, 90.0, 30.0).unwrap();
        store.record_session("ada", "b2", 50.0, 95.0, 20.5).unwrap();
        store.record_session("ada", "i1", 35.0, 100.0, 45.0).unwrap();
        store.record_session("bob", "a1", 80.0, 99.0, 10.0).unwrap();
    }

    fn check_aggregates(store: &dyn ProfileStore) {
        let stats = store.stats("ada").unwrap();
        assert_eq!(stats.best_wpm, 50.0);
        assert_eq!(stats.average_wpm, 41.67);
        assert_eq!(stats.total_time, 95.5);
        assert_eq!(stats.exercises_completed, 3);
        assert_eq!(stats.accuracy, 95.0);
    }

    #[test]
    fn test_stats_default_for_unknown_owner() {
        let store = MemoryProfileStore::new();
        assert_eq!(store.stats("nobody").unwrap(), ProfileStats::default());
        assert!(store.summary("nobody").unwrap().is_none());

        let sqlite = SqliteProfileStore::in_memory().unwrap();
        assert_eq!(sqlite.stats("nobody").unwrap(), ProfileStats::default());
        assert!(sqlite.summary("nobody").unwrap().is_none());
    }

    #[test]
    fn test_memory_store_aggregates() {
        let store = MemoryProfileStore::new();
        fill(&store);
        check_aggregates(&store);
    }

    #[test]
    fn test_sqlite_store_aggregates() {
        let store = SqliteProfileStore::in_memory().unwrap();
        fill(&store);
        check_aggregates(&store);
        assert_eq!(store.stats("bob").unwrap().exercises_completed, 1);
    }

    #[test]
    fn test_recent_sessions_newest_first() {
        let store = SqliteProfileStore::in_memory().unwrap();
        fill(&store);

        let recent = store.recent_sessions("ada", 2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].exercise_id, "i1");
        assert_eq!(recent[1].exercise_id, "b2");

        let memory = MemoryProfileStore::new();
        fill(&memory);
        let recent = memory.recent_sessions("ada", 10).unwrap();
        let ids: Vec<&str> = recent.iter().map(|s| s.exercise_id.as_str()).collect();
        assert_eq!(ids, vec!["i1", "b2", "b1"]);
    }

    #[test]
    fn test_progress_oldest_first() {
        let store = MemoryProfileStore::new();
        fill(&store);

        let progress = store.progress("ada").unwrap();
        let wpm: Vec<f64> = progress.wpm.iter().map(|p| p.value).collect();
        assert_eq!(wpm, vec![40.0, 50.0, 35.0]);
        assert_eq!(progress.accuracy.len(), 3);
        assert!(progress.wpm.windows(2).all(|w| w[0].t <= w[1].t));
    }

    #[test]
    fn test_summary_tracks_activity() {
        let store = SqliteProfileStore::in_memory().unwrap();
        fill(&store);

        let summary = store.summary("ada").unwrap().unwrap();
        assert!(summary.created_at <= summary.last_active);
        assert_eq!(summary.stats.exercises_completed, 3);
    }

    #[test]
    fn test_sqlite_store_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state").join("profiles.db");

        {
            let store = SqliteProfileStore::open(&path).unwrap();
            store.record_session("ada", "b1", 42.0, 97.5, 12.0).unwrap();
        }

        let store = SqliteProfileStore::open(&path).unwrap();
        let sessions = store.sessions("ada").unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].wpm, 42.0);
        assert_eq!(sessions[0].accuracy, 97.5);
    }

    #[test]
    fn test_export_csv() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.csv");
        let store = MemoryProfileStore::new();
        fill(&store);

        let written = store.export_csv("ada", &path).unwrap();
        assert_eq!(written, 3);

        let contents = std::fs::read_to_string(&path).unwrap();
        let mut lines = contents.lines();
        assert_eq!(
            lines.next(),
            Some("timestamp,exercise_id,wpm,accuracy,time_elapsed")
        );
        assert_eq!(lines.count(), 3);
    }

    #[test]
    fn test_failed_record_leaves_profile_untouched() {
        let store = SqliteProfileStore::in_memory().unwrap();
        store.conn.execute("DROP TABLE sessions", []).unwrap();

        assert!(store.record_session("ada", "b1", 40.0, 90.0, 30.0).is_err());
        assert!(store.summary("ada").unwrap().is_none());
    }
}
