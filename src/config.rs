use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::app_dirs::AppDirs;
use crate::store::DEFAULT_SESSION_TTL;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub owner_id: String,
    /// Restrict random picks to one level
    pub level: Option<String>,
    /// Always practice this exercise (requires `level`)
    pub exercise_id: Option<String>,
    pub catalog_path: Option<PathBuf>,
    pub database_path: Option<PathBuf>,
    pub session_ttl_secs: u64,
    pub recent_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            owner_id: default_owner(),
            level: None,
            exercise_id: None,
            catalog_path: None,
            database_path: None,
            session_ttl_secs: DEFAULT_SESSION_TTL.as_secs(),
            recent_limit: 10,
        }
    }
}

fn default_owner() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "local".to_string())
}

impl Config {
    pub fn resolved_catalog_path(&self) -> PathBuf {
        self.catalog_path
            .clone()
            .or_else(AppDirs::catalog_path)
            .unwrap_or_else(|| PathBuf::from("kasongo_exercises.json"))
    }

    pub fn resolved_database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .or_else(AppDirs::db_path)
            .unwrap_or_else(|| PathBuf::from("kasongo_profiles.db"))
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new() -> Self {
        let path = AppDirs::config_path().unwrap_or_else(|| PathBuf::from("kasongo_config.json"));
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        let Ok(bytes) = fs::read(&self.path) else {
            return Config::default();
        };
        match serde_json::from_slice::<Config>(&bytes) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ignoring malformed config");
                Config::default()
            }
        }
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg)?;
        fs::write(&self.path, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn roundtrip_default_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let store = FileConfigStore::with_path(&path);
        let cfg = Config::default();
        store.save(&cfg).unwrap();
        let loaded = store.load();
        assert_eq!(cfg, loaded);
    }

    #[test]
    fn save_and_load_custom_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let store = FileConfigStore::with_path(&path);
        let cfg = Config {
            owner_id: "ada".into(),
            level: Some("advanced".into()),
            exercise_id: Some("a2".into()),
            catalog_path: Some(dir.path().join("exercises.json")),
            database_path: Some(dir.path().join("profiles.db")),
            session_ttl_secs: 120,
            recent_limit: 5,
        };
        store.save(&cfg).unwrap();
        let loaded = store.load();
        assert_eq!(cfg, loaded);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, br#"{"owner_id": "ada"}"#).unwrap();

        let loaded = FileConfigStore::with_path(&path).load();
        assert_eq!(loaded.owner_id, "ada");
        assert_eq!(loaded.recent_limit, 10);
        assert_eq!(loaded.session_ttl_secs, DEFAULT_SESSION_TTL.as_secs());
    }

    #[test]
    fn malformed_file_loads_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, b"not json").unwrap();

        let loaded = FileConfigStore::with_path(&path).load();
        assert_eq!(loaded.recent_limit, Config::default().recent_limit);
    }

    #[test]
    fn explicit_paths_win_over_app_dirs() {
        let cfg = Config {
            catalog_path: Some(PathBuf::from("/tmp/c.json")),
            database_path: Some(PathBuf::from("/tmp/p.db")),
            ..Config::default()
        };
        assert_eq!(cfg.resolved_catalog_path(), PathBuf::from("/tmp/c.json"));
        assert_eq!(cfg.resolved_database_path(), PathBuf::from("/tmp/p.db"));
    }
}
