use std::fmt;
use std::fs;
use std::path::Path;

use include_dir::{include_dir, Dir};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::{info, warn};

static DATA_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/src/data");
const DEFAULT_CATALOG: &str = "exercises.json";

pub const NOT_FOUND_ID: &str = "not_found";
pub const EMPTY_ID: &str = "empty";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exercise {
    pub id: String,
    pub title: String,
    pub text: String,
}

impl Exercise {
    pub fn new(id: impl Into<String>, title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            text: text.into(),
        }
    }

    /// Placeholder returned when a (level, id) lookup misses
    pub fn not_found() -> Self {
        Self::new(NOT_FOUND_ID, "Exercise Not Found", "")
    }

    /// Placeholder returned when the catalog has nothing to offer
    pub fn empty() -> Self {
        Self::new(EMPTY_ID, "No Exercises Available", "")
    }

    pub fn is_sentinel(&self) -> bool {
        self.id == NOT_FOUND_ID || self.id == EMPTY_ID
    }
}

/// Levels in the order they appear in the catalog file
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Levels(pub Vec<(String, Vec<Exercise>)>);

impl Serialize for Levels {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, exercises) in &self.0 {
            map.serialize_entry(name, exercises)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Levels {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct LevelsVisitor;

        impl<'de> Visitor<'de> for LevelsVisitor {
            type Value = Levels;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of level names to exercise lists")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Levels, A::Error> {
                let mut levels = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((name, exercises)) =
                    access.next_entry::<String, Vec<Exercise>>()?
                {
                    levels.push((name, exercises));
                }
                Ok(Levels(levels))
            }
        }

        deserializer.deserialize_map(LevelsVisitor)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExerciseCatalog {
    pub levels: Levels,
}

/// Practice texts grouped by difficulty level.
///
/// Lookups never fail: misses come back as sentinel exercises so callers can
/// display them like any other result.
#[derive(Clone, Debug, Default)]
pub struct ExerciseManager {
    catalog: ExerciseCatalog,
}

impl ExerciseManager {
    pub fn new(catalog: ExerciseCatalog) -> Self {
        Self { catalog }
    }

    /// The catalog shipped with the binary
    pub fn builtin() -> Self {
        let catalog = DATA_DIR
            .get_file(DEFAULT_CATALOG)
            .and_then(|file| file.contents_utf8())
            .and_then(|json| serde_json::from_str(json).ok())
            .unwrap_or_default();
        Self { catalog }
    }

    /// Load a catalog file, seeding it with the built-in catalog if missing.
    ///
    /// An unreadable or malformed file yields an empty catalog.
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            let manager = Self::builtin();
            if let Err(e) = manager.save(path) {
                warn!(path = %path.display(), error = %e, "could not seed exercise catalog");
            } else {
                info!(path = %path.display(), "seeded default exercise catalog");
            }
            return manager;
        }

        let catalog = fs::read(path)
            .map_err(|e| e.to_string())
            .and_then(|bytes| {
                serde_json::from_slice::<ExerciseCatalog>(&bytes).map_err(|e| e.to_string())
            });

        match catalog {
            Ok(catalog) => Self { catalog },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "exercise catalog unreadable, using empty catalog");
                Self::default()
            }
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(&self.catalog)?;
        fs::write(path, data)
    }

    pub fn catalog(&self) -> &ExerciseCatalog {
        &self.catalog
    }

    pub fn levels(&self) -> impl Iterator<Item = &str> {
        self.catalog.levels.0.iter().map(|(name, _)| name.as_str())
    }

    pub fn exercises_by_level(&self, level: &str) -> &[Exercise] {
        self.catalog
            .levels
            .0
            .iter()
            .find(|(name, _)| name == level)
            .map(|(_, exercises)| exercises.as_slice())
            .unwrap_or(&[])
    }

    pub fn get_exercise(&self, level: &str, id: &str) -> Exercise {
        self.exercises_by_level(level)
            .iter()
            .find(|exercise| exercise.id == id)
            .cloned()
            .unwrap_or_else(Exercise::not_found)
    }

    /// Find which level an exercise id belongs to
    pub fn level_of(&self, id: &str) -> Option<&str> {
        self.catalog
            .levels
            .0
            .iter()
            .find(|(_, exercises)| exercises.iter().any(|e| e.id == id))
            .map(|(name, _)| name.as_str())
    }

    pub fn random_exercise(&self) -> Exercise {
        self.random_exercise_with(&mut rand::thread_rng())
    }

    /// Uniform pick across every level combined
    pub fn random_exercise_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Exercise {
        let all: Vec<&Exercise> = self
            .catalog
            .levels
            .0
            .iter()
            .flat_map(|(_, exercises)| exercises.iter())
            .collect();

        all.choose(rng)
            .map(|exercise| (*exercise).clone())
            .unwrap_or_else(Exercise::empty)
    }

    /// Uniform pick within one level, `empty` sentinel if the level has none
    pub fn random_in_level_with<R: Rng + ?Sized>(&self, level: &str, rng: &mut R) -> Exercise {
        self.exercises_by_level(level)
            .choose(rng)
            .cloned()
            .unwrap_or_else(Exercise::empty)
    }
}
