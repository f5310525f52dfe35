//! Durable storage for the full application state.
//!
//! The store only ever sees complete snapshots: `save` replaces whatever was
//! there before, so an interrupted write can lose the latest change but never
//! corrupt older state. A state file that cannot be parsed is renamed to
//! `<name>.corrupt-<timestamp>` on load, never overwritten.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use tracing::{debug, error, instrument, warn};

use crate::domain::AppData;
use crate::error::StoreError;

pub trait Store: Send + Sync {
    /// Returns `None` on first run.
    fn load(&self) -> Result<Option<AppData>, StoreError>;
    fn save(&self, data: &AppData) -> Result<(), StoreError>;
}

/// Pretty-printed JSON file, replaced atomically through a sibling temp file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path from PASSPORT_STATE_PATH, defaulting to `./passport_state.json`.
    pub fn from_env() -> Self {
        let path = std::env::var("PASSPORT_STATE_PATH").unwrap_or_else(|_| "passport_state.json".into());
        Self::new(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(suffix);
        self.path.with_file_name(name)
    }

    fn temp_path(&self) -> PathBuf {
        self.sibling(".tmp")
    }

    /// Move an unreadable state file aside so the next save cannot replace it.
    fn quarantine(&self) -> Option<PathBuf> {
        let aside = self.sibling(&format!(".corrupt-{}", Utc::now().format("%Y%m%dT%H%M%S%.3fZ")));
        match fs::rename(&self.path, &aside) {
            Ok(()) => {
                warn!(target: "progress", from = %self.path.display(), to = %aside.display(), "Unreadable state file moved aside");
                Some(aside)
            }
            Err(e) => {
                error!(target: "progress", path = %self.path.display(), error = %e, "Could not move unreadable state file aside");
                None
            }
        }
    }
}

impl Store for JsonFileStore {
    #[instrument(level = "debug", skip(self), fields(path = %self.path.display()))]
    fn load(&self) -> Result<Option<AppData>, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            // Not UTF-8: the file is damaged, not merely unreachable.
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                self.quarantine();
                return Err(e.into());
            }
            Err(e) => return Err(e.into()),
        };
        let data = match serde_json::from_str::<AppData>(&raw) {
            Ok(data) => data,
            Err(e) => {
                self.quarantine();
                return Err(e.into());
            }
        };
        debug!(target: "progress", questions = data.questions.len(), history = data.exam_history.len(), "State file loaded");
        Ok(Some(data))
    }

    #[instrument(level = "debug", skip(self, data), fields(path = %self.path.display()))]
    fn save(&self, data: &AppData) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(data)?;
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let tmp = self.temp_path();
        fs::write(&tmp, &json)?;
        fs::rename(&tmp, &self.path)?;
        debug!(target: "progress", bytes = json.len(), "State file written");
        Ok(())
    }
}

/// In-memory store for tests and ephemeral runs (`PASSPORT_STATE_PATH=:memory:`).
/// Counts successful saves.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    data: Option<AppData>,
    saves: usize,
    fail_saves: bool,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    #[must_use]
    pub fn with_data(data: AppData) -> Self {
        Self { inner: Mutex::new(MemoryInner { data: Some(data), ..MemoryInner::default() }) }
    }

    /// Make every subsequent `save` fail.
    #[cfg(test)]
    pub fn set_fail_saves(&self, fail: bool) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.fail_saves = fail;
        }
    }

    #[cfg(test)]
    pub fn saves(&self) -> usize {
        self.inner.lock().map(|i| i.saves).unwrap_or(0)
    }

    #[cfg(test)]
    pub fn stored(&self) -> Option<AppData> {
        self.inner.lock().ok().and_then(|i| i.data.clone())
    }
}

impl Store for MemoryStore {
    fn load(&self) -> Result<Option<AppData>, StoreError> {
        let inner = self.inner.lock().map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(inner.data.clone())
    }

    fn save(&self, data: &AppData) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().map_err(|e| StoreError::Unavailable(e.to_string()))?;
        if inner.fail_saves {
            return Err(StoreError::Unavailable("writes disabled".into()));
        }
        inner.data = Some(data.clone());
        inner.saves += 1;
        debug!(target: "progress", saves = inner.saves, "In-memory state replaced");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{sample_question, Difficulty};

    #[test]
    fn missing_file_loads_as_none() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("state.json"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn save_then_load_returns_same_snapshot() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested").join("state.json"));

        let mut data = AppData { difficulty: Difficulty::Hard, ..AppData::default() };
        data.questions.push(sample_question("q1", 2, 3));
        data.wrong_question_ids.insert("q1".into());

        store.save(&data).unwrap();
        assert_eq!(store.load().unwrap(), Some(data.clone()));
        assert!(!store.temp_path().exists());

        data.wrong_question_ids.clear();
        store.save(&data).unwrap();
        assert_eq!(store.load().unwrap(), Some(data));
    }

    /// Files in `dir` named `state.json.corrupt-*`.
    fn corrupt_copies(dir: &Path) -> Vec<PathBuf> {
        fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p.file_name().unwrap().to_string_lossy().starts_with("state.json.corrupt-"))
            .collect()
    }

    #[test]
    fn corrupt_file_is_moved_aside_intact() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{ not json").unwrap();

        let err = JsonFileStore::new(&path).load().unwrap_err();
        assert!(matches!(err, StoreError::Serialization(_)));
        assert!(!path.exists());

        let aside = corrupt_copies(dir.path());
        assert_eq!(aside.len(), 1);
        assert_eq!(fs::read_to_string(&aside[0]).unwrap(), "{ not json");
    }

    #[test]
    fn non_utf8_file_is_moved_aside_intact() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, [0xff, 0xfe, 0x00]).unwrap();

        assert!(matches!(JsonFileStore::new(&path).load(), Err(StoreError::Io(_))));
        let aside = corrupt_copies(dir.path());
        assert_eq!(fs::read(&aside[0]).unwrap(), vec![0xff, 0xfe, 0x00]);
    }

    #[test]
    fn memory_store_counts_and_can_fail() {
        let store = MemoryStore::new();
        store.save(&AppData::default()).unwrap();
        assert_eq!(store.saves(), 1);

        store.set_fail_saves(true);
        assert!(store.save(&AppData::default()).is_err());
        assert_eq!(store.saves(), 1);
    }
}
