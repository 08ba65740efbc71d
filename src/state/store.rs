use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, SqlsyncError};
use crate::state::snapshot::{MigrationState, Snapshot};

const STATE_VERSION: u32 = 1;

/// Everything persisted between runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateFile {
    pub version: u32,
    pub snapshot: Snapshot,
    #[serde(default)]
    pub history: Vec<MigrationState>,
}

impl Default for StateFile {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            snapshot: Snapshot::default(),
            history: Vec::new(),
        }
    }
}

/// JSON persistence of the snapshot and migration history
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the state file; a missing file is an empty state
    pub fn load(&self) -> Result<StateFile> {
        if !self.path.exists() {
            debug!("No state file at {}, starting empty", self.path.display());
            return Ok(StateFile::default());
        }

        let content = fs::read_to_string(&self.path).map_err(|e| SqlsyncError::StateLoad {
            path: self.path.clone(),
            message: e.to_string(),
        })?;
        let state: StateFile = serde_json::from_str(&content).map_err(|e| SqlsyncError::StateLoad {
            path: self.path.clone(),
            message: e.to_string(),
        })?;

        if state.version != STATE_VERSION {
            return Err(SqlsyncError::StateLoad {
                path: self.path.clone(),
                message: format!("unsupported state version {}", state.version),
            });
        }

        debug!(
            tracked = state.snapshot.len(),
            migrations = state.history.len(),
            "Loaded state from {}",
            self.path.display()
        );
        Ok(state)
    }

    /// Write the state file, replacing the previous one in a single rename
    pub fn save(&self, state: &StateFile) -> Result<()> {
        let save_error = |message: String| SqlsyncError::StateSave {
            path: self.path.clone(),
            message,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| save_error(e.to_string()))?;
        }

        let json = serde_json::to_string_pretty(state).map_err(|e| save_error(e.to_string()))?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, json).map_err(|e| save_error(e.to_string()))?;
        fs::rename(&tmp_path, &self.path).map_err(|e| save_error(e.to_string()))?;

        info!("Saved state to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::process_file;
    use tempfile::tempdir;

    #[test]
    fn test_missing_state_is_empty() {
        let dir = tempdir().unwrap();
        let store = StateStore::new(dir.path().join(".sqlsync/state.json"));
        let state = store.load().unwrap();
        assert!(state.snapshot.is_empty());
        assert!(state.history.is_empty());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let store = StateStore::new(dir.path().join(".sqlsync/state.json"));

        let files = vec![
            process_file("views/v.sql", "CREATE VIEW v AS SELECT 1;"),
            process_file(
                "tables/users.sql",
                "-- sqlsync: declarativeTable=true\nCREATE TABLE users (id serial PRIMARY KEY, email text);",
            ),
        ];
        let state = StateFile {
            snapshot: Snapshot::new().advance(&files),
            ..StateFile::default()
        };

        store.save(&state).unwrap();
        assert!(store.path().exists());
        assert_eq!(store.load().unwrap(), state);
    }

    #[test]
    fn test_corrupt_state_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{ not json").unwrap();

        let err = StateStore::new(&path).load().unwrap_err();
        assert!(matches!(err, SqlsyncError::StateLoad { .. }));
    }
}
