use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};
use sqlsync::commands::{execute_generate_at, execute_status, GenerateResult, StatusResult};
use sqlsync::config::SqlsyncConfig;
use sqlsync::output::LibraryOutputHandler;
use sqlsync::state::{StateFile, StateStore};
use tempfile::TempDir;

/// Project tree in a temporary directory with a single `sql` section
pub struct TestProject {
    pub temp_dir: TempDir,
    pub config: SqlsyncConfig,
    pub output: LibraryOutputHandler,
    generations: u32,
}

impl TestProject {
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let temp_dir = TempDir::new()?;
        fs::create_dir_all(temp_dir.path().join("sql"))?;

        Ok(Self {
            temp_dir,
            config: SqlsyncConfig::default(),
            output: LibraryOutputHandler::new(),
            generations: 0,
        })
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn migrations_dir(&self) -> PathBuf {
        self.root().join(self.config.migrations_dir())
    }

    /// Write a source file under `sql/`
    pub fn write_sql_file(&self, name: &str, content: &str) -> Result<(), Box<dyn std::error::Error>> {
        let path = self.root().join("sql").join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    pub fn remove_sql_file(&self, name: &str) -> Result<(), Box<dyn std::error::Error>> {
        fs::remove_file(self.root().join("sql").join(name))?;
        Ok(())
    }

    /// Run `generate`, one simulated minute after the previous run
    pub fn generate(&mut self, name: &str) -> sqlsync::Result<GenerateResult> {
        self.generations += 1;
        let created_at = self.created_at(self.generations);
        execute_generate_at(self.root(), &self.config, name, created_at, &self.output)
    }

    pub fn status(&self) -> sqlsync::Result<StatusResult> {
        execute_status(self.root(), &self.config, &self.output)
    }

    pub fn state(&self) -> sqlsync::Result<StateFile> {
        StateStore::new(self.root().join(self.config.state_file())).load()
    }

    /// Names of migration files written so far, sorted
    pub fn migration_files(&self) -> Result<Vec<String>, Box<dyn std::error::Error>> {
        let dir = self.migrations_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut names = fs::read_dir(dir)?
            .map(|entry| entry.map(|e| e.file_name().to_string_lossy().to_string()))
            .collect::<Result<Vec<_>, _>>()?;
        names.sort();
        Ok(names)
    }

    pub fn created_at(&self, generation: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, generation, 0).unwrap()
    }
}

pub mod assertions;
pub mod fixtures;
