use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, SqlsyncError};

pub const CONFIG_FILE: &str = "sqlsync.toml";
pub const SAMPLE_CONFIG_FILE: &str = "sqlsync.toml.example";

const DEFAULT_MIGRATIONS_DIR: &str = "migrations";
const DEFAULT_STATE_FILE: &str = ".sqlsync/state.json";
const DEFAULT_SECTION_PATH: &str = "sql";

/// A named source directory scanned for `.sql` files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub name: String,
    pub path: PathBuf,
}

impl Section {
    /// Section named after the last component of its path
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        Self { name, path }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlsyncConfig {
    /// Directory receiving generated migration files
    pub migrations_dir: Option<PathBuf>,

    /// JSON file holding the snapshot and migration history
    pub state_file: Option<PathBuf>,

    /// Source directories, scanned in order
    #[serde(default)]
    pub sections: Vec<Section>,
}

impl SqlsyncConfig {
    /// Load `sqlsync.toml` from the current directory
    pub fn load_from_file() -> Result<Option<Self>> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    /// Load a config file; a missing file is not an error
    pub fn load_from(config_path: &Path) -> Result<Option<Self>> {
        if !config_path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(config_path).map_err(|e| SqlsyncError::ConfigLoad {
            path: config_path.to_path_buf(),
            message: e.to_string(),
        })?;
        let config: SqlsyncConfig = toml::from_str(&content).map_err(|e| SqlsyncError::ConfigLoad {
            path: config_path.to_path_buf(),
            message: e.to_string(),
        })?;

        config.validate()?;
        Ok(Some(config))
    }

    fn validate(&self) -> Result<()> {
        for (i, section) in self.sections.iter().enumerate() {
            if section.name.trim().is_empty() {
                return Err(SqlsyncError::Configuration(format!("section #{} has an empty name", i + 1)));
            }
            if self.sections[..i].iter().any(|s| s.name == section.name) {
                return Err(SqlsyncError::Configuration(format!(
                    "section '{}' is declared more than once",
                    section.name
                )));
            }
        }
        Ok(())
    }

    /// Merge CLI arguments with config file values.
    /// CLI arguments take precedence; any `--section` replaces the
    /// configured sections.
    pub fn merge_with_cli(
        config_file: Option<Self>,
        cli_migrations_dir: Option<PathBuf>,
        cli_state_file: Option<PathBuf>,
        cli_sections: Vec<PathBuf>,
    ) -> Self {
        let base_config = config_file.unwrap_or_default();

        let sections = if cli_sections.is_empty() {
            base_config.sections
        } else {
            cli_sections.into_iter().map(Section::from_path).collect()
        };

        Self {
            migrations_dir: cli_migrations_dir.or(base_config.migrations_dir),
            state_file: cli_state_file.or(base_config.state_file),
            sections,
        }
    }

    pub fn migrations_dir(&self) -> PathBuf {
        self.migrations_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_MIGRATIONS_DIR))
    }

    pub fn state_file(&self) -> PathBuf {
        self.state_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_FILE))
    }

    /// Configured sections, or a single `sql` section when none are set
    pub fn sections(&self) -> Vec<Section> {
        if self.sections.is_empty() {
            vec![Section::from_path(DEFAULT_SECTION_PATH)]
        } else {
            self.sections.clone()
        }
    }

    /// Write `sqlsync.toml.example` into `dir`
    pub fn write_sample_config(dir: &Path) -> Result<PathBuf> {
        let sample_config = SqlsyncConfig {
            migrations_dir: Some(PathBuf::from(DEFAULT_MIGRATIONS_DIR)),
            state_file: Some(PathBuf::from(DEFAULT_STATE_FILE)),
            sections: vec![
                Section {
                    name: "schema".to_string(),
                    path: PathBuf::from("sql/schema"),
                },
                Section {
                    name: "functions".to_string(),
                    path: PathBuf::from("sql/functions"),
                },
            ],
        };

        let content = toml::to_string_pretty(&sample_config)
            .map_err(|e| SqlsyncError::Configuration(e.to_string()))?;
        let path = dir.join(SAMPLE_CONFIG_FILE);
        fs::write(&path, content).map_err(|e| SqlsyncError::FileWrite {
            path: path.clone(),
            message: e.to_string(),
            source: e,
        })?;

        Ok(path)
    }
}
