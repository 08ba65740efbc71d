use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
#[cfg(feature = "cli")]
use owo_colors::OwoColorize;
use tracing::info;

use crate::analysis::synthesizer::{synthesize_migration, Migration};
use crate::config::SqlsyncConfig;
use crate::error::{Result, SqlsyncError};
use crate::log_migration;
use crate::output::OutputHandler;
use crate::scanner::scan_and_process;
use crate::state::diff::diff_state;
use crate::state::store::StateStore;

#[derive(Debug)]
pub struct GenerateResult {
    pub migration: Migration,
    /// `None` when there was nothing to write
    pub migration_path: Option<PathBuf>,
    pub changes: usize,
}

/// Only alphanumerics, underscores and hyphens
pub fn validate_migration_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(SqlsyncError::InvalidMigrationName("name cannot be empty".to_string()));
    }
    if !name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-') {
        return Err(SqlsyncError::InvalidMigrationName(format!(
            "'{}' may only contain alphanumeric characters, underscores and hyphens",
            name
        )));
    }
    Ok(())
}

pub fn migration_file_name(name: &str, created_at: DateTime<Utc>) -> String {
    format!("{}_{}.sql", created_at.format("%Y%m%d%H%M%S"), name)
}

pub fn execute_generate(
    root: &Path,
    config: &SqlsyncConfig,
    name: &str,
    output: &dyn OutputHandler,
) -> Result<GenerateResult> {
    execute_generate_at(root, config, name, Utc::now(), output)
}

/// Generate a migration stamped with `created_at`.
///
/// An empty migration is not written, but the snapshot is still saved so
/// comment-only edits stop showing up as changes. A migration holding only
/// notes for changes that need hand-written SQL is written all the same.
pub fn execute_generate_at(
    root: &Path,
    config: &SqlsyncConfig,
    name: &str,
    created_at: DateTime<Utc>,
    output: &dyn OutputHandler,
) -> Result<GenerateResult> {
    validate_migration_name(name)?;

    let store = StateStore::new(root.join(config.state_file()));
    let mut state = store.load()?;

    let files = scan_and_process(root, &config.sections())?;
    let diff = diff_state(&files, &state.snapshot, output)?;
    let next = state.snapshot.advance(&files);

    let migration = synthesize_migration(name, created_at, &diff, &next);
    for pending in &migration.pending_confirmations {
        output.warning(&format!(
            "Rename {} -> {} on {} needs confirmation (score {:.2})",
            pending.from, pending.to, pending.table, pending.confidence
        ));
    }

    for path in &migration.manual_review {
        output.warning(&format!("{} changed in a way that needs hand-written SQL; see the NOTE in the migration", path));
    }

    let migration_path = if !migration.should_persist() {
        output.info("No schema changes; no migration written");
        None
    } else {
        let migrations_dir = root.join(config.migrations_dir());
        fs::create_dir_all(&migrations_dir).map_err(|e| SqlsyncError::FileWrite {
            path: migrations_dir.clone(),
            message: e.to_string(),
            source: e,
        })?;

        let path = migrations_dir.join(migration_file_name(name, created_at));
        if path.exists() {
            return Err(SqlsyncError::MigrationExists(path));
        }

        fs::write(&path, &migration.text).map_err(|e| SqlsyncError::FileWrite {
            path: path.clone(),
            message: e.to_string(),
            source: e,
        })?;
        log_migration!(name, "written");
        output.status("Wrote", &path.display().to_string());

        state.history.push(migration.state.clone());
        Some(path)
    };

    state.snapshot = next;
    store.save(&state)?;
    info!(changes = diff.changes.len(), "Snapshot updated");

    Ok(GenerateResult {
        changes: diff.changes.len(),
        migration,
        migration_path,
    })
}

#[cfg(feature = "cli")]
pub fn print_generate_summary(result: &GenerateResult) {
    println!("\n{}", "=== sqlsync Generate Summary ===".bold().blue());

    match &result.migration_path {
        Some(path) => {
            println!("\n{}:", "Migration Created".bold().green());
            println!("  {} {}", "Name:".bold(), result.migration.name.cyan());
            println!("  {} {}", "Path:".bold(), path.display().to_string().dimmed());
            println!("  {} {}", "Statements:".bold(), result.migration.state.statements.len());
            if !result.migration.manual_review.is_empty() {
                println!("\n{}:", "Needs Hand-Written SQL".bold().yellow());
                for path in &result.migration.manual_review {
                    println!("  {} {}", "⚠".yellow(), path);
                }
                println!("  Follow the NOTE lines in the migration before applying it.");
            }
        }
        None if result.changes == 0 => {
            println!("\n{}", "No changes detected.".green());
        }
        None => {
            println!(
                "\n{}",
                "Only comment or non-executable changes; snapshot updated, no migration written.".green()
            );
        }
    }

    if !result.migration.pending_confirmations.is_empty() {
        println!("\n{}:", "Renames Needing Confirmation".bold().yellow());
        for pending in &result.migration.pending_confirmations {
            println!(
                "  {} {}: {} -> {} (score {:.2})",
                "⚠".yellow(),
                pending.table,
                pending.from,
                pending.to,
                pending.confidence
            );
        }
        println!("  Review the WARNING lines in the migration before applying it.");
    }
}
