use std::path::Path;

#[cfg(feature = "cli")]
use owo_colors::OwoColorize;

#[cfg(feature = "cli")]
use crate::state::diff::{FileChange, Modification};

use crate::config::SqlsyncConfig;
use crate::error::Result;
use crate::output::OutputHandler;
use crate::scanner::scan_and_process;
use crate::state::diff::{diff_state, StateDiff};
use crate::state::store::StateStore;

#[derive(Debug)]
pub struct StatusResult {
    pub diff: StateDiff,
    pub files_scanned: usize,
    pub migrations_recorded: usize,
}

/// Report what `generate` would pick up, without writing anything
pub fn execute_status(root: &Path, config: &SqlsyncConfig, output: &dyn OutputHandler) -> Result<StatusResult> {
    let store = StateStore::new(root.join(config.state_file()));
    let state = store.load()?;

    output.heading("Scanning source files");
    let files = scan_and_process(root, &config.sections())?;
    let diff = diff_state(&files, &state.snapshot, output)?;

    if diff.is_empty() {
        output.success("No changes since the last migration");
    } else {
        output.info(&format!("{} file(s) changed", diff.changes.len()));
    }

    Ok(StatusResult {
        files_scanned: files.len(),
        migrations_recorded: state.history.len(),
        diff,
    })
}

#[cfg(feature = "cli")]
fn change_detail(change: &FileChange) -> String {
    match change {
        FileChange::Added { file } => format!("{} statement(s)", file.statements().len()),
        FileChange::Modified { detail, .. } => match detail {
            Modification::TableAltered { operations, .. } => operations
                .iter()
                .map(|op| op.describe())
                .collect::<Vec<_>>()
                .join("; "),
            Modification::Content { statement_changes } if statement_changes.is_empty() => {
                "comments only".to_string()
            }
            Modification::Content { statement_changes } => {
                format!("{} statement change(s)", statement_changes.len())
            }
            other => other.label().to_string(),
        },
        FileChange::Deleted { previous, .. } if previous.is_declarative() => "declarative table".to_string(),
        FileChange::Deleted { .. } => String::new(),
    }
}

#[cfg(feature = "cli")]
pub fn print_status_summary(result: &StatusResult) {
    println!("\n{}", "=== sqlsync Status ===".bold().blue());
    println!(
        "  {} file(s) scanned, {} migration(s) recorded",
        result.files_scanned, result.migrations_recorded
    );

    if result.diff.is_empty() {
        println!("\n{}", "Everything is up to date.".green());
        return;
    }

    for change in &result.diff.changes {
        let marker = match change {
            FileChange::Added { .. } => "+".green().bold().to_string(),
            FileChange::Modified { .. } => "~".yellow().bold().to_string(),
            FileChange::Deleted { .. } => "-".red().bold().to_string(),
        };
        let detail = change_detail(change);
        if detail.is_empty() {
            println!("  {} {}", marker, change.path());
        } else {
            println!("  {} {} {}", marker, change.path(), format!("({})", detail).dimmed());
        }
    }

    println!(
        "\n{} Run 'sqlsync generate <name>' to write a migration.",
        "→".cyan()
    );
}
