//! Migration text assembly.
//!
//! Every executable statement is wrapped in `startStatement`/`endStatement`
//! markers carrying its hash, so a migration file can be split back into
//! exactly the statements that produced it.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::analysis::schema_diff::{AlterKind, AlterOperation};
use crate::processor::ProcessedFile;
use crate::sql::objects::{calculate_hash, normalize_sql, terminated, Statement};
use crate::sql::splitter::split_sql_file;
use crate::state::diff::{FileChange, Modification, StateDiff, StatementChange};
use crate::state::snapshot::{MigrationState, Snapshot, StatementOrigin, TrackedFile};

pub const ADDED_BANNER: &str = "-- >>> ADDED FILES <<<";
pub const MODIFIED_BANNER: &str = "-- >>> MODIFIED FILES <<<";
pub const DELETED_BANNER: &str = "-- >>> DELETED FILES <<<";

/// A rename scored below the confirmation threshold
#[derive(Debug, Clone, PartialEq)]
pub struct PendingConfirmation {
    pub path: String,
    pub table: String,
    pub from: String,
    pub to: String,
    pub confidence: f64,
}

/// Generated migration text plus the state to persist alongside it
#[derive(Debug, Clone, PartialEq)]
pub struct Migration {
    pub name: String,
    pub text: String,
    pub state: MigrationState,
    pub pending_confirmations: Vec<PendingConfirmation>,
    /// Paths whose change could only be recorded as a note; the SQL for
    /// them has to be written by hand
    pub manual_review: Vec<String>,
}

impl Migration {
    /// True when nothing executable remains once comments and markers are
    /// removed
    pub fn is_empty(&self) -> bool {
        is_effectively_empty(&self.text)
    }

    /// Whether the migration has to be written: it carries SQL, or notes
    /// asking for SQL that could not be generated
    pub fn should_persist(&self) -> bool {
        !self.is_empty() || !self.manual_review.is_empty()
    }
}

/// Whether SQL text holds no executable statement
pub fn is_effectively_empty(text: &str) -> bool {
    match split_sql_file(text) {
        Ok(statements) => statements.is_empty(),
        Err(_) => normalize_sql(text).is_empty(),
    }
}

/// Comment out every line of `text`
fn commented(text: &str) -> String {
    text.lines()
        .map(|line| if line.is_empty() { "--".to_string() } else { format!("-- {}", line) })
        .collect::<Vec<_>>()
        .join("\n")
}

struct MigrationBuilder {
    out: String,
    statements: Vec<StatementOrigin>,
    pending: Vec<PendingConfirmation>,
    manual_review: Vec<String>,
}

impl MigrationBuilder {
    fn line(&mut self, line: &str) {
        self.out.push_str(line);
        self.out.push('\n');
    }

    fn blank(&mut self) {
        self.out.push('\n');
    }

    fn file_header(&mut self, path: &str) {
        self.line(&format!("-- File: {}", path));
    }

    /// Emit one executable statement between hash markers
    fn statement(&mut self, path: &str, hash: &str, sql: &str) {
        self.line(&format!("-- sqlsync: startStatement:{}", hash));
        self.line(sql.trim_end());
        self.line(&format!("-- sqlsync: endStatement:{}", hash));
        self.statements.push(StatementOrigin {
            hash: hash.to_string(),
            path: path.to_string(),
        });
    }

    fn file_statement(&mut self, path: &str, statement: &Statement) {
        let sql = terminated(statement.raw());
        self.statement(path, statement.hash(), &sql);
    }

    fn generated_statement(&mut self, path: &str, sql: &str) {
        let hash = calculate_hash(&normalize_sql(sql));
        self.statement(path, &hash, sql);
    }

    fn dump(&mut self, file: &ProcessedFile) {
        for statement in file.statements() {
            self.line(&commented(&terminated(statement.raw())));
        }
    }

    fn needs_review(&mut self, path: &str) {
        warn!(path, "Change needs a hand-written migration");
        self.manual_review.push(path.to_string());
    }

    fn added(&mut self, file: &ProcessedFile) {
        self.file_header(file.path());
        if file.statements().is_empty() {
            self.line("-- (no statements)");
        }
        for statement in file.statements() {
            self.file_statement(file.path(), statement);
        }
        self.blank();
    }

    fn alter_operations(&mut self, path: &str, table: &str, operations: &[AlterOperation]) {
        for operation in operations {
            self.line(&format!("-- {}", operation.describe()));
            if let AlterKind::RenameColumn {
                from,
                to,
                confidence,
                requires_confirmation: true,
            } = &operation.kind
            {
                self.line(&format!(
                    "-- WARNING: low-confidence rename {} -> {} on {} (score {:.2}); confirm before applying",
                    from, to, table, confidence
                ));
                self.pending.push(PendingConfirmation {
                    path: path.to_string(),
                    table: table.to_string(),
                    from: from.clone(),
                    to: to.clone(),
                    confidence: *confidence,
                });
            }
            for sql in &operation.sql {
                self.generated_statement(path, sql);
            }
        }
    }

    fn modified(&mut self, file: &ProcessedFile, previous: &TrackedFile, detail: &Modification) {
        let path = file.path();
        self.file_header(path);

        // Statements the file already had under its previous mode
        let previous_hashes = previous.statement_hashes();
        let unchanged = !file.statements().is_empty()
            && file
                .statements()
                .iter()
                .all(|statement| previous_hashes.contains(&statement.hash()));

        match detail {
            Modification::TableAltered {
                current, operations, ..
            } => {
                self.alter_operations(path, &current.qualified_name(), operations);
            }
            Modification::TableStructureUnavailable => {
                self.line("-- NOTE: table structure could not be compared; review and write the ALTER statements by hand.");
                self.line("-- Current definition:");
                self.dump(file);
                self.needs_review(path);
            }
            Modification::BecameDeclarative if unchanged => {
                self.line("-- NOTE: file is now a declarative table; its definition is unchanged.");
            }
            Modification::BecameDeclarative => {
                self.line("-- NOTE: file is now a declarative table and its definition changed; write the ALTER statements by hand.");
                self.line("-- NOTE: later edits generate ALTER statements.");
                self.line("-- Current definition:");
                self.dump(file);
                self.needs_review(path);
            }
            Modification::DeclarativeDisabled { previous_table } => {
                let table = previous_table
                    .as_ref()
                    .map(|t| t.qualified_name())
                    .unwrap_or_else(|| "unknown table".to_string());
                self.line(&format!(
                    "-- NOTE: declarativeTable was turned off for {}; changes are no longer tracked structurally.",
                    table
                ));
                if unchanged {
                    self.line("-- Content is unchanged.");
                } else {
                    self.line("-- NOTE: content changed; review and write the migration by hand.");
                    self.line("-- Current content:");
                    self.dump(file);
                    self.needs_review(path);
                }
            }
            Modification::Content { statement_changes } if file.is_split() => {
                for change in statement_changes {
                    match change {
                        StatementChange::Added(statement) => self.file_statement(path, statement),
                        StatementChange::Deleted { hash } => {
                            self.line(&format!("-- Statement {} was removed from this file", hash));
                        }
                    }
                }
                if statement_changes.is_empty() {
                    self.line("-- Comment-only change");
                }
            }
            Modification::Content { statement_changes } => {
                let added: Vec<&Statement> = statement_changes
                    .iter()
                    .filter_map(|c| match c {
                        StatementChange::Added(statement) => Some(statement),
                        StatementChange::Deleted { .. } => None,
                    })
                    .collect();
                if added.is_empty() && file.statements().is_empty() {
                    self.line("-- File content was removed");
                } else if added.is_empty() {
                    self.line("-- Comment-only change");
                }
                for statement in added {
                    self.file_statement(path, statement);
                }
            }
        }
        self.blank();
    }

    fn deleted(&mut self, path: &str, previous: &TrackedFile) {
        self.file_header(path);
        match previous.table() {
            Some(table) => {
                warn!(path, table = %table.qualified_name(), "Declarative table file deleted, emitting DROP TABLE");
                self.line(&format!(
                    "-- WARNING: declarative table {} was deleted; this drops the table and its data.",
                    table.qualified_name()
                ));
                self.generated_statement(path, &format!("DROP TABLE IF EXISTS {};", table.sql_name()));
            }
            None if previous.is_declarative() => {
                self.line("-- WARNING: declarative table file deleted but its structure is unknown; drop the table by hand if intended.");
                self.needs_review(path);
            }
            None => {
                self.line("-- File deleted; objects it created are left in place.");
                for hash in previous.statement_hashes() {
                    self.line(&format!("--   statement {}", hash));
                }
            }
        }
        self.blank();
    }
}

/// Assemble the migration for `diff`. `next` is the snapshot that will be
/// saved with it; its declarative tables are recorded in the state.
pub fn synthesize_migration(name: &str, created_at: DateTime<Utc>, diff: &StateDiff, next: &Snapshot) -> Migration {
    let mut builder = MigrationBuilder {
        out: String::new(),
        statements: Vec::new(),
        pending: Vec::new(),
        manual_review: Vec::new(),
    };

    builder.line(&format!("-- Migration: {}", name));
    builder.line(&format!("-- Created: {}", created_at.format("%Y-%m-%d %H:%M:%S UTC")));
    builder.blank();

    let added: Vec<&FileChange> = diff.added().collect();
    if !added.is_empty() {
        builder.line(ADDED_BANNER);
        builder.blank();
        for change in added {
            if let FileChange::Added { file } = change {
                builder.added(file);
            }
        }
    }

    let modified: Vec<&FileChange> = diff.modified().collect();
    if !modified.is_empty() {
        builder.line(MODIFIED_BANNER);
        builder.blank();
        for change in modified {
            if let FileChange::Modified { file, previous, detail } = change {
                builder.modified(file, previous, detail);
            }
        }
    }

    let deleted: Vec<&FileChange> = diff.deleted().collect();
    if !deleted.is_empty() {
        builder.line(DELETED_BANNER);
        builder.blank();
        for change in deleted {
            if let FileChange::Deleted { path, previous } = change {
                builder.deleted(path, previous);
            }
        }
    }

    debug!(
        statements = builder.statements.len(),
        pending = builder.pending.len(),
        manual_review = builder.manual_review.len(),
        "Synthesized migration {}",
        name
    );

    Migration {
        name: name.to_string(),
        text: builder.out,
        state: MigrationState {
            name: name.to_string(),
            created_at,
            statements: builder.statements,
            declarative_tables: next.declarative_tables(),
        },
        pending_confirmations: builder.pending,
        manual_review: builder.manual_review,
    }
}
