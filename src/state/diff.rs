use std::collections::{BTreeMap, HashSet};

use tracing::{debug, info};

use crate::analysis::schema_diff::{diff_tables, AlterOperation};
use crate::error::{Result, SqlsyncError};
use crate::log_file_change;
use crate::output::{FileEvent, OutputHandler};
use crate::processor::ProcessedFile;
use crate::sql::objects::Statement;
use crate::sql::table::TableDefinition;
use crate::state::snapshot::{Snapshot, TrackedFile};

/// Statement-level change inside a plain file, matched by hash
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementChange {
    Added(Statement),
    Deleted { hash: String },
}

/// Why a path present on both sides counts as modified
#[derive(Debug, Clone, PartialEq)]
pub enum Modification {
    /// Declarative table with both structures known
    TableAltered {
        previous: TableDefinition,
        current: TableDefinition,
        operations: Vec<AlterOperation>,
    },
    /// Declarative table whose structures cannot be compared; only the raw
    /// hash differs
    TableStructureUnavailable,
    /// A plain file switched to `declarativeTable`
    BecameDeclarative,
    /// `declarativeTable` was turned off; the old structure is context only
    DeclarativeDisabled { previous_table: Option<TableDefinition> },
    /// Plain file content changed
    Content { statement_changes: Vec<StatementChange> },
}

impl Modification {
    pub fn label(&self) -> &'static str {
        match self {
            Modification::TableAltered { .. } => "table altered",
            Modification::TableStructureUnavailable => "table structure unavailable",
            Modification::BecameDeclarative => "became declarative",
            Modification::DeclarativeDisabled { .. } => "declarative disabled",
            Modification::Content { .. } => "content",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FileChange {
    Added {
        file: ProcessedFile,
    },
    Modified {
        file: ProcessedFile,
        previous: TrackedFile,
        detail: Modification,
    },
    Deleted {
        path: String,
        previous: TrackedFile,
    },
}

impl FileChange {
    pub fn path(&self) -> &str {
        match self {
            FileChange::Added { file } | FileChange::Modified { file, .. } => file.path(),
            FileChange::Deleted { path, .. } => path,
        }
    }

    pub fn event(&self) -> FileEvent {
        match self {
            FileChange::Added { .. } => FileEvent::Added,
            FileChange::Modified { .. } => FileEvent::Modified,
            FileChange::Deleted { .. } => FileEvent::Deleted,
        }
    }
}

/// Classified difference between the current tree and a snapshot
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateDiff {
    /// Sorted by path
    pub changes: Vec<FileChange>,
    pub unmodified: Vec<String>,
}

impl StateDiff {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn added(&self) -> impl Iterator<Item = &FileChange> {
        self.changes.iter().filter(|c| matches!(c, FileChange::Added { .. }))
    }

    pub fn modified(&self) -> impl Iterator<Item = &FileChange> {
        self.changes.iter().filter(|c| matches!(c, FileChange::Modified { .. }))
    }

    pub fn deleted(&self) -> impl Iterator<Item = &FileChange> {
        self.changes.iter().filter(|c| matches!(c, FileChange::Deleted { .. }))
    }
}

fn statement_changes(file: &ProcessedFile, previous: &TrackedFile) -> Vec<StatementChange> {
    let previous_hashes = previous.statement_hashes();
    let previous_set: HashSet<&str> = previous_hashes.iter().copied().collect();
    let current_set: HashSet<&str> = file.statements().iter().map(|s| s.hash()).collect();

    let mut changes: Vec<StatementChange> = previous_hashes
        .iter()
        .filter(|hash| !current_set.contains(*hash))
        .map(|hash| StatementChange::Deleted {
            hash: hash.to_string(),
        })
        .collect();

    changes.extend(
        file.statements()
            .iter()
            .filter(|s| !previous_set.contains(s.hash()))
            .cloned()
            .map(StatementChange::Added),
    );

    changes
}

/// Decide whether `file` changed relative to its snapshot record
fn classify_existing(file: &ProcessedFile, previous: &TrackedFile) -> Option<Modification> {
    let raw_changed = file.raw_hash() != previous.raw_hash();

    match (file.is_declarative(), previous) {
        (true, TrackedFile::Plain { .. }) => Some(Modification::BecameDeclarative),
        (true, TrackedFile::Declarative(record)) => match (record.table.as_ref(), file.table()) {
            (Some(old), Some(new)) if old.qualified_name() == new.qualified_name() => {
                let operations = diff_tables(old, new);
                if operations.is_empty() {
                    None
                } else {
                    Some(Modification::TableAltered {
                        previous: old.clone(),
                        current: new.clone(),
                        operations,
                    })
                }
            }
            _ if raw_changed => Some(Modification::TableStructureUnavailable),
            _ => None,
        },
        (false, TrackedFile::Declarative(record)) => Some(Modification::DeclarativeDisabled {
            previous_table: record.table.clone(),
        }),
        (false, TrackedFile::Plain { .. }) if raw_changed => Some(Modification::Content {
            statement_changes: statement_changes(file, previous),
        }),
        (false, TrackedFile::Plain { .. }) => None,
    }
}

/// Compare the current tree against the snapshot.
///
/// Refuses to run while any file carries an error, listing all of them.
pub fn diff_state(files: &[ProcessedFile], snapshot: &Snapshot, output: &dyn OutputHandler) -> Result<StateDiff> {
    let errors: Vec<(String, _)> = files
        .iter()
        .filter_map(|f| f.error().map(|e| (f.path().to_string(), e.clone())))
        .collect();
    if !errors.is_empty() {
        for (path, error) in &errors {
            output.file_event(FileEvent::Failed, &format!("{}: {}", path, error));
        }
        return Err(SqlsyncError::UnresolvedFileErrors(errors));
    }

    let mut changes: BTreeMap<String, FileChange> = BTreeMap::new();
    let mut unmodified = Vec::new();

    for file in files {
        match snapshot.get(file.path()) {
            None => {
                changes.insert(file.path().to_string(), FileChange::Added { file: file.clone() });
            }
            Some(previous) => match classify_existing(file, previous) {
                Some(detail) => {
                    debug!(path = file.path(), detail = detail.label(), "File modified");
                    changes.insert(
                        file.path().to_string(),
                        FileChange::Modified {
                            file: file.clone(),
                            previous: previous.clone(),
                            detail,
                        },
                    );
                }
                None => unmodified.push(file.path().to_string()),
            },
        }
    }

    let current: HashSet<&str> = files.iter().map(|f| f.path()).collect();
    for (path, previous) in snapshot.iter().filter(|(path, _)| !current.contains(path)) {
        changes.insert(
            path.to_string(),
            FileChange::Deleted {
                path: path.to_string(),
                previous: previous.clone(),
            },
        );
    }

    unmodified.sort();
    let diff = StateDiff {
        changes: changes.into_values().collect(),
        unmodified,
    };

    for change in &diff.changes {
        log_file_change!(change.path(), change.event());
        output.file_event(change.event(), change.path());
    }
    for path in &diff.unmodified {
        output.file_event(FileEvent::Unmodified, path);
    }

    info!(
        added = diff.added().count(),
        modified = diff.modified().count(),
        deleted = diff.deleted().count(),
        unmodified = diff.unmodified.len(),
        "State diff complete"
    );
    Ok(diff)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FileError;
    use crate::output::{LibraryOutputHandler, OutputLevel, SilentOutputHandler};
    use crate::processor::process_file;

    fn snapshot_of(files: &[ProcessedFile]) -> Snapshot {
        Snapshot::new().advance(files)
    }

    #[test]
    fn test_unchanged_tree_has_no_changes() {
        let files = vec![
            process_file("views/v.sql", "CREATE VIEW v AS SELECT 1;"),
            process_file("tables/t.sql", "-- sqlsync: declarativeTable=true\nCREATE TABLE t (id int);"),
        ];
        let diff = diff_state(&files, &snapshot_of(&files), &SilentOutputHandler).unwrap();
        assert!(diff.is_empty());
        assert_eq!(diff.unmodified, vec!["tables/t.sql", "views/v.sql"]);
    }

    #[test]
    fn test_added_and_deleted() {
        let before = vec![process_file("old.sql", "SELECT 1;")];
        let after = vec![process_file("new.sql", "SELECT 2;")];
        let diff = diff_state(&after, &snapshot_of(&before), &SilentOutputHandler).unwrap();

        assert_eq!(diff.changes.len(), 2);
        assert!(matches!(&diff.changes[0], FileChange::Added { file } if file.path() == "new.sql"));
        assert!(matches!(&diff.changes[1], FileChange::Deleted { path, .. } if path == "old.sql"));
    }

    #[test]
    fn test_fails_closed_on_file_errors() {
        let files = vec![
            process_file("a.sql", "-- sqlsync: declarativeTable=true, splitStatements=true\nCREATE TABLE a (id int);"),
            process_file("b.sql", "CREATE TABLE b (id int); CREATE INDEX b_id ON b (id);"),
            process_file("c.sql", "SELECT 1;"),
        ];
        let output = LibraryOutputHandler::new();
        let err = diff_state(&files, &Snapshot::new(), &output).unwrap_err();

        match err {
            SqlsyncError::UnresolvedFileErrors(errors) => {
                assert_eq!(errors.len(), 2);
                assert_eq!(errors[0], ("a.sql".to_string(), FileError::DirectiveConflict));
                assert_eq!(errors[1].1, FileError::MultiStatementTableFile { count: 2 });
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(output.messages_at(OutputLevel::Error).len(), 2);
    }

    #[test]
    fn test_comment_only_edit_of_declarative_table_is_unmodified() {
        let before = vec![process_file("t.sql", "-- sqlsync: declarativeTable=true\nCREATE TABLE t (id int);")];
        let after = vec![process_file(
            "t.sql",
            "-- sqlsync: declarativeTable=true\n-- the t table\nCREATE TABLE t (\n  id int -- key\n);",
        )];
        let diff = diff_state(&after, &snapshot_of(&before), &SilentOutputHandler).unwrap();
        assert!(diff.is_empty());
    }

    #[test]
    fn test_renamed_table_structure_unavailable() {
        let before = vec![process_file("t.sql", "-- sqlsync: declarativeTable=true\nCREATE TABLE users (id int);")];
        let after = vec![process_file(
            "t.sql",
            "-- sqlsync: declarativeTable=true\nCREATE TABLE billing.accounts (id int, email text);",
        )];
        let diff = diff_state(&after, &snapshot_of(&before), &SilentOutputHandler).unwrap();

        assert!(matches!(
            &diff.changes[0],
            FileChange::Modified {
                detail: Modification::TableStructureUnavailable,
                ..
            }
        ));
        assert_eq!(diff.changes[0].path(), "t.sql");
    }

    #[test]
    fn test_record_without_structure_falls_back_to_raw_hash() {
        let snapshot: Snapshot = serde_json::from_value(serde_json::json!({
            "files": {
                "t.sql": {
                    "kind": "declarative",
                    "raw_hash": "0000",
                    "statement_hash": "",
                    "table": null
                }
            }
        }))
        .unwrap();
        let after = vec![process_file("t.sql", "-- sqlsync: declarativeTable=true\nCREATE TABLE t (id int);")];
        let diff = diff_state(&after, &snapshot, &SilentOutputHandler).unwrap();
        assert!(matches!(
            &diff.changes[0],
            FileChange::Modified {
                detail: Modification::TableStructureUnavailable,
                ..
            }
        ));

        // Same raw hash and no structure to compare: nothing to report
        let unchanged: Snapshot = serde_json::from_value(serde_json::json!({
            "files": {
                "t.sql": {
                    "kind": "declarative",
                    "raw_hash": after[0].raw_hash(),
                    "statement_hash": "",
                    "table": null
                }
            }
        }))
        .unwrap();
        assert!(diff_state(&after, &unchanged, &SilentOutputHandler).unwrap().is_empty());
    }

    #[test]
    fn test_declarative_alteration() {
        let before = vec![process_file("t.sql", "-- sqlsync: declarativeTable=true\nCREATE TABLE t (id int);")];
        let after = vec![process_file("t.sql", "-- sqlsync: declarativeTable=true\nCREATE TABLE t (id int, name text);")];
        let diff = diff_state(&after, &snapshot_of(&before), &SilentOutputHandler).unwrap();

        match &diff.changes[0] {
            FileChange::Modified {
                detail: Modification::TableAltered { operations, .. },
                ..
            } => assert_eq!(operations.len(), 1),
            other => panic!("unexpected change: {:?}", other),
        }
    }

    #[test]
    fn test_directive_transitions() {
        let plain = vec![process_file("t.sql", "CREATE TABLE t (id int);")];
        let declarative = vec![process_file("t.sql", "-- sqlsync: declarativeTable=true\nCREATE TABLE t (id int);")];

        let became = diff_state(&declarative, &snapshot_of(&plain), &SilentOutputHandler).unwrap();
        assert!(matches!(
            &became.changes[0],
            FileChange::Modified { detail: Modification::BecameDeclarative, .. }
        ));

        let disabled = diff_state(&plain, &snapshot_of(&declarative), &SilentOutputHandler).unwrap();
        match &disabled.changes[0] {
            FileChange::Modified {
                detail: Modification::DeclarativeDisabled { previous_table },
                ..
            } => assert_eq!(previous_table.as_ref().unwrap().name(), "t"),
            other => panic!("unexpected change: {:?}", other),
        }
    }

    #[test]
    fn test_split_statement_changes() {
        let before = vec![process_file(
            "f.sql",
            "-- sqlsync: splitStatements=true\nCREATE VIEW a AS SELECT 1;\nCREATE VIEW b AS SELECT 2;",
        )];
        let after = vec![process_file(
            "f.sql",
            "-- sqlsync: splitStatements=true\nCREATE VIEW a AS SELECT 1;\nCREATE VIEW b AS SELECT 3;",
        )];
        let diff = diff_state(&after, &snapshot_of(&before), &SilentOutputHandler).unwrap();

        match &diff.changes[0] {
            FileChange::Modified {
                detail: Modification::Content { statement_changes },
                ..
            } => {
                assert_eq!(statement_changes.len(), 2);
                assert!(matches!(&statement_changes[0], StatementChange::Deleted { .. }));
                assert!(matches!(&statement_changes[1], StatementChange::Added(s) if s.normalized().ends_with("SELECT 3")));
            }
            other => panic!("unexpected change: {:?}", other),
        }
    }

    #[test]
    fn test_comment_edit_of_plain_file_has_no_statement_changes() {
        let before = vec![process_file("v.sql", "CREATE VIEW v AS SELECT 1;")];
        let after = vec![process_file("v.sql", "-- documented\nCREATE VIEW v AS SELECT 1;")];
        let diff = diff_state(&after, &snapshot_of(&before), &SilentOutputHandler).unwrap();

        match &diff.changes[0] {
            FileChange::Modified {
                detail: Modification::Content { statement_changes },
                ..
            } => assert!(statement_changes.is_empty()),
            other => panic!("unexpected change: {:?}", other),
        }
    }
}
