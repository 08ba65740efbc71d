use sqlsync::commands::GenerateResult;
use sqlsync::state::{FileChange, StateDiff};

/// Assert that `generate` wrote a migration and return its text
pub fn assert_migration_written(result: &GenerateResult) -> &str {
    assert!(
        result.migration_path.is_some(),
        "Expected a migration to be written, but it was empty:\n{}",
        result.migration.text
    );
    &result.migration.text
}

/// Assert that `generate` produced nothing executable
pub fn assert_no_migration(result: &GenerateResult) {
    assert!(
        result.migration_path.is_none(),
        "Expected no migration, but one was written:\n{}",
        result.migration.text
    );
}

/// Assert that the migration text contains `needle`
pub fn assert_migration_contains(text: &str, needle: &str) {
    assert!(
        text.contains(needle),
        "Expected migration to contain '{}', but it was:\n{}",
        needle,
        text
    );
}

pub fn assert_migration_lacks(text: &str, needle: &str) {
    assert!(
        !text.contains(needle),
        "Expected migration not to contain '{}', but it was:\n{}",
        needle,
        text
    );
}

/// Assert the kind of change reported for a path
pub fn assert_change(diff: &StateDiff, path: &str, kind: &str) {
    let change = diff.changes.iter().find(|c| c.path() == path);
    let actual = match change {
        Some(FileChange::Added { .. }) => "added",
        Some(FileChange::Modified { .. }) => "modified",
        Some(FileChange::Deleted { .. }) => "deleted",
        None => "unchanged",
    };
    assert_eq!(actual, kind, "Unexpected change for {}: {:?}", path, change);
}
