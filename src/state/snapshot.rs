use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::processor::ProcessedFile;
use crate::sql::table::TableDefinition;

/// Last known state of a declarative table file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclarativeRecord {
    pub raw_hash: String,
    /// Hash of the CREATE TABLE statement that produced `table`
    pub statement_hash: String,
    pub table: Option<TableDefinition>,
}

/// What the snapshot remembers about one path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrackedFile {
    Plain {
        raw_hash: String,
        statement_hashes: Vec<String>,
    },
    Declarative(DeclarativeRecord),
}

impl TrackedFile {
    /// Record for a successfully processed file; `None` when it failed
    pub fn from_processed(file: &ProcessedFile) -> Option<Self> {
        let content = file.content().ok()?;

        if file.is_declarative() {
            let statement_hash = content
                .statements
                .first()
                .map(|s| s.hash().to_string())
                .unwrap_or_default();
            return Some(TrackedFile::Declarative(DeclarativeRecord {
                raw_hash: file.raw_hash().to_string(),
                statement_hash,
                table: content.table.clone(),
            }));
        }

        Some(TrackedFile::Plain {
            raw_hash: file.raw_hash().to_string(),
            statement_hashes: content.statements.iter().map(|s| s.hash().to_string()).collect(),
        })
    }

    pub fn raw_hash(&self) -> &str {
        match self {
            TrackedFile::Plain { raw_hash, .. } => raw_hash,
            TrackedFile::Declarative(record) => &record.raw_hash,
        }
    }

    /// Hashes of every statement the file contributed
    pub fn statement_hashes(&self) -> Vec<&str> {
        match self {
            TrackedFile::Plain { statement_hashes, .. } => {
                statement_hashes.iter().map(String::as_str).collect()
            }
            TrackedFile::Declarative(record) if record.statement_hash.is_empty() => Vec::new(),
            TrackedFile::Declarative(record) => vec![record.statement_hash.as_str()],
        }
    }

    pub fn table(&self) -> Option<&TableDefinition> {
        match self {
            TrackedFile::Declarative(record) => record.table.as_ref(),
            TrackedFile::Plain { .. } => None,
        }
    }

    pub fn is_declarative(&self) -> bool {
        matches!(self, TrackedFile::Declarative(_))
    }
}

/// Hash and structure record of every tracked path as of the last
/// successful migration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    files: BTreeMap<String, TrackedFile>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<&TrackedFile> {
        self.files.get(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TrackedFile)> {
        self.files.iter().map(|(path, tracked)| (path.as_str(), tracked))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// The snapshot that results from accepting `files` as the new tree.
    ///
    /// Paths missing from `files` are dropped. A file that failed to process
    /// keeps its previous record, if any.
    pub fn advance(&self, files: &[ProcessedFile]) -> Snapshot {
        let files = files
            .iter()
            .filter_map(|file| {
                let tracked = TrackedFile::from_processed(file)
                    .or_else(|| self.files.get(file.path()).cloned())?;
                Some((file.path().to_string(), tracked))
            })
            .collect();
        Snapshot { files }
    }

    /// Declarative records keyed by path
    pub fn declarative_tables(&self) -> BTreeMap<String, DeclarativeRecord> {
        self.files
            .iter()
            .filter_map(|(path, tracked)| match tracked {
                TrackedFile::Declarative(record) => Some((path.clone(), record.clone())),
                TrackedFile::Plain { .. } => None,
            })
            .collect()
    }
}

impl FromIterator<(String, TrackedFile)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (String, TrackedFile)>>(iter: I) -> Self {
        Snapshot {
            files: iter.into_iter().collect(),
        }
    }
}

/// A statement hash emitted by a migration and the file it came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementOrigin {
    pub hash: String,
    pub path: String,
}

/// Persistable record of one generated migration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationState {
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub statements: Vec<StatementOrigin>,
    pub declarative_tables: BTreeMap<String, DeclarativeRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::process_file;

    #[test]
    fn test_advance_tracks_plain_and_declarative() {
        let files = vec![
            process_file("views/v.sql", "CREATE VIEW v AS SELECT 1;"),
            process_file("tables/t.sql", "-- sqlsync: declarativeTable=true\nCREATE TABLE t (id int);"),
        ];

        let snapshot = Snapshot::new().advance(&files);
        assert_eq!(snapshot.len(), 2);

        let view = snapshot.get("views/v.sql").unwrap();
        assert!(!view.is_declarative());
        assert_eq!(view.statement_hashes(), vec![files[0].statements()[0].hash()]);

        let table = snapshot.get("tables/t.sql").unwrap();
        assert!(table.is_declarative());
        assert_eq!(table.table().unwrap().qualified_name(), "public.t");
        assert_eq!(snapshot.declarative_tables().len(), 1);
    }

    #[test]
    fn test_advance_is_pure_and_drops_missing_paths() {
        let first = Snapshot::new().advance(&[
            process_file("a.sql", "SELECT 1;"),
            process_file("b.sql", "SELECT 2;"),
        ]);
        let second = first.advance(&[process_file("a.sql", "SELECT 1;")]);

        assert_eq!(first.len(), 2);
        assert_eq!(second.paths().collect::<Vec<_>>(), vec!["a.sql"]);
    }

    #[test]
    fn test_advance_keeps_previous_record_for_failed_file() {
        let first = Snapshot::new().advance(&[process_file("a.sql", "SELECT 1;")]);
        let broken = process_file("a.sql", "SELECT 'unterminated;");
        assert!(broken.error().is_some());

        let second = first.advance(&[broken]);
        assert_eq!(second.get("a.sql"), first.get("a.sql"));
    }

    #[test]
    fn test_tracked_file_serialization_is_tagged() {
        let tracked = TrackedFile::Plain {
            raw_hash: "abc".to_string(),
            statement_hashes: vec!["def".to_string()],
        };
        let json = serde_json::to_value(&tracked).unwrap();
        assert_eq!(json["kind"], "plain");

        let back: TrackedFile = serde_json::from_value(json).unwrap();
        assert_eq!(back, tracked);
    }
}
