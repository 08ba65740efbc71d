use std::path::PathBuf;
use thiserror::Error;

/// Main error type for sqlsync
#[derive(Error, Debug)]
pub enum SqlsyncError {
    // File System Errors
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    #[error("Failed to read {path}: {message}")]
    FileRead {
        path: PathBuf,
        message: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {message}")]
    FileWrite {
        path: PathBuf,
        message: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    // Source file errors, aggregated across the whole tree
    #[error("{} file(s) have unresolved errors", .0.len())]
    UnresolvedFileErrors(Vec<(String, FileError)>),

    // State Tracking Errors
    #[error("Failed to load state from {path}: {message}")]
    StateLoad {
        path: PathBuf,
        message: String,
    },

    #[error("Failed to save state to {path}: {message}")]
    StateSave {
        path: PathBuf,
        message: String,
    },

    // Migration Errors
    #[error("Invalid migration name: {0}")]
    InvalidMigrationName(String),

    #[error("Migration file already exists: {0}")]
    MigrationExists(PathBuf),

    // Configuration Errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Failed to load configuration from {path}: {message}")]
    ConfigLoad {
        path: PathBuf,
        message: String,
    },

    #[error("{0}")]
    Other(String),
}

/// A failure local to one source file. One file's error never aborts the
/// processing of others; the caller aggregates them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FileError {
    #[error("declarativeTable and splitStatements are mutually exclusive")]
    DirectiveConflict,

    #[error("CREATE TABLE must be the only statement in its file (found {count} statements)")]
    MultiStatementTableFile { count: usize },

    #[error("Failed to parse table definition: {message}")]
    TableParseFailure { message: String },

    #[error("Syntax error at line {line}: {message}")]
    StatementSyntaxError { line: usize, message: String },

    #[error("Invalid directive at line {line}: {message}")]
    InvalidDirective { line: usize, message: String },
}

/// Statement tokenizer failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SplitError {
    #[error("unterminated {kind} starting at line {line}")]
    Unterminated { kind: &'static str, line: usize },

    #[error("endStatement marker without matching startStatement")]
    UnmatchedEndMarker { line: usize },

    #[error("startStatement marker is never closed")]
    UnclosedStartMarker { line: usize },

    #[error("startStatement marker nested inside another manual statement")]
    NestedStartMarker { line: usize },
}

impl SplitError {
    pub fn line(&self) -> usize {
        match self {
            SplitError::Unterminated { line, .. }
            | SplitError::UnmatchedEndMarker { line }
            | SplitError::UnclosedStartMarker { line }
            | SplitError::NestedStartMarker { line } => *line,
        }
    }
}

impl From<SplitError> for FileError {
    fn from(err: SplitError) -> Self {
        FileError::StatementSyntaxError {
            line: err.line(),
            message: err.to_string(),
        }
    }
}

/// CREATE TABLE structural parsing failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TableParseError {
    #[error("statement is not a CREATE TABLE")]
    NotCreateTable,

    #[error("unbalanced parentheses in table body")]
    UnbalancedParentheses,

    #[error("table {0} declares no columns")]
    NoColumns(String),

    #[error("column {0} has no data type")]
    MissingType(String),

    #[error("column {0} is declared more than once")]
    DuplicateColumn(String),

    #[error("malformed column definition: {0}")]
    MalformedColumn(String),
}

impl From<TableParseError> for FileError {
    fn from(err: TableParseError) -> Self {
        FileError::TableParseFailure {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for SqlsyncError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => {
                SqlsyncError::FileNotFound(PathBuf::from("unknown"))
            }
            std::io::ErrorKind::PermissionDenied => {
                SqlsyncError::PermissionDenied(PathBuf::from("unknown"))
            }
            _ => SqlsyncError::Other(err.to_string()),
        }
    }
}

/// Result type alias for sqlsync operations
pub type Result<T> = std::result::Result<T, SqlsyncError>;

/// Helper trait for adding context to errors
pub trait ErrorContext<T> {
    /// Add context about which file caused the error
    fn file_context(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> ErrorContext<T> for std::result::Result<T, std::io::Error> {
    fn file_context(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| {
            let path = path.into();
            match e.kind() {
                std::io::ErrorKind::NotFound => SqlsyncError::FileNotFound(path),
                std::io::ErrorKind::PermissionDenied => SqlsyncError::PermissionDenied(path),
                _ => SqlsyncError::FileRead {
                    message: e.to_string(),
                    path,
                    source: e,
                },
            }
        })
    }
}

/// Helper function to format error with all its causes
pub fn format_error_chain(err: &SqlsyncError) -> String {
    use std::error::Error;

    let mut output = format!("Error: {}", err);

    if let SqlsyncError::UnresolvedFileErrors(errors) = err {
        for (path, file_error) in errors {
            output.push_str(&format!("\n  {}: {}", path, file_error));
        }
    }

    let mut current_err: &dyn Error = err;
    while let Some(source) = current_err.source() {
        output.push_str(&format!("\n  Caused by: {}", source));
        current_err = source;
    }

    output
}

/// Helper function to suggest fixes for common errors
pub fn suggest_fix(err: &SqlsyncError) -> Option<String> {
    match err {
        SqlsyncError::FileNotFound(path) => Some(
            format!("File not found: {}\n\
                    - Check if the path is correct\n\
                    - Ensure you're running sqlsync from the project root", path.display())
        ),
        SqlsyncError::PermissionDenied(path) => Some(
            format!("Permission denied for: {}\n\
                    - Check file permissions", path.display())
        ),
        SqlsyncError::DirectoryNotFound(path) => Some(
            format!("Section directory not found: {}\n\
                    - Check the [[sections]] entries in sqlsync.toml", path.display())
        ),
        SqlsyncError::UnresolvedFileErrors(errors) => {
            let conflicts = errors
                .iter()
                .any(|(_, e)| matches!(e, FileError::DirectiveConflict));
            let multi = errors
                .iter()
                .any(|(_, e)| matches!(e, FileError::MultiStatementTableFile { .. }));

            let mut hint = String::from("Fix every listed file before generating a migration.");
            if conflicts {
                hint.push_str("\n- declarativeTable and splitStatements cannot both be true");
            }
            if multi {
                hint.push_str("\n- Move additional statements (indexes, grants) out of CREATE TABLE files");
            }
            Some(hint)
        }
        SqlsyncError::StateLoad { path, .. } => Some(
            format!("The state file {} could not be read.\n\
                    - If it was edited by hand, restore it from version control", path.display())
        ),
        _ => None,
    }
}

/// Calculate line and column number from a byte position in text
pub fn calculate_line_column(text: &str, byte_position: usize) -> (usize, usize) {
    let mut line = 1;
    let mut column = 1;
    let mut current_pos = 0;

    for ch in text.chars() {
        if current_pos >= byte_position {
            break;
        }

        current_pos += ch.len_utf8();

        if ch == '\n' {
            line += 1;
            column = 1;
        } else {
            column += 1;
        }
    }

    (line, column)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calculate_line_column() {
        let sql = "SELECT * FROM users\nWHERE id = 1\nAND name = 'test'";

        assert_eq!(calculate_line_column(sql, 0), (1, 1));
        assert_eq!(calculate_line_column(sql, 7), (1, 8)); // at '*'
        assert_eq!(calculate_line_column(sql, 20), (2, 1)); // at 'W' in WHERE
        assert_eq!(calculate_line_column(sql, 33), (3, 1)); // at 'A' in AND
    }

    #[test]
    fn test_calculate_line_column_with_unicode() {
        let sql = "SELECT '🎉' FROM table\nWHERE x = 1";

        assert_eq!(calculate_line_column(sql, 8), (1, 9));
        assert_eq!(calculate_line_column(sql, 12), (1, 10));
    }

    #[test]
    fn test_split_error_maps_to_syntax_error() {
        let err: FileError = SplitError::Unterminated { kind: "string literal", line: 4 }.into();
        match err {
            FileError::StatementSyntaxError { line, message } => {
                assert_eq!(line, 4);
                assert!(message.contains("string literal"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_format_error_chain_lists_file_errors() {
        let err = SqlsyncError::UnresolvedFileErrors(vec![
            ("tables/users.sql".to_string(), FileError::DirectiveConflict),
        ]);
        let formatted = format_error_chain(&err);
        assert!(formatted.contains("1 file(s) have unresolved errors"));
        assert!(formatted.contains("tables/users.sql"));
        assert!(suggest_fix(&err).unwrap().contains("mutually exclusive") || suggest_fix(&err).unwrap().contains("cannot both be true"));
    }

    #[test]
    fn test_file_context_not_found() {
        let result: std::result::Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        match result.file_context("sql/missing.sql") {
            Err(SqlsyncError::FileNotFound(path)) => assert_eq!(path, PathBuf::from("sql/missing.sql")),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
