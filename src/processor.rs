use std::fs;
use std::path::Path;

use tracing::{debug, trace};

use crate::error::{ErrorContext, FileError, Result};
use crate::sql::objects::{calculate_hash, terminated, Statement};
use crate::sql::splitter::split_sql_file;
use crate::sql::table::{parse_create_table, TableDefinition};
use crate::sql::directives::{parse_directives, Directives};

/// Successfully processed file content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContent {
    pub statements: Vec<Statement>,
    /// Present only for declarative table files
    pub table: Option<TableDefinition>,
}

/// Per-file result of processing one source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedFile {
    path: String,
    raw_hash: String,
    directives: Directives,
    content: std::result::Result<FileContent, FileError>,
}

impl ProcessedFile {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn raw_hash(&self) -> &str {
        &self.raw_hash
    }

    pub fn directives(&self) -> Directives {
        self.directives
    }

    pub fn content(&self) -> std::result::Result<&FileContent, &FileError> {
        self.content.as_ref()
    }

    /// Statements of the file; empty when processing failed
    pub fn statements(&self) -> &[Statement] {
        match &self.content {
            Ok(content) => &content.statements,
            Err(_) => &[],
        }
    }

    pub fn table(&self) -> Option<&TableDefinition> {
        self.content.as_ref().ok().and_then(|c| c.table.as_ref())
    }

    pub fn error(&self) -> Option<&FileError> {
        self.content.as_ref().err()
    }

    pub fn is_declarative(&self) -> bool {
        self.directives.declarative_table
    }

    pub fn is_split(&self) -> bool {
        self.directives.split_statements
    }
}

/// Process one file's text. Failures are captured on the returned value,
/// never raised, so one bad file cannot stop the rest of a run.
pub fn process_file(path: &str, content: &str) -> ProcessedFile {
    let raw_hash = calculate_hash(content);

    let (directives, outcome) = match parse_directives(content) {
        Ok(directives) => (directives, process_content(content, directives)),
        Err(e) => (Directives::default(), Err(e)),
    };

    match &outcome {
        Ok(content) => debug!(
            path,
            statements = content.statements.len(),
            declarative = content.table.is_some(),
            "Processed file"
        ),
        Err(e) => debug!(path, error = %e, "File processing failed"),
    }

    ProcessedFile {
        path: path.to_string(),
        raw_hash,
        directives,
        content: outcome,
    }
}

fn process_content(content: &str, directives: Directives) -> std::result::Result<FileContent, FileError> {
    if directives.is_conflicting() {
        return Err(FileError::DirectiveConflict);
    }

    let statements = split_sql_file(content)?;
    trace!("Tokenizer produced {} statements", statements.len());

    if statements.len() > 1 && statements.iter().any(Statement::is_create_table) {
        return Err(FileError::MultiStatementTableFile {
            count: statements.len(),
        });
    }

    if directives.declarative_table {
        let statement = statements.into_iter().next().ok_or_else(|| FileError::TableParseFailure {
            message: "declarative file contains no statement".to_string(),
        })?;
        if !statement.is_create_table() {
            return Err(FileError::TableParseFailure {
                message: format!("declarative file must contain a CREATE TABLE, found {}", statement.kind()),
            });
        }
        let table = parse_create_table(statement.raw())?;
        return Ok(FileContent {
            statements: vec![statement],
            table: Some(table),
        });
    }

    if directives.split_statements {
        return Ok(FileContent {
            statements,
            table: None,
        });
    }

    // One statement for the whole file, rebuilt from the tokenized pieces
    // so manual span markers are dropped and every piece is terminated
    let Some(start_line) = statements.first().map(|s| s.start_line().unwrap_or(1)) else {
        return Ok(FileContent {
            statements: Vec::new(),
            table: None,
        });
    };
    let body = statements
        .iter()
        .map(|s| terminated(s.raw()))
        .collect::<Vec<_>>()
        .join("\n");
    Ok(FileContent {
        statements: vec![Statement::new(body).with_start_line(start_line)],
        table: None,
    })
}

/// Read and process `root/relative_path`. Only read failures are returned
/// as errors; processing failures stay on the `ProcessedFile`.
pub fn process_file_at(root: &Path, relative_path: &str) -> Result<ProcessedFile> {
    let full_path = root.join(relative_path);
    let content = fs::read_to_string(&full_path).file_context(&full_path)?;
    Ok(process_file(relative_path, &content))
}
