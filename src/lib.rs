//! Declarative schema migrations for PostgreSQL.
//!
//! Source files hold the desired schema. Each run splits them into
//! statements, compares their hashes and table structures against the last
//! snapshot, and writes a migration with only what changed: whole statements
//! for ordinary files, `ALTER TABLE` steps for files marked
//! `-- sqlsync: declarativeTable=true`.

pub mod analysis;
#[cfg(feature = "cli")]
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod output;
pub mod processor;
pub mod scanner;
pub mod sql;
pub mod state;

pub use analysis::{diff_tables, synthesize_migration, AlterKind, AlterOperation, Migration};
pub use config::{Section, SqlsyncConfig};
pub use error::{FileError, Result, SqlsyncError};
pub use output::{LibraryOutputHandler, OutputHandler, SilentOutputHandler};
pub use processor::{process_file, process_file_at, FileContent, ProcessedFile};
pub use sql::{split_sql_file, parse_create_table, Statement, StatementKind, TableDefinition, ColumnDefinition};
pub use state::{diff_state, FileChange, Modification, Snapshot, StateDiff, StateFile, StateStore};
