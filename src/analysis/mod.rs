pub mod rename;
pub mod schema_diff;
pub mod synthesizer;

pub use rename::{match_renames, rename_score, RenameMatch, CONFIRMATION_THRESHOLD, RENAME_THRESHOLD};
pub use schema_diff::{diff_tables, AlterKind, AlterOperation, ColumnChange};
pub use synthesizer::{is_effectively_empty, synthesize_migration, Migration, PendingConfirmation};
