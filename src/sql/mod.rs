pub mod directives;
pub mod objects;
pub mod splitter;
pub mod table;

pub use directives::{parse_directives, Directives};
pub use objects::{calculate_hash, normalize_sql, strip_comments, terminated, Statement, StatementKind};
pub use splitter::split_sql_file;
pub use table::{parse_create_table, quote_ident, ColumnDefinition, ForeignKey, TableDefinition};
