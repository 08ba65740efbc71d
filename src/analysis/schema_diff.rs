use std::collections::{HashMap, HashSet};
use std::fmt;

use tracing::debug;

use crate::analysis::rename::match_renames;
use crate::sql::table::{quote_ident, ColumnDefinition, TableDefinition};

/// Attribute of a column that changed between two definitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnChange {
    Type,
    Nullability,
    Default,
    PrimaryKey,
    Unique,
    ForeignKey,
    Check,
}

impl fmt::Display for ColumnChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ColumnChange::Type => "type",
            ColumnChange::Nullability => "nullability",
            ColumnChange::Default => "default",
            ColumnChange::PrimaryKey => "primary key",
            ColumnChange::Unique => "unique",
            ColumnChange::ForeignKey => "foreign key",
            ColumnChange::Check => "check",
        };
        write!(f, "{}", label)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AlterKind {
    AddColumn {
        column: String,
    },
    DropColumn {
        column: String,
    },
    ModifyColumn {
        column: String,
        changes: Vec<ColumnChange>,
    },
    RenameColumn {
        from: String,
        to: String,
        confidence: f64,
        requires_confirmation: bool,
    },
}

/// One schema-evolution step and the SQL that performs it
#[derive(Debug, Clone, PartialEq)]
pub struct AlterOperation {
    pub kind: AlterKind,
    pub sql: Vec<String>,
}

impl AlterOperation {
    pub fn requires_confirmation(&self) -> bool {
        matches!(
            self.kind,
            AlterKind::RenameColumn {
                requires_confirmation: true,
                ..
            }
        )
    }

    /// Short human description, e.g. `rename user_name -> username`
    pub fn describe(&self) -> String {
        match &self.kind {
            AlterKind::AddColumn { column } => format!("add column {}", column),
            AlterKind::DropColumn { column } => format!("drop column {}", column),
            AlterKind::ModifyColumn { column, changes } => {
                let changes: Vec<String> = changes.iter().map(ToString::to_string).collect();
                format!("modify column {} ({})", column, changes.join(", "))
            }
            AlterKind::RenameColumn { from, to, confidence, .. } => {
                format!("rename column {} -> {} (confidence {:.2})", from, to, confidence)
            }
        }
    }
}

fn explicit_unique(column: &ColumnDefinition) -> bool {
    column.is_unique() && !column.is_primary_key()
}

fn column_changes(old: &ColumnDefinition, new: &ColumnDefinition) -> Vec<ColumnChange> {
    let mut changes = Vec::new();
    if old.data_type() != new.data_type() {
        changes.push(ColumnChange::Type);
    }
    if old.is_nullable() != new.is_nullable() {
        changes.push(ColumnChange::Nullability);
    }
    if old.default() != new.default() {
        changes.push(ColumnChange::Default);
    }
    if old.is_primary_key() != new.is_primary_key() {
        changes.push(ColumnChange::PrimaryKey);
    }
    if explicit_unique(old) != explicit_unique(new) {
        changes.push(ColumnChange::Unique);
    }
    if old.foreign_key() != new.foreign_key() {
        changes.push(ColumnChange::ForeignKey);
    }
    if old.check() != new.check() {
        changes.push(ColumnChange::Check);
    }
    changes
}

/// SQL builder bound to one target table
struct AlterBuilder<'a> {
    table: &'a TableDefinition,
    table_sql: String,
    /// The table's key columns differ, so the key is rebuilt around the column work
    primary_key_changed: bool,
    primary_key_dropped: bool,
}

impl<'a> AlterBuilder<'a> {
    fn new(table: &'a TableDefinition, primary_key_changed: bool) -> Self {
        Self {
            table,
            table_sql: table.sql_name(),
            primary_key_changed,
            primary_key_dropped: false,
        }
    }

    fn constraint_name(&self, column: &str, suffix: &str) -> String {
        quote_ident(&format!("{}_{}_{}", self.table.name(), column, suffix))
    }

    fn primary_key_name(&self) -> String {
        quote_ident(&format!("{}_pkey", self.table.name()))
    }

    fn alter(&self, clause: String) -> String {
        format!("ALTER TABLE {} {};", self.table_sql, clause)
    }

    /// Drop the old key ahead of the first statement that could conflict with it
    fn drop_primary_key(&mut self, sql: &mut Vec<String>) {
        if self.primary_key_changed && !self.primary_key_dropped {
            self.primary_key_dropped = true;
            sql.push(self.alter(format!("DROP CONSTRAINT IF EXISTS {}", self.primary_key_name())));
        }
    }

    fn add_primary_key(&self) -> Option<String> {
        let key_columns: Vec<String> = self
            .table
            .primary_key_columns()
            .into_iter()
            .map(quote_ident)
            .collect();
        if !self.primary_key_changed || key_columns.is_empty() {
            return None;
        }
        Some(self.alter(format!(
            "ADD CONSTRAINT {} PRIMARY KEY ({})",
            self.primary_key_name(),
            key_columns.join(", ")
        )))
    }

    fn add_column(&mut self, column: &ColumnDefinition) -> Vec<String> {
        let mut sql = Vec::new();
        if self.primary_key_changed && column.is_primary_key() {
            self.drop_primary_key(&mut sql);
            sql.push(self.alter(format!("ADD COLUMN {}", column.without_primary_key().to_sql())));
        } else {
            sql.push(self.alter(format!("ADD COLUMN {}", column.to_sql())));
        }
        sql
    }

    /// Constraint drops first, then type, nullability and default, then
    /// constraint adds. The primary key itself is re-added by the caller
    /// once every column is in place.
    fn modify(&mut self, old: &ColumnDefinition, new: &ColumnDefinition, changes: &[ColumnChange]) -> Vec<String> {
        let column = quote_ident(new.name());
        let mut drops = Vec::new();
        let mut steps = Vec::new();
        let mut adds = Vec::new();

        for change in changes {
            let (suffix, definition) = match change {
                ColumnChange::Type => {
                    steps.push(self.alter(format!(
                        "ALTER COLUMN {col} TYPE {ty} USING {col}::{ty}",
                        col = column,
                        ty = new.data_type()
                    )));
                    continue;
                }
                ColumnChange::Nullability => {
                    let action = if new.is_nullable() { "DROP" } else { "SET" };
                    steps.push(self.alter(format!("ALTER COLUMN {} {} NOT NULL", column, action)));
                    continue;
                }
                ColumnChange::Default => {
                    steps.push(match new.default() {
                        Some(default) => self.alter(format!("ALTER COLUMN {} SET DEFAULT {}", column, default)),
                        None => self.alter(format!("ALTER COLUMN {} DROP DEFAULT", column)),
                    });
                    continue;
                }
                ColumnChange::PrimaryKey => {
                    self.drop_primary_key(&mut drops);
                    continue;
                }
                ColumnChange::Unique => ("key", explicit_unique(new).then(|| format!("UNIQUE ({})", column))),
                ColumnChange::ForeignKey => (
                    "fkey",
                    new.foreign_key()
                        .map(|fk| format!("FOREIGN KEY ({}) {}", column, fk.to_sql())),
                ),
                ColumnChange::Check => ("check", new.check().map(|check| format!("CHECK ({})", check))),
            };

            drops.push(self.alter(format!(
                "DROP CONSTRAINT IF EXISTS {}",
                self.constraint_name(old.name(), suffix)
            )));
            if let Some(definition) = definition {
                adds.push(self.alter(format!(
                    "ADD CONSTRAINT {} {}",
                    self.constraint_name(new.name(), suffix),
                    definition
                )));
            }
        }

        drops.extend(steps);
        drops.extend(adds);
        drops
    }
}

/// Structural diff of two definitions of the same table.
///
/// Operations come out as renames (each followed by its modification),
/// then additions, drops, and modifications of same-name columns in new
/// column order. A changed primary key is dropped by the first statement
/// that touches it and re-added by the last one.
pub fn diff_tables(old: &TableDefinition, new: &TableDefinition) -> Vec<AlterOperation> {
    let old_names: HashSet<&str> = old.columns().iter().map(|c| c.name()).collect();
    let new_names: HashSet<&str> = new.columns().iter().map(|c| c.name()).collect();

    let removed: Vec<(usize, &ColumnDefinition)> = old
        .columns()
        .iter()
        .enumerate()
        .filter(|(_, c)| !new_names.contains(c.name()))
        .collect();
    let added: Vec<(usize, &ColumnDefinition)> = new
        .columns()
        .iter()
        .enumerate()
        .filter(|(_, c)| !old_names.contains(c.name()))
        .collect();

    let renames = match_renames(&removed, &added);
    let renamed_old: HashSet<usize> = renames.iter().map(|r| r.old_index).collect();
    let renamed_new: HashMap<usize, usize> = renames.iter().map(|r| (r.new_index, r.old_index)).collect();

    // Old key columns under their new names
    let renamed_to: HashMap<&str, &str> = renames
        .iter()
        .map(|r| (old.columns()[r.old_index].name(), new.columns()[r.new_index].name()))
        .collect();
    let old_key: Vec<&str> = old
        .primary_key_columns()
        .into_iter()
        .map(|name| renamed_to.get(name).copied().unwrap_or(name))
        .collect();
    let primary_key_changed = old_key != new.primary_key_columns();

    let mut builder = AlterBuilder::new(new, primary_key_changed);
    let mut operations: Vec<AlterOperation> = Vec::new();
    let mut last_key_operation = None;

    for rename in &renames {
        let old_column = &old.columns()[rename.old_index];
        let new_column = &new.columns()[rename.new_index];
        debug!(
            table = %new.qualified_name(),
            from = old_column.name(),
            to = new_column.name(),
            score = rename.score,
            "Detected column rename"
        );

        operations.push(AlterOperation {
            kind: AlterKind::RenameColumn {
                from: old_column.name().to_string(),
                to: new_column.name().to_string(),
                confidence: rename.score,
                requires_confirmation: rename.requires_confirmation(),
            },
            sql: vec![builder.alter(format!(
                "RENAME COLUMN {} TO {}",
                quote_ident(old_column.name()),
                quote_ident(new_column.name())
            ))],
        });

        let changes = column_changes(old_column, new_column);
        if !changes.is_empty() {
            let sql = builder.modify(old_column, new_column, &changes);
            if changes.contains(&ColumnChange::PrimaryKey) {
                last_key_operation = Some(operations.len());
            }
            operations.push(AlterOperation {
                kind: AlterKind::ModifyColumn {
                    column: new_column.name().to_string(),
                    changes,
                },
                sql,
            });
        }
    }

    for &(index, column) in &added {
        if renamed_new.contains_key(&index) {
            continue;
        }
        if column.is_primary_key() {
            last_key_operation = Some(operations.len());
        }
        let sql = builder.add_column(column);
        operations.push(AlterOperation {
            kind: AlterKind::AddColumn {
                column: column.name().to_string(),
            },
            sql,
        });
    }

    for &(index, column) in &removed {
        if renamed_old.contains(&index) {
            continue;
        }
        let mut sql = Vec::new();
        if column.is_primary_key() {
            builder.drop_primary_key(&mut sql);
            last_key_operation = Some(operations.len());
        }
        sql.push(builder.alter(format!("DROP COLUMN {}", quote_ident(column.name()))));
        operations.push(AlterOperation {
            kind: AlterKind::DropColumn {
                column: column.name().to_string(),
            },
            sql,
        });
    }

    for new_column in new.columns() {
        let Some(old_column) = old.column(new_column.name()) else {
            continue;
        };
        let changes = column_changes(old_column, new_column);
        if changes.is_empty() {
            continue;
        }
        let sql = builder.modify(old_column, new_column, &changes);
        if sql.is_empty() {
            continue;
        }
        if changes.contains(&ColumnChange::PrimaryKey) {
            last_key_operation = Some(operations.len());
        }
        operations.push(AlterOperation {
            kind: AlterKind::ModifyColumn {
                column: new_column.name().to_string(),
                changes,
            },
            sql,
        });
    }

    if let (Some(index), Some(add_key)) = (last_key_operation, builder.add_primary_key()) {
        operations[index].sql.push(add_key);
    }

    operations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::table::parse_create_table;

    fn table(sql: &str) -> TableDefinition {
        parse_create_table(sql).unwrap()
    }

    #[test]
    fn test_identical_tables_produce_nothing() {
        let sql = "CREATE TABLE users (id serial PRIMARY KEY, email text NOT NULL UNIQUE)";
        assert!(diff_tables(&table(sql), &table(sql)).is_empty());
    }

    #[test]
    fn test_add_column() {
        let ops = diff_tables(
            &table("CREATE TABLE users (id int)"),
            &table("CREATE TABLE users (id int, created_at timestamptz NOT NULL DEFAULT now())"),
        );
        assert_eq!(ops.len(), 1);
        assert_eq!(
            ops[0].kind,
            AlterKind::AddColumn {
                column: "created_at".to_string()
            }
        );
        assert_eq!(
            ops[0].sql,
            vec!["ALTER TABLE public.users ADD COLUMN created_at TIMESTAMPTZ NOT NULL DEFAULT now();"]
        );
    }

    #[test]
    fn test_drop_column() {
        let ops = diff_tables(
            &table("CREATE TABLE users (id int, legacy_flag boolean)"),
            &table("CREATE TABLE users (id int)"),
        );
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].sql, vec!["ALTER TABLE public.users DROP COLUMN legacy_flag;"]);
    }

    #[test]
    fn test_rename_detected() {
        let ops = diff_tables(
            &table("CREATE TABLE users (id int, user_name text NOT NULL)"),
            &table("CREATE TABLE users (id int, username text NOT NULL)"),
        );
        assert_eq!(ops.len(), 1);
        match &ops[0].kind {
            AlterKind::RenameColumn {
                from,
                to,
                requires_confirmation,
                ..
            } => {
                assert_eq!(from, "user_name");
                assert_eq!(to, "username");
                assert!(!requires_confirmation);
            }
            other => panic!("expected rename, got {:?}", other),
        }
        assert_eq!(ops[0].sql, vec!["ALTER TABLE public.users RENAME COLUMN user_name TO username;"]);
    }

    #[test]
    fn test_unrelated_replacement_is_drop_and_add() {
        let ops = diff_tables(
            &table("CREATE TABLE items (id int, price numeric(10,2) NOT NULL DEFAULT 0)"),
            &table("CREATE TABLE items (id int, cost text DEFAULT 'free')"),
        );
        let kinds: Vec<&AlterKind> = ops.iter().map(|op| &op.kind).collect();
        assert_eq!(
            kinds,
            vec![
                &AlterKind::AddColumn {
                    column: "cost".to_string()
                },
                &AlterKind::DropColumn {
                    column: "price".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_rename_with_residual_changes_is_followed_by_modify() {
        let ops = diff_tables(
            &table("CREATE TABLE users (id int, user_name varchar(50))"),
            &table("CREATE TABLE users (id int, username varchar(100))"),
        );
        assert_eq!(ops.len(), 2);
        assert!(matches!(ops[0].kind, AlterKind::RenameColumn { .. }));
        assert_eq!(
            ops[1].kind,
            AlterKind::ModifyColumn {
                column: "username".to_string(),
                changes: vec![ColumnChange::Type]
            }
        );
        assert_eq!(
            ops[1].sql,
            vec!["ALTER TABLE public.users ALTER COLUMN username TYPE VARCHAR(100) USING username::VARCHAR(100);"]
        );
    }

    #[test]
    fn test_modify_attributes() {
        let ops = diff_tables(
            &table("CREATE TABLE users (id int, email text, status text DEFAULT 'new')"),
            &table("CREATE TABLE users (id int, email text NOT NULL UNIQUE, status text)"),
        );
        assert_eq!(ops.len(), 2);
        assert_eq!(
            ops[0].sql,
            vec![
                "ALTER TABLE public.users DROP CONSTRAINT IF EXISTS users_email_key;",
                "ALTER TABLE public.users ALTER COLUMN email SET NOT NULL;",
                "ALTER TABLE public.users ADD CONSTRAINT users_email_key UNIQUE (email);",
            ]
        );
        assert_eq!(ops[1].sql, vec!["ALTER TABLE public.users ALTER COLUMN status DROP DEFAULT;"]);
    }

    #[test]
    fn test_foreign_key_and_check_changes() {
        let ops = diff_tables(
            &table("CREATE TABLE orders (id int, user_id int, qty int)"),
            &table("CREATE TABLE orders (id int, user_id int REFERENCES users (id) ON DELETE CASCADE, qty int CHECK (qty > 0))"),
        );
        assert_eq!(ops.len(), 2);
        assert_eq!(
            ops[0].sql[1],
            "ALTER TABLE public.orders ADD CONSTRAINT orders_user_id_fkey FOREIGN KEY (user_id) REFERENCES users (id) ON DELETE CASCADE;"
        );
        assert_eq!(
            ops[1].sql[1],
            "ALTER TABLE public.orders ADD CONSTRAINT orders_qty_check CHECK (qty > 0);"
        );
    }

    #[test]
    fn test_composite_primary_key_emitted_once() {
        let ops = diff_tables(
            &table("CREATE TABLE m (user_id int NOT NULL, group_id int NOT NULL)"),
            &table("CREATE TABLE m (user_id int, group_id int, PRIMARY KEY (user_id, group_id))"),
        );

        let pk_statements: Vec<&String> = ops
            .iter()
            .flat_map(|op| op.sql.iter())
            .filter(|sql| sql.contains("m_pkey"))
            .collect();
        assert_eq!(
            pk_statements,
            vec![
                "ALTER TABLE public.m DROP CONSTRAINT IF EXISTS m_pkey;",
                "ALTER TABLE public.m ADD CONSTRAINT m_pkey PRIMARY KEY (user_id, group_id);",
            ]
        );
    }

    #[test]
    fn test_removed_primary_key_dropped_before_nullability() {
        let ops = diff_tables(
            &table("CREATE TABLE t (id int PRIMARY KEY, name text)"),
            &table("CREATE TABLE t (id int, name text)"),
        );
        assert_eq!(ops.len(), 1);
        assert_eq!(
            ops[0].sql,
            vec![
                "ALTER TABLE public.t DROP CONSTRAINT IF EXISTS t_pkey;",
                "ALTER TABLE public.t ALTER COLUMN id DROP NOT NULL;",
            ]
        );
    }

    #[test]
    fn test_key_moved_to_new_column() {
        let ops = diff_tables(
            &table("CREATE TABLE t (code text PRIMARY KEY)"),
            &table("CREATE TABLE t (id bigint PRIMARY KEY, code text NOT NULL)"),
        );
        let sql: Vec<&str> = ops.iter().flat_map(|op| op.sql.iter()).map(String::as_str).collect();
        assert_eq!(
            sql,
            vec![
                "ALTER TABLE public.t DROP CONSTRAINT IF EXISTS t_pkey;",
                "ALTER TABLE public.t ADD COLUMN id BIGINT NOT NULL;",
                "ALTER TABLE public.t ADD CONSTRAINT t_pkey PRIMARY KEY (id);",
            ]
        );
    }

    #[test]
    fn test_renamed_key_column_keeps_constraint() {
        let ops = diff_tables(
            &table("CREATE TABLE t (user_id int PRIMARY KEY, note text)"),
            &table("CREATE TABLE t (userid int PRIMARY KEY, note text)"),
        );
        assert!(ops.iter().flat_map(|op| op.sql.iter()).all(|sql| !sql.contains("t_pkey")));
    }

    #[test]
    fn test_operation_order() {
        let ops = diff_tables(
            &table("CREATE TABLE t (id int, user_name text, obsolete_blob bytea NOT NULL DEFAULT '', note text)"),
            &table("CREATE TABLE t (id bigint, username text, note text NOT NULL, created_at date)"),
        );
        let kinds: Vec<&str> = ops
            .iter()
            .map(|op| match op.kind {
                AlterKind::RenameColumn { .. } => "rename",
                AlterKind::AddColumn { .. } => "add",
                AlterKind::DropColumn { .. } => "drop",
                AlterKind::ModifyColumn { .. } => "modify",
            })
            .collect();
        assert_eq!(kinds, vec!["rename", "add", "drop", "modify", "modify"]);
    }
}
