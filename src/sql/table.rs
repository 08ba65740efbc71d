//! Structural decomposition of `CREATE TABLE` statements.
//!
//! There is no grammar here: the column block is cut into top-level entries
//! and each entry is read as a flat token list, which is enough to recover
//! names, types and the usual column constraints.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::TableParseError;
use crate::sql::objects::{normalize_sql, strip_comments};
use crate::sql::splitter::{classify, CharClass};

pub const DEFAULT_SCHEMA: &str = "public";

/// Foreign key target of a single column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Folded schema name, when the reference is qualified
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    /// Folded table name
    pub table: String,
    pub column: Option<String>,
    pub on_delete: Option<String>,
    pub on_update: Option<String>,
}

impl ForeignKey {
    pub fn new(table: impl Into<String>, column: Option<String>) -> Self {
        Self {
            schema: None,
            table: table.into(),
            column,
            on_delete: None,
            on_update: None,
        }
    }

    pub fn in_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn on_delete(mut self, action: impl Into<String>) -> Self {
        self.on_delete = Some(action.into());
        self
    }

    pub fn on_update(mut self, action: impl Into<String>) -> Self {
        self.on_update = Some(action.into());
        self
    }

    /// `REFERENCES ...` clause, including referential actions
    pub fn to_sql(&self) -> String {
        let target = match &self.schema {
            Some(schema) => format!("{}.{}", quote_ident(schema), quote_ident(&self.table)),
            None => quote_ident(&self.table),
        };
        let mut sql = format!("REFERENCES {}", target);
        if let Some(column) = &self.column {
            sql.push_str(&format!(" ({})", quote_ident(column)));
        }
        if let Some(action) = &self.on_delete {
            sql.push_str(&format!(" ON DELETE {}", action));
        }
        if let Some(action) = &self.on_update {
            sql.push_str(&format!(" ON UPDATE {}", action));
        }
        sql
    }
}

/// One column of a table.
///
/// Primary-key columns are always not-null and unique; every constructor
/// and the deserializer enforce this.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ColumnRecord")]
pub struct ColumnDefinition {
    name: String,
    data_type: String,
    nullable: bool,
    default: Option<String>,
    primary_key: bool,
    unique: bool,
    foreign_key: Option<ForeignKey>,
    check: Option<String>,
}

#[derive(Deserialize)]
struct ColumnRecord {
    name: String,
    data_type: String,
    nullable: bool,
    default: Option<String>,
    primary_key: bool,
    unique: bool,
    foreign_key: Option<ForeignKey>,
    check: Option<String>,
}

impl From<ColumnRecord> for ColumnDefinition {
    fn from(record: ColumnRecord) -> Self {
        ColumnDefinition {
            name: record.name,
            data_type: record.data_type,
            nullable: record.nullable,
            default: record.default,
            primary_key: record.primary_key,
            unique: record.unique,
            foreign_key: record.foreign_key,
            check: record.check,
        }
        .enforce()
    }
}

impl ColumnDefinition {
    /// A nullable column with no constraints
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: canonical_type(&data_type.into()),
            nullable: true,
            default: None,
            primary_key: false,
            unique: false,
            foreign_key: None,
            check: None,
        }
    }

    fn enforce(mut self) -> Self {
        if self.primary_key {
            self.nullable = false;
            self.unique = true;
        }
        self
    }

    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self.enforce()
    }

    pub fn not_null(self) -> Self {
        self.with_nullable(false)
    }

    pub fn with_default(mut self, expression: impl Into<String>) -> Self {
        self.default = Some(normalize_sql(&expression.into()));
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.enforce()
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn references(mut self, foreign_key: ForeignKey) -> Self {
        self.foreign_key = Some(foreign_key);
        self
    }

    pub fn with_check(mut self, expression: impl Into<String>) -> Self {
        self.check = Some(normalize_sql(&expression.into()));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> &str {
        &self.data_type
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn default(&self) -> Option<&str> {
        self.default.as_deref()
    }

    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    pub fn foreign_key(&self) -> Option<&ForeignKey> {
        self.foreign_key.as_ref()
    }

    pub fn check(&self) -> Option<&str> {
        self.check.as_deref()
    }

    /// Column definition clause as used in `ADD COLUMN`.
    ///
    /// Clause order is fixed: type, NOT NULL, DEFAULT, PRIMARY KEY, UNIQUE,
    /// REFERENCES, CHECK.
    /// Same column with the key constraint left to a table-level clause
    pub(crate) fn without_primary_key(&self) -> Self {
        Self {
            primary_key: false,
            unique: false,
            ..self.clone()
        }
    }

    pub fn to_sql(&self) -> String {
        let mut sql = format!("{} {}", quote_ident(&self.name), self.data_type);
        if !self.nullable {
            sql.push_str(" NOT NULL");
        }
        if let Some(default) = &self.default {
            sql.push_str(&format!(" DEFAULT {}", default));
        }
        if self.primary_key {
            sql.push_str(" PRIMARY KEY");
        } else if self.unique {
            sql.push_str(" UNIQUE");
        }
        if let Some(fk) = &self.foreign_key {
            sql.push(' ');
            sql.push_str(&fk.to_sql());
        }
        if let Some(check) = &self.check {
            sql.push_str(&format!(" CHECK ({})", check));
        }
        sql
    }
}

/// Structural view of one table: qualified name plus ordered columns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDefinition {
    schema: String,
    name: String,
    columns: Vec<ColumnDefinition>,
}

impl TableDefinition {
    pub fn new(schema: impl Into<String>, name: impl Into<String>, columns: Vec<ColumnDefinition>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
            columns,
        }
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[ColumnDefinition] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// `schema.table`, unquoted
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }

    /// `schema.table` quoted for use in generated SQL
    pub fn sql_name(&self) -> String {
        format!("{}.{}", quote_ident(&self.schema), quote_ident(&self.name))
    }

    pub fn primary_key_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| c.name.as_str())
            .collect()
    }
}

const RESERVED: &[&str] = &[
    "all", "analyse", "analyze", "and", "any", "array", "as", "asc", "asymmetric", "both",
    "case", "cast", "check", "collate", "column", "constraint", "create", "current_catalog",
    "current_date", "current_role", "current_time", "current_timestamp", "current_user",
    "default", "deferrable", "desc", "distinct", "do", "else", "end", "except", "false",
    "fetch", "for", "foreign", "from", "grant", "group", "having", "in", "initially",
    "intersect", "into", "lateral", "leading", "limit", "localtime", "localtimestamp", "not",
    "null", "offset", "on", "only", "or", "order", "placing", "primary", "references",
    "returning", "select", "session_user", "some", "symmetric", "table", "then", "to",
    "trailing", "true", "union", "unique", "user", "using", "variadic", "when", "where",
    "window", "with",
    // Allowed as function or type names only
    "authorization", "binary", "collation", "concurrently", "cross", "current_schema",
    "freeze", "full", "ilike", "inner", "is", "isnull", "join", "left", "like", "natural",
    "notnull", "outer", "overlaps", "right", "similar", "tablesample", "verbose",
];

static PLAIN_IDENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z_][a-z0-9_$]*$").expect("identifier regex is valid"));

/// Quote an identifier only when PostgreSQL requires it
pub fn quote_ident(name: &str) -> String {
    if PLAIN_IDENT.is_match(name) && !RESERVED.contains(&name) {
        name.to_string()
    } else {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}

/// Fold an identifier the way PostgreSQL does: quoted names keep their
/// spelling, unquoted names are lower-cased.
pub fn unquote_ident(ident: &str) -> String {
    let ident = ident.trim();
    if ident.len() >= 2 && ident.starts_with('"') && ident.ends_with('"') {
        ident[1..ident.len() - 1].replace("\"\"", "\"")
    } else {
        ident.to_lowercase()
    }
}

/// Split `a."B".c` into its folded parts
fn split_qualified(name: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in name.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                current.push(ch);
            }
            '.' if !in_quotes => {
                parts.push(std::mem::take(&mut current));
            }
            _ => current.push(ch),
        }
    }
    parts.push(current);
    parts.iter().map(|p| unquote_ident(p)).collect()
}

/// Upper-case the unquoted parts of a type name and tidy its spacing:
/// `varchar (255)` becomes `VARCHAR(255)`, `int []` becomes `INT[]`.
fn canonical_type(raw: &str) -> String {
    let classified = classify(raw);
    let mut out = String::with_capacity(raw.len());
    let mut pending_space = false;

    for &(_, ch, class) in &classified.chars {
        match class {
            CharClass::Comment => pending_space = true,
            CharClass::Code if ch.is_whitespace() => pending_space = true,
            CharClass::Code => {
                let glued = matches!(ch, '(' | ')' | '[' | ']' | ',')
                    || out.ends_with(['(', '[', ',']);
                if pending_space && !out.is_empty() && !glued {
                    out.push(' ');
                }
                pending_space = false;
                out.push(ch.to_ascii_uppercase());
            }
            CharClass::Quoted => {
                if pending_space && !out.is_empty() && !out.ends_with(['(', '[', ',']) {
                    out.push(' ');
                }
                pending_space = false;
                out.push(ch);
            }
        }
    }

    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenKind {
    Word,
    QuotedIdent,
    Literal,
    Group,
    Punct,
}

#[derive(Debug, Clone, Copy)]
struct Token {
    kind: TokenKind,
    start: usize,
    end: usize,
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$' || c == '.'
}

/// Flat token list of one column or constraint entry. Parenthesized and
/// bracketed runs become single `Group` tokens.
fn tokenize(entry: &str) -> Vec<Token> {
    let classified = classify(entry);
    let chars = &classified.chars;
    let offset_of = |j: usize| chars.get(j).map(|c| c.0).unwrap_or(entry.len());
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (start, ch, class) = chars[i];
        match class {
            CharClass::Comment => i += 1,
            CharClass::Quoted => {
                let mut j = i;
                while j < chars.len() && chars[j].2 == CharClass::Quoted {
                    j += 1;
                }
                let kind = if ch == '"' {
                    TokenKind::QuotedIdent
                } else {
                    TokenKind::Literal
                };
                tokens.push(Token { kind, start, end: offset_of(j) });
                i = j;
            }
            CharClass::Code if ch.is_whitespace() => i += 1,
            CharClass::Code if ch == '(' || ch == '[' => {
                let close = if ch == '(' { ')' } else { ']' };
                let mut depth = 0usize;
                let mut j = i;
                while j < chars.len() {
                    let (_, c, cl) = chars[j];
                    j += 1;
                    if cl != CharClass::Code {
                        continue;
                    }
                    if c == ch {
                        depth += 1;
                    } else if c == close {
                        depth -= 1;
                        if depth == 0 {
                            break;
                        }
                    }
                }
                tokens.push(Token { kind: TokenKind::Group, start, end: offset_of(j) });
                i = j;
            }
            CharClass::Code if is_word_char(ch) => {
                let mut j = i;
                while j < chars.len() && chars[j].2 == CharClass::Code && is_word_char(chars[j].1) {
                    j += 1;
                }
                tokens.push(Token { kind: TokenKind::Word, start, end: offset_of(j) });
                i = j;
            }
            CharClass::Code => {
                tokens.push(Token { kind: TokenKind::Punct, start, end: start + ch.len_utf8() });
                i += 1;
            }
        }
    }

    tokens
}

/// Split on commas that are not nested in parentheses, brackets or quotes
fn split_top_level(text: &str) -> Vec<&str> {
    let classified = classify(text);
    let mut parts = Vec::new();
    let mut paren = 0usize;
    let mut bracket = 0usize;
    let mut start = 0usize;

    for &(pos, ch, class) in &classified.chars {
        if class != CharClass::Code {
            continue;
        }
        match ch {
            '(' => paren += 1,
            ')' => paren = paren.saturating_sub(1),
            '[' => bracket += 1,
            ']' => bracket = bracket.saturating_sub(1),
            ',' if paren == 0 && bracket == 0 => {
                parts.push(&text[start..pos]);
                start = pos + 1;
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);

    parts.into_iter().map(str::trim).filter(|p| !p.is_empty()).collect()
}

const IDENT: &str = r#"(?:"(?:[^"]|"")+"|[A-Za-z_][A-Za-z0-9_$]*)"#;

static HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?is)^\s*CREATE\s+(?:(?:GLOBAL|LOCAL)\s+)?(?:(?:TEMPORARY|TEMP|UNLOGGED)\s+)?TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?(?:({ident})\s*\.\s*)?({ident})\s*\(",
        ident = IDENT
    ))
    .expect("table header regex is valid")
});

/// Byte offset of the `)` closing the `(` at `open`
fn matching_paren(text: &str, open: usize) -> Option<usize> {
    let classified = classify(text);
    let mut depth = 0usize;
    for &(pos, ch, class) in classified.chars.iter().filter(|c| c.0 >= open) {
        if class != CharClass::Code {
            continue;
        }
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(pos);
                }
            }
            _ => {}
        }
    }
    None
}

const COLUMN_CONSTRAINTS: &[&str] = &[
    "NOT", "NULL", "DEFAULT", "PRIMARY", "UNIQUE", "REFERENCES", "CHECK", "CONSTRAINT",
    "COLLATE", "GENERATED",
];

const TABLE_CONSTRAINTS: &[&str] = &[
    "CONSTRAINT", "PRIMARY", "FOREIGN", "UNIQUE", "CHECK",
];

/// View over one entry's tokens with keyword helpers
struct Entry<'a> {
    text: &'a str,
    tokens: Vec<Token>,
}

impl<'a> Entry<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            tokens: tokenize(text),
        }
    }

    fn len(&self) -> usize {
        self.tokens.len()
    }

    fn slice(&self, index: usize) -> &'a str {
        let token = self.tokens[index];
        &self.text[token.start..token.end]
    }

    fn keyword(&self, index: usize) -> Option<String> {
        self.tokens
            .get(index)
            .filter(|t| t.kind == TokenKind::Word)
            .map(|_| self.slice(index).to_ascii_uppercase())
    }

    fn is_keyword(&self, index: usize, keyword: &str) -> bool {
        self.keyword(index).as_deref() == Some(keyword)
    }

    fn is_group(&self, index: usize) -> bool {
        self.tokens.get(index).map(|t| t.kind) == Some(TokenKind::Group)
    }

    /// Text inside a group token, without the enclosing brackets
    fn group_inner(&self, index: usize) -> &'a str {
        let token = self.tokens[index];
        let inner_end = token.end.saturating_sub(1).max(token.start + 1);
        &self.text[token.start + 1..inner_end]
    }

    /// Source text spanning tokens `from..to` (exclusive)
    fn span(&self, from: usize, to: usize) -> &'a str {
        &self.text[self.tokens[from].start..self.tokens[to - 1].end]
    }

    fn is_column_constraint(&self, index: usize) -> bool {
        self.keyword(index)
            .map(|k| COLUMN_CONSTRAINTS.contains(&k.as_str()))
            .unwrap_or(false)
    }

    /// End of a DEFAULT expression starting at `from`. The first token is
    /// always part of it and keywords inside `CASE ... END` are not
    /// constraints.
    fn expression_end(&self, from: usize) -> usize {
        let mut depth = 0usize;
        let mut j = from;
        while j < self.len() {
            if j > from && depth == 0 && self.is_column_constraint(j) {
                break;
            }
            match self.keyword(j).as_deref() {
                Some("CASE") => depth += 1,
                Some("END") => depth = depth.saturating_sub(1),
                _ => {}
            }
            j += 1;
        }
        j
    }

    /// Index of the first token at or after `from` that starts a column
    /// constraint, skipping any listed as allowed
    fn next_constraint(&self, from: usize, allowed: &[&str]) -> usize {
        let mut j = from;
        while j < self.len() {
            if self.is_column_constraint(j) {
                let keyword = self.keyword(j).unwrap_or_default();
                if !allowed.contains(&keyword.as_str()) {
                    break;
                }
            }
            j += 1;
        }
        j
    }
}

fn column_list(text: &str) -> Vec<String> {
    split_top_level(text).into_iter().map(unquote_ident).collect()
}

/// Parse `REFERENCES table [(col)] [ON DELETE a] [ON UPDATE a] ...` starting
/// at the token after REFERENCES. Returns the key and the next token index.
fn parse_references(entry: &Entry<'_>, mut i: usize) -> Result<(ForeignKey, usize), TableParseError> {
    if i >= entry.len() {
        return Err(TableParseError::MalformedColumn(entry.text.to_string()));
    }

    // Adjacent tokens form the (possibly quoted, qualified) table name
    let name_start = i;
    i += 1;
    while i < entry.len()
        && entry.tokens[i].start == entry.tokens[i - 1].end
        && entry.tokens[i].kind != TokenKind::Group
    {
        i += 1;
    }
    let mut parts = split_qualified(entry.span(name_start, i));
    let table = parts
        .pop()
        .ok_or_else(|| TableParseError::MalformedColumn(entry.text.to_string()))?;
    let schema = parts.pop();

    let mut column = None;
    if entry.is_group(i) {
        column = column_list(entry.group_inner(i)).into_iter().next();
        i += 1;
    }

    let mut fk = ForeignKey::new(table, column);
    fk.schema = schema;
    loop {
        if entry.is_keyword(i, "ON") {
            let target = entry.keyword(i + 1);
            let (action, next) = referential_action(entry, i + 2);
            match target.as_deref() {
                Some("DELETE") => fk.on_delete = action,
                Some("UPDATE") => fk.on_update = action,
                _ => return Err(TableParseError::MalformedColumn(entry.text.to_string())),
            }
            i = next;
        } else if entry.is_keyword(i, "MATCH") || entry.is_keyword(i, "INITIALLY") {
            i += 2;
        } else if entry.is_keyword(i, "DEFERRABLE") {
            i += 1;
        } else if entry.is_keyword(i, "NOT") && entry.is_keyword(i + 1, "DEFERRABLE") {
            i += 2;
        } else {
            break;
        }
    }

    Ok((fk, i))
}

fn referential_action(entry: &Entry<'_>, i: usize) -> (Option<String>, usize) {
    match entry.keyword(i).as_deref() {
        Some("NO") => (Some("NO ACTION".to_string()), i + 2),
        Some("SET") => {
            let what = entry.keyword(i + 1).unwrap_or_default();
            let mut next = i + 2;
            if entry.is_group(next) {
                next += 1;
            }
            (Some(format!("SET {}", what)), next)
        }
        Some(action) => (Some(action.to_string()), i + 1),
        None => (None, i),
    }
}

/// Table-level constraints collected in the first pass
#[derive(Default)]
struct TableConstraints {
    primary_key: HashSet<String>,
    unique: HashSet<String>,
    foreign_keys: HashMap<String, ForeignKey>,
}

fn is_table_constraint(entry: &Entry<'_>) -> bool {
    match entry.keyword(0).as_deref() {
        // Not reserved words, so a column may carry either name
        Some("EXCLUDE") => entry.is_keyword(1, "USING") || entry.is_group(1),
        Some("LIKE") => {
            entry.len() >= 2
                && (entry.len() == 2 || entry.is_keyword(2, "INCLUDING") || entry.is_keyword(2, "EXCLUDING"))
        }
        Some(keyword) => TABLE_CONSTRAINTS.contains(&keyword),
        None => false,
    }
}

fn collect_table_constraint(entry: &Entry<'_>, constraints: &mut TableConstraints) -> Result<(), TableParseError> {
    let mut i = 0;
    if entry.is_keyword(0, "CONSTRAINT") {
        i = 2;
    }

    match entry.keyword(i).as_deref() {
        Some("PRIMARY") if entry.is_keyword(i + 1, "KEY") && entry.is_group(i + 2) => {
            constraints.primary_key.extend(column_list(entry.group_inner(i + 2)));
        }
        Some("UNIQUE") => {
            let group = (i + 1..entry.len()).find(|&j| entry.is_group(j));
            if let Some(group) = group {
                let columns = column_list(entry.group_inner(group));
                if columns.len() == 1 {
                    constraints.unique.extend(columns);
                } else {
                    debug!(constraint = entry.text, "Skipping multi-column UNIQUE constraint");
                }
            }
        }
        Some("FOREIGN") if entry.is_keyword(i + 1, "KEY") && entry.is_group(i + 2) => {
            let columns = column_list(entry.group_inner(i + 2));
            if !entry.is_keyword(i + 3, "REFERENCES") {
                return Err(TableParseError::MalformedColumn(entry.text.to_string()));
            }
            let (fk, _) = parse_references(entry, i + 4)?;
            if columns.len() == 1 {
                constraints.foreign_keys.insert(columns[0].clone(), fk);
            } else {
                debug!(constraint = entry.text, "Skipping multi-column FOREIGN KEY constraint");
            }
        }
        _ => trace!(constraint = entry.text, "Ignoring table-level constraint"),
    }

    Ok(())
}

fn parse_column(entry: &Entry<'_>) -> Result<ColumnDefinition, TableParseError> {
    let name = match entry.tokens.first().map(|t| t.kind) {
        Some(TokenKind::Word) | Some(TokenKind::QuotedIdent) => unquote_ident(entry.slice(0)),
        _ => return Err(TableParseError::MalformedColumn(entry.text.to_string())),
    };

    let type_end = entry.next_constraint(1, &[]);
    if type_end == 1 {
        return Err(TableParseError::MissingType(name));
    }
    let mut column = ColumnDefinition::new(name, entry.span(1, type_end));

    let mut i = type_end;
    while i < entry.len() {
        let keyword = entry.keyword(i).unwrap_or_default();
        match keyword.as_str() {
            "CONSTRAINT" => i += 2,
            "NOT" if entry.is_keyword(i + 1, "NULL") => {
                column.nullable = false;
                i += 2;
            }
            "NULL" => {
                column.nullable = true;
                i += 1;
            }
            "DEFAULT" => {
                // DEFAULT NULL is read as an expression rather than a
                // nullability clause
                if i + 1 >= entry.len() {
                    return Err(TableParseError::MalformedColumn(entry.text.to_string()));
                }
                let end = entry.expression_end(i + 1);
                let expression = normalize_sql(entry.span(i + 1, end));
                column.default = if expression.eq_ignore_ascii_case("NULL") {
                    None
                } else {
                    Some(expression)
                };
                i = end;
            }
            "PRIMARY" if entry.is_keyword(i + 1, "KEY") => {
                column.primary_key = true;
                i += 2;
            }
            "UNIQUE" => {
                column.unique = true;
                i += 1;
            }
            "REFERENCES" => {
                let (fk, next) = parse_references(entry, i + 1)?;
                column.foreign_key = Some(fk);
                i = next;
            }
            "CHECK" if entry.is_group(i + 1) => {
                column.check = Some(normalize_sql(entry.group_inner(i + 1)));
                i += 2;
            }
            "COLLATE" => i += 2,
            "GENERATED" => {
                // GENERATED BY DEFAULT AS IDENTITY contains DEFAULT
                i = entry.next_constraint(i + 1, &["DEFAULT"]);
            }
            _ => {
                trace!(token = entry.slice(i), column = %column.name, "Skipping unrecognized column token");
                i += 1;
            }
        }
    }

    Ok(column.enforce())
}

/// Parse a `CREATE TABLE` statement into its structural definition
pub fn parse_create_table(sql: &str) -> Result<TableDefinition, TableParseError> {
    let text = strip_comments(sql);
    let header = HEADER.captures(&text).ok_or(TableParseError::NotCreateTable)?;

    let schema = header
        .get(1)
        .map(|m| unquote_ident(m.as_str()))
        .unwrap_or_else(|| DEFAULT_SCHEMA.to_string());
    let name = unquote_ident(&header[2]);

    // The header is anchored at the start and ends on the opening paren
    let open = header[0].len() - 1;
    let close = matching_paren(&text, open).ok_or(TableParseError::UnbalancedParentheses)?;
    let body = &text[open + 1..close];

    let entries: Vec<Entry<'_>> = split_top_level(body).into_iter().map(Entry::new).collect();

    let mut constraints = TableConstraints::default();
    for entry in entries.iter().filter(|e| is_table_constraint(e)) {
        collect_table_constraint(entry, &mut constraints)?;
    }

    let mut columns: Vec<ColumnDefinition> = Vec::new();
    for entry in entries.iter().filter(|e| !is_table_constraint(e)) {
        let mut column = parse_column(entry)?;
        if columns.iter().any(|c| c.name == column.name) {
            return Err(TableParseError::DuplicateColumn(column.name));
        }

        if constraints.primary_key.contains(&column.name) {
            column.primary_key = true;
        }
        if constraints.unique.contains(&column.name) {
            column.unique = true;
        }
        if column.foreign_key.is_none() {
            column.foreign_key = constraints.foreign_keys.remove(&column.name);
        }
        columns.push(column.enforce());
    }

    if columns.is_empty() {
        return Err(TableParseError::NoColumns(format!("{}.{}", schema, name)));
    }

    debug!(table = %format!("{}.{}", schema, name), columns = columns.len(), "Parsed table definition");
    Ok(TableDefinition::new(schema, name, columns))
}
