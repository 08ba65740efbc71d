use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::sql::splitter::{classify, CharClass};

/// Best-effort classification of a statement by its leading keywords
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    Create,
    Alter,
    Function,
    Trigger,
    Policy,
    Unknown,
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatementKind::Create => write!(f, "CREATE"),
            StatementKind::Alter => write!(f, "ALTER"),
            StatementKind::Function => write!(f, "FUNCTION"),
            StatementKind::Trigger => write!(f, "TRIGGER"),
            StatementKind::Policy => write!(f, "POLICY"),
            StatementKind::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// One syntactically complete SQL command.
///
/// The hash covers the normalized text only, so editing comments or
/// re-indenting never changes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    raw: String,
    normalized: String,
    hash: String,
    kind: StatementKind,
    start_line: Option<usize>,
}

impl Statement {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let normalized = normalize_sql(&raw);
        let hash = calculate_hash(&normalized);
        let kind = classify_statement(&normalized);
        Self {
            raw,
            normalized,
            hash,
            kind,
            start_line: None,
        }
    }

    pub fn with_start_line(mut self, start_line: usize) -> Self {
        self.start_line = Some(start_line);
        self
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn kind(&self) -> StatementKind {
        self.kind
    }

    pub fn start_line(&self) -> Option<usize> {
        self.start_line
    }

    /// True when the statement holds nothing but comments and whitespace
    pub fn is_empty(&self) -> bool {
        self.normalized.is_empty()
    }

    pub fn is_create_table(&self) -> bool {
        CREATE_TABLE.is_match(&self.normalized)
    }
}

static CREATE_TABLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^CREATE\s+(?:(?:GLOBAL|LOCAL)\s+)?(?:(?:TEMPORARY|TEMP|UNLOGGED)\s+)?TABLE\b")
        .expect("create table regex is valid")
});

static FUNCTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^CREATE\s+(?:OR\s+REPLACE\s+)?(?:FUNCTION|PROCEDURE)\b")
        .expect("function regex is valid")
});

static TRIGGER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^CREATE\s+(?:OR\s+REPLACE\s+)?(?:CONSTRAINT\s+)?TRIGGER\b")
        .expect("trigger regex is valid")
});

static POLICY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^CREATE\s+POLICY\b").expect("policy regex is valid")
});

fn classify_statement(normalized: &str) -> StatementKind {
    let first_word = normalized
        .split(|c: char| c.is_whitespace() || c == '(')
        .next()
        .unwrap_or("")
        .to_ascii_uppercase();

    match first_word.as_str() {
        "CREATE" if FUNCTION.is_match(normalized) => StatementKind::Function,
        "CREATE" if TRIGGER.is_match(normalized) => StatementKind::Trigger,
        "CREATE" if POLICY.is_match(normalized) => StatementKind::Policy,
        "CREATE" => StatementKind::Create,
        "ALTER" => StatementKind::Alter,
        _ => StatementKind::Unknown,
    }
}

/// SHA-256 of the given text, hex encoded
pub fn calculate_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Remove line and block comments, leaving quoted text untouched
pub fn strip_comments(sql: &str) -> String {
    let classified = classify(sql);
    let mut out = String::with_capacity(sql.len());
    let mut in_comment = false;

    for &(_, ch, class) in &classified.chars {
        if class == CharClass::Comment {
            if !in_comment {
                out.push(' ');
                in_comment = true;
            }
            continue;
        }
        in_comment = false;
        out.push(ch);
    }

    out
}

/// Normalize SQL for hashing: strip comments, collapse whitespace outside
/// quotes, drop the trailing semicolon.
pub fn normalize_sql(sql: &str) -> String {
    let classified = classify(sql);
    let mut out = String::with_capacity(sql.len());
    let mut pending_space = false;

    for &(_, ch, class) in &classified.chars {
        match class {
            CharClass::Comment => pending_space = true,
            CharClass::Code if ch.is_whitespace() => pending_space = true,
            _ => {
                if pending_space && !out.is_empty() {
                    out.push(' ');
                }
                pending_space = false;
                out.push(ch);
            }
        }
    }

    out.trim_end_matches(|c: char| c == ';' || c.is_whitespace())
        .to_string()
}

/// Ensure the statement ends with a semicolon. The semicolon goes after the
/// last code character, ahead of any trailing comment.
pub fn terminated(sql: &str) -> String {
    let trimmed = sql.trim_end();
    let classified = classify(trimmed);
    let last = classified
        .chars
        .iter()
        .rev()
        .find(|&&(_, ch, class)| class != CharClass::Comment && !ch.is_whitespace());

    match last {
        None | Some(&(_, ';', CharClass::Code)) => trimmed.to_string(),
        Some(&(pos, ch, _)) => {
            let at = pos + ch.len_utf8();
            format!("{};{}", &trimmed[..at], &trimmed[at..])
        }
    }
}
