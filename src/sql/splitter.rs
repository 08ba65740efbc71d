//! Statement boundary detection for SQL source files.
//!
//! This is a narrow scanner, not a parser: it only knows enough about
//! PostgreSQL lexical structure (string literals, quoted identifiers,
//! dollar-quoted bodies and comments) to decide where a `;` really ends a
//! statement.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::trace;

use crate::error::{calculate_line_column, SplitError};
use crate::sql::objects::Statement;

/// Lexical class of a single character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CharClass {
    /// Plain SQL text where `;`, parentheses and commas are significant
    Code,
    /// Inside (or delimiting) a string, quoted identifier or dollar block
    Quoted,
    /// Inside a line or block comment
    Comment,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ScanMode {
    Normal,
    SingleQuote { backslash_escapes: bool },
    QuotedIdent,
    DollarQuote(Vec<char>),
    LineComment,
    BlockComment(usize),
}

impl ScanMode {
    fn describe(&self) -> Option<&'static str> {
        match self {
            ScanMode::Normal | ScanMode::LineComment => None,
            ScanMode::SingleQuote { .. } => Some("string literal"),
            ScanMode::QuotedIdent => Some("quoted identifier"),
            ScanMode::DollarQuote(_) => Some("dollar-quoted block"),
            ScanMode::BlockComment(_) => Some("block comment"),
        }
    }
}

/// Every character of a text with its byte offset and lexical class.
#[derive(Debug)]
pub(crate) struct Classified {
    pub chars: Vec<(usize, char, CharClass)>,
    /// Set when input ended inside a quote, dollar block or block comment
    pub error: Option<SplitError>,
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Length in chars of a dollar-quote tag (`$$` or `$tag$`) starting at `i`.
fn dollar_tag_len(chars: &[(usize, char)], i: usize) -> Option<usize> {
    if i > 0 {
        let prev = chars[i - 1].1;
        if is_ident_char(prev) || prev == '$' {
            return None;
        }
    }

    let mut j = i + 1;
    while j < chars.len() {
        let c = chars[j].1;
        if c == '$' {
            if j > i + 1 && chars[i + 1].1.is_ascii_digit() {
                return None;
            }
            return Some(j - i + 1);
        }
        if !is_ident_char(c) {
            return None;
        }
        j += 1;
    }
    None
}

fn tag_matches(chars: &[(usize, char)], i: usize, tag: &[char]) -> bool {
    if i + tag.len() > chars.len() {
        return false;
    }
    chars[i..i + tag.len()]
        .iter()
        .zip(tag)
        .all(|(&(_, c), &t)| c == t)
}

/// Walk the text once, assigning each character a lexical class.
pub(crate) fn classify(text: &str) -> Classified {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut out = Vec::with_capacity(chars.len());
    let mut mode = ScanMode::Normal;
    let mut opened_at = 0usize;
    let mut i = 0usize;

    while i < chars.len() {
        let (pos, ch) = chars[i];
        let next = chars.get(i + 1).map(|&(_, c)| c);
        let mut consumed = 1usize;
        let mut class = CharClass::Quoted;
        let mut transition: Option<ScanMode> = None;

        match &mode {
            ScanMode::Normal => match ch {
                '-' if next == Some('-') => {
                    class = CharClass::Comment;
                    consumed = 2;
                    transition = Some(ScanMode::LineComment);
                }
                '/' if next == Some('*') => {
                    class = CharClass::Comment;
                    consumed = 2;
                    transition = Some(ScanMode::BlockComment(1));
                }
                '\'' => {
                    // E'...' strings honour backslash escapes
                    let backslash_escapes = i > 0
                        && matches!(chars[i - 1].1, 'e' | 'E')
                        && (i < 2 || !is_ident_char(chars[i - 2].1));
                    transition = Some(ScanMode::SingleQuote { backslash_escapes });
                }
                '"' => transition = Some(ScanMode::QuotedIdent),
                '$' => match dollar_tag_len(&chars, i) {
                    Some(len) => {
                        let tag = chars[i..i + len].iter().map(|&(_, c)| c).collect();
                        consumed = len;
                        transition = Some(ScanMode::DollarQuote(tag));
                    }
                    None => class = CharClass::Code,
                },
                _ => class = CharClass::Code,
            },
            ScanMode::LineComment => {
                if ch == '\n' {
                    class = CharClass::Code;
                    transition = Some(ScanMode::Normal);
                } else {
                    class = CharClass::Comment;
                }
            }
            ScanMode::BlockComment(depth) => {
                class = CharClass::Comment;
                if ch == '*' && next == Some('/') {
                    consumed = 2;
                    transition = Some(if *depth == 1 {
                        ScanMode::Normal
                    } else {
                        ScanMode::BlockComment(depth - 1)
                    });
                } else if ch == '/' && next == Some('*') {
                    consumed = 2;
                    transition = Some(ScanMode::BlockComment(depth + 1));
                }
            }
            ScanMode::SingleQuote { backslash_escapes } => {
                if *backslash_escapes && ch == '\\' && next.is_some() {
                    consumed = 2;
                } else if ch == '\'' {
                    if next == Some('\'') {
                        consumed = 2;
                    } else {
                        transition = Some(ScanMode::Normal);
                    }
                }
            }
            ScanMode::QuotedIdent => {
                if ch == '"' {
                    if next == Some('"') {
                        consumed = 2;
                    } else {
                        transition = Some(ScanMode::Normal);
                    }
                }
            }
            ScanMode::DollarQuote(tag) => {
                if ch == '$' && tag_matches(&chars, i, tag) {
                    consumed = tag.len();
                    transition = Some(ScanMode::Normal);
                }
            }
        }

        for &(p, c) in &chars[i..(i + consumed).min(chars.len())] {
            out.push((p, c, class));
        }

        if let Some(next_mode) = transition {
            if mode == ScanMode::Normal {
                opened_at = pos;
            }
            mode = next_mode;
        }
        i += consumed;
    }

    let error = mode.describe().map(|kind| SplitError::Unterminated {
        kind,
        line: calculate_line_column(text, opened_at).0,
    });

    Classified { chars: out, error }
}

static MARKER_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*--[ \t]*sqlsync:[ \t]*(startStatement|endStatement)\b[^\n]*$")
        .expect("marker regex is valid")
});

fn line_at(content: &str, offset: usize) -> usize {
    content[..offset].matches('\n').count() + 1
}

/// Split SQL file content into individual statements.
///
/// Manual `startStatement`/`endStatement` spans are honoured first; the text
/// around them goes through the semicolon scan.
pub fn split_sql_file(content: &str) -> Result<Vec<Statement>, SplitError> {
    let mut statements = Vec::new();
    let mut cursor = 0usize;
    let mut open_span: Option<(usize, usize)> = None; // (body start, marker line)

    for marker in MARKER_LINE.captures_iter(content) {
        let Some(whole) = marker.get(0) else {
            continue;
        };
        let line = line_at(content, whole.start());

        match (&marker[1], open_span) {
            ("startStatement", None) => {
                split_on_semicolons(content, cursor, whole.start(), &mut statements)?;
                open_span = Some((whole.end(), line));
            }
            ("startStatement", Some(_)) => {
                return Err(SplitError::NestedStartMarker { line });
            }
            ("endStatement", Some((body_start, _))) => {
                push_statement(content, body_start, whole.start(), &mut statements);
                open_span = None;
                cursor = whole.end();
            }
            _ => return Err(SplitError::UnmatchedEndMarker { line }),
        }
    }

    if let Some((_, line)) = open_span {
        return Err(SplitError::UnclosedStartMarker { line });
    }

    split_on_semicolons(content, cursor, content.len(), &mut statements)?;

    trace!(count = statements.len(), "split SQL content");
    Ok(statements)
}

fn split_on_semicolons(
    content: &str,
    start: usize,
    end: usize,
    statements: &mut Vec<Statement>,
) -> Result<(), SplitError> {
    let region = &content[start..end];
    let classified = classify(region);
    if let Some(err) = classified.error {
        // Report lines relative to the whole file
        return Err(match err {
            SplitError::Unterminated { kind, line } => SplitError::Unterminated {
                kind,
                line: line + line_at(content, start) - 1,
            },
            other => other,
        });
    }

    let mut segment_start = 0usize;
    for &(pos, ch, class) in &classified.chars {
        if ch == ';' && class == CharClass::Code {
            push_statement(content, start + segment_start, start + pos + 1, statements);
            segment_start = pos + 1;
        }
    }
    push_statement(content, start + segment_start, end, statements);

    Ok(())
}

fn push_statement(content: &str, start: usize, end: usize, statements: &mut Vec<Statement>) {
    let segment = &content[start..end];
    let trimmed = segment.trim();
    if trimmed.is_empty() {
        return;
    }

    let statement = Statement::new(trimmed);
    if statement.is_empty() {
        return;
    }

    let leading = segment.len() - segment.trim_start().len();
    let start_line = line_at(content, start + leading);
    statements.push(statement.with_start_line(start_line));
}
