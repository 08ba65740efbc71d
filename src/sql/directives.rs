//! `-- sqlsync: key=value[, ...]` directive comments.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::FileError;
use crate::sql::splitter::{classify, CharClass};

/// Per-file processing flags. Both default to false and are mutually
/// exclusive; the conflict is reported by the file processor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directives {
    pub declarative_table: bool,
    pub split_statements: bool,
}

impl Directives {
    pub fn is_conflicting(&self) -> bool {
        self.declarative_table && self.split_statements
    }
}

static DIRECTIVE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*--\s*sqlsync:\s*(.*?)\s*$").expect("directive regex is valid")
});

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

/// Collect every directive line in a file. Later lines override earlier
/// ones; statement markers are not directives and are skipped. Lines inside
/// string literals, dollar quotes or block comments are never directives.
pub fn parse_directives(content: &str) -> Result<Directives, FileError> {
    let mut directives = Directives::default();
    let classified = classify(content);
    let mut line_start = 0usize;

    for (index, raw_line) in content.split_inclusive('\n').enumerate() {
        let starts_in_code = line_start == 0
            || classified
                .chars
                .binary_search_by_key(&(line_start - 1), |c| c.0)
                .map(|found| classified.chars[found].2 == CharClass::Code)
                .unwrap_or(false);
        line_start += raw_line.len();

        let line = raw_line.trim_end_matches(['\n', '\r']);
        if !starts_in_code {
            continue;
        }
        let Some(captures) = DIRECTIVE_LINE.captures(line) else {
            continue;
        };
        let body = &captures[1];
        if body.starts_with("startStatement") || body.starts_with("endStatement") {
            continue;
        }

        for pair in body.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let Some((key, value)) = pair.split_once('=') else {
                return Err(FileError::InvalidDirective {
                    line: index + 1,
                    message: format!("expected key=value, found '{}'", pair),
                });
            };
            let key = key.trim();
            let value = value.trim();

            let target = match key {
                "declarativeTable" => &mut directives.declarative_table,
                "splitStatements" => &mut directives.split_statements,
                other => {
                    warn!(directive = other, line = index + 1, "Ignoring unknown sqlsync directive");
                    continue;
                }
            };

            *target = parse_bool(value).ok_or_else(|| FileError::InvalidDirective {
                line: index + 1,
                message: format!("{} expects a boolean, found '{}'", key, value),
            })?;
        }
    }

    Ok(directives)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_absent() {
        let directives = parse_directives("CREATE VIEW v AS SELECT 1;").unwrap();
        assert_eq!(directives, Directives::default());
    }

    #[test]
    fn test_single_directive() {
        let directives = parse_directives("-- sqlsync: declarativeTable=true\nCREATE TABLE t (id int);").unwrap();
        assert!(directives.declarative_table);
        assert!(!directives.split_statements);
    }

    #[test]
    fn test_multiple_pairs_on_one_line() {
        let directives = parse_directives("--sqlsync: declarativeTable=false, splitStatements=TRUE").unwrap();
        assert!(!directives.declarative_table);
        assert!(directives.split_statements);
    }

    #[test]
    fn test_conflict_is_detected_not_rejected() {
        let directives = parse_directives("-- sqlsync: declarativeTable=true, splitStatements=true").unwrap();
        assert!(directives.is_conflicting());
    }

    #[test]
    fn test_markers_are_not_directives() {
        let directives = parse_directives("-- sqlsync: startStatement:abc\nSELECT 1;\n-- sqlsync: endStatement:abc").unwrap();
        assert_eq!(directives, Directives::default());
    }

    #[test]
    fn test_invalid_boolean() {
        let err = parse_directives("\n-- sqlsync: splitStatements=maybe").unwrap_err();
        assert!(matches!(err, FileError::InvalidDirective { line: 2, .. }));
    }

    #[test]
    fn test_missing_equals() {
        let err = parse_directives("-- sqlsync: splitStatements").unwrap_err();
        assert!(matches!(err, FileError::InvalidDirective { line: 1, .. }));
    }

    #[test]
    fn test_quoted_text_is_not_a_directive() {
        let content = "CREATE FUNCTION f() RETURNS text AS $$\n-- sqlsync: splitStatements=true\nSELECT 'x';\n$$ LANGUAGE sql;\n\nSELECT 'a\n-- sqlsync: declarativeTable=true\n';\n/*\n-- sqlsync: splitStatements=true\n*/\n";
        assert_eq!(parse_directives(content).unwrap(), Directives::default());
    }

    #[test]
    fn test_directive_after_dollar_quote_still_applies() {
        let content = "CREATE FUNCTION f() RETURNS int AS $$ SELECT 1 $$ LANGUAGE sql;\n-- sqlsync: splitStatements=true\n";
        assert!(parse_directives(content).unwrap().split_statements);
    }

    #[test]
    fn test_unknown_key_is_ignored() {
        let directives = parse_directives("-- sqlsync: somethingElse=true, splitStatements=true").unwrap();
        assert!(directives.split_statements);
    }
}
