use std::collections::HashSet;
use std::fs;
use std::path::Path;

use tracing::{debug, trace};

use crate::config::Section;
use crate::error::{ErrorContext, Result, SqlsyncError};
use crate::processor::{process_file_at, ProcessedFile};

/// A discovered source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub section: String,
    /// Relative to the project root, `/`-separated
    pub path: String,
}

/// Find every `.sql` file under each section, sorted within a section.
/// Sections are visited in order; a path reachable from two sections is
/// reported once, under the first.
pub fn scan_sections(root: &Path, sections: &[Section]) -> Result<Vec<SourceFile>> {
    let mut files = Vec::new();
    let mut seen = HashSet::new();

    for section in sections {
        let dir = root.join(&section.path);
        if !dir.is_dir() {
            return Err(SqlsyncError::DirectoryNotFound(dir));
        }

        let mut found = Vec::new();
        scan_directory_recursive(root, &dir, &mut found)?;
        found.sort();
        debug!(section = %section.name, files = found.len(), "Scanned section");

        for path in found {
            if seen.insert(path.clone()) {
                files.push(SourceFile {
                    section: section.name.clone(),
                    path,
                });
            }
        }
    }

    Ok(files)
}

fn scan_directory_recursive(root: &Path, dir: &Path, found: &mut Vec<String>) -> Result<()> {
    let entries = fs::read_dir(dir).file_context(dir)?;

    for entry in entries {
        let path = entry.file_context(dir)?.path();

        if path.is_dir() {
            scan_directory_recursive(root, &path, found)?;
        } else if path.extension().and_then(|s| s.to_str()) == Some("sql") {
            found.push(relative_path(root, &path));
        } else {
            trace!("Skipping non-SQL file {}", path.display());
        }
    }

    Ok(())
}

fn relative_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Scan and process every source file. Read failures abort; processing
/// failures are kept on each `ProcessedFile`.
pub fn scan_and_process(root: &Path, sections: &[Section]) -> Result<Vec<ProcessedFile>> {
    scan_sections(root, sections)?
        .iter()
        .map(|source| process_file_at(root, &source.path))
        .collect()
}
