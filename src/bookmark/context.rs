//! Context: the 3-line window around a bookmarked position

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during context extraction
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Line {line} out of range (file has {count} lines)")]
    OutOfRange { line: usize, count: usize },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for context extraction
pub type ContextResult<T> = Result<T, ContextError>;

/// The raw text of a bookmarked line and its immediate neighbors.
///
/// `before` and `after` are empty only at true file boundaries — an empty
/// string never stands in for "unknown."
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    /// Line above the target (empty at the first line)
    pub before: String,
    /// The bookmarked line itself
    pub target: String,
    /// Line below the target (empty at the last line)
    pub after: String,
}

/// Extract the target line and its surrounding context from a file.
///
/// `line` is 1-based and must lie within the file; out-of-range requests
/// report the file's actual line count.
pub fn extract_context(path: &Path, line: usize) -> ContextResult<Context> {
    if !path.exists() {
        return Err(ContextError::FileNotFound(path.to_path_buf()));
    }

    let lines = read_file_lines(path)?;

    if line < 1 || line > lines.len() {
        return Err(ContextError::OutOfRange {
            line,
            count: lines.len(),
        });
    }

    let idx = line - 1;
    Ok(Context {
        before: if idx > 0 {
            lines[idx - 1].clone()
        } else {
            String::new()
        },
        target: lines[idx].clone(),
        after: if idx + 1 < lines.len() {
            lines[idx + 1].clone()
        } else {
            String::new()
        },
    })
}

/// Read all lines from a file. A missing file reads as no lines.
pub fn read_file_lines(path: &Path) -> io::Result<Vec<String>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = fs::read_to_string(path)?;
    Ok(content.lines().map(str::to_string).collect())
}
