//! JSONL + context-file storage
//!
//! Storage layout, relative to the project root:
//!
//! ```text
//! .sigil/
//!   bookmarks.jsonl          # one JSON object per line (metadata only)
//!   contexts/
//!     bm_1709123456_a3f5.ctx # raw context lines, no escaping
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use crate::bookmark::{Bookmark, Context, Metadata, Status, Validation};

/// Name of the storage marker directory
pub const SIGIL_DIR: &str = ".sigil";
/// Metadata file inside the storage directory
pub const BOOKMARKS_FILE: &str = "bookmarks.jsonl";
/// Directory of per-bookmark context snapshots
pub const CONTEXTS_DIR: &str = "contexts";

// Context files mark the target line with >>> and indent neighbors 4 spaces
const TARGET_MARKER: &str = ">>> ";
const NEIGHBOR_PREFIX: &str = "    ";

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// One metadata record, as stored on a JSONL line.
///
/// Missing optional fields default on read, so records written by older or
/// newer versions still load.
#[derive(Debug, Serialize, Deserialize)]
struct Record {
    id: String,
    file: String,
    line: usize,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    desc: String,
    #[serde(default)]
    status: Status,
    #[serde(default)]
    created: String,
    #[serde(default)]
    accessed: String,
    #[serde(default)]
    checked: String,
}

impl Record {
    fn from_bookmark(bm: &Bookmark) -> Self {
        Self {
            id: bm.id.clone(),
            file: bm.file.clone(),
            line: bm.line,
            tags: bm.metadata.tags.clone(),
            desc: bm.metadata.description.clone(),
            status: bm.validation.status,
            created: bm.metadata.created.clone(),
            accessed: bm.metadata.accessed.clone(),
            checked: bm.validation.last_checked.clone(),
        }
    }

    fn into_bookmark(self, context: Context) -> Bookmark {
        Bookmark {
            id: self.id,
            file: self.file,
            line: self.line,
            context,
            metadata: Metadata {
                tags: self.tags,
                description: self.desc,
                created: self.created,
                accessed: self.accessed,
            },
            validation: Validation {
                status: self.status,
                last_checked: self.checked,
            },
        }
    }
}

/// Ensure the `.sigil/` directory structure exists under `root`.
///
/// Idempotent; safe to call on every invocation. Returns the storage
/// directory path.
pub fn ensure_storage(root: &Path) -> StorageResult<PathBuf> {
    let sigil_dir = root.join(SIGIL_DIR);
    fs::create_dir_all(sigil_dir.join(CONTEXTS_DIR))?;

    let bookmarks_path = sigil_dir.join(BOOKMARKS_FILE);
    if !bookmarks_path.exists() {
        fs::write(&bookmarks_path, "")?;
    }

    Ok(sigil_dir)
}

/// Load all bookmarks from the metadata file plus their context snapshots.
///
/// Returns bookmarks in metadata-file order (insertion order). Blank lines
/// are skipped; a line that fails to parse is dropped with a warning rather
/// than failing the whole load.
pub fn load_bookmarks(sigil_dir: &Path) -> StorageResult<Vec<Bookmark>> {
    let bookmarks_path = sigil_dir.join(BOOKMARKS_FILE);
    let contexts_dir = sigil_dir.join(CONTEXTS_DIR);

    let mut bookmarks = Vec::new();
    for line in fs::read_to_string(&bookmarks_path)?.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let record: Record = match serde_json::from_str(line) {
            Ok(r) => r,
            Err(e) => {
                warn!("skipping malformed bookmark record: {}", e);
                continue;
            }
        };
        let context = load_context(&contexts_dir, &record.id)?;
        bookmarks.push(record.into_bookmark(context));
    }

    debug!("loaded {} bookmark(s)", bookmarks.len());
    Ok(bookmarks)
}

/// Save all bookmarks, replacing the previous set wholesale.
///
/// The metadata file is written to a temporary sibling and renamed into
/// place, so a crash mid-write leaves the old file intact. Context files are
/// then rewritten and any whose id is no longer present is deleted.
pub fn save_bookmarks(sigil_dir: &Path, bookmarks: &[Bookmark]) -> StorageResult<()> {
    let bookmarks_path = sigil_dir.join(BOOKMARKS_FILE);
    let contexts_dir = sigil_dir.join(CONTEXTS_DIR);

    let mut content = String::new();
    for bm in bookmarks {
        content.push_str(&serde_json::to_string(&Record::from_bookmark(bm))?);
        content.push('\n');
    }

    let tmp = sigil_dir.join(format!("{}.tmp", BOOKMARKS_FILE));
    fs::write(&tmp, &content)?;
    fs::rename(&tmp, &bookmarks_path)?;

    for bm in bookmarks {
        save_context(&contexts_dir, &bm.id, &bm.context)?;
    }

    remove_orphan_contexts(&contexts_dir, bookmarks)?;

    debug!("saved {} bookmark(s)", bookmarks.len());
    Ok(())
}

/// Delete context files whose bookmark no longer exists.
fn remove_orphan_contexts(contexts_dir: &Path, bookmarks: &[Bookmark]) -> StorageResult<()> {
    let current_ids: Vec<&str> = bookmarks.iter().map(|bm| bm.id.as_str()).collect();

    for entry in fs::read_dir(contexts_dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("ctx") {
            continue;
        }
        let stem = match path.file_stem().and_then(|s| s.to_str()) {
            Some(s) => s.to_string(),
            None => continue,
        };
        if !current_ids.contains(&stem.as_str()) {
            debug!("removing orphaned context file for {}", stem);
            // Already-gone is fine; another cleanup may have raced us.
            if let Err(e) = fs::remove_file(&path) {
                if e.kind() != io::ErrorKind::NotFound {
                    return Err(e.into());
                }
            }
        }
    }

    Ok(())
}

/// Write a `.ctx` file with raw context lines.
fn save_context(contexts_dir: &Path, bookmark_id: &str, context: &Context) -> StorageResult<()> {
    let mut content = String::new();
    if !context.before.is_empty() {
        content.push_str(NEIGHBOR_PREFIX);
        content.push_str(&context.before);
        content.push('\n');
    }
    content.push_str(TARGET_MARKER);
    content.push_str(&context.target);
    content.push('\n');
    if !context.after.is_empty() {
        content.push_str(NEIGHBOR_PREFIX);
        content.push_str(&context.after);
        content.push('\n');
    }

    fs::write(contexts_dir.join(format!("{}.ctx", bookmark_id)), content)?;
    Ok(())
}

/// Read a `.ctx` file back into a Context.
///
/// A missing file yields an all-empty Context — the metadata file is the
/// authority, and partial corruption must not fail the load.
fn load_context(contexts_dir: &Path, bookmark_id: &str) -> StorageResult<Context> {
    let ctx_path = contexts_dir.join(format!("{}.ctx", bookmark_id));
    if !ctx_path.exists() {
        return Ok(Context::default());
    }

    let content = fs::read_to_string(&ctx_path)?;
    let lines: Vec<&str> = content.lines().collect();

    let mut context = Context::default();
    let target_idx = lines.iter().position(|l| l.starts_with(TARGET_MARKER));

    if let Some(i) = target_idx {
        context.target = lines[i][TARGET_MARKER.len()..].to_string();
        if i > 0 {
            context.before = strip_neighbor_prefix(lines[i - 1]);
        }
        if i + 1 < lines.len() {
            context.after = strip_neighbor_prefix(lines[i + 1]);
        }
    }

    Ok(context)
}

fn strip_neighbor_prefix(line: &str) -> String {
    line.strip_prefix(NEIGHBOR_PREFIX).unwrap_or(line).to_string()
}
