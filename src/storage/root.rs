//! Project root discovery and path relativization

use std::path::{Path, PathBuf};

use super::jsonl::SIGIL_DIR;

const GIT_DIR: &str = ".git";

/// Walk up from `start` to find the project root.
///
/// The upward walk runs twice: first looking for a `.sigil/` directory
/// (closest wins), then falling back to `.git`. A `.sigil/` anywhere in the
/// ancestry therefore beats a nearer `.git`. Returns None when neither
/// marker exists all the way to the filesystem root.
pub fn find_root(start: &Path) -> Option<PathBuf> {
    let start = start
        .canonicalize()
        .unwrap_or_else(|_| start.to_path_buf());

    for dir in start.ancestors() {
        if dir.join(SIGIL_DIR).is_dir() {
            return Some(dir.to_path_buf());
        }
    }

    for dir in start.ancestors() {
        if dir.join(GIT_DIR).exists() {
            return Some(dir.to_path_buf());
        }
    }

    None
}

/// Resolve `path` and express it relative to `root`.
///
/// Paths outside the root come back absolute and canonical, unchanged —
/// this never errors.
pub fn relative_path(path: &Path, root: &Path) -> String {
    let abs = canonical_or_absolute(path);
    let root_abs = canonical_or_absolute(root);

    match abs.strip_prefix(&root_abs) {
        Ok(rel) => rel.to_string_lossy().into_owned(),
        Err(_) => abs.to_string_lossy().into_owned(),
    }
}

fn canonical_or_absolute(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_default()
            .join(path)
    }
}
