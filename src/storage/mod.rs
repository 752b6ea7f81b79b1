//! Split persistence for bookmarks
//!
//! Metadata lives in a newline-delimited JSON file (one record per
//! bookmark); each bookmark's 3-line context snapshot lives in its own raw
//! text file keyed by id. The metadata file is the authority — a missing
//! context file degrades to an empty snapshot, never an error.

mod jsonl;
mod root;

pub use jsonl::{
    ensure_storage, load_bookmarks, save_bookmarks, StorageError, StorageResult, BOOKMARKS_FILE,
    CONTEXTS_DIR, SIGIL_DIR,
};
pub use root::{find_root, relative_path};
