//! Sigil: context-aware line bookmarks
//!
//! Sigil attaches persistent bookmarks to specific lines of source files and
//! re-locates them after the file drifts. Each bookmark carries a 3-line
//! context snapshot (before/target/after) captured at creation; the
//! reconciliation engine uses that snapshot to decide whether the bookmark is
//! still valid, where its line has moved to, or that it is unrecoverable.
//!
//! # Core Concepts
//!
//! - **Bookmark**: a pointer to one line of one file, with captured context
//! - **Context**: the 3-line window used to confirm a relocated line
//! - **Reconciliation**: the layered search that resolves drift
//!
//! # Example
//!
//! ```
//! use sigil::{reconcile_lines, Bookmark, Context, Status};
//!
//! let context = Context {
//!     before: "fn main() {".to_string(),
//!     target: "    let x = 1;".to_string(),
//!     after: "}".to_string(),
//! };
//! let bookmark = Bookmark::new("src/main.rs", 2, context);
//!
//! let lines: Vec<String> = ["fn main() {", "    let x = 1;", "}"]
//!     .iter()
//!     .map(|s| s.to_string())
//!     .collect();
//! let result = reconcile_lines(&bookmark, &lines);
//! assert_eq!(result.new_status, Status::Valid);
//! ```

pub mod bookmark;
pub mod reconcile;
pub mod storage;

pub use bookmark::{
    extract_context, generate_id, now_iso, read_file_lines, Bookmark, Context, ContextError,
    ContextResult, Metadata, Status, Validation,
};
pub use reconcile::{apply_result, reconcile, reconcile_lines, ValidationResult};
pub use storage::{
    ensure_storage, find_root, load_bookmarks, relative_path, save_bookmarks, StorageError,
    StorageResult,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
