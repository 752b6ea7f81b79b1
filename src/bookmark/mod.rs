//! Bookmark data model and context capture

mod context;
mod mark;

pub use context::{extract_context, read_file_lines, Context, ContextError, ContextResult};
pub use mark::{generate_id, now_iso, Bookmark, Metadata, Status, Validation};
