//! Bookmark records: identity, position, metadata, validation state

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

use super::context::Context;

/// Validation status of a bookmark
///
/// Every status can transition to any other on the next reconciliation pass;
/// none is terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Target line confirmed at the recorded (or a nearby) position
    Valid,
    /// Target line found elsewhere in the file
    Moved,
    /// Target line missing or unresolvably ambiguous
    Stale,
    /// The bookmarked file itself no longer exists
    MissingFile,
    /// Never reconciled
    #[default]
    Unknown,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Valid => "valid",
            Status::Moved => "moved",
            Status::Stale => "stale",
            Status::MissingFile => "missing_file",
            Status::Unknown => "unknown",
        }
    }

    /// Statuses that mean the bookmark needs attention
    pub fn needs_attention(&self) -> bool {
        matches!(self, Status::Stale | Status::MissingFile)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// User-facing metadata attached to a bookmark
///
/// Timestamps are ISO-8601 UTC strings at second precision; an empty string
/// means "never recorded" (tolerant-read default).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metadata {
    /// Tags, stored in the order given but matched as a set
    pub tags: Vec<String>,
    /// Free-text description
    pub description: String,
    /// When the bookmark was created
    pub created: String,
    /// When the bookmark was last viewed
    pub accessed: String,
}

/// Reconciliation bookkeeping
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Validation {
    pub status: Status,
    /// When the bookmark was last reconciled
    pub last_checked: String,
}

/// A pointer to one line of one file, with enough captured context to
/// re-locate the line after the file drifts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bookmark {
    /// Immutable identity, format `bm_<unix-seconds>_<4-hex>`
    pub id: String,
    /// Path relative to the project root
    pub file: String,
    /// 1-based line number; rewritten by successful reconciliation with
    /// `fix`, or by explicit relocation
    pub line: usize,
    /// Context captured at creation or last relocation — the ground truth
    /// the reconciliation engine matches against
    pub context: Context,
    pub metadata: Metadata,
    pub validation: Validation,
}

impl Bookmark {
    /// Create a bookmark at `file:line` with freshly captured context.
    ///
    /// Starts out `valid` with created/accessed/checked all stamped now.
    pub fn new(file: impl Into<String>, line: usize, context: Context) -> Self {
        let now = now_iso();
        Self {
            id: generate_id(),
            file: file.into(),
            line,
            context,
            metadata: Metadata {
                tags: Vec::new(),
                description: String::new(),
                created: now.clone(),
                accessed: now.clone(),
            },
            validation: Validation {
                status: Status::Valid,
                last_checked: now,
            },
        }
    }

    /// Last 8 characters of the id, for display.
    pub fn short_id(&self) -> &str {
        &self.id[self.id.len().saturating_sub(8)..]
    }
}

/// Generate a bookmark id: `bm_<unix-seconds>_<4-hex>`.
///
/// The hex suffix hashes the wall-clock second together with a
/// nanosecond-precision reading, so ids minted within the same second stay
/// distinct. Uniqueness is overwhelmingly likely, not cryptographically
/// guaranteed.
pub fn generate_id() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let ts = now.as_secs();
    let digest = Sha256::digest(format!("{}{}", ts, now.as_nanos()).as_bytes());
    format!("bm_{}_{:02x}{:02x}", ts, digest[0], digest[1])
}

/// Current UTC time as an ISO-8601 string at second precision.
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
