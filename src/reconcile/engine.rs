//! The layered search that re-locates a bookmark's target line.
//!
//! Four tiers, executed in strict order, stopping at the first success:
//!
//! 1. File existence gate — missing file short-circuits to `missing_file`,
//!    an empty file to `stale`.
//! 2. Exact-position check — the common no-drift case, before any scan.
//! 3. Nearby search — ±10 lines around the original position, each hit
//!    confirmed against the stored neighbor context.
//! 4. Whole-file search — a unique hit is evidence enough on its own;
//!    multiple hits are disambiguated by context or reported as ambiguous.
//!
//! The matching core is a pure function over the bookmark and a snapshot of
//! file lines, so it tests without filesystem fixtures.

use std::io;
use std::path::Path;
use tracing::debug;

use crate::bookmark::{now_iso, read_file_lines, Bookmark, Status};

/// How far the nearby search looks around the original position.
///
/// Small local edits (a few lines inserted or deleted above) are the
/// dominant drift pattern; locality is the primary signal and context the
/// confirmation.
const SEARCH_RADIUS: usize = 10;

/// Outcome of reconciling one bookmark against current file contents.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    /// Status before this pass
    pub old_status: Status,
    /// Status decided by this pass
    pub new_status: Status,
    /// Where the target line is now, when it was found at all
    pub new_line: Option<usize>,
    /// Human-readable explanation, including candidate line numbers when
    /// the search ends ambiguous
    pub message: String,
}

/// Reconcile a bookmark against its file on disk under `root`.
///
/// Only the existence gate and the read live here; everything else is
/// [`reconcile_lines`].
pub fn reconcile(bookmark: &Bookmark, root: &Path) -> io::Result<ValidationResult> {
    let path = root.join(&bookmark.file);
    if !path.exists() {
        return Ok(ValidationResult {
            old_status: bookmark.validation.status,
            new_status: Status::MissingFile,
            new_line: None,
            message: format!("File not found: {}", bookmark.file),
        });
    }

    let lines = read_file_lines(&path)?;
    let result = reconcile_lines(bookmark, &lines);
    debug!(
        "reconciled {}: {} -> {}",
        bookmark.short_id(),
        result.old_status,
        result.new_status
    );
    Ok(result)
}

/// Pure matching core: decide a bookmark's fate from a snapshot of lines.
pub fn reconcile_lines(bookmark: &Bookmark, lines: &[String]) -> ValidationResult {
    let old_status = bookmark.validation.status;
    let result = |new_status, new_line, message: String| ValidationResult {
        old_status,
        new_status,
        new_line,
        message,
    };

    if lines.is_empty() {
        return result(Status::Stale, None, "File is empty".to_string());
    }

    let target = &bookmark.context.target;
    let idx = bookmark.line.saturating_sub(1);

    // Tier 2: exact position
    if bookmark.line >= 1 && idx < lines.len() && lines[idx] == *target {
        return result(
            Status::Valid,
            Some(bookmark.line),
            "Exact match at original line".to_string(),
        );
    }

    // Tier 3: nearby, with context confirmation
    let start = idx.saturating_sub(SEARCH_RADIUS);
    let end = lines.len().min(idx + SEARCH_RADIUS + 1);
    for i in start..end {
        if lines[i] == *target && context_matches(lines, i, bookmark) {
            return result(
                Status::Valid,
                Some(i + 1),
                format!(
                    "Found nearby (moved from line {} to {})",
                    bookmark.line,
                    i + 1
                ),
            );
        }
    }

    // Tier 4: whole file
    let matches: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, line)| *line == target)
        .map(|(i, _)| i)
        .collect();

    match matches.len() {
        0 => result(
            Status::Stale,
            None,
            "Target line not found in file".to_string(),
        ),
        1 => {
            let new_line = matches[0] + 1;
            result(
                Status::Moved,
                Some(new_line),
                format!("Found at line {} (moved from {})", new_line, bookmark.line),
            )
        }
        _ => {
            for &i in &matches {
                if context_matches(lines, i, bookmark) {
                    let new_line = i + 1;
                    return result(
                        Status::Moved,
                        Some(new_line),
                        format!("Found at line {} (disambiguated by context)", new_line),
                    );
                }
            }
            let candidates: Vec<usize> = matches.iter().map(|i| i + 1).collect();
            result(
                Status::Stale,
                None,
                format!(
                    "Multiple matches at lines {:?}, context doesn't match",
                    candidates
                ),
            )
        }
    }
}

/// Permissive neighbor check for a candidate position.
///
/// Compares whichever of the stored before/after lines are non-empty; one
/// matching neighbor is adequate corroboration, and with nothing stored
/// there is nothing to contradict. Requiring both neighbors would turn
/// every one-sided edit into a spurious `stale`.
fn context_matches(lines: &[String], idx: usize, bookmark: &Bookmark) -> bool {
    let ctx = &bookmark.context;
    let mut checked = 0;
    let mut matched = 0;

    if !ctx.before.is_empty() {
        checked += 1;
        if idx > 0 && lines[idx - 1] == ctx.before {
            matched += 1;
        }
    }

    if !ctx.after.is_empty() {
        checked += 1;
        if idx + 1 < lines.len() && lines[idx + 1] == ctx.after {
            matched += 1;
        }
    }

    checked == 0 || matched > 0
}

/// Fold a reconciliation outcome back into the bookmark.
///
/// Always refreshes the status and last-checked timestamp. The line number
/// is rewritten only under `fix`, and only when it actually differs;
/// refreshing the stored context at the new position is the caller's job.
/// Returns whether the bookmark changed (status or line).
pub fn apply_result(bookmark: &mut Bookmark, result: &ValidationResult, fix: bool) -> bool {
    let mut changed = false;

    bookmark.validation.status = result.new_status;
    bookmark.validation.last_checked = now_iso();

    if fix {
        if let Some(new_line) = result.new_line {
            if new_line != bookmark.line {
                bookmark.line = new_line;
                changed = true;
            }
        }
    }

    if result.new_status != result.old_status {
        changed = true;
    }

    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bookmark::Context;
    use std::fs;

    fn lines(src: &[&str]) -> Vec<String> {
        src.iter().map(|s| s.to_string()).collect()
    }

    fn bookmark_at(line: usize, before: &str, target: &str, after: &str) -> Bookmark {
        Bookmark::new(
            "src/lib.rs",
            line,
            Context {
                before: before.to_string(),
                target: target.to_string(),
                after: after.to_string(),
            },
        )
    }

    #[test]
    fn test_exact_match_is_valid_at_original_line() {
        let file = lines(&["alpha", "beta", "gamma"]);
        let bm = bookmark_at(2, "alpha", "beta", "gamma");

        let result = reconcile_lines(&bm, &file);
        assert_eq!(result.new_status, Status::Valid);
        assert_eq!(result.new_line, Some(2));
    }

    #[test]
    fn test_empty_file_is_stale() {
        let bm = bookmark_at(1, "", "anything", "");
        let result = reconcile_lines(&bm, &[]);
        assert_eq!(result.new_status, Status::Stale);
        assert_eq!(result.message, "File is empty");
    }

    #[test]
    fn test_nearby_search_preempts_whole_file() {
        // Three lines inserted above push the target from line 2 to 5.
        let file = lines(&["x1", "x2", "x3", "alpha", "beta", "gamma"]);
        let bm = bookmark_at(2, "alpha", "beta", "gamma");

        let result = reconcile_lines(&bm, &file);
        // Tier 3 resolves this as valid, not tier 4's moved
        assert_eq!(result.new_status, Status::Valid);
        assert_eq!(result.new_line, Some(5));
        assert!(result.message.contains("nearby"));
    }

    #[test]
    fn test_nearby_hit_without_context_falls_through() {
        // A copy of the target sits 3 lines below, but its neighbors match
        // nothing we stored; the unique-match rule of tier 4 still finds it.
        let file = lines(&["alpha?", "changed", "gamma?", "other", "beta"]);
        let bm = bookmark_at(2, "alpha", "beta", "gamma");

        let result = reconcile_lines(&bm, &file);
        assert_eq!(result.new_status, Status::Moved);
        assert_eq!(result.new_line, Some(5));
    }

    #[test]
    fn test_unique_whole_file_match_is_moved() {
        let mut file = vec!["filler".to_string(); 40];
        file.push("beta".to_string());
        let bm = bookmark_at(2, "alpha", "beta", "gamma");

        let result = reconcile_lines(&bm, &file);
        assert_eq!(result.new_status, Status::Moved);
        assert_eq!(result.new_line, Some(41));
        assert!(result.message.contains("moved from 2"));
    }

    #[test]
    fn test_multiple_matches_disambiguated_by_context() {
        // Target text at lines 5 and 50; stored context matches only the
        // neighbors at 50.
        let mut file = vec!["filler".to_string(); 60];
        file[4] = "beta".to_string();
        file[48] = "alpha".to_string();
        file[49] = "beta".to_string();
        file[50] = "gamma".to_string();
        let bm = bookmark_at(25, "alpha", "beta", "gamma");

        let result = reconcile_lines(&bm, &file);
        assert_eq!(result.new_status, Status::Moved);
        assert_eq!(result.new_line, Some(50));
        assert!(result.message.contains("disambiguated"));
    }

    #[test]
    fn test_unresolvable_ambiguity_lists_candidates() {
        let mut file = vec!["filler".to_string(); 60];
        file[4] = "beta".to_string();
        file[49] = "beta".to_string();
        let bm = bookmark_at(25, "alpha", "beta", "gamma");

        let result = reconcile_lines(&bm, &file);
        assert_eq!(result.new_status, Status::Stale);
        assert_eq!(result.new_line, None);
        assert!(result.message.contains("[5, 50]"), "{}", result.message);
    }

    #[test]
    fn test_zero_matches_is_stale() {
        let file = lines(&["nothing", "here", "matches"]);
        let bm = bookmark_at(2, "alpha", "beta", "gamma");

        let result = reconcile_lines(&bm, &file);
        assert_eq!(result.new_status, Status::Stale);
        assert_eq!(result.message, "Target line not found in file");
    }

    #[test]
    fn test_one_matching_neighbor_suffices() {
        // Only the after-neighbor survives an edit above; OR semantics
        // still accept the reposition.
        let file = lines(&["edited", "beta", "gamma", "tail"]);
        let bm = bookmark_at(3, "alpha", "beta", "gamma");

        let result = reconcile_lines(&bm, &file);
        assert_eq!(result.new_status, Status::Valid);
        assert_eq!(result.new_line, Some(2));
    }

    #[test]
    fn test_empty_stored_context_needs_no_confirmation() {
        let file = lines(&["x", "beta", "y"]);
        let bm = bookmark_at(5, "", "beta", "");

        let result = reconcile_lines(&bm, &file);
        assert_eq!(result.new_status, Status::Valid);
        assert_eq!(result.new_line, Some(2));
    }

    #[test]
    fn test_line_beyond_eof_still_searches() {
        let file = lines(&["alpha", "beta", "gamma"]);
        let bm = bookmark_at(200, "alpha", "beta", "gamma");

        let result = reconcile_lines(&bm, &file);
        assert_eq!(result.new_status, Status::Moved);
        assert_eq!(result.new_line, Some(2));
    }

    #[test]
    fn test_reconcile_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let bm = bookmark_at(3, "alpha", "beta", "gamma");

        let result = reconcile(&bm, dir.path()).unwrap();
        assert_eq!(result.new_status, Status::MissingFile);
        assert_eq!(result.new_line, None);
        assert!(result.message.contains("src/lib.rs"));
    }

    #[test]
    fn test_reconcile_reads_file_from_root() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/lib.rs"), "alpha\nbeta\ngamma\n").unwrap();
        let bm = bookmark_at(2, "alpha", "beta", "gamma");

        let result = reconcile(&bm, dir.path()).unwrap();
        assert_eq!(result.new_status, Status::Valid);
        assert_eq!(result.new_line, Some(2));
    }

    #[test]
    fn test_apply_result_without_fix_keeps_line() {
        let mut bm = bookmark_at(2, "alpha", "beta", "gamma");
        let result = ValidationResult {
            old_status: Status::Valid,
            new_status: Status::Moved,
            new_line: Some(7),
            message: String::new(),
        };

        let changed = apply_result(&mut bm, &result, false);
        assert!(changed); // status changed
        assert_eq!(bm.line, 2);
        assert_eq!(bm.validation.status, Status::Moved);
        assert!(!bm.validation.last_checked.is_empty());
    }

    #[test]
    fn test_apply_result_with_fix_moves_line() {
        let mut bm = bookmark_at(2, "alpha", "beta", "gamma");
        let result = ValidationResult {
            old_status: Status::Valid,
            new_status: Status::Moved,
            new_line: Some(7),
            message: String::new(),
        };

        let changed = apply_result(&mut bm, &result, true);
        assert!(changed);
        assert_eq!(bm.line, 7);
    }

    #[test]
    fn test_apply_result_unchanged_reports_false() {
        let mut bm = bookmark_at(2, "alpha", "beta", "gamma");
        let result = ValidationResult {
            old_status: Status::Valid,
            new_status: Status::Valid,
            new_line: Some(2),
            message: String::new(),
        };

        let changed = apply_result(&mut bm, &result, true);
        assert!(!changed);
        assert_eq!(bm.line, 2);
    }

    #[test]
    fn test_status_transitions_are_not_terminal() {
        // stale -> valid once the line reappears
        let mut bm = bookmark_at(2, "alpha", "beta", "gamma");
        bm.validation.status = Status::Stale;

        let file = lines(&["alpha", "beta", "gamma"]);
        let result = reconcile_lines(&bm, &file);
        assert_eq!(result.old_status, Status::Stale);
        assert_eq!(result.new_status, Status::Valid);
    }
}
