//! Sigil CLI — context-aware line bookmarks.
//!
//! Usage:
//!   sigil add src/main.rs:42 -t todo,perf -d "revisit this loop"
//!   sigil list --stale
//!   sigil validate --fix

use clap::{Parser, Subcommand};
use sigil::{
    apply_result, ensure_storage, extract_context, find_root, load_bookmarks, now_iso, reconcile,
    relative_path, save_bookmarks, Bookmark, Status, ValidationResult,
};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "sigil",
    version,
    about = "Bookmark code locations with context-aware validation"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize sigil in the current directory
    Init,
    /// Add a bookmark
    Add {
        /// file:line (e.g. src/main.rs:42)
        location: String,
        /// Comma-separated tags
        #[arg(short, long)]
        tags: Option<String>,
        /// Description
        #[arg(short, long, default_value = "")]
        desc: String,
    },
    /// List bookmarks
    #[command(alias = "ls")]
    List {
        /// Filter by tags (comma-separated)
        #[arg(short, long)]
        tags: Option<String>,
        /// Filter by file pattern
        #[arg(short, long)]
        file: Option<String>,
        /// Show only stale bookmarks
        #[arg(long)]
        stale: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show bookmark details
    Show {
        /// Bookmark ID (or partial match)
        id: String,
    },
    /// Delete bookmark(s)
    #[command(alias = "rm")]
    Delete {
        /// Bookmark ID (or partial match)
        id: Option<String>,
        /// Delete all with these tags
        #[arg(short, long)]
        tags: Option<String>,
    },
    /// Validate all bookmarks against their files
    Validate {
        /// Auto-fix line numbers
        #[arg(long)]
        fix: bool,
    },
    /// Search bookmarks
    Search {
        /// Search term
        query: String,
    },
    /// Reposition a bookmark
    Move {
        /// Bookmark ID (or partial match)
        id: String,
        /// New position: +N (relative), -N (relative), N (absolute), or file:line
        #[arg(allow_hyphen_values = true)]
        target: String,
    },
}

struct Project {
    root: PathBuf,
    sigil_dir: PathBuf,
    bookmarks: Vec<Bookmark>,
}

/// Find the root, ensure storage exists, load all bookmarks.
fn open_project() -> Result<Project, String> {
    let cwd = std::env::current_dir().map_err(|e| format!("cannot determine cwd: {}", e))?;
    let root = find_root(&cwd).ok_or_else(|| {
        "Not in a sigil project. Run 'sigil init' first, or navigate to a directory with .sigil/ or .git/"
            .to_string()
    })?;
    let sigil_dir = ensure_storage(&root).map_err(|e| e.to_string())?;
    let bookmarks = load_bookmarks(&sigil_dir).map_err(|e| e.to_string())?;
    Ok(Project {
        root,
        sigil_dir,
        bookmarks,
    })
}

/// Resolve a full or partial bookmark id to an index.
///
/// Ambiguity is reported with every matching id listed, leaving resolution
/// to the caller.
fn find_by_partial_id(bookmarks: &[Bookmark], partial: &str) -> Result<usize, String> {
    let matches: Vec<usize> = bookmarks
        .iter()
        .enumerate()
        .filter(|(_, b)| b.id.contains(partial))
        .map(|(i, _)| i)
        .collect();

    match matches.len() {
        0 => Err(format!("No bookmark matching '{}'.", partial)),
        1 => Ok(matches[0]),
        _ => {
            let mut msg = format!("Ambiguous ID '{}'. Matches:", partial);
            for &i in &matches {
                msg.push_str(&format!("\n  {}", bookmarks[i].id));
            }
            Err(msg)
        }
    }
}

/// Split a `file:line` location into its parts.
fn parse_location(location: &str) -> Result<(PathBuf, usize), String> {
    let (file, line) = location
        .rsplit_once(':')
        .ok_or_else(|| "Location must be file:line (e.g. src/main.rs:42)".to_string())?;
    let line: usize = line
        .parse()
        .map_err(|_| format!("Invalid line number: {}", line))?;
    Ok((PathBuf::from(file), line))
}

fn parse_tags(tags: Option<&str>) -> Vec<String> {
    tags.map(|t| {
        t.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

fn tags_intersect(bookmark: &Bookmark, filter: &[String]) -> bool {
    bookmark
        .metadata
        .tags
        .iter()
        .any(|t| filter.iter().any(|f| f == t))
}

fn resolve_against_cwd(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_default()
            .join(path)
    }
}

// ---------- Commands ----------

fn cmd_init() -> i32 {
    let cwd = match std::env::current_dir() {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Error: cannot determine cwd: {}", e);
            return 1;
        }
    };
    match ensure_storage(&cwd) {
        Ok(sigil_dir) => {
            println!("Initialized sigil in {}", sigil_dir.display());
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_add(project: &mut Project, location: &str, tags: Option<&str>, desc: &str) -> i32 {
    let (filepath, line) = match parse_location(location) {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    let filepath = resolve_against_cwd(&filepath);
    let rel_path = relative_path(&filepath, &project.root);

    let context = match extract_context(&filepath, line) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    let mut bookmark = Bookmark::new(rel_path.clone(), line, context);
    bookmark.metadata.tags = parse_tags(tags);
    bookmark.metadata.description = desc.to_string();

    let short_id = bookmark.short_id().to_string();
    let target = bookmark.context.target.trim().to_string();
    let tag_line = bookmark.metadata.tags.join(", ");

    project.bookmarks.push(bookmark);
    if let Err(e) = save_bookmarks(&project.sigil_dir, &project.bookmarks) {
        eprintln!("Error: {}", e);
        return 1;
    }

    println!("Added bookmark {} → {}:{}", short_id, rel_path, line);
    if !tag_line.is_empty() {
        println!("  Tags: {}", tag_line);
    }
    if !desc.is_empty() {
        println!("  Desc: {}", desc);
    }
    println!("  Context: {}", target);
    0
}

fn cmd_list(
    project: &Project,
    tags: Option<&str>,
    file: Option<&str>,
    stale: bool,
    json: bool,
) -> i32 {
    let filter_tags = parse_tags(tags);
    let filtered: Vec<&Bookmark> = project
        .bookmarks
        .iter()
        .filter(|b| filter_tags.is_empty() || tags_intersect(b, &filter_tags))
        .filter(|b| file.map(|pattern| b.file.contains(pattern)).unwrap_or(true))
        .filter(|b| !stale || b.validation.status.needs_attention())
        .collect();

    if filtered.is_empty() {
        println!("No bookmarks found.");
        return 0;
    }

    if json {
        match serde_json::to_string_pretty(&filtered) {
            Ok(out) => {
                println!("{}", out);
                0
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                1
            }
        }
    } else {
        print_table(&filtered);
        0
    }
}

fn cmd_show(project: &mut Project, id: &str) -> i32 {
    let idx = match find_by_partial_id(&project.bookmarks, id) {
        Ok(idx) => idx,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    project.bookmarks[idx].metadata.accessed = now_iso();
    if let Err(e) = save_bookmarks(&project.sigil_dir, &project.bookmarks) {
        eprintln!("Error: {}", e);
        return 1;
    }

    let bm = &project.bookmarks[idx];
    println!("Bookmark: {}", bm.id);
    println!("File: {}:{}", bm.file, bm.line);
    println!(
        "Tags: {}",
        if bm.metadata.tags.is_empty() {
            "(none)".to_string()
        } else {
            bm.metadata.tags.join(", ")
        }
    );
    println!(
        "Description: {}",
        if bm.metadata.description.is_empty() {
            "(none)"
        } else {
            &bm.metadata.description
        }
    );
    println!("Created: {}", bm.metadata.created);
    println!("Last accessed: {}", bm.metadata.accessed);
    println!(
        "Status: {} (checked {})",
        bm.validation.status, bm.validation.last_checked
    );
    println!();
    println!("Context:");
    if !bm.context.before.is_empty() {
        println!("  {:>4} │ {}", bm.line.saturating_sub(1), bm.context.before);
    }
    println!("→ {:>4} │ {}", bm.line, bm.context.target);
    if !bm.context.after.is_empty() {
        println!("  {:>4} │ {}", bm.line + 1, bm.context.after);
    }
    0
}

fn cmd_delete(project: &mut Project, id: Option<&str>, tags: Option<&str>) -> i32 {
    if let Some(id) = id {
        let idx = match find_by_partial_id(&project.bookmarks, id) {
            Ok(idx) => idx,
            Err(e) => {
                eprintln!("Error: {}", e);
                return 1;
            }
        };
        let bm = project.bookmarks.remove(idx);
        if let Err(e) = save_bookmarks(&project.sigil_dir, &project.bookmarks) {
            eprintln!("Error: {}", e);
            return 1;
        }
        println!("Deleted bookmark {} ({}:{})", bm.short_id(), bm.file, bm.line);
        0
    } else if let Some(tags) = tags {
        let filter_tags = parse_tags(Some(tags));
        let to_delete: Vec<usize> = project
            .bookmarks
            .iter()
            .enumerate()
            .filter(|(_, b)| tags_intersect(b, &filter_tags))
            .map(|(i, _)| i)
            .collect();

        if to_delete.is_empty() {
            println!("No bookmarks match those tags.");
            return 0;
        }

        println!("Deleting {} bookmark(s):", to_delete.len());
        for &i in &to_delete {
            let bm = &project.bookmarks[i];
            println!("  {} → {}:{}", bm.short_id(), bm.file, bm.line);
        }
        project.bookmarks.retain(|b| !tags_intersect(b, &filter_tags));
        if let Err(e) = save_bookmarks(&project.sigil_dir, &project.bookmarks) {
            eprintln!("Error: {}", e);
            return 1;
        }
        0
    } else {
        eprintln!("Error: Specify a bookmark ID or --tags to delete.");
        1
    }
}

fn cmd_validate(project: &mut Project, fix: bool) -> i32 {
    if project.bookmarks.is_empty() {
        println!("No bookmarks to validate.");
        return 0;
    }

    let mut results: Vec<ValidationResult> = Vec::with_capacity(project.bookmarks.len());
    let mut fixed = 0usize;
    for bm in &mut project.bookmarks {
        let result = match reconcile(bm, &project.root) {
            Ok(r) => r,
            Err(e) => {
                eprintln!("Error: {}: {}", bm.file, e);
                return 1;
            }
        };
        let old_line = bm.line;
        apply_result(bm, &result, fix);
        if fix && bm.line != old_line {
            fixed += 1;
        }
        results.push(result);
    }

    if let Err(e) = save_bookmarks(&project.sigil_dir, &project.bookmarks) {
        eprintln!("Error: {}", e);
        return 1;
    }

    println!("Validated {} bookmark(s):\n", results.len());

    let status_order = [
        (Status::Valid, "✓"),
        (Status::Moved, "→"),
        (Status::Stale, "?"),
        (Status::MissingFile, "✗"),
    ];
    for (status, icon) in status_order {
        let group: Vec<usize> = results
            .iter()
            .enumerate()
            .filter(|(_, r)| r.new_status == status)
            .map(|(i, _)| i)
            .collect();
        if group.is_empty() {
            continue;
        }
        println!("  {} {}: {}", icon, status, group.len());
        if status == Status::Valid {
            continue;
        }
        for i in group {
            let bm = &project.bookmarks[i];
            if results[i].message.is_empty() {
                println!("    {} {}:{}", bm.short_id(), bm.file, bm.line);
            } else {
                println!(
                    "    {} {}:{} — {}",
                    bm.short_id(),
                    bm.file,
                    bm.line,
                    results[i].message
                );
            }
        }
    }

    if fix && fixed > 0 {
        println!("\n  Fixed {} bookmark line number(s).", fixed);
    }
    0
}

fn cmd_search(project: &Project, query: &str) -> i32 {
    let query = query.to_lowercase();
    let matches: Vec<&Bookmark> = project
        .bookmarks
        .iter()
        .filter(|b| {
            let haystack = format!(
                "{} {} {} {}",
                b.metadata.description,
                b.metadata.tags.join(" "),
                b.file,
                b.context.target
            )
            .to_lowercase();
            haystack.contains(&query)
        })
        .collect();

    if matches.is_empty() {
        println!("No bookmarks matching '{}'.", query);
        return 0;
    }

    print_table(&matches);
    0
}

fn cmd_move(project: &mut Project, id: &str, target: &str) -> i32 {
    let idx = match find_by_partial_id(&project.bookmarks, id) {
        Ok(idx) => idx,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    let (new_file, new_line) =
        match parse_move_target(target, &project.bookmarks[idx], &project.root) {
            Ok(parsed) => parsed,
            Err(e) => {
                eprintln!("Error: {}", e);
                return 1;
            }
        };

    let actual_path = if Path::new(&new_file).is_absolute() {
        PathBuf::from(&new_file)
    } else {
        project.root.join(&new_file)
    };
    let new_context = match extract_context(&actual_path, new_line) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    let bm = &mut project.bookmarks[idx];
    let old_location = format!("{}:{}", bm.file, bm.line);
    let short_id = bm.short_id().to_string();
    bm.file = new_file.clone();
    bm.line = new_line;
    bm.context = new_context.clone();
    bm.validation.status = Status::Valid;
    bm.validation.last_checked = now_iso();

    if let Err(e) = save_bookmarks(&project.sigil_dir, &project.bookmarks) {
        eprintln!("Error: {}", e);
        return 1;
    }

    println!("Moved {}: {} → {}:{}", short_id, old_location, new_file, new_line);
    println!("  Context: {}", new_context.target.trim());
    0
}

/// Interpret a move target: `+N`/`-N` relative, `N` absolute, or `file:line`.
fn parse_move_target(
    target: &str,
    bookmark: &Bookmark,
    root: &Path,
) -> Result<(String, usize), String> {
    let (new_file, new_line) = if let Some(delta) = parse_relative(target) {
        let line = bookmark.line as i64 + delta;
        if line < 1 {
            return Err(format!("Line number must be >= 1 (got {})", line));
        }
        (bookmark.file.clone(), line as usize)
    } else if target.contains(':') {
        let (path, line) = parse_location(target)?;
        let path = resolve_against_cwd(&path);
        (relative_path(&path, root), line)
    } else {
        let line: usize = target
            .parse()
            .map_err(|_| format!("Cannot parse target '{}'", target))?;
        (bookmark.file.clone(), line)
    };

    if new_line < 1 {
        return Err(format!("Line number must be >= 1 (got {})", new_line));
    }
    Ok((new_file, new_line))
}

fn parse_relative(target: &str) -> Option<i64> {
    let rest = target.strip_prefix('+').or_else(|| target.strip_prefix('-'))?;
    if rest.is_empty() || !rest.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    target.parse::<i64>().ok()
}

// ---------- Table output ----------

fn print_table(bookmarks: &[&Bookmark]) {
    let headers = ["ID", "FILE", "LINE", "TAGS", "DESCRIPTION", "STATUS"];
    // Caps keep long paths and descriptions from blowing out the table
    let caps = [usize::MAX, 35, usize::MAX, 20, 45, usize::MAX];

    let rows: Vec<[String; 6]> = bookmarks
        .iter()
        .map(|bm| {
            let mut desc = bm.metadata.description.clone();
            if desc.chars().count() > 45 {
                desc = format!("{}...", truncate(&desc, 42));
            }
            [
                bm.short_id().to_string(),
                bm.file.clone(),
                bm.line.to_string(),
                bm.metadata.tags.join(","),
                desc,
                bm.validation.status.to_string(),
            ]
        })
        .collect();

    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (i, val) in row.iter().enumerate() {
            widths[i] = widths[i].max(val.chars().count()).min(caps[i]);
        }
    }

    let format_row = |cells: &[String]| {
        cells
            .iter()
            .enumerate()
            .map(|(i, val)| format!("{:<width$}", truncate(val, widths[i]), width = widths[i]))
            .collect::<Vec<_>>()
            .join("  ")
    };

    let header_cells: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
    let rule_cells: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
    println!("{}", format_row(&header_cells));
    println!("{}", format_row(&rule_cells));
    for row in &rows {
        println!("{}", format_row(row));
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Init = cli.command {
        std::process::exit(cmd_init());
    }

    let mut project = match open_project() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let code = match cli.command {
        Commands::Init => unreachable!(),
        Commands::Add {
            location,
            tags,
            desc,
        } => cmd_add(&mut project, &location, tags.as_deref(), &desc),
        Commands::List {
            tags,
            file,
            stale,
            json,
        } => cmd_list(&project, tags.as_deref(), file.as_deref(), stale, json),
        Commands::Show { id } => cmd_show(&mut project, &id),
        Commands::Delete { id, tags } => cmd_delete(&mut project, id.as_deref(), tags.as_deref()),
        Commands::Validate { fix } => cmd_validate(&mut project, fix),
        Commands::Search { query } => cmd_search(&project, &query),
        Commands::Move { id, target } => cmd_move(&mut project, &id, &target),
    };
    std::process::exit(code);
}
