use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Instant, UNIX_EPOCH};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use ignore::WalkBuilder;
use tracing::{debug, info, warn};

use luca::{Document, Index, OpenMode, Query, Searcher};

const PATH_FIELD: &str = "path";
const MODIFIED_FIELD: &str = "modified";
const CONTENTS_FIELD: &str = "contents";

#[derive(Parser)]
#[command(name = "luca", version, about = "Index a file tree and search it", long_about = None)]
struct Cli {
    /// Directory holding the index
    #[arg(long, global = true, env = "LUCA_INDEX_DIR", default_value = "./local/index")]
    index_dir: PathBuf,

    /// Log at debug level
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Index the files under a directory
    Index(IndexArgs),
    /// Run a query string against the index
    Search(SearchArgs),
}

#[derive(Parser)]
struct IndexArgs {
    /// Directory (or single file) to index
    source: PathBuf,

    /// Start from an empty index or update the existing one
    #[arg(long, value_enum, default_value_t = Mode::Update)]
    mode: Mode,

    /// File extensions to index
    #[arg(long, value_delimiter = ',', default_value = "txt,html,htm")]
    include: Vec<String>,

    /// Also index empty files
    #[arg(long)]
    include_empty: bool,

    /// Merge the index down to a single segment afterwards
    #[arg(long)]
    force_merge: bool,

    /// Delete documents whose file no longer exists
    #[arg(long)]
    delete_removed_files: bool,
}

#[derive(Parser)]
struct SearchArgs {
    /// Query, e.g. `contents:rust AND modified:[0 TO 1700000000000]`
    query: String,

    /// Number of hits to print
    #[arg(long, short = 'k', default_value = "10")]
    top_k: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Mode {
    Create,
    Update,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .init();

    debug!("luca v{}", luca::VERSION);

    match cli.command {
        Command::Index(args) => run_index(&cli.index_dir, &args),
        Command::Search(args) => run_search(&cli.index_dir, &args),
    }
}

fn run_index(index_dir: &Path, args: &IndexArgs) -> Result<()> {
    if !args.source.exists() {
        bail!("source {} does not exist", args.source.display());
    }

    let open_mode = match args.mode {
        Mode::Create => OpenMode::Create,
        Mode::Update => OpenMode::CreateOrOpen,
    };
    let index = Index::open(index_dir, open_mode)
        .with_context(|| format!("failed to open index at {}", index_dir.display()))?;
    info!(
        index_dir = %index_dir.display(),
        source = %args.source.display(),
        mode = ?args.mode,
        "Indexing"
    );

    let extensions: HashSet<String> = args
        .include
        .iter()
        .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
        .collect();

    let started = Instant::now();
    let mut indexed = 0u64;
    let mut skipped = 0u64;

    for entry in WalkBuilder::new(&args.source)
        .hidden(true)
        .git_ignore(false)
        .build()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!(error = %err, "Skipping unreadable entry");
                None
            }
        })
        .filter(|e| e.file_type().map_or(false, |t| t.is_file()))
    {
        let path = entry.path();
        if !has_extension(path, &extensions) {
            continue;
        }
        match index_file(&index, path, args) {
            Ok(true) => indexed += 1,
            Ok(false) => skipped += 1,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Failed to index file");
                skipped += 1;
            }
        }
    }

    if args.delete_removed_files {
        let removed = delete_removed_files(&index)?;
        info!(removed, "Deleted documents of removed files");
    }

    let generation = index.commit()?;
    if args.force_merge {
        index.force_merge_to_one()?;
        info!(segments = index.segment_ids().len(), "Force merge finished");
    }

    let elapsed = started.elapsed();
    let elapsed_ms = elapsed.as_millis();
    let secs = elapsed.as_secs_f64();
    let rate = if secs > 0.0 { indexed as f64 / secs } else { indexed as f64 };
    info!(
        indexed,
        skipped,
        generation,
        live_docs = index.live_doc_count(),
        "Indexing finished"
    );
    println!("Indexed {indexed} documents in {elapsed_ms} ms ({rate:.1} docs/sec)");

    index.close()?;
    Ok(())
}

fn has_extension(path: &Path, extensions: &HashSet<String>) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| extensions.contains(&ext.to_ascii_lowercase()))
}

/// Index one file; `Ok(false)` when it was skipped
fn index_file(index: &Index, path: &Path, args: &IndexArgs) -> Result<bool> {
    let metadata = fs::metadata(path)?;
    if metadata.len() == 0 && !args.include_empty {
        debug!(path = %path.display(), "Skipping empty file");
        return Ok(false);
    }

    let bytes = fs::read(path)?;
    let contents = String::from_utf8_lossy(&bytes);
    let modified = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map_or(0, |d| d.as_millis() as i64);

    let id = path.to_string_lossy();
    let doc = Document::new()
        .with_keyword(PATH_FIELD, id.as_ref())
        .with_numeric(MODIFIED_FIELD, modified)
        .with_text(CONTENTS_FIELD, contents.as_ref());

    match args.mode {
        Mode::Create => index.add(&doc)?,
        Mode::Update => index.update(&id, &doc)?,
    }
    debug!(path = %id, "Indexed file");
    Ok(true)
}

/// Delete every committed document whose file is gone
fn delete_removed_files(index: &Index) -> Result<usize> {
    let searcher = index.open_searcher();
    let all = searcher.doc_count() as usize;
    let hits = searcher.search(&Query::match_all(), all)?;

    let mut removed = 0;
    for hit in hits {
        let Some(id) = hit.id else {
            continue;
        };
        if !Path::new(&id).exists() {
            index.delete(&id)?;
            debug!(path = %id, "Deleted removed file");
            removed += 1;
        }
    }
    Ok(removed)
}

fn run_search(index_dir: &Path, args: &SearchArgs) -> Result<()> {
    let searcher = Searcher::open(index_dir)
        .with_context(|| format!("failed to open index at {}", index_dir.display()))?;
    let query = searcher.parse_query(&args.query)?;
    let top = searcher.search_with_stats(&query, args.top_k)?;

    println!(
        "{} matching documents ({} ms), showing {}",
        top.total_hits,
        top.took_ms,
        top.hits.len()
    );
    for (rank, hit) in top.hits.iter().enumerate() {
        let doc = searcher.retrieve(hit.address)?;
        let path = doc.get_str(PATH_FIELD).unwrap_or("<no path>");
        let modified = doc
            .get_i64(MODIFIED_FIELD)
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();
        println!("{:>3}. {:>8.4}  {}  {}", rank + 1, hit.score, path, modified);
    }

    searcher.close();
    Ok(())
}
