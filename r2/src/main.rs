//! r2 - Main entry point
//!
//! One action per invocation, selected by flag.

use anyhow::{Context, Result};
use clap::{error::ErrorKind, ArgGroup, CommandFactory, Parser};
use r2::repository::{DiffState, RestoreOptions};
use r2::utils::format::{format_bytes, format_timestamp, short_digest};
use r2::{utils, Config, Repository};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "r2", author, version, about, long_about = None)]
#[command(group(
    ArgGroup::new("action")
        .multiple(false)
        .args([
            "init", "add", "quick_add", "backup", "diff", "restore", "list_files",
            "remove", "gc", "history", "prune", "status", "link", "install",
        ])
))]
struct Args {
    /// Set up the r2 directory
    #[arg(long)]
    init: bool,

    /// Track a file under a name
    #[arg(short, long, num_args = 2, value_names = ["NAME", "PATH"])]
    add: Option<Vec<String>>,

    /// Track a file under its own file name
    #[arg(short, long, value_name = "FILE")]
    quick_add: Option<PathBuf>,

    /// Record a new generation of a tracked file
    #[arg(short, long, value_name = "FILE")]
    backup: Option<String>,

    /// Compare a file with a generation (default: latest)
    #[arg(short, long, num_args = 1..=2, value_names = ["FILE", "GENERATION"])]
    diff: Option<Vec<String>>,

    /// Overwrite a file with a generation (default: latest)
    #[arg(short, long, num_args = 1..=2, value_names = ["FILE", "GENERATION"])]
    restore: Option<Vec<String>>,

    /// Do not back up the current file before restoring over it
    #[arg(short, long)]
    no_backup_first: bool,

    /// List tracked files
    #[arg(short, long)]
    list_files: bool,

    /// Stop tracking a file
    #[arg(long, value_name = "FILE")]
    remove: Option<String>,

    /// Delete stored content no generation refers to
    #[arg(long)]
    gc: bool,

    /// Show every generation of a file
    #[arg(long, value_name = "FILE")]
    history: Option<String>,

    /// Drop all but the latest generation of a file (default: every file)
    #[arg(long, num_args = 0..=1, value_name = "FILE")]
    prune: Option<Option<String>>,

    /// Show which tracked files changed since their latest generation
    #[arg(long)]
    status: bool,

    /// Symlink TARGET to a stored generation (default: latest)
    #[arg(long, num_args = 2..=3, value_names = ["FILE", "TARGET", "GENERATION"])]
    link: Option<Vec<String>>,

    /// Copy the latest generation into the bin directory as an executable
    #[arg(long, value_name = "FILE")]
    install: Option<String>,

    /// Report what --gc or --prune would remove without removing it
    #[arg(long)]
    dry_run: bool,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;

    // Initialize logging
    let log_level = args.log_level.as_deref().unwrap_or(&config.log.level);
    utils::logger::init(log_level, config.log_file().as_deref())?;

    tracing::debug!(home = %config.home.display(), "r2 v{}", env!("CARGO_PKG_VERSION"));

    if args.init {
        let repo = Repository::init(&config)?;
        println!("Initialized r2 at {}", repo.layout().home.display());
        return Ok(());
    }

    let has_action = args.add.is_some()
        || args.quick_add.is_some()
        || args.backup.is_some()
        || args.diff.is_some()
        || args.restore.is_some()
        || args.list_files
        || args.remove.is_some()
        || args.gc
        || args.history.is_some()
        || args.prune.is_some()
        || args.status
        || args.link.is_some()
        || args.install.is_some();
    if !has_action {
        Args::command().print_help()?;
        return Ok(());
    }

    let repo = Repository::open(&config)?;
    run(&repo, &config, args)
}

fn run(repo: &Repository, config: &Config, args: Args) -> Result<()> {
    if let Some(add) = args.add {
        let (name, path) = (&add[0], PathBuf::from(&add[1]));
        let snap = repo.add(name, &path)?;
        println!("Added {} ({}) as generation {}", snap.name, path.display(), snap.generation);
    } else if let Some(path) = args.quick_add {
        let snap = repo.quick_add(&path)?;
        println!("Added {} ({}) as generation {}", snap.name, path.display(), snap.generation);
    } else if let Some(name) = args.backup {
        let snap = repo.backup(&name)?;
        println!("Backed up {} as generation {}", snap.name, snap.generation);
    } else if let Some(diff) = args.diff {
        let (name, generation) = file_and_generation(&diff);
        let report = repo.diff(name, generation)?;
        match report.state {
            DiffState::Matches => {
                println!("{} matches backed up version {}", report.name, report.generation)
            }
            DiffState::Differs => {
                println!("{} differs from backed up version {}", report.name, report.generation)
            }
            DiffState::Missing => {
                println!("{} is missing from {}", report.name, report.path.display())
            }
            DiffState::Unreadable => {
                println!("{} cannot be read at {}", report.name, report.path.display())
            }
        }
    } else if let Some(restore) = args.restore {
        let (name, generation) = file_and_generation(&restore);
        let options = RestoreOptions {
            generation,
            backup_first: config.restore.backup_first && !args.no_backup_first,
        };
        let report = repo.restore(name, options)?;
        println!("Restored file {} from backup {}", report.name, report.generation);
        if let Some(saved) = report.snapshot {
            println!("Previous contents saved as generation {}", saved);
        }
    } else if args.list_files {
        for name in repo.list_files()? {
            println!("{}", name);
        }
    } else if let Some(name) = args.remove {
        let entry = repo.remove(&name)?;
        println!(
            "Removed {} ({} generations; run --gc to reclaim space)",
            name,
            entry.generations.len()
        );
    } else if args.gc {
        let report = repo.gc(args.dry_run)?;
        let verb = if report.dry_run { "Would delete" } else { "Deleted" };
        println!(
            "{} {} of {} blobs, {} freed",
            verb,
            report.unreferenced.len(),
            report.scanned,
            format_bytes(report.bytes_freed)
        );
    } else if let Some(name) = args.history {
        for item in repo.history(&name)? {
            let size = item.size.map(format_bytes).unwrap_or_else(|| "-".to_string());
            let stored = item
                .stored_at
                .as_ref()
                .map(format_timestamp)
                .unwrap_or_else(|| "(blob missing)".to_string());
            println!(
                "{:>5}  {}  {:>12}  {}",
                item.generation,
                short_digest(&item.digest.to_hex()),
                size,
                stored
            );
        }
    } else if let Some(target) = args.prune {
        let report = repo.prune(target.as_deref(), args.dry_run)?;
        let verb = if report.dry_run { "Would prune" } else { "Pruned" };
        if report.pruned.is_empty() {
            println!("Nothing to prune");
        }
        for (name, dropped) in &report.pruned {
            println!("{} {} generations from {}", verb, dropped, name);
        }
    } else if args.status {
        for report in repo.status()? {
            println!("{:<10}  {}  {}", report.state.to_string(), report.name, report.path.display());
        }
    } else if let Some(link) = args.link {
        let generation = link.get(2).map(|g| parse_generation(g));
        let report = repo.link(&link[0], &PathBuf::from(&link[1]), generation)?;
        println!("Linked {} -> {}", report.target.display(), report.blob.display());
    } else if let Some(name) = args.install {
        let dest = repo.install(&name)?;
        println!("Installed {} to {}", name, dest.display());
    }

    Ok(())
}

/// `<file> [generation]` from a 1..=2 value flag
fn file_and_generation(values: &[String]) -> (&str, Option<u64>) {
    let generation = values.get(1).map(|g| parse_generation(g));
    (values[0].as_str(), generation)
}

/// Exits with a usage error when `value` is not a generation number.
fn parse_generation(value: &str) -> u64 {
    match value.parse::<u64>() {
        Ok(generation) => generation,
        Err(_) => Args::command()
            .error(
                ErrorKind::InvalidValue,
                format!("Generation must be an integer, got '{}'", value),
            )
            .exit(),
    }
}
