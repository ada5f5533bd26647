//! # fileintegrity CLI - Integrity tracking for directory trees
//!
//! ## Usage
//! ```bash
//! # Record every file of a directory (run again to pick up changes)
//! fileintegrity upsert ~/photos
//!
//! # Re-hash every recorded file
//! fileintegrity verify ~/photos
//!
//! # Files with identical content
//! fileintegrity check duplicates ~/photos
//!
//! # Files of ~/inbox already present in ~/photos, deleted with --fix
//! fileintegrity check contained ~/photos ~/inbox --fix
//! ```
//!
//! Every run writes a log file into the `.integrity` directory of the
//! directory it reports on. `verify` exits with status 1 when a file is
//! missing or damaged.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use colored::*;
use fileintegrity::{IntegrityError, IntegrityStore, Options};
use humantime::format_duration;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// fileintegrity CLI - Track, verify and deduplicate directory trees
#[derive(Parser)]
#[command(name = "fileintegrity")]
#[command(version)]
#[command(about = "Track the integrity of directory trees with an append-only hash journal")]
#[command(long_about = None)]
struct Cli {
    /// Enable verbose diagnostics
    #[arg(short, long, global = true)]
    verbose: bool,

    /// JSON file with default run options
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bring the journal of a directory up to date
    #[command(alias = "up")]
    Upsert {
        /// Directory to track
        dir: PathBuf,

        /// Only write the log file
        #[arg(short, long)]
        quiet: bool,

        /// Zip the journal before touching it
        #[arg(long)]
        backup: bool,
    },

    /// Re-check every recorded file of a directory
    Verify {
        /// Tracked directory
        dir: PathBuf,

        /// Only write the log file
        #[arg(short, long)]
        quiet: bool,
    },

    /// Fingerprint analyses
    #[command(subcommand)]
    Check(CheckCommands),
}

#[derive(Subcommand)]
enum CheckCommands {
    /// Report files with identical content
    #[command(alias = "dup")]
    Duplicates {
        /// Tracked directory
        dir: PathBuf,

        /// Only write the log file
        #[arg(short, long)]
        quiet: bool,
    },

    /// Report files of EXTERNAL whose content already exists in DIR
    Contained {
        /// Tracked base directory, never modified
        dir: PathBuf,

        /// Directory to compare against the base
        external: PathBuf,

        /// Delete contained and duplicate files from EXTERNAL
        #[arg(short, long)]
        fix: bool,

        /// Only write the log file
        #[arg(short, long)]
        quiet: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    // Diagnostics go to stderr; run output stays on stdout
    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Disable colors if needed
    if std::env::var("NO_COLOR").is_ok() {
        colored::control::set_override(false);
    }

    if let Err(e) = run(cli) {
        let message = match e.downcast_ref::<IntegrityError>() {
            Some(err) => err.user_message(),
            None => format!("{:#}", e),
        };
        eprintln!("{}: {}", "Error".red().bold(), message);
        std::process::exit(1);
    }
}

/// Main command runner
fn run(cli: Cli) -> anyhow::Result<()> {
    let base = match &cli.config {
        Some(path) => Options::from_file(path)
            .with_context(|| format!("could not load options from {}", path.display()))?,
        None => Options::default(),
    };

    match cli.command {
        Commands::Upsert { dir, quiet, backup } => {
            let mut options = apply_quiet(base, quiet);
            options.backup_before_run |= backup;
            cmd_upsert(&dir, &options, quiet)
        }
        Commands::Verify { dir, quiet } => cmd_verify(&dir, &apply_quiet(base, quiet), quiet),
        Commands::Check(CheckCommands::Duplicates { dir, quiet }) => {
            cmd_duplicates(&dir, &apply_quiet(base, quiet), quiet)
        }
        Commands::Check(CheckCommands::Contained {
            dir,
            external,
            fix,
            quiet,
        }) => cmd_contained(&dir, external, fix, &apply_quiet(base, quiet), quiet),
    }
}

/// Quiet mode keeps the log file but drops console output
fn apply_quiet(mut options: Options, quiet: bool) -> Options {
    if quiet {
        options.log_to_console = false;
        options.show_progress = false;
    }
    options
}

fn finished(label: &str, elapsed: Duration, quiet: bool) {
    if quiet {
        return;
    }
    println!(
        "\n{} {} in {}",
        "✓".green().bold(),
        label,
        format_duration(truncate_millis(elapsed)).to_string().cyan()
    );
}

fn truncate_millis(elapsed: Duration) -> Duration {
    Duration::from_millis(elapsed.as_millis() as u64)
}

/// Bring the journal of `dir` up to date
fn cmd_upsert(dir: &Path, options: &Options, quiet: bool) -> anyhow::Result<()> {
    let summary = fileintegrity::upsert(dir, options)?;
    let label = if summary.has_changes() {
        format!(
            "Upsert done: {} new, {} updated, {} deleted",
            summary.new_files, summary.updated_files, summary.deleted_files
        )
    } else {
        "Upsert done: no changes".to_string()
    };
    finished(&label, summary.execution_time, quiet);
    if summary.failed_files > 0 {
        eprintln!(
            "{}: {} files could not be hashed",
            "Warning".yellow().bold(),
            summary.failed_files
        );
    }
    Ok(())
}

/// Re-check every recorded file of `dir`
fn cmd_verify(dir: &Path, options: &Options, quiet: bool) -> anyhow::Result<()> {
    let summary = fileintegrity::verify(dir, options)?;
    if !summary.is_valid() {
        bail!(
            "{} of {} files failed verification",
            summary.invalid_files,
            summary.valid_files + summary.invalid_files
        );
    }
    finished(
        &format!("Verified {} files", summary.valid_files),
        summary.execution_time,
        quiet,
    );
    Ok(())
}

/// Report duplicate content within `dir`
fn cmd_duplicates(dir: &Path, options: &Options, quiet: bool) -> anyhow::Result<()> {
    let summary = fileintegrity::find_duplicates(dir, options)?;
    finished(
        &format!("Found {} duplicate files", summary.duplicate_files),
        summary.execution_time,
        quiet,
    );
    Ok(())
}

/// Report content of `external` already present in `dir`
fn cmd_contained(
    dir: &Path,
    external: PathBuf,
    fix: bool,
    options: &Options,
    quiet: bool,
) -> anyhow::Result<()> {
    let store = IntegrityStore::open(dir.to_path_buf())?;
    let summary = store.find_contained_in(external, fix, options)?;
    let label = if fix {
        format!(
            "Found {} contained and {} duplicate files, removed {}",
            summary.contained_files, summary.duplicate_files, summary.removed_files
        )
    } else {
        format!(
            "Found {} contained and {} duplicate files",
            summary.contained_files, summary.duplicate_files
        )
    };
    finished(&label, summary.execution_time, quiet);
    Ok(())
}
