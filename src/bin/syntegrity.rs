//! Syntegrity CLI
//!
//! Thin wrapper over the scan engine: assembles configuration, runs every
//! target, and prints the digest report to stdout. Diagnostics go to the
//! logging layer (stderr by default).

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::process;
use syntegrity::cache::DigestCache;
use syntegrity::changes::{self, Snapshot};
use syntegrity::config::ScanConfig;
use syntegrity::logging::init_logging;
use syntegrity::report;
use syntegrity::scan::{self, TargetOutcome};
use tracing::info;

#[derive(Parser)]
#[command(
    name = "syntegrity",
    about = "Dual-hash directory integrity scanner",
    version
)]
struct Cli {
    /// Directories or files to scan (overrides configured roots)
    roots: Vec<PathBuf>,

    /// Configuration file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Worker-pool size cap
    #[arg(long)]
    workers: Option<usize>,

    /// Digest cache location (delete it to force full recomputation)
    #[arg(long)]
    cache: Option<PathBuf>,

    /// Print the nested structure rendering per root
    #[arg(long)]
    structure: bool,

    /// Compare against the previous run's snapshot and report changes
    #[arg(long)]
    changes: bool,

    /// Log level override (trace, debug, info, warn, error, off)
    #[arg(long)]
    log_level: Option<String>,
}

fn main() {
    let cli = Cli::parse();
    match try_main(&cli) {
        Ok(false) => {}
        Ok(true) => process::exit(1),
        Err(e) => {
            eprintln!("syntegrity: {:#}", e);
            process::exit(2);
        }
    }
}

fn try_main(cli: &Cli) -> anyhow::Result<bool> {
    let mut config = ScanConfig::load(cli.config.as_deref()).context("loading configuration")?;
    if !cli.roots.is_empty() {
        config.roots = cli.roots.clone();
    }
    if let Some(workers) = cli.workers {
        config.max_workers = workers.max(1);
    }
    if let Some(cache) = &cli.cache {
        config.cache_path = cache.clone();
    }
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }

    init_logging(&config.logging).context("initializing logging")?;

    if config.roots.is_empty() {
        anyhow::bail!("no scan roots given (pass paths or set `roots` in the config)");
    }

    info!(targets = config.roots.len(), "syntegrity starting");
    Ok(run(cli, &config))
}

/// Scan all targets and print the report. Returns true if any failed.
fn run(cli: &Cli, config: &ScanConfig) -> bool {
    let cache = DigestCache::open(&config.cache_path);
    let options = config.scan_options();
    let results = scan::scan_all(&config.roots, &cache, &options);

    let mut failed = false;
    for (target, outcome) in results {
        match outcome {
            Ok(TargetOutcome::File(digest)) => {
                println!("{}", report::file_line(&target, &digest));
            }
            Ok(TargetOutcome::Tree(outcome)) => {
                for line in report::file_lines(&outcome.tree) {
                    println!("{}", line);
                }
                for line in report::folder_lines(&outcome.tree) {
                    println!("{}", line);
                }
                if cli.structure {
                    println!("{}", report::render_structure(&outcome.tree));
                }
                if cli.changes {
                    report_changes(config, &outcome.tree);
                }
            }
            Err(e) => {
                eprintln!("{}: scan failed: {}", target.display(), e);
                failed = true;
            }
        }
    }
    failed
}

/// Diff against the previous snapshot for this root, then replace it.
fn report_changes(config: &ScanConfig, tree: &syntegrity::tree::Node) {
    let root = tree.path();
    let snapshot_file = changes::snapshot_path(&config.snapshot_dir, root);
    let previous = Snapshot::load(&snapshot_file);
    let current = Snapshot::capture(root, tree);

    let detected = changes::detect(&previous, &current);
    if detected.is_empty() {
        println!("No changes detected since last run.");
    } else {
        println!("Changes detected:");
        for change in &detected {
            println!("  {}", change);
        }
    }

    if let Err(e) = current.save(&snapshot_file) {
        eprintln!("failed to save snapshot {}: {}", snapshot_file.display(), e);
    }
}
