mod commands;
mod logging;
mod progress;

use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use asset_sync_core::matcher::canonical_name;
use asset_sync_core::scanner::Resolution;
use asset_sync_core::{
    AppConfig, AssetStore, FolderWatcher, ScanEngine, ScanOptions, ScanSummary, SqliteStore,
};
use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands};
use dotenv::dotenv;
use progress::CliNotifier;
use tracing::{error, info};

fn main() {
    dotenv().ok();

    let _guard = logging::init_logger();

    let config = match asset_sync_core::config::load_configuration() {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            process::exit(1);
        }
    };

    let args = Cli::parse();

    let outcome = match args.command {
        Some(Commands::AddFolder { path }) => run_add_folder(&config, &path),
        Some(Commands::ListFolders) => run_list_folders(&config),
        Some(Commands::Scan) => run_scan(&config),
        Some(Commands::Watch) => run_watch(&config),
        Some(Commands::Canonical { names }) => {
            for name in names {
                println!("{} -> {}", name, canonical_name(&name).green());
            }
            Ok(())
        }
        Some(Commands::PrintConfig) => {
            println!("Configuration: {:?}", config);
            Ok(())
        }
        Some(Commands::TruncateDb) => run_truncate(&config),
        None => {
            let _ = Cli::command().print_long_help();
            Ok(())
        }
    };

    if let Err(err) = outcome {
        error!("Error: {:#}", err);
        process::exit(1);
    }
}

fn open_store(config: &AppConfig) -> Result<Arc<SqliteStore>> {
    let store = SqliteStore::open(&config.database_path)
        .with_context(|| format!("opening database {}", config.database_path))?;
    Ok(Arc::new(store))
}

fn build_engine(config: &AppConfig, notifier: Arc<CliNotifier>) -> Result<ScanEngine> {
    let store = open_store(config)?;
    Ok(ScanEngine::new(store, Arc::new(config.scanner_settings()))
        .with_notifier(notifier)
        .with_options(ScanOptions::from(config)))
}

fn run_add_folder(config: &AppConfig, path: &Path) -> Result<()> {
    let canonical = fs::canonicalize(path)
        .with_context(|| format!("resolving folder {}", path.display()))?;
    if !canonical.is_dir() {
        anyhow::bail!("{} is not a directory", canonical.display());
    }
    let store = open_store(config)?;
    let id = store.add_scan_folder(&canonical.to_string_lossy())?;
    println!(
        "Added scan folder {} {}",
        canonical.display().to_string().green(),
        format!("(id {})", id).dimmed()
    );
    Ok(())
}

fn run_list_folders(config: &AppConfig) -> Result<()> {
    let store = open_store(config)?;
    let folders = store.list_scan_folders()?;
    if folders.is_empty() {
        println!("No scan folders registered. Use `asset-sync add-folder <path>`.");
        return Ok(());
    }
    for folder in folders {
        let state = if folder.is_scannable() {
            "active".green()
        } else {
            "inactive".yellow()
        };
        println!("{:>4}  {}  {}", folder.id, state, folder.path);
    }
    Ok(())
}

fn run_scan(config: &AppConfig) -> Result<()> {
    let notifier = Arc::new(CliNotifier::new());
    let engine = Arc::new(build_engine(config, Arc::clone(&notifier))?);

    let handle = engine
        .start_scan()
        .context("a scan is already running")?;
    let summary = handle.join()?;

    print_summary(&summary, notifier.commits());
    Ok(())
}

fn run_watch(config: &AppConfig) -> Result<()> {
    let settings = Arc::new(config.scanner_settings());
    let (watcher, events) = FolderWatcher::new(
        Arc::clone(&settings),
        Duration::from_millis(config.debounce_ms),
        config.queue_capacity,
    )?;

    let notifier = Arc::new(CliNotifier::new());
    let store = open_store(config)?;
    let folders: Vec<String> = store
        .list_scan_folders()?
        .into_iter()
        .filter(|f| f.is_scannable())
        .map(|f| f.path)
        .collect();

    let engine = Arc::new(
        ScanEngine::new(store, settings)
            .with_notifier(notifier.clone())
            .with_options(ScanOptions::from(config))
            .with_live_events(events),
    );

    watcher.start(folders);
    let listener = engine.listen();

    let summary = engine.run_scan()?;
    print_summary(&summary, notifier.commits());

    println!("{}", "Watching for changes, press Enter to stop.".cyan());
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;

    info!("Stopping watcher");
    watcher.shutdown();
    if let Some(listener) = listener {
        if listener.join().is_err() {
            error!("Live listener thread panicked");
        }
    }
    Ok(())
}

fn run_truncate(config: &AppConfig) -> Result<()> {
    match prompt_confirm(
        "Are you SURE you want to COMPLETELY DELETE the Database?",
        Some(false),
    ) {
        Ok(true) => {
            open_store(config)?.truncate_all()?;
            println!("All tables truncated");
        }
        _ => process::exit(0),
    }
    Ok(())
}

fn print_summary(summary: &ScanSummary, commits: usize) {
    println!();
    info!(
        "Scan: {} for {} files{}",
        format!("{:.2}s", summary.duration.as_secs_f64()).green(),
        summary.processed,
        if summary.cancelled { " (cancelled)" } else { "" },
    );
    info!(
        "{} new, {} copies, {} moved, {} resurrected, {} refreshed, {} unchanged, {} failed",
        format!("{}", summary.count(Resolution::New)).green(),
        format!("{}", summary.count(Resolution::Copy)).cyan(),
        format!("{}", summary.count(Resolution::Moved)).cyan(),
        format!("{}", summary.count(Resolution::Resurrected)).cyan(),
        format!("{}", summary.count(Resolution::Refreshed)).cyan(),
        summary.count(Resolution::Unchanged),
        format!("{}", summary.count(Resolution::Failed)).red(),
    );
    info!(
        "{} rows written in {} commits, {} soft-deleted",
        summary.rows_applied,
        commits,
        format!("{}", summary.soft_deleted).red(),
    );
}

fn prompt_confirm(prompt: &str, default: Option<bool>) -> io::Result<bool> {
    let mut input = String::new();

    loop {
        input.clear();

        match default {
            Some(true) => print!("{} (Y/n): ", prompt),
            Some(false) | None => print!("{} (y/N): ", prompt),
        }
        io::stdout().flush()?;

        io::stdin().read_line(&mut input)?;

        match input.trim().to_uppercase().as_str() {
            "Y" => return Ok(true),
            "N" => return Ok(false),
            "" => match default {
                Some(default) => return Ok(default),
                None => continue,
            },
            _ => continue,
        }
    }
}
