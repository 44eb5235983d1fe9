use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "asset-sync")]
#[command(about = "Keeps an asset library catalog in sync with disk", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Register a folder to be scanned and watched
    AddFolder { path: PathBuf },
    /// List registered scan folders
    ListFolders,
    /// Run one full scan over every active folder
    Scan,
    /// Full scan, then apply filesystem changes live until Enter is pressed
    Watch,
    /// Show the version-family name computed for each file name
    Canonical {
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Print configuration values
    PrintConfig,
    /// Truncate all database tables
    TruncateDb,
}
