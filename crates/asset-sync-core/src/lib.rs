pub mod config;
pub mod engine;
pub mod error;
pub mod hasher;
pub mod matcher;
pub mod progress;
pub mod scanner;
pub mod storage;
pub mod thumbnail;
pub mod watcher;

pub use config::{AppConfig, ScannerSettings};
pub use engine::{ScanEngine, ScanHandle, ScanOptions, ScanSummary};
pub use error::{Error, Result};
pub use progress::{ScanNotifier, ScannerStatus, SilentNotifier};
pub use storage::{AssetStore, SqliteStore};
pub use watcher::FolderWatcher;
