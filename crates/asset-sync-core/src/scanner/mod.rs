pub mod collector;
pub mod resolver;
pub mod session;
pub mod walk;

use crate::error::Error;
use crate::storage::AssetChange;

pub use collector::{BatchWriter, Collector, CollectorReport};
pub use resolver::Resolver;
pub use session::ScanSession;

/// One file handed from the directory producer to a worker.
#[derive(Debug, Clone)]
pub struct ScanJob {
    pub path: String,
    pub folder_id: Option<i64>,
}

/// What the resolver decided for one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resolution {
    /// Never seen before.
    New,
    /// New path with the bytes of a record that is still on disk.
    Copy,
    /// Known record found at a new path; its old path is gone.
    Moved,
    /// Soft-deleted record whose file reappeared.
    Resurrected,
    /// Known path whose modification time changed.
    Refreshed,
    /// Known path gone from disk, soft-deleted by the live path.
    Removed,
    Unchanged,
    Failed,
}

/// Worker output consumed by the collector.
#[derive(Debug)]
pub struct ScanResult {
    pub path: String,
    pub resolution: Resolution,
    pub change: Option<AssetChange>,
    /// Path to mark as seen when it differs from `path` (the pre-move path).
    pub existing_path: Option<String>,
    pub error: Option<Error>,
}

impl ScanResult {
    pub(crate) fn new(path: &str, resolution: Resolution) -> Self {
        Self {
            path: path.to_string(),
            resolution,
            change: None,
            existing_path: None,
            error: None,
        }
    }

    pub(crate) fn failed(path: &str, error: Error) -> Self {
        Self {
            error: Some(error),
            ..Self::new(path, Resolution::Failed)
        }
    }
}
