use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScannerStatus {
    Scanning,
    Idle,
}

impl fmt::Display for ScannerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScannerStatus::Scanning => f.write_str("scanning"),
            ScannerStatus::Idle => f.write_str("idle"),
        }
    }
}

/// Trait for surfacing scan activity to whatever sits above the core.
///
/// Only aggregate signals go through here; per-file failures are logged.
/// All methods have default no-op implementations.
pub trait ScanNotifier: Send + Sync {
    fn on_status(&self, _status: ScannerStatus) {}
    fn on_progress(&self, _current: usize, _total: usize, _last_path: &str) {}
    fn on_library_changed(&self) {}
}

/// No-op notifier for silent operation.
pub struct SilentNotifier;

impl ScanNotifier for SilentNotifier {}
