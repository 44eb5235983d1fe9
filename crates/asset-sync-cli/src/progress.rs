use asset_sync_core::{ScanNotifier, ScannerStatus};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Draws the scan as an indicatif bar; the total is known after the
/// counting phase, so the bar starts as a spinner.
pub struct CliNotifier {
    bar: Mutex<Option<ProgressBar>>,
    commits: AtomicUsize,
}

impl CliNotifier {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
            commits: AtomicUsize::new(0),
        }
    }

    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::Relaxed)
    }

    fn start_bar(&self) {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::with_template(
                "  {spinner:.cyan} Scanning [{bar:30.cyan/dim}] {pos}/{len} files {wide_msg:.dim}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("━╸─")
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );
        pb.enable_steady_tick(Duration::from_millis(80));

        let mut guard = self.bar.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(old) = guard.replace(pb) {
            old.finish_and_clear();
        }
    }

    fn finish_bar(&self) {
        let mut guard = self.bar.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(pb) = guard.take() {
            pb.finish_and_clear();
        }
    }
}

impl ScanNotifier for CliNotifier {
    fn on_status(&self, status: ScannerStatus) {
        match status {
            ScannerStatus::Scanning => self.start_bar(),
            ScannerStatus::Idle => self.finish_bar(),
        }
    }

    fn on_progress(&self, current: usize, total: usize, last_path: &str) {
        let guard = self.bar.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(pb) = guard.as_ref() {
            if pb.length() != Some(total as u64) {
                pb.set_length(total as u64);
            }
            pb.set_position(current as u64);
            pb.set_message(last_path.to_string());
        }
    }

    fn on_library_changed(&self) {
        self.commits.fetch_add(1, Ordering::Relaxed);
    }
}
