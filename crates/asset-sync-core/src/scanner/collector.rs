use crossbeam_channel::Receiver;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};

use super::{Resolution, ScanResult};
use crate::error::Result;
use crate::progress::ScanNotifier;
use crate::storage::{AssetChange, AssetStore, BatchOutcome};

/// Commits resolver output and announces every successful commit.
#[derive(Clone)]
pub struct BatchWriter {
    store: Arc<dyn AssetStore>,
    notifier: Arc<dyn ScanNotifier>,
}

impl BatchWriter {
    pub fn new(store: Arc<dyn AssetStore>, notifier: Arc<dyn ScanNotifier>) -> Self {
        Self { store, notifier }
    }

    pub fn commit(&self, changes: &[AssetChange]) -> Result<BatchOutcome> {
        if changes.is_empty() {
            return Ok(BatchOutcome::default());
        }
        let outcome = self.store.apply_batch(changes)?;
        info!(
            count = changes.len(),
            failed = outcome.failed,
            "Committed batch to store"
        );
        self.notifier.on_library_changed();
        Ok(outcome)
    }
}

/// What the collector saw over one scan.
#[derive(Debug, Default)]
pub struct CollectorReport {
    /// Every path observed on disk, including pre-move paths.
    pub accounted: HashSet<String>,
    pub resolutions: HashMap<Resolution, usize>,
    pub rows_applied: usize,
    pub rows_failed: usize,
    pub batches_failed: usize,
}

impl CollectorReport {
    pub fn count(&self, resolution: Resolution) -> usize {
        self.resolutions.get(&resolution).copied().unwrap_or(0)
    }
}

/// Single consumer of worker results: buffers changes, flushes them in
/// batches, tracks which paths were seen and reports throttled progress.
pub struct Collector {
    writer: BatchWriter,
    notifier: Arc<dyn ScanNotifier>,
    batch_size: usize,
    progress_every: usize,
    total: usize,
    processed: Arc<AtomicUsize>,
}

impl Collector {
    pub fn new(
        writer: BatchWriter,
        notifier: Arc<dyn ScanNotifier>,
        processed: Arc<AtomicUsize>,
    ) -> Self {
        Self {
            writer,
            notifier,
            batch_size: 100,
            progress_every: 30,
            total: 0,
            processed,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_progress_every(mut self, every: usize) -> Self {
        self.progress_every = every.max(1);
        self
    }

    pub fn with_total(mut self, total: usize) -> Self {
        self.total = total;
        self
    }

    /// Runs until every sender of `results` is dropped, then flushes the rest.
    pub fn run(self, results: Receiver<ScanResult>) -> CollectorReport {
        let mut report = CollectorReport::default();
        let mut buffer: Vec<AssetChange> = Vec::with_capacity(self.batch_size);

        for result in results.iter() {
            match &result.error {
                Some(e) => error!(path = %result.path, "Error scanning file: {}", e),
                None => debug!(path = %result.path, resolution = ?result.resolution, "File scanned"),
            }

            *report.resolutions.entry(result.resolution).or_insert(0) += 1;
            report.accounted.insert(result.path.clone());
            if let Some(existing) = &result.existing_path {
                report.accounted.insert(existing.clone());
            }

            let last_path = result.path;
            if let Some(change) = result.change {
                buffer.push(change);
            }
            if buffer.len() >= self.batch_size {
                self.flush(&mut buffer, &mut report);
            }

            let current = self.processed.fetch_add(1, Ordering::Relaxed) + 1;
            if current % self.progress_every == 0 {
                self.notifier.on_progress(current, self.total, &last_path);
            }
        }

        self.flush(&mut buffer, &mut report);
        report
    }

    fn flush(&self, buffer: &mut Vec<AssetChange>, report: &mut CollectorReport) {
        if buffer.is_empty() {
            return;
        }
        match self.writer.commit(buffer) {
            Ok(outcome) => {
                report.rows_applied += outcome.applied;
                report.rows_failed += outcome.failed;
            }
            Err(e) => {
                error!(count = buffer.len(), "Batch operation failed: {}", e);
                report.batches_failed += 1;
            }
        }
        buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::SilentNotifier;
    use crate::storage::{NewAsset, SqliteStore};
    use std::sync::Mutex;

    #[derive(Default)]
    struct CountingNotifier {
        changed: AtomicUsize,
        progress: Mutex<Vec<usize>>,
    }

    impl ScanNotifier for CountingNotifier {
        fn on_progress(&self, current: usize, _total: usize, _last_path: &str) {
            self.progress.lock().unwrap().push(current);
        }
        fn on_library_changed(&self) {
            self.changed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn new_asset(path: &str) -> NewAsset {
        NewAsset {
            scan_folder_id: None,
            group_id: "g".to_string(),
            file_name: path.rsplit('/').next().unwrap_or(path).to_string(),
            file_path: path.to_string(),
            file_type: "image".to_string(),
            file_size: 1,
            file_hash: None,
            thumbnail_path: String::new(),
            image_width: None,
            image_height: None,
            bit_depth: None,
            has_alpha_channel: None,
            dominant_color: None,
            last_modified: 1_700_000_000,
            last_scanned: 1_700_000_000,
        }
    }

    fn created(path: &str) -> ScanResult {
        let mut result = ScanResult::new(path, Resolution::New);
        result.change = Some(AssetChange::Create(new_asset(path)));
        result
    }

    #[test]
    fn test_batches_and_notifies_per_commit() {
        let store: Arc<dyn AssetStore> = Arc::new(SqliteStore::open_in_memory().unwrap());
        let notifier = Arc::new(CountingNotifier::default());
        let writer = BatchWriter::new(Arc::clone(&store), notifier.clone());
        let collector = Collector::new(writer, notifier.clone(), Arc::new(AtomicUsize::new(0)))
            .with_batch_size(2)
            .with_progress_every(2)
            .with_total(5);

        let (tx, rx) = crossbeam_channel::unbounded();
        for i in 0..5 {
            tx.send(created(&format!("/lib/{}.png", i))).unwrap();
        }
        drop(tx);
        let report = collector.run(rx);

        assert_eq!(report.rows_applied, 5);
        assert_eq!(report.count(Resolution::New), 5);
        // 2 + 2 + final 1
        assert_eq!(notifier.changed.load(Ordering::SeqCst), 3);
        assert_eq!(*notifier.progress.lock().unwrap(), vec![2, 4]);
        assert_eq!(store.list_assets().unwrap().len(), 5);
    }

    #[test]
    fn test_row_failure_does_not_abort_batch() {
        let store: Arc<dyn AssetStore> = Arc::new(SqliteStore::open_in_memory().unwrap());
        let writer = BatchWriter::new(Arc::clone(&store), Arc::new(SilentNotifier));
        let collector = Collector::new(writer, Arc::new(SilentNotifier), Arc::new(AtomicUsize::new(0)));

        let (tx, rx) = crossbeam_channel::unbounded();
        tx.send(created("/lib/a.png")).unwrap();
        tx.send(created("/lib/a.png")).unwrap();
        tx.send(created("/lib/b.png")).unwrap();
        drop(tx);
        let report = collector.run(rx);

        assert_eq!(report.rows_applied, 2);
        assert_eq!(report.rows_failed, 1);
        assert_eq!(report.batches_failed, 0);
    }

    #[test]
    fn test_moved_result_accounts_old_path() {
        let store: Arc<dyn AssetStore> = Arc::new(SqliteStore::open_in_memory().unwrap());
        let writer = BatchWriter::new(store, Arc::new(SilentNotifier));
        let collector = Collector::new(writer, Arc::new(SilentNotifier), Arc::new(AtomicUsize::new(0)));

        let mut moved = ScanResult::new("/lib/new.png", Resolution::Moved);
        moved.existing_path = Some("/lib/old.png".to_string());
        let (tx, rx) = crossbeam_channel::unbounded();
        tx.send(moved).unwrap();
        drop(tx);
        let report = collector.run(rx);

        assert!(report.accounted.contains("/lib/old.png"));
        assert!(report.accounted.contains("/lib/new.png"));
        assert_eq!(report.count(Resolution::Moved), 1);
    }
}
