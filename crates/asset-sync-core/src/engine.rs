use crossbeam_channel::{bounded, Receiver};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::config::{AppConfig, ScannerSettings};
use crate::error::{Error, Result};
use crate::progress::{ScanNotifier, ScannerStatus, SilentNotifier};
use crate::scanner::walk::{compile_ignore_patterns, FolderWalker};
use crate::scanner::{
    BatchWriter, Collector, CollectorReport, Resolution, Resolver, ScanJob, ScanResult,
    ScanSession,
};
use crate::storage::{AssetStore, CachedAsset, ScanFolder};
use crate::thumbnail::{PlaceholderThumbnails, ThumbnailGenerator};

/// Pipeline sizing for a full scan.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub batch_size: usize,
    pub progress_every: usize,
    pub queue_capacity: usize,
    pub workers: usize,
    pub ignore_patterns: Vec<String>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for ScanOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            batch_size: config.batch_size.max(1),
            progress_every: config.progress_every.max(1),
            queue_capacity: config.queue_capacity.max(1),
            workers: config.worker_count(),
            ignore_patterns: config.ignore_patterns.clone(),
        }
    }
}

#[derive(Debug, Default)]
pub struct ScanSummary {
    pub total_files: usize,
    pub processed: usize,
    pub resolutions: HashMap<Resolution, usize>,
    pub rows_applied: usize,
    pub rows_failed: usize,
    pub soft_deleted: usize,
    pub cancelled: bool,
    pub duration: Duration,
}

impl ScanSummary {
    pub fn count(&self, resolution: Resolution) -> usize {
        self.resolutions.get(&resolution).copied().unwrap_or(0)
    }

    /// Rows created, updated or soft-deleted by this scan.
    pub fn rows_changed(&self) -> usize {
        self.rows_applied + self.soft_deleted
    }
}

/// Handle to a scan running on its own thread.
pub struct ScanHandle {
    handle: JoinHandle<Result<ScanSummary>>,
}

impl ScanHandle {
    pub fn join(self) -> Result<ScanSummary> {
        self.handle
            .join()
            .map_err(|_| Error::Other("scan thread panicked".to_string()))?
    }
}

/// Resets the scanning flag however the scan ends.
struct ScanGuard<'a>(&'a AtomicBool);

impl Drop for ScanGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Orchestrates full scans and single-file live updates against one store.
pub struct ScanEngine {
    store: Arc<dyn AssetStore>,
    settings: Arc<ScannerSettings>,
    thumbnails: Arc<dyn ThumbnailGenerator>,
    notifier: Arc<dyn ScanNotifier>,
    options: ScanOptions,
    is_scanning: AtomicBool,
    cancel: Arc<AtomicBool>,
    processed: Arc<AtomicUsize>,
    total: AtomicUsize,
    live_events: Mutex<Option<Receiver<PathBuf>>>,
}

impl ScanEngine {
    pub fn new(store: Arc<dyn AssetStore>, settings: Arc<ScannerSettings>) -> Self {
        Self {
            store,
            settings,
            thumbnails: Arc::new(PlaceholderThumbnails),
            notifier: Arc::new(SilentNotifier),
            options: ScanOptions::default(),
            is_scanning: AtomicBool::new(false),
            cancel: Arc::new(AtomicBool::new(false)),
            processed: Arc::new(AtomicUsize::new(0)),
            total: AtomicUsize::new(0),
            live_events: Mutex::new(None),
        }
    }

    pub fn with_thumbnails(mut self, thumbnails: Arc<dyn ThumbnailGenerator>) -> Self {
        self.thumbnails = thumbnails;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn ScanNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_options(mut self, options: ScanOptions) -> Self {
        self.options = options;
        self
    }

    /// Queue of settled paths from a watcher, drained by [`ScanEngine::listen`].
    pub fn with_live_events(self, events: Receiver<PathBuf>) -> Self {
        *self.live_events.lock().unwrap_or_else(|e| e.into_inner()) = Some(events);
        self
    }

    pub fn store(&self) -> &Arc<dyn AssetStore> {
        &self.store
    }

    pub fn settings(&self) -> &Arc<ScannerSettings> {
        &self.settings
    }

    pub fn is_scanning(&self) -> bool {
        self.is_scanning.load(Ordering::Acquire)
    }

    /// `(processed, total)` for the current or last scan.
    pub fn progress(&self) -> (usize, usize) {
        (
            self.processed.load(Ordering::Relaxed),
            self.total.load(Ordering::Relaxed),
        )
    }

    /// Starts a full scan in the background. Returns `None` when a scan is
    /// already running.
    pub fn start_scan(self: &Arc<Self>) -> Option<ScanHandle> {
        if !self.try_begin() {
            info!("Scan already in progress, ignoring start request");
            return None;
        }

        let engine = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name("asset-scan".to_string())
            .spawn(move || {
                let _guard = ScanGuard(&engine.is_scanning);
                engine.execute_scan()
            });

        match spawned {
            Ok(handle) => Some(ScanHandle { handle }),
            Err(e) => {
                error!("Failed to spawn scan thread: {}", e);
                self.is_scanning.store(false, Ordering::Release);
                None
            }
        }
    }

    /// Runs a full scan on the calling thread.
    pub fn run_scan(&self) -> Result<ScanSummary> {
        if !self.try_begin() {
            return Err(Error::ScanInProgress);
        }
        let _guard = ScanGuard(&self.is_scanning);
        self.execute_scan()
    }

    /// Raises the cancellation signal; in-flight work winds down on its own.
    pub fn stop_scan(&self) {
        if self.is_scanning() {
            info!("Scan cancellation requested");
            self.cancel.store(true, Ordering::Relaxed);
        }
    }

    fn try_begin(&self) -> bool {
        let won = self
            .is_scanning
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if won {
            self.cancel.store(false, Ordering::Relaxed);
        }
        won
    }

    fn resolver(&self) -> Resolver {
        Resolver::new(
            Arc::clone(&self.store),
            Arc::clone(&self.settings),
            Arc::clone(&self.thumbnails),
        )
    }

    fn writer(&self) -> BatchWriter {
        BatchWriter::new(Arc::clone(&self.store), Arc::clone(&self.notifier))
    }

    fn execute_scan(&self) -> Result<ScanSummary> {
        let started = Instant::now();
        self.processed.store(0, Ordering::Relaxed);
        self.total.store(0, Ordering::Relaxed);

        let snapshot = self.store.list_assets_for_cache()?;
        let folders: Vec<ScanFolder> = self
            .store
            .list_scan_folders()?
            .into_iter()
            .filter(ScanFolder::is_scannable)
            .collect();
        info!(
            known_assets = snapshot.len(),
            folders = folders.len(),
            "Starting full scan"
        );

        self.notifier.on_status(ScannerStatus::Scanning);

        let ignore = compile_ignore_patterns(&self.options.ignore_patterns);
        let walker = FolderWalker::new(&folders, &self.settings, &ignore);
        let total = walker.count_eligible_files(&self.cancel);
        self.total.store(total, Ordering::Relaxed);
        self.notifier.on_progress(0, total, "");
        debug!("{} eligible files found", total);

        let report = match self.run_pipeline(&walker, total) {
            Ok(report) => report,
            Err(e) => {
                self.notifier.on_status(ScannerStatus::Idle);
                return Err(e);
            }
        };
        let cancelled = self.cancel.load(Ordering::Relaxed);

        let soft_deleted = if cancelled {
            info!("Scan cancelled, skipping cleanup");
            0
        } else {
            self.sweep(&snapshot, &report.accounted)
        };

        self.notifier.on_status(ScannerStatus::Idle);

        let summary = ScanSummary {
            total_files: total,
            processed: self.processed.load(Ordering::Relaxed),
            resolutions: report.resolutions,
            rows_applied: report.rows_applied,
            rows_failed: report.rows_failed,
            soft_deleted,
            cancelled,
            duration: started.elapsed(),
        };
        info!(
            "Scan finished in {:.2}s: {} processed, {} rows written, {} soft-deleted",
            summary.duration.as_secs_f64(),
            summary.processed,
            summary.rows_applied,
            summary.soft_deleted,
        );
        Ok(summary)
    }

    /// Producer on this thread, a worker pool, and one collector.
    fn run_pipeline(&self, walker: &FolderWalker<'_>, total: usize) -> Result<CollectorReport> {
        let capacity = self.options.queue_capacity;
        let (job_tx, job_rx) = bounded::<ScanJob>(capacity);
        let (result_tx, result_rx) = bounded::<ScanResult>(capacity);

        let session = ScanSession::new();
        let resolver = self.resolver();
        let collector = Collector::new(
            self.writer(),
            Arc::clone(&self.notifier),
            Arc::clone(&self.processed),
        )
        .with_batch_size(self.options.batch_size)
        .with_progress_every(self.options.progress_every)
        .with_total(total);

        let workers = self.options.workers.max(1);
        debug!("Spawning {} scan workers", workers);

        thread::scope(|s| {
            let collector = s.spawn(move || collector.run(result_rx));

            for _ in 0..workers {
                let jobs = job_rx.clone();
                let results = result_tx.clone();
                let resolver = &resolver;
                let session = &session;
                s.spawn(move || {
                    for job in jobs.iter() {
                        if let Some(result) = resolver.resolve(&job, session) {
                            if results.send(result).is_err() {
                                break;
                            }
                        }
                    }
                });
            }
            drop(job_rx);
            drop(result_tx);

            let produced = walker.produce(&job_tx, &self.cancel);
            drop(job_tx);
            debug!("Producer finished after {} jobs", produced);

            collector
                .join()
                .map_err(|_| Error::Other("collector thread panicked".to_string()))
        })
    }

    /// Soft-deletes every active snapshot path the scan did not see.
    fn sweep(&self, snapshot: &[CachedAsset], accounted: &HashSet<String>) -> usize {
        let mut deleted = 0;
        for cached in snapshot
            .iter()
            .filter(|c| !c.is_deleted && !accounted.contains(&c.file_path))
        {
            match self.store.soft_delete_asset(cached.id) {
                Ok(()) => {
                    info!(path = %cached.file_path, "Cleanup: marked missing file as deleted");
                    deleted += 1;
                }
                Err(e) => error!(path = %cached.file_path, "Cleanup failed: {}", e),
            }
        }
        if deleted > 0 {
            self.notifier.on_library_changed();
        }
        deleted
    }

    /// Reconciles one path right away, the way a full scan would, and commits
    /// the outcome on its own. Returns `None` when nothing applies.
    pub fn scan_file(&self, path: &Path) -> Result<Option<Resolution>> {
        let path_str = path.to_string_lossy().into_owned();
        if !self.settings.is_extension_allowed(path) {
            debug!(path = %path_str, "Live scan skipped: extension not allowed");
            return Ok(None);
        }

        match fs::metadata(path) {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return self.remove_missing(&path_str);
            }
            Err(e) => {
                warn!(path = %path_str, "Live scan could not stat file: {}", e);
                return Err(e.into());
            }
        }

        let folders = self.store.list_scan_folders()?;
        let job = ScanJob {
            folder_id: resolve_folder_id(&folders, path),
            path: path_str,
        };

        let Some(result) = self.resolver().resolve(&job, &ScanSession::new()) else {
            return Ok(None);
        };
        if let Some(e) = &result.error {
            error!(path = %result.path, "Live scan failed: {}", e);
        }
        if let Some(change) = &result.change {
            self.writer().commit(std::slice::from_ref(change))?;
        }
        info!(path = %result.path, resolution = ?result.resolution, "Live scan applied");
        Ok(Some(result.resolution))
    }

    fn remove_missing(&self, path: &str) -> Result<Option<Resolution>> {
        match self.store.asset_by_path(path)? {
            Some(asset) if !asset.is_deleted => {
                self.store.soft_delete_asset(asset.id)?;
                info!(path, "Live scan: file removed, marked as deleted");
                self.notifier.on_library_changed();
                Ok(Some(Resolution::Removed))
            }
            _ => Ok(None),
        }
    }

    /// Drains the live event queue on a dedicated thread until every sender
    /// is gone. Returns `None` if no queue was attached or it is already taken.
    pub fn listen(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let events = self
            .live_events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()?;

        let engine = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name("asset-live".to_string())
            .spawn(move || {
                for path in events.iter() {
                    if let Err(e) = engine.scan_file(&path) {
                        error!(path = %path.display(), "Live update failed: {}", e);
                    }
                }
                debug!("Live event queue closed");
            });

        match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                error!("Failed to spawn live listener: {}", e);
                None
            }
        }
    }
}

/// The most specific scannable folder containing `path`.
pub fn resolve_folder_id(folders: &[ScanFolder], path: &Path) -> Option<i64> {
    folders
        .iter()
        .filter(|f| f.is_scannable() && path.starts_with(&f.path))
        .max_by_key(|f| Path::new(&f.path).components().count())
        .map(|f| f.id)
}
