//! Live filesystem watching for the scan folders.
//!
//! Every directory of every watched tree gets its own non-recursive watch so
//! dot-directories can be left out. Qualifying file events are debounced per
//! path and the settled paths are pushed onto a bounded queue for the engine.

pub mod debounce;

pub use debounce::Debouncer;

use crossbeam_channel::{bounded, select, unbounded, Receiver, Sender, TrySendError};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::config::{non_overlapping_directories, ScannerSettings};
use crate::error::Result;

type Sink = Arc<Mutex<Option<Sender<PathBuf>>>>;

struct WatchState {
    backend: RecommendedWatcher,
    watched: HashSet<PathBuf>,
}

struct Inner {
    state: Mutex<WatchState>,
    settings: Arc<ScannerSettings>,
    debouncer: Debouncer,
    sink: Sink,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, WatchState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn add_watch(&self, dir: &Path) -> Result<()> {
        let mut state = self.lock();
        if state.watched.contains(dir) {
            return Ok(());
        }
        state.backend.watch(dir, RecursiveMode::NonRecursive)?;
        state.watched.insert(dir.to_path_buf());
        Ok(())
    }

    /// Registers `root` and every non-hidden directory below it.
    fn watch_tree(&self, root: &Path) -> usize {
        let mut added = 0usize;
        let walker = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !(e.file_type().is_dir() && is_hidden(e.path())));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!("Skipping path due to access error: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_dir() {
                continue;
            }
            match self.add_watch(entry.path()) {
                Ok(()) => added += 1,
                Err(e) => error!(path = %entry.path().display(), "Failed to watch directory: {}", e),
            }
        }
        added
    }

    fn unwatch_tree(&self, root: &Path) -> usize {
        let mut state = self.lock();
        let doomed: Vec<PathBuf> = state
            .watched
            .iter()
            .filter(|p| p.starts_with(root))
            .cloned()
            .collect();
        for path in &doomed {
            if let Err(e) = state.backend.unwatch(path) {
                debug!(path = %path.display(), "Failed to remove watch: {}", e);
            }
            state.watched.remove(path);
        }
        doomed.len()
    }

    fn forget(&self, dir: &Path) {
        let mut state = self.lock();
        state.watched.retain(|p| !p.starts_with(dir));
    }

    fn qualifies(&self, path: &Path) -> bool {
        !is_ignored_name(path) && self.settings.is_extension_allowed(path)
    }

    fn handle_event(self: &Arc<Self>, event: Event) {
        let created = match event.kind {
            EventKind::Create(_) => true,
            EventKind::Modify(_) | EventKind::Remove(_) => false,
            _ => return,
        };

        for path in event.paths {
            if path.is_dir() {
                if created && !is_hidden(&path) {
                    info!(path = %path.display(), "New directory detected");
                    let inner = Arc::clone(self);
                    let spawned = thread::Builder::new()
                        .name("asset-watch-register".to_string())
                        .spawn(move || {
                            inner.watch_tree(&path);
                        });
                    if let Err(e) = spawned {
                        error!("Failed to spawn directory registration: {}", e);
                    }
                }
                continue;
            }
            if matches!(event.kind, EventKind::Remove(_)) && self.lock().watched.contains(&path) {
                self.forget(&path);
                continue;
            }
            if self.qualifies(&path) {
                self.debouncer.trigger(path);
            }
        }
    }
}

/// Hands a settled path downstream without ever blocking. Paths that no
/// longer exist are dropped; removals are left to the next full scan.
fn forward(sink: &Sink, path: PathBuf) {
    if !path.exists() {
        debug!(path = %path.display(), "Settled path no longer exists, not forwarding");
        return;
    }
    let guard = sink.lock().unwrap_or_else(|e| e.into_inner());
    let Some(tx) = guard.as_ref() else {
        return;
    };
    info!(path = %path.display(), "File ready for scan");
    match tx.try_send(path) {
        Ok(()) => {}
        Err(TrySendError::Full(path)) => {
            warn!(path = %path.display(), "Watcher queue full, dropping event")
        }
        Err(TrySendError::Disconnected(_)) => debug!("Watcher queue has no receiver"),
    }
}

/// Dot-prefixed or `~`-suffixed names are never scanned.
pub fn is_ignored_name(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();
    name.starts_with('.') || name.ends_with('~')
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}

pub struct FolderWatcher {
    inner: Arc<Inner>,
    stop_tx: Sender<()>,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl FolderWatcher {
    /// Creates the watcher and its event loop. The returned receiver yields
    /// each path once it has been quiet for `debounce`; it closes on shutdown.
    pub fn new(
        settings: Arc<ScannerSettings>,
        debounce: Duration,
        capacity: usize,
    ) -> Result<(Self, Receiver<PathBuf>)> {
        let (out_tx, out_rx) = bounded(capacity.max(1));
        let sink: Sink = Arc::new(Mutex::new(Some(out_tx)));

        let settled_sink = Arc::clone(&sink);
        let debouncer = Debouncer::new(debounce, move |path| forward(&settled_sink, path));

        let (raw_tx, raw_rx) = unbounded::<notify::Result<Event>>();
        let backend = notify::recommended_watcher(move |res| {
            let _ = raw_tx.send(res);
        })?;

        let inner = Arc::new(Inner {
            state: Mutex::new(WatchState {
                backend,
                watched: HashSet::new(),
            }),
            settings,
            debouncer,
            sink,
        });

        let (stop_tx, stop_rx) = bounded::<()>(1);
        let loop_inner = Arc::clone(&inner);
        let event_loop = thread::Builder::new()
            .name("asset-watch".to_string())
            .spawn(move || run_event_loop(&loop_inner, &raw_rx, &stop_rx))?;

        Ok((
            Self {
                inner,
                stop_tx,
                threads: Mutex::new(vec![event_loop]),
            },
            out_rx,
        ))
    }

    /// Registers every folder tree in the background.
    pub fn start(&self, folders: Vec<String>) {
        let inner = Arc::clone(&self.inner);
        let spawned = thread::Builder::new()
            .name("asset-watch-init".to_string())
            .spawn(move || {
                info!("Initializing folder watchers in background");
                let roots = non_overlapping_directories(folders);
                let added: usize = roots.iter().map(|r| inner.watch_tree(Path::new(r))).sum();
                info!("{} directories are now being watched", added);
            });
        match spawned {
            Ok(handle) => self
                .threads
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(handle),
            Err(e) => error!("Failed to spawn watcher registration: {}", e),
        }
    }

    /// Adds a folder tree synchronously; returns the number of new watches.
    pub fn watch(&self, root: &Path) -> usize {
        info!(root = %root.display(), "Adding watcher recursively");
        self.inner.watch_tree(root)
    }

    pub fn unwatch(&self, root: &Path) -> usize {
        info!(root = %root.display(), "Removing watchers recursively");
        self.inner.unwatch_tree(root)
    }

    pub fn watched_count(&self) -> usize {
        self.inner.lock().watched.len()
    }

    /// Stops the event loop and pending timers, then closes the output queue.
    /// Safe to call more than once.
    pub fn shutdown(&self) {
        let _ = self.stop_tx.try_send(());
        self.inner.debouncer.shutdown();

        let threads: Vec<JoinHandle<()>> = self
            .threads
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect();
        for handle in threads {
            if handle.join().is_err() {
                error!("Watcher thread panicked");
            }
        }

        let closed = self
            .inner
            .sink
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if closed.is_some() {
            info!("Watcher shut down");
        }
    }
}

impl Drop for FolderWatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_event_loop(
    inner: &Arc<Inner>,
    events: &Receiver<notify::Result<Event>>,
    stop: &Receiver<()>,
) {
    info!("Watcher loop started");
    loop {
        select! {
            recv(events) -> msg => match msg {
                Ok(Ok(event)) => inner.handle_event(event),
                Ok(Err(e)) => error!("Watcher error: {}", e),
                Err(_) => break,
            },
            recv(stop) -> _ => break,
        }
    }
    debug!("Watcher loop stopped");
}
