use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error};

struct State {
    deadlines: HashMap<PathBuf, Instant>,
    stopped: bool,
}

struct Shared {
    state: Mutex<State>,
    wake: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Per-path quiet-window timer. Every trigger pushes that path's deadline
/// out by `delay`; a path is handed to the callback once, after it has been
/// quiet for the whole window. One timer thread serves all paths.
pub struct Debouncer {
    shared: Arc<Shared>,
    delay: Duration,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl Debouncer {
    pub fn new<F>(delay: Duration, on_settled: F) -> Self
    where
        F: Fn(PathBuf) + Send + 'static,
    {
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                deadlines: HashMap::new(),
                stopped: false,
            }),
            wake: Condvar::new(),
        });

        let timer_shared = Arc::clone(&shared);
        let timer = thread::Builder::new()
            .name("asset-debounce".to_string())
            .spawn(move || run_timer(&timer_shared, on_settled))
            .map_err(|e| error!("Failed to spawn debounce timer: {}", e))
            .ok();

        Self {
            shared,
            delay,
            timer: Mutex::new(timer),
        }
    }

    /// (Re)starts the quiet window for `path`.
    pub fn trigger(&self, path: PathBuf) {
        let mut state = self.shared.lock();
        if state.stopped {
            return;
        }
        state.deadlines.insert(path, Instant::now() + self.delay);
        self.shared.wake.notify_one();
    }

    pub fn pending(&self) -> usize {
        self.shared.lock().deadlines.len()
    }

    /// Drops every pending timer and stops the timer thread. Idempotent.
    pub fn shutdown(&self) {
        {
            let mut state = self.shared.lock();
            state.stopped = true;
            state.deadlines.clear();
        }
        self.shared.wake.notify_all();

        let handle = self
            .timer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("Debounce timer thread panicked");
            }
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_timer<F: Fn(PathBuf)>(shared: &Shared, on_settled: F) {
    loop {
        let due = {
            let mut state = shared.lock();
            loop {
                if state.stopped {
                    debug!("Debounce timer stopped");
                    return;
                }
                let now = Instant::now();
                let due: Vec<PathBuf> = state
                    .deadlines
                    .iter()
                    .filter(|(_, deadline)| **deadline <= now)
                    .map(|(path, _)| path.clone())
                    .collect();
                if !due.is_empty() {
                    for path in &due {
                        state.deadlines.remove(path);
                    }
                    break due;
                }
                state = match state.deadlines.values().min().copied() {
                    Some(next) => {
                        shared
                            .wake
                            .wait_timeout(state, next - now)
                            .unwrap_or_else(|e| e.into_inner())
                            .0
                    }
                    None => shared.wake.wait(state).unwrap_or_else(|e| e.into_inner()),
                };
            }
        };

        // lock released before the callback
        for path in due {
            on_settled(path);
        }
    }
}
