use crossbeam_channel::{SendTimeoutError, Sender};
use glob::Pattern;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, error, info};
use walkdir::WalkDir;

use super::ScanJob;
use crate::config::ScannerSettings;
use crate::storage::ScanFolder;

const SEND_POLL: Duration = Duration::from_millis(50);

pub fn compile_ignore_patterns(globs: &[String]) -> Vec<Pattern> {
    globs
        .iter()
        .filter_map(|glob| match Pattern::new(glob) {
            Ok(p) => Some(p),
            Err(e) => {
                error!("Invalid glob pattern '{}': {}", glob, e);
                None
            }
        })
        .collect()
}

/// Enumerates eligible files under the scan folders.
///
/// A folder nested inside another scan folder is walked only on its own, so
/// each file is attributed to its most specific folder exactly once.
pub struct FolderWalker<'a> {
    folders: &'a [ScanFolder],
    settings: &'a ScannerSettings,
    ignore_patterns: &'a [Pattern],
}

impl<'a> FolderWalker<'a> {
    pub fn new(
        folders: &'a [ScanFolder],
        settings: &'a ScannerSettings,
        ignore_patterns: &'a [Pattern],
    ) -> Self {
        Self {
            folders,
            settings,
            ignore_patterns,
        }
    }

    fn nested_roots(&self, folder: &ScanFolder) -> Vec<PathBuf> {
        let root = Path::new(&folder.path);
        self.folders
            .iter()
            .map(|f| PathBuf::from(&f.path))
            .filter(|p| p.as_path() != root && p.starts_with(root))
            .collect()
    }

    /// Calls `visit` for every eligible file in `folder` until it returns false
    /// or `cancel` is raised. Unreadable entries are skipped.
    pub fn walk_folder(
        &self,
        folder: &ScanFolder,
        cancel: &AtomicBool,
        mut visit: impl FnMut(PathBuf) -> bool,
    ) {
        let nested = self.nested_roots(folder);
        let walker = WalkDir::new(&folder.path)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| {
                if entry.depth() > 0
                    && entry.file_type().is_dir()
                    && nested.iter().any(|n| n.as_path() == entry.path())
                {
                    return false;
                }
                !self
                    .ignore_patterns
                    .iter()
                    .any(|pattern| pattern.matches_path(entry.path()))
            });

        for entry in walker {
            if cancel.load(Ordering::Relaxed) {
                debug!("Walk of {} aborted by cancellation", folder.path);
                return;
            }
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!("Skipping unreadable entry under {}: {}", folder.path, e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            if !self.settings.is_extension_allowed(entry.path()) {
                continue;
            }
            if !visit(entry.into_path()) {
                return;
            }
        }
    }

    /// Total eligible files across all folders, for progress reporting.
    pub fn count_eligible_files(&self, cancel: &AtomicBool) -> usize {
        self.folders
            .par_iter()
            .map(|folder| {
                let mut count = 0usize;
                self.walk_folder(folder, cancel, |_| {
                    count += 1;
                    true
                });
                count
            })
            .sum()
    }

    /// Pushes a job per eligible file onto the bounded queue. Blocks while the
    /// queue is full and gives up as soon as `cancel` is raised.
    pub fn produce(&self, jobs: &Sender<ScanJob>, cancel: &AtomicBool) -> usize {
        let mut produced = 0usize;
        for folder in self.folders {
            if cancel.load(Ordering::Relaxed) {
                break;
            }
            info!("Scanning folder {}", folder.path);
            self.walk_folder(folder, cancel, |path| {
                let job = ScanJob {
                    path: path.to_string_lossy().into_owned(),
                    folder_id: Some(folder.id),
                };
                if send_cancellable(jobs, job, cancel) {
                    produced += 1;
                    true
                } else {
                    false
                }
            });
        }
        produced
    }
}

fn send_cancellable(jobs: &Sender<ScanJob>, mut job: ScanJob, cancel: &AtomicBool) -> bool {
    loop {
        match jobs.send_timeout(job, SEND_POLL) {
            Ok(()) => return true,
            Err(SendTimeoutError::Timeout(returned)) => {
                if cancel.load(Ordering::Relaxed) {
                    return false;
                }
                job = returned;
            }
            Err(SendTimeoutError::Disconnected(_)) => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn folder(id: i64, path: &Path) -> ScanFolder {
        ScanFolder {
            id,
            path: path.to_string_lossy().into_owned(),
            is_active: true,
            is_deleted: false,
        }
    }

    #[test]
    fn test_count_filters_by_extension_and_ignore() {
        let tmp = tempdir().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("sub")).unwrap();
        fs::create_dir_all(root.join("cache")).unwrap();
        fs::write(root.join("a.png"), b"a").unwrap();
        fs::write(root.join("notes.txt"), b"n").unwrap();
        fs::write(root.join("sub/b.fbx"), b"b").unwrap();
        fs::write(root.join("cache/c.png"), b"c").unwrap();

        let folders = vec![folder(1, root)];
        let settings = ScannerSettings::new();
        let ignore = compile_ignore_patterns(&["**/cache".to_string()]);
        let walker = FolderWalker::new(&folders, &settings, &ignore);

        assert_eq!(walker.count_eligible_files(&AtomicBool::new(false)), 2);
    }

    #[test]
    fn test_nested_folder_attributed_once() {
        let tmp = tempdir().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("inner")).unwrap();
        fs::write(root.join("outer.png"), b"o").unwrap();
        fs::write(root.join("inner/inner.png"), b"i").unwrap();

        let folders = vec![folder(1, root), folder(2, &root.join("inner"))];
        let settings = ScannerSettings::new();
        let walker = FolderWalker::new(&folders, &settings, &[]);
        let (tx, rx) = crossbeam_channel::unbounded();

        let produced = walker.produce(&tx, &AtomicBool::new(false));
        drop(tx);
        let jobs: Vec<ScanJob> = rx.iter().collect();

        assert_eq!(produced, 2);
        let inner = jobs.iter().find(|j| j.path.ends_with("inner.png")).unwrap();
        assert_eq!(inner.folder_id, Some(2));
    }

    #[test]
    fn test_produce_stops_on_cancel() {
        let tmp = tempdir().unwrap();
        for i in 0..5 {
            fs::write(tmp.path().join(format!("f{}.png", i)), b"x").unwrap();
        }
        let folders = vec![folder(1, tmp.path())];
        let settings = ScannerSettings::new();
        let walker = FolderWalker::new(&folders, &settings, &[]);
        let (tx, _rx) = crossbeam_channel::bounded(1);

        let produced = walker.produce(&tx, &AtomicBool::new(true));
        assert_eq!(produced, 0);
    }
}
