use asset_sync_core::{FolderWatcher, ScannerSettings};
use std::fs;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tempfile::tempdir;

const DEBOUNCE: Duration = Duration::from_millis(150);

fn watcher() -> (FolderWatcher, crossbeam_channel::Receiver<std::path::PathBuf>) {
    FolderWatcher::new(Arc::new(ScannerSettings::new()), DEBOUNCE, 16).unwrap()
}

#[test]
fn test_rapid_writes_yield_one_event() {
    let tmp = tempdir().unwrap();
    let (watcher, events) = watcher();
    watcher.watch(tmp.path());

    let path = tmp.path().join("Rock.png");
    for i in 0..5 {
        fs::write(&path, format!("pass {}", i)).unwrap();
        thread::sleep(Duration::from_millis(20));
    }

    let settled = events.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(settled, path);
    assert!(events.recv_timeout(DEBOUNCE * 4).is_err());
    watcher.shutdown();
}

#[test]
fn test_filtered_names_are_not_forwarded() {
    let tmp = tempdir().unwrap();
    let (watcher, events) = watcher();
    watcher.watch(tmp.path());

    fs::write(tmp.path().join("notes.txt"), b"text").unwrap();
    fs::write(tmp.path().join(".hidden.png"), b"hidden").unwrap();
    fs::write(tmp.path().join("scene.blend~"), b"backup").unwrap();

    assert!(events.recv_timeout(DEBOUNCE * 4).is_err());
    watcher.shutdown();
}

#[test]
fn test_new_subdirectory_is_watched() {
    let tmp = tempdir().unwrap();
    let (watcher, events) = watcher();
    watcher.watch(tmp.path());
    assert_eq!(watcher.watched_count(), 1);

    let sub = tmp.path().join("props");
    fs::create_dir(&sub).unwrap();
    // registration happens asynchronously
    for _ in 0..50 {
        if watcher.watched_count() == 2 {
            break;
        }
        thread::sleep(Duration::from_millis(20));
    }
    assert_eq!(watcher.watched_count(), 2);

    let path = sub.join("Crate.fbx");
    fs::write(&path, b"crate").unwrap();
    assert_eq!(events.recv_timeout(Duration::from_secs(5)).unwrap(), path);
    watcher.shutdown();
}

#[test]
fn test_start_registers_folders_in_background() {
    let tmp = tempdir().unwrap();
    fs::create_dir_all(tmp.path().join("a/b")).unwrap();
    let (watcher, _events) = watcher();

    let root = tmp.path().to_string_lossy().into_owned();
    let nested = tmp.path().join("a").to_string_lossy().into_owned();
    watcher.start(vec![nested, root]);

    for _ in 0..50 {
        if watcher.watched_count() == 3 {
            break;
        }
        thread::sleep(Duration::from_millis(20));
    }
    assert_eq!(watcher.watched_count(), 3);
}

#[test]
fn test_deleted_file_is_not_forwarded() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("Rock.png");
    fs::write(&path, b"rock").unwrap();
    let (watcher, events) = watcher();
    watcher.watch(tmp.path());

    fs::remove_file(&path).unwrap();

    assert!(events.recv_timeout(DEBOUNCE * 4).is_err());
    watcher.shutdown();
}
