use asset_sync_core::storage::{AssetChange, AssetStore, AssetUpdate, NewAsset, SqliteStore};
use tempfile::tempdir;

fn new_asset(folder: Option<i64>, name: &str, group: &str, hash: Option<&str>) -> NewAsset {
    NewAsset {
        scan_folder_id: folder,
        group_id: group.to_string(),
        file_name: name.to_string(),
        file_path: format!("/lib/{}", name),
        file_type: "image".to_string(),
        file_size: 42,
        file_hash: hash.map(str::to_string),
        thumbnail_path: "/placeholders/image_placeholder.webp".to_string(),
        image_width: Some(64),
        image_height: Some(32),
        bit_depth: Some(8),
        has_alpha_channel: Some(false),
        dominant_color: Some("#808080".to_string()),
        last_modified: 1_700_000_000,
        last_scanned: 1_700_000_100,
    }
}

#[test]
fn test_open_on_disk_and_reopen() {
    let tmp = tempdir().unwrap();
    let db_path = tmp.path().join("catalog.db");
    let db_path = db_path.to_string_lossy();

    {
        let store = SqliteStore::open(&db_path).unwrap();
        store.add_scan_folder("/lib").unwrap();
        store.insert_asset(&new_asset(None, "a.png", "g1", Some("h1"))).unwrap();
    }

    let store = SqliteStore::open(&db_path).unwrap();
    assert_eq!(store.list_scan_folders().unwrap().len(), 1);
    let asset = store.asset_by_path("/lib/a.png").unwrap().unwrap();
    assert_eq!(asset.group_id, "g1");
    assert_eq!(asset.image_width, Some(64));
    assert!(!asset.is_deleted);
    assert!(!asset.is_hidden);
}

#[test]
fn test_add_scan_folder_is_idempotent() {
    let store = SqliteStore::open_in_memory().unwrap();
    let first = store.add_scan_folder("/lib").unwrap();
    let second = store.add_scan_folder("/lib").unwrap();
    assert_eq!(first, second);

    let folders = store.list_scan_folders().unwrap();
    assert_eq!(folders.len(), 1);
    assert!(folders[0].is_scannable());
}

#[test]
fn test_update_leaves_unset_columns_untouched() {
    let store = SqliteStore::open_in_memory().unwrap();
    let id = store
        .insert_asset(&new_asset(None, "a.png", "g1", Some("h1")))
        .unwrap();

    store
        .update_asset(&AssetUpdate {
            id,
            file_path: Some("/lib/sub/b.png".to_string()),
            file_name: Some("b.png".to_string()),
            ..Default::default()
        })
        .unwrap();

    let asset = store.asset_by_id(id).unwrap().unwrap();
    assert_eq!(asset.file_path, "/lib/sub/b.png");
    assert_eq!(asset.file_name, "b.png");
    assert_eq!(asset.group_id, "g1");
    assert_eq!(asset.file_hash.as_deref(), Some("h1"));
    assert_eq!(asset.dominant_color.as_deref(), Some("#808080"));
}

#[test]
fn test_refresh_overwrites_metadata_with_nulls() {
    let store = SqliteStore::open_in_memory().unwrap();
    let id = store
        .insert_asset(&new_asset(None, "a.png", "g1", Some("h1")))
        .unwrap();

    let mut fresh = new_asset(None, "a.png", "g1", None);
    fresh.file_size = 4096;
    fresh.image_width = None;
    fresh.image_height = None;
    fresh.bit_depth = None;
    fresh.has_alpha_channel = None;
    fresh.dominant_color = None;
    store.update_asset(&AssetUpdate::refresh(id, &fresh)).unwrap();

    let asset = store.asset_by_id(id).unwrap().unwrap();
    assert_eq!(asset.file_size, 4096);
    assert_eq!(asset.file_hash, None);
    assert_eq!(asset.image_width, None);
    assert_eq!(asset.image_height, None);
    assert_eq!(asset.bit_depth, None);
    assert_eq!(asset.has_alpha_channel, None);
    assert_eq!(asset.dominant_color, None);
    assert_eq!(asset.group_id, "g1");
}

#[test]
fn test_soft_delete_and_undelete() {
    let store = SqliteStore::open_in_memory().unwrap();
    let id = store
        .insert_asset(&new_asset(None, "a.png", "g1", None))
        .unwrap();

    store.soft_delete_asset(id).unwrap();
    assert!(store.asset_by_id(id).unwrap().unwrap().is_deleted);

    store.update_asset(&AssetUpdate::undelete(id, 1_800_000_000)).unwrap();
    let asset = store.asset_by_id(id).unwrap().unwrap();
    assert!(!asset.is_deleted);
    assert_eq!(asset.last_scanned, 1_800_000_000);
    assert_eq!(asset.last_modified, 1_700_000_000);
}

#[test]
fn test_asset_by_hash_prefers_active_then_lowest_id() {
    let store = SqliteStore::open_in_memory().unwrap();
    let first = store
        .insert_asset(&new_asset(None, "a.png", "g1", Some("same")))
        .unwrap();
    let second = store
        .insert_asset(&new_asset(None, "b.png", "g1", Some("same")))
        .unwrap();
    let third = store
        .insert_asset(&new_asset(None, "c.png", "g1", Some("same")))
        .unwrap();

    assert_eq!(store.asset_by_hash("same").unwrap().unwrap().id, first);

    store.soft_delete_asset(first).unwrap();
    assert_eq!(store.asset_by_hash("same").unwrap().unwrap().id, second);

    store.soft_delete_asset(second).unwrap();
    store.soft_delete_asset(third).unwrap();
    assert_eq!(store.asset_by_hash("same").unwrap().unwrap().id, first);

    assert!(store.asset_by_hash("other").unwrap().is_none());
}

#[test]
fn test_potential_siblings_scoped_to_folder_and_active() {
    let store = SqliteStore::open_in_memory().unwrap();
    let lib = store.add_scan_folder("/lib").unwrap();
    let other = store.add_scan_folder("/other").unwrap();

    let env = store
        .insert_asset(&new_asset(Some(lib), "Env.png", "g1", None))
        .unwrap();
    let gone = store
        .insert_asset(&new_asset(Some(lib), "Env_old.png", "g2", None))
        .unwrap();
    store.soft_delete_asset(gone).unwrap();
    let mut elsewhere = new_asset(Some(other), "Env_v3.png", "g3", None);
    elsewhere.file_path = "/other/Env_v3.png".to_string();
    store.insert_asset(&elsewhere).unwrap();

    let found = store.find_potential_siblings(lib, "%env%", 50).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, env);
}

#[test]
fn test_apply_batch_skips_failing_rows() {
    let store = SqliteStore::open_in_memory().unwrap();
    let existing = store
        .insert_asset(&new_asset(None, "a.png", "g1", None))
        .unwrap();

    let changes = vec![
        AssetChange::Create(new_asset(None, "b.png", "g2", None)),
        // duplicate path violates the unique constraint
        AssetChange::Create(new_asset(None, "a.png", "g3", None)),
        AssetChange::Update(AssetUpdate {
            id: existing,
            file_size: Some(7),
            ..Default::default()
        }),
    ];
    let outcome = store.apply_batch(&changes).unwrap();

    assert_eq!(outcome.applied, 2);
    assert_eq!(outcome.failed, 1);
    assert_eq!(store.list_assets().unwrap().len(), 2);
    assert_eq!(store.asset_by_id(existing).unwrap().unwrap().file_size, 7);
}

#[test]
fn test_cache_snapshot_lists_every_row() {
    let store = SqliteStore::open_in_memory().unwrap();
    let a = store
        .insert_asset(&new_asset(None, "a.png", "g1", None))
        .unwrap();
    store
        .insert_asset(&new_asset(None, "b.png", "g1", None))
        .unwrap();
    store.soft_delete_asset(a).unwrap();

    let snapshot = store.list_assets_for_cache().unwrap();
    assert_eq!(snapshot.len(), 2);
    assert!(snapshot.iter().any(|c| c.id == a && c.is_deleted));
}

#[test]
fn test_truncate_all() {
    let store = SqliteStore::open_in_memory().unwrap();
    store.add_scan_folder("/lib").unwrap();
    store
        .insert_asset(&new_asset(None, "a.png", "g1", None))
        .unwrap();
    store.truncate_all().unwrap();
    assert!(store.list_assets().unwrap().is_empty());
    assert!(store.list_scan_folders().unwrap().is_empty());
}
