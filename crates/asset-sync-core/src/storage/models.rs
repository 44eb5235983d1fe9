/// A cataloged file. Timestamps are unix seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct Asset {
    pub id: i64,
    pub scan_folder_id: Option<i64>,
    pub group_id: String,
    pub file_name: String,
    pub file_path: String,
    pub file_type: String,
    pub file_size: i64,
    pub file_hash: Option<String>,
    pub thumbnail_path: String,
    pub image_width: Option<i64>,
    pub image_height: Option<i64>,
    pub bit_depth: Option<i64>,
    pub has_alpha_channel: Option<bool>,
    pub dominant_color: Option<String>,
    pub is_deleted: bool,
    pub is_hidden: bool,
    pub last_modified: i64,
    pub last_scanned: i64,
}

/// A root directory whose subtree is scanned and watched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanFolder {
    pub id: i64,
    pub path: String,
    pub is_active: bool,
    pub is_deleted: bool,
}

impl ScanFolder {
    pub fn is_scannable(&self) -> bool {
        self.is_active && !self.is_deleted
    }
}

/// Minimal per-asset state loaded before a scan for the cleanup diff.
#[derive(Debug, Clone)]
pub struct CachedAsset {
    pub id: i64,
    pub file_path: String,
    pub is_deleted: bool,
}

/// Insert parameters for a newly discovered file.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAsset {
    pub scan_folder_id: Option<i64>,
    pub group_id: String,
    pub file_name: String,
    pub file_path: String,
    pub file_type: String,
    pub file_size: i64,
    pub file_hash: Option<String>,
    pub thumbnail_path: String,
    pub image_width: Option<i64>,
    pub image_height: Option<i64>,
    pub bit_depth: Option<i64>,
    pub has_alpha_channel: Option<bool>,
    pub dominant_color: Option<String>,
    pub last_modified: i64,
    pub last_scanned: i64,
}

/// Column-level patch: `None` leaves the stored value untouched, unless
/// `replace_metadata` is set, in which case the hash and image columns are
/// written as given, `None` included.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssetUpdate {
    pub id: i64,
    pub file_path: Option<String>,
    pub file_name: Option<String>,
    pub scan_folder_id: Option<i64>,
    pub is_deleted: Option<bool>,
    pub last_scanned: Option<i64>,
    pub file_size: Option<i64>,
    pub last_modified: Option<i64>,
    pub file_hash: Option<String>,
    pub thumbnail_path: Option<String>,
    pub image_width: Option<i64>,
    pub image_height: Option<i64>,
    pub bit_depth: Option<i64>,
    pub has_alpha_channel: Option<bool>,
    pub dominant_color: Option<String>,
    pub replace_metadata: bool,
}

impl AssetUpdate {
    /// Clears the soft-delete flag and stamps the scan time, nothing else.
    pub fn undelete(id: i64, now: i64) -> Self {
        Self {
            id,
            is_deleted: Some(false),
            last_scanned: Some(now),
            ..Default::default()
        }
    }

    /// Full technical refresh from freshly generated metadata.
    pub fn refresh(id: i64, fresh: &NewAsset) -> Self {
        Self {
            id,
            is_deleted: Some(false),
            last_scanned: Some(fresh.last_scanned),
            file_size: Some(fresh.file_size),
            last_modified: Some(fresh.last_modified),
            file_hash: fresh.file_hash.clone(),
            thumbnail_path: Some(fresh.thumbnail_path.clone()),
            image_width: fresh.image_width,
            image_height: fresh.image_height,
            bit_depth: fresh.bit_depth,
            has_alpha_channel: fresh.has_alpha_channel,
            dominant_color: fresh.dominant_color.clone(),
            replace_metadata: true,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AssetChange {
    Create(NewAsset),
    Update(AssetUpdate),
}

/// Row accounting for one committed batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub applied: usize,
    pub failed: usize,
}
