use chrono::{DateTime, Utc};
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{Resolution, ScanJob, ScanResult, ScanSession};
use crate::config::{extension_of, ScannerSettings};
use crate::error::{Error, Result};
use crate::hasher::{compute_content_hash, FileType};
use crate::matcher;
use crate::storage::{Asset, AssetChange, AssetStore, AssetUpdate, NewAsset};
use crate::thumbnail::{Thumbnail, ThumbnailGenerator};

/// Decides, for one file, whether it is new, a copy, a move, a resurrection,
/// a refresh or unchanged, and builds the matching store change.
///
/// Never writes to the store.
#[derive(Clone)]
pub struct Resolver {
    store: Arc<dyn AssetStore>,
    settings: Arc<ScannerSettings>,
    thumbnails: Arc<dyn ThumbnailGenerator>,
}

impl Resolver {
    pub fn new(
        store: Arc<dyn AssetStore>,
        settings: Arc<ScannerSettings>,
        thumbnails: Arc<dyn ThumbnailGenerator>,
    ) -> Self {
        Self {
            store,
            settings,
            thumbnails,
        }
    }

    /// `None` when the extension is (no longer) allowed; such a path is left
    /// unaccounted and falls to the cleanup sweep.
    pub fn resolve(&self, job: &ScanJob, session: &ScanSession) -> Option<ScanResult> {
        let path = Path::new(&job.path);
        if !self.settings.is_extension_allowed(path) {
            debug!(path = %job.path, "Skipping file: extension not allowed");
            return None;
        }

        let hash = match compute_content_hash(path, self.settings.max_hash_file_size()) {
            Ok(hash) => hash,
            Err(e) => {
                warn!(path = %job.path, "Hashing skipped: {}", e);
                None
            }
        };

        let existing = match self.lookup(&job.path, hash.as_deref()) {
            Ok(existing) => existing,
            Err(e) => {
                error!(path = %job.path, "Store lookup failed: {}", e);
                return Some(ScanResult::failed(&job.path, e));
            }
        };

        let file_type = FileType::from_extension(&extension_of(path));
        let result = match existing {
            Some(asset) => self.resolve_existing(job, session, asset, file_type, hash),
            None => self.resolve_new(job, session, file_type, hash, None, Resolution::New),
        };
        Some(result)
    }

    /// Exact path first; only on a miss, any record with the same bytes.
    fn lookup(&self, path: &str, hash: Option<&str>) -> Result<Option<Asset>> {
        if let Some(asset) = self.store.asset_by_path(path)? {
            return Ok(Some(asset));
        }
        let Some(hash) = hash else {
            return Ok(None);
        };
        let found = self.store.asset_by_hash(hash)?;
        if let Some(asset) = &found {
            debug!(path, old_path = %asset.file_path, "Found existing asset by hash");
        }
        Ok(found)
    }

    fn resolve_existing(
        &self,
        job: &ScanJob,
        session: &ScanSession,
        existing: Asset,
        file_type: FileType,
        hash: Option<String>,
    ) -> ScanResult {
        if existing.file_path == job.path {
            return self.resolve_same_path(job, existing, file_type, hash);
        }

        let old_missing = matches!(
            fs::metadata(&existing.file_path),
            Err(ref e) if e.kind() == io::ErrorKind::NotFound
        );

        if old_missing && session.claim_move(existing.id) {
            info!(old_path = %existing.file_path, new_path = %job.path, "Move/rename detected");
            let update = AssetUpdate {
                id: existing.id,
                file_path: Some(job.path.clone()),
                file_name: Some(file_name_of(&job.path)),
                scan_folder_id: job.folder_id,
                is_deleted: Some(false),
                last_scanned: Some(Utc::now().timestamp()),
                ..Default::default()
            };
            let mut result = ScanResult::new(&job.path, Resolution::Moved);
            result.change = Some(AssetChange::Update(update));
            result.existing_path = Some(existing.file_path);
            return result;
        }

        info!(original_id = existing.id, new_copy_path = %job.path, "Duplicate detected (copy)");
        self.resolve_new(
            job,
            session,
            file_type,
            hash,
            Some(existing.group_id),
            Resolution::Copy,
        )
    }

    fn resolve_same_path(
        &self,
        job: &ScanJob,
        existing: Asset,
        file_type: FileType,
        hash: Option<String>,
    ) -> ScanResult {
        let resurrected = existing.is_deleted;
        if resurrected {
            info!(id = existing.id, path = %job.path, "Resurrection: restoring soft-deleted asset");
        }

        let disk_mtime = match fs::metadata(&job.path).and_then(|m| m.modified()) {
            Ok(modified) => unix_seconds(modified),
            Err(e) => {
                warn!(path = %job.path, "Failed to stat known asset: {}", e);
                return ScanResult::failed(&job.path, e.into());
            }
        };

        let now = Utc::now().timestamp();
        let mut result = ScanResult::new(&job.path, Resolution::Unchanged);

        if disk_mtime != existing.last_modified {
            info!(path = %job.path, "File changed on disk: refreshing metadata");
            match self.build_asset(job, file_type, hash, &existing.group_id) {
                Ok(fresh) => {
                    result.resolution = if resurrected {
                        Resolution::Resurrected
                    } else {
                        Resolution::Refreshed
                    };
                    result.change = Some(AssetChange::Update(AssetUpdate::refresh(
                        existing.id,
                        &fresh,
                    )));
                }
                Err(e) => {
                    error!(path = %job.path, "Failed to regenerate metadata: {}", e);
                    if resurrected {
                        result.resolution = Resolution::Resurrected;
                        result.change =
                            Some(AssetChange::Update(AssetUpdate::undelete(existing.id, now)));
                    } else {
                        result.resolution = Resolution::Failed;
                        result.error = Some(e);
                    }
                }
            }
        } else if resurrected {
            result.resolution = Resolution::Resurrected;
            result.change = Some(AssetChange::Update(AssetUpdate::undelete(existing.id, now)));
        }

        result
    }

    /// Grouping priority: stored record with the same bytes, the session's
    /// hash cache, a filename sibling, then a fresh id. Whatever is picked is
    /// published for the hash so concurrent copies converge.
    fn resolve_new(
        &self,
        job: &ScanJob,
        session: &ScanSession,
        file_type: FileType,
        hash: Option<String>,
        store_group: Option<String>,
        resolution: Resolution,
    ) -> ScanResult {
        let file_name = file_name_of(&job.path);

        let mut group_id = store_group;
        if group_id.is_none() {
            if let Some(hash) = hash.as_deref() {
                group_id = session.hash_group(hash);
                if let Some(g) = &group_id {
                    info!(new_path = %job.path, group_id = %g, "Exact duplicate found (session)");
                }
            }
        }
        let from_hash = group_id.is_some();
        if group_id.is_none() {
            if let Some(folder_id) = job.folder_id {
                group_id = matcher::try_match(self.store.as_ref(), session, folder_id, &file_name);
                if let Some(g) = &group_id {
                    info!(new_path = %job.path, group_id = %g, "Heuristic match found (name)");
                }
            }
        }
        let mut group_id = group_id.unwrap_or_else(|| Uuid::new_v4().to_string());

        // a sibling published concurrently wins over a name-derived or fresh group
        if let Some(folder_id) = job.folder_id {
            let canonical = matcher::canonical_name(&file_name);
            if canonical.chars().count() >= matcher::MIN_CANONICAL_LEN {
                let registered = session.publish_name_group(folder_id, canonical, &group_id);
                if !from_hash {
                    group_id = registered;
                }
            }
        }
        if let Some(hash) = hash.as_deref() {
            group_id = session.publish_hash_group(hash, group_id);
        }

        match self.build_asset(job, file_type, hash, &group_id) {
            Ok(asset) => {
                debug!(path = %job.path, group_id = %group_id, "New asset resolved");
                let mut result = ScanResult::new(&job.path, resolution);
                result.change = Some(AssetChange::Create(asset));
                result
            }
            Err(e) => {
                error!(path = %job.path, "Failed to generate metadata for new asset: {}", e);
                ScanResult::failed(&job.path, e)
            }
        }
    }

    fn build_asset(
        &self,
        job: &ScanJob,
        file_type: FileType,
        hash: Option<String>,
        group_id: &str,
    ) -> std::result::Result<NewAsset, Error> {
        let path = Path::new(&job.path);
        let thumb = self.thumbnails.generate(path).unwrap_or_else(|e| {
            warn!(path = %job.path, "Thumbnail generation failed, using placeholder: {}", e);
            Thumbnail::placeholder()
        });
        let metadata = fs::metadata(path)?;
        let meta = &thumb.metadata;
        let sized = meta.has_dimensions();

        Ok(NewAsset {
            scan_folder_id: job.folder_id,
            group_id: group_id.to_string(),
            file_name: file_name_of(&job.path),
            file_path: job.path.clone(),
            file_type: file_type.to_string(),
            file_size: metadata.len() as i64,
            file_hash: hash,
            thumbnail_path: thumb.reference.clone(),
            image_width: sized.then_some(meta.width as i64),
            image_height: sized.then_some(meta.height as i64),
            bit_depth: sized.then_some(meta.bit_depth as i64),
            has_alpha_channel: sized.then_some(meta.has_alpha),
            dominant_color: meta.dominant_color.clone(),
            last_modified: unix_seconds(metadata.modified()?),
            last_scanned: Utc::now().timestamp(),
        })
    }
}

pub(crate) fn unix_seconds(time: SystemTime) -> i64 {
    DateTime::<Utc>::from(time).timestamp()
}

pub(crate) fn file_name_of(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default()
}
