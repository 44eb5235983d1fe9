use super::models::*;
use super::sqlite::SqliteStore;
use super::store::AssetStore;
use crate::error::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, error};

const ASSET_COLUMNS: &str = "id, scan_folder_id, group_id, file_name, file_path, file_type, \
     file_size, file_hash, thumbnail_path, image_width, image_height, bit_depth, \
     has_alpha_channel, dominant_color, is_deleted, is_hidden, last_modified, last_scanned";

fn asset_from_row(row: &Row<'_>) -> rusqlite::Result<Asset> {
    Ok(Asset {
        id: row.get(0)?,
        scan_folder_id: row.get(1)?,
        group_id: row.get(2)?,
        file_name: row.get(3)?,
        file_path: row.get(4)?,
        file_type: row.get(5)?,
        file_size: row.get(6)?,
        file_hash: row.get(7)?,
        thumbnail_path: row.get(8)?,
        image_width: row.get(9)?,
        image_height: row.get(10)?,
        bit_depth: row.get(11)?,
        has_alpha_channel: row.get(12)?,
        dominant_color: row.get(13)?,
        is_deleted: row.get(14)?,
        is_hidden: row.get(15)?,
        last_modified: row.get(16)?,
        last_scanned: row.get(17)?,
    })
}

fn insert_asset(conn: &Connection, asset: &NewAsset) -> rusqlite::Result<i64> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO asset \
         (scan_folder_id, group_id, file_name, file_path, file_type, file_size, file_hash, \
          thumbnail_path, image_width, image_height, bit_depth, has_alpha_channel, \
          dominant_color, last_modified, last_scanned) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
    )?;
    stmt.execute(params![
        asset.scan_folder_id,
        asset.group_id,
        asset.file_name,
        asset.file_path,
        asset.file_type,
        asset.file_size,
        asset.file_hash,
        asset.thumbnail_path,
        asset.image_width,
        asset.image_height,
        asset.bit_depth,
        asset.has_alpha_channel,
        asset.dominant_color,
        asset.last_modified,
        asset.last_scanned,
    ])?;
    Ok(conn.last_insert_rowid())
}

fn update_asset(conn: &Connection, update: &AssetUpdate) -> rusqlite::Result<usize> {
    let mut stmt = conn.prepare_cached(
        "UPDATE asset SET \
             file_path = COALESCE(?2, file_path), \
             file_name = COALESCE(?3, file_name), \
             scan_folder_id = COALESCE(?4, scan_folder_id), \
             is_deleted = COALESCE(?5, is_deleted), \
             last_scanned = COALESCE(?6, last_scanned), \
             file_size = COALESCE(?7, file_size), \
             last_modified = COALESCE(?8, last_modified), \
             file_hash = CASE WHEN ?16 THEN ?9 ELSE COALESCE(?9, file_hash) END, \
             thumbnail_path = COALESCE(?10, thumbnail_path), \
             image_width = CASE WHEN ?16 THEN ?11 ELSE COALESCE(?11, image_width) END, \
             image_height = CASE WHEN ?16 THEN ?12 ELSE COALESCE(?12, image_height) END, \
             bit_depth = CASE WHEN ?16 THEN ?13 ELSE COALESCE(?13, bit_depth) END, \
             has_alpha_channel = CASE WHEN ?16 THEN ?14 ELSE COALESCE(?14, has_alpha_channel) END, \
             dominant_color = CASE WHEN ?16 THEN ?15 ELSE COALESCE(?15, dominant_color) END \
         WHERE id = ?1",
    )?;
    stmt.execute(params![
        update.id,
        update.file_path,
        update.file_name,
        update.scan_folder_id,
        update.is_deleted,
        update.last_scanned,
        update.file_size,
        update.last_modified,
        update.file_hash,
        update.thumbnail_path,
        update.image_width,
        update.image_height,
        update.bit_depth,
        update.has_alpha_channel,
        update.dominant_color,
        update.replace_metadata,
    ])
}

impl AssetStore for SqliteStore {
    // ── Assets ───────────────────────────────────────────────────

    fn asset_by_id(&self, id: i64) -> Result<Option<Asset>> {
        let conn = self.connection();
        let asset = conn
            .query_row(
                &format!("SELECT {} FROM asset WHERE id = ?1", ASSET_COLUMNS),
                params![id],
                asset_from_row,
            )
            .optional()?;
        Ok(asset)
    }

    fn asset_by_path(&self, path: &str) -> Result<Option<Asset>> {
        let conn = self.connection();
        let asset = conn
            .query_row(
                &format!("SELECT {} FROM asset WHERE file_path = ?1", ASSET_COLUMNS),
                params![path],
                asset_from_row,
            )
            .optional()?;
        Ok(asset)
    }

    fn asset_by_hash(&self, hash: &str) -> Result<Option<Asset>> {
        let conn = self.connection();
        let asset = conn
            .query_row(
                &format!(
                    "SELECT {} FROM asset WHERE file_hash = ?1 \
                     ORDER BY is_deleted ASC, id ASC LIMIT 1",
                    ASSET_COLUMNS
                ),
                params![hash],
                asset_from_row,
            )
            .optional()?;
        Ok(asset)
    }

    fn find_potential_siblings(
        &self,
        folder_id: i64,
        pattern: &str,
        limit: usize,
    ) -> Result<Vec<Asset>> {
        let conn = self.connection();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM asset \
             WHERE scan_folder_id = ?1 AND file_name LIKE ?2 AND is_deleted = 0 \
             ORDER BY id ASC LIMIT ?3",
            ASSET_COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![folder_id, pattern, limit as i64], asset_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn list_assets(&self) -> Result<Vec<Asset>> {
        let conn = self.connection();
        let mut stmt =
            conn.prepare(&format!("SELECT {} FROM asset ORDER BY id ASC", ASSET_COLUMNS))?;
        let rows = stmt
            .query_map([], asset_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn insert_asset(&self, asset: &NewAsset) -> Result<i64> {
        Ok(insert_asset(&self.connection(), asset)?)
    }

    fn update_asset(&self, update: &AssetUpdate) -> Result<()> {
        update_asset(&self.connection(), update)?;
        Ok(())
    }

    fn soft_delete_asset(&self, id: i64) -> Result<()> {
        self.connection().execute(
            "UPDATE asset SET is_deleted = 1 WHERE id = ?1",
            params![id],
        )?;
        Ok(())
    }

    fn apply_batch(&self, changes: &[AssetChange]) -> Result<BatchOutcome> {
        let mut outcome = BatchOutcome::default();
        if changes.is_empty() {
            return Ok(outcome);
        }

        let mut conn = self.connection();
        let tx = conn.transaction()?;
        for change in changes {
            let res = match change {
                AssetChange::Create(asset) => insert_asset(&tx, asset).map(|_| ()).map_err(|e| {
                    error!("Failed to insert asset {}: {}", asset.file_path, e);
                }),
                AssetChange::Update(update) => update_asset(&tx, update).map(|_| ()).map_err(|e| {
                    error!("Failed to update asset {}: {}", update.id, e);
                }),
            };
            match res {
                Ok(()) => outcome.applied += 1,
                Err(()) => outcome.failed += 1,
            }
        }
        tx.commit()?;
        debug!(
            "Committed batch: {} applied, {} failed",
            outcome.applied, outcome.failed
        );
        Ok(outcome)
    }

    // ── Scan Folders ─────────────────────────────────────────────

    fn add_scan_folder(&self, path: &str) -> Result<i64> {
        let conn = self.connection();
        let now = chrono::Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO scan_folder (path, created_at) VALUES (?1, ?2) \
             ON CONFLICT(path) DO UPDATE SET is_active = 1, is_deleted = 0",
            params![path, now],
        )?;
        let id = conn.query_row(
            "SELECT id FROM scan_folder WHERE path = ?1",
            params![path],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    fn list_scan_folders(&self) -> Result<Vec<ScanFolder>> {
        let conn = self.connection();
        let mut stmt = conn.prepare_cached(
            "SELECT id, path, is_active, is_deleted FROM scan_folder ORDER BY id ASC",
        )?;
        let folders = stmt
            .query_map([], |row| {
                Ok(ScanFolder {
                    id: row.get(0)?,
                    path: row.get(1)?,
                    is_active: row.get(2)?,
                    is_deleted: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(folders)
    }

    fn list_assets_for_cache(&self) -> Result<Vec<CachedAsset>> {
        let conn = self.connection();
        let mut stmt = conn.prepare(
            "SELECT id, file_path, is_deleted FROM asset",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(CachedAsset {
                    id: row.get(0)?,
                    file_path: row.get(1)?,
                    is_deleted: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}
