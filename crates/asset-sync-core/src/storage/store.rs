use super::models::*;
use crate::error::Result;

/// Durable asset/folder persistence consumed by the scan pipeline.
///
/// Workers only read through this trait; writes happen from the collector's
/// batches and the live single-file path.
pub trait AssetStore: Send + Sync {
    fn asset_by_id(&self, id: i64) -> Result<Option<Asset>>;
    fn asset_by_path(&self, path: &str) -> Result<Option<Asset>>;
    /// Any record carrying `hash`, active ones first, then lowest id.
    fn asset_by_hash(&self, hash: &str) -> Result<Option<Asset>>;
    /// Loose `LIKE` filter on file name inside one folder, ascending id.
    fn find_potential_siblings(
        &self,
        folder_id: i64,
        pattern: &str,
        limit: usize,
    ) -> Result<Vec<Asset>>;
    fn list_assets(&self) -> Result<Vec<Asset>>;
    fn insert_asset(&self, asset: &NewAsset) -> Result<i64>;
    fn update_asset(&self, update: &AssetUpdate) -> Result<()>;
    fn soft_delete_asset(&self, id: i64) -> Result<()>;
    /// Applies every change inside one transaction. Individual row failures are
    /// logged and counted; only begin/commit failures abort the batch.
    fn apply_batch(&self, changes: &[AssetChange]) -> Result<BatchOutcome>;

    fn add_scan_folder(&self, path: &str) -> Result<i64>;
    fn list_scan_folders(&self) -> Result<Vec<ScanFolder>>;
    fn list_assets_for_cache(&self) -> Result<Vec<CachedAsset>>;
}
