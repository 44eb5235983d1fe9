pub mod models;
pub mod queries;
pub mod sqlite;
pub mod store;

pub use models::*;
pub use sqlite::SqliteStore;
pub use store::AssetStore;
