pub mod classify;
pub mod content;

pub use classify::FileType;
pub use content::compute_content_hash;
