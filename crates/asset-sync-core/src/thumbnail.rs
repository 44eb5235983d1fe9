use crate::error::{Error, Result};
use crate::hasher::FileType;
use std::path::Path;

pub const GENERIC_PLACEHOLDER: &str = "/placeholders/generic_placeholder.webp";

/// Technical image details; zeroed for anything that is not a decodable image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
    pub bit_depth: u8,
    pub has_alpha: bool,
    pub dominant_color: Option<String>,
}

impl ImageMetadata {
    pub fn has_dimensions(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

#[derive(Debug, Clone, Default)]
pub struct Thumbnail {
    pub reference: String,
    pub metadata: ImageMetadata,
}

impl Thumbnail {
    pub fn placeholder() -> Self {
        Self {
            reference: GENERIC_PLACEHOLDER.to_string(),
            metadata: ImageMetadata::default(),
        }
    }
}

/// Renders a preview and extracts image metadata for one file.
pub trait ThumbnailGenerator: Send + Sync {
    fn generate(&self, path: &Path) -> Result<Thumbnail>;
}

/// Hands out a static placeholder per file category without touching pixels.
pub struct PlaceholderThumbnails;

impl ThumbnailGenerator for PlaceholderThumbnails {
    fn generate(&self, path: &Path) -> Result<Thumbnail> {
        if !path.is_file() {
            return Err(Error::Metadata(format!(
                "{} is not a regular file",
                path.display()
            )));
        }
        let ext = crate::config::extension_of(path);
        let reference = match FileType::from_extension(&ext) {
            FileType::Image => "/placeholders/image_placeholder.webp",
            FileType::Model => "/placeholders/model_placeholder.webp",
            FileType::Texture => "/placeholders/texture_placeholder.webp",
            FileType::Other => GENERIC_PLACEHOLDER,
        };
        Ok(Thumbnail {
            reference: reference.to_string(),
            metadata: ImageMetadata::default(),
        })
    }
}
