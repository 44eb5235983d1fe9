use std::fmt;

/// Coarse category of an asset. Informational only: the allowed-extension
/// list decides what is scanned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Image,
    Model,
    Texture,
    Other,
}

impl FileType {
    pub fn from_extension(extension: &str) -> Self {
        let ext = extension.to_lowercase();
        match ext.trim_start_matches('.') {
            "jpg" | "jpeg" | "png" | "gif" | "webp" => FileType::Image,

            // DCC scenes, sculpting, procedural and engine assets
            "blend" | "blend1" | "fbx" | "obj" | "max" | "ma" | "mb" | "glb" | "gltf" => {
                FileType::Model
            }
            "ztl" | "zpr" | "zbr" => FileType::Model,
            "hip" | "hipnc" | "hiplc" => FileType::Model,
            "uasset" | "umap" | "unity" | "prefab" | "mat" | "asset" => FileType::Model,

            "psd" | "psb" | "ai" | "eps" | "exr" | "hdr" | "tif" | "tiff" | "tga" => {
                FileType::Texture
            }
            "spp" | "sbs" | "sbsar" => FileType::Texture,

            _ => FileType::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Image => "image",
            FileType::Model => "model",
            FileType::Texture => "texture",
            FileType::Other => "other",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
