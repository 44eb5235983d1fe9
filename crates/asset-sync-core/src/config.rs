use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::RwLock;

/// Extensions that may never be added to the allowed list.
pub const DANGEROUS_EXTENSIONS: &[&str] = &[
    ".exe", ".dll", ".bat", ".cmd", ".sh", ".vbs", ".msi", ".com", ".scr", ".js", ".ps1", ".bin",
];

pub const DEFAULT_ALLOWED_EXTENSIONS: &[&str] = &[
    ".jpg", ".jpeg", ".gif", ".png", ".webp", ".blend", ".fbx", ".obj", ".ztl", ".zpr", ".exr",
    ".hdr", ".tif", ".tiff", ".max", ".ma", ".mb", ".zbr", ".spp", ".sbs", ".sbsar", ".hip",
    ".hipnc", ".hiplc", ".psd", ".psb", ".ai", ".eps", ".uasset", ".umap", ".unity", ".prefab",
    ".mat", ".asset",
];

pub const DEFAULT_MAX_HASH_FILE_SIZE: u64 = 256 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database_path: String,
    pub allowed_extensions: Option<Vec<String>>,
    pub max_hash_file_size: u64,
    pub ignore_patterns: Vec<String>,
    pub debounce_ms: u64,
    pub batch_size: usize,
    pub progress_every: usize,
    pub queue_capacity: usize,
    /// Worker threads for a full scan; 0 means one per CPU core.
    pub workers: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: "asset_sync.db".to_string(),
            allowed_extensions: None,
            max_hash_file_size: DEFAULT_MAX_HASH_FILE_SIZE,
            ignore_patterns: Vec::new(),
            debounce_ms: 500,
            batch_size: 100,
            progress_every: 30,
            queue_capacity: 100,
            workers: 0,
        }
    }
}

impl AppConfig {
    pub fn scanner_settings(&self) -> ScannerSettings {
        let settings = ScannerSettings::new();
        if let Some(exts) = &self.allowed_extensions {
            settings.set_allowed_extensions(exts.iter().map(String::as_str));
        }
        settings.set_max_hash_file_size(self.max_hash_file_size);
        settings
    }

    pub fn worker_count(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4)
    }
}

pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::with_name("Config").required(false))
        .add_source(Environment::with_prefix("ASSET_SYNC").separator("__"))
        .build()?;
    builder.try_deserialize::<AppConfig>()
}

/// Lowercase and force a leading dot: `PNG` and `.png` both become `.png`.
pub fn normalize_extension(ext: &str) -> String {
    let lower = ext.trim().to_lowercase();
    if lower.starts_with('.') {
        lower
    } else {
        format!(".{}", lower)
    }
}

/// Lowercased extension of `path` including the dot, or an empty string.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

pub fn is_extension_valid(ext: &str) -> bool {
    let mut normalized = normalize_extension(ext);
    if let Some(idx) = normalized.rfind('.') {
        normalized = normalized[idx..].to_string();
    }
    normalized.len() > 1 && !DANGEROUS_EXTENSIONS.contains(&normalized.as_str())
}

#[derive(Debug)]
struct SettingsInner {
    allowed_extensions: BTreeSet<String>,
    max_hash_file_size: u64,
}

/// Runtime scanner settings shared between the scan pipeline, the watcher
/// and whatever edits them. Readers never see the backing set directly.
#[derive(Debug)]
pub struct ScannerSettings {
    inner: RwLock<SettingsInner>,
}

impl Default for ScannerSettings {
    fn default() -> Self {
        Self::new()
    }
}

impl ScannerSettings {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(SettingsInner {
                allowed_extensions: DEFAULT_ALLOWED_EXTENSIONS
                    .iter()
                    .map(|e| e.to_string())
                    .collect(),
                max_hash_file_size: DEFAULT_MAX_HASH_FILE_SIZE,
            }),
        }
    }

    pub fn allowed_extensions(&self) -> Vec<String> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.allowed_extensions.iter().cloned().collect()
    }

    pub fn set_allowed_extensions<'a>(&self, exts: impl IntoIterator<Item = &'a str>) {
        let normalized: BTreeSet<String> = exts.into_iter().map(normalize_extension).collect();
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.allowed_extensions = normalized;
    }

    /// Adds every valid extension; dangerous or malformed ones are rejected
    /// and reported together in the returned error.
    pub fn add_extensions(&self, exts: &[&str]) -> Result<bool, String> {
        let mut invalid = Vec::new();
        let mut modified = false;
        {
            let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
            for ext in exts {
                if !is_extension_valid(ext) {
                    invalid.push(ext.to_string());
                    continue;
                }
                modified |= inner.allowed_extensions.insert(normalize_extension(ext));
            }
        }
        if invalid.is_empty() {
            Ok(modified)
        } else {
            Err(format!(
                "invalid or dangerous extensions: {}",
                invalid.join(", ")
            ))
        }
    }

    pub fn remove_extension(&self, ext: &str) -> bool {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.allowed_extensions.remove(&normalize_extension(ext))
    }

    pub fn is_extension_allowed(&self, path: &Path) -> bool {
        let ext = extension_of(path);
        if ext.is_empty() {
            return false;
        }
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.allowed_extensions.contains(&ext)
    }

    /// 0 disables the ceiling.
    pub fn max_hash_file_size(&self) -> u64 {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .max_hash_file_size
    }

    pub fn set_max_hash_file_size(&self, bytes: u64) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.max_hash_file_size = bytes;
    }
}

/// Remove directories that are subdirectories of other directories in the list.
pub fn non_overlapping_directories(dirs: Vec<String>) -> Vec<String> {
    let mut result: Vec<String> = Vec::new();

    for dir in dirs {
        let dir_path = Path::new(&dir);
        if result.iter().any(|res| dir_path.starts_with(res)) {
            continue;
        }
        result.retain(|res| !Path::new(res).starts_with(dir_path));
        result.push(dir);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_allowed_is_case_insensitive() {
        let settings = ScannerSettings::new();
        assert!(settings.is_extension_allowed(Path::new("/a/B.PNG")));
        assert!(!settings.is_extension_allowed(Path::new("/a/readme.txt")));
        assert!(!settings.is_extension_allowed(Path::new("/a/Makefile")));
    }

    #[test]
    fn test_add_extensions_rejects_dangerous() {
        let settings = ScannerSettings::new();
        let err = settings.add_extensions(&["txt", ".EXE"]).unwrap_err();
        assert!(err.contains(".EXE"));
        // the valid one still lands
        assert!(settings.is_extension_allowed(Path::new("notes.txt")));
        assert!(!settings.is_extension_allowed(Path::new("setup.exe")));
    }

    #[test]
    fn test_remove_extension() {
        let settings = ScannerSettings::new();
        assert!(settings.remove_extension("PNG"));
        assert!(!settings.is_extension_allowed(Path::new("a.png")));
        assert!(!settings.remove_extension(".png"));
    }

    #[test]
    fn test_non_overlapping_with_subdirectory() {
        let dirs = vec![
            "/home/user/docs".to_string(),
            "/home/user".to_string(),
            "/var/data".to_string(),
        ];
        let result = non_overlapping_directories(dirs);
        assert_eq!(result.len(), 2);
        assert!(result.contains(&"/home/user".to_string()));
        assert!(result.contains(&"/var/data".to_string()));
    }
}
