use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use tracing::trace;

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Streaming BLAKE3 digest of a file, hex encoded.
///
/// Returns `Ok(None)` when the file is larger than `size_ceiling` so that one
/// huge file cannot dominate a scan. A ceiling of 0 hashes everything.
pub fn compute_content_hash(path: &Path, size_ceiling: u64) -> io::Result<Option<String>> {
    let metadata = std::fs::metadata(path)?;
    if size_ceiling > 0 && metadata.len() > size_ceiling {
        trace!(
            "Skipping hash for {} ({} bytes > {} ceiling)",
            path.display(),
            metadata.len(),
            size_ceiling
        );
        return Ok(None);
    }

    let mut file = File::open(path)?;
    let mut hasher = blake3::Hasher::new();
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(Some(hasher.finalize().to_hex().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_identical_content_identical_hash() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.png");
        let b = dir.path().join("b.png");
        fs::write(&a, b"same bytes").unwrap();
        fs::write(&b, b"same bytes").unwrap();

        let ha = compute_content_hash(&a, 0).unwrap().unwrap();
        let hb = compute_content_hash(&b, 0).unwrap().unwrap();
        assert_eq!(ha, hb);
        assert_eq!(ha, blake3::hash(b"same bytes").to_hex().to_string());
    }

    #[test]
    fn test_ceiling_skips_large_files() {
        let dir = tempdir().unwrap();
        let big = dir.path().join("big.exr");
        fs::write(&big, vec![7u8; 2048]).unwrap();

        assert_eq!(compute_content_hash(&big, 1024).unwrap(), None);
        assert!(compute_content_hash(&big, 4096).unwrap().is_some());
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = tempdir().unwrap();
        assert!(compute_content_hash(&dir.path().join("nope.png"), 0).is_err());
    }
}
