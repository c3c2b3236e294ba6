//! Asset fingerprints for the packaging system.
//!
//! The deployment side treats the output directory as the payload and uses
//! the fingerprint to decide whether it changed.

use crate::error::{ErrorExt, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;

/// How the bundle's asset hash is derived.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum AssetHashType {
    /// Hash the contents of the output directory
    #[default]
    Output,
    /// Caller-provided fingerprint
    Custom(String),
}

impl AssetHashType {
    /// Computes the fingerprint for a finished output directory.
    pub fn compute(&self, output_dir: &Path) -> Result<String> {
        match self {
            AssetHashType::Output => hash_directory(output_dir),
            AssetHashType::Custom(fingerprint) => {
                Ok(format!("{:x}", Sha256::digest(fingerprint.as_bytes())))
            }
        }
    }
}

/// SHA-256 over every regular file below `dir`.
///
/// Files are visited in sorted path order and each contributes its relative
/// path followed by its contents, so the hash only depends on the tree.
pub fn hash_directory(dir: &Path) -> Result<String> {
    let mut entries = Vec::new();
    for entry in walkdir::WalkDir::new(dir).follow_links(false) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(dir).to_path_buf();
            let io = e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("filesystem loop"));
            crate::error::BundleError::Fs {
                context: "walking output directory",
                path,
                error: io,
            }
        })?;
        if entry.file_type().is_file() {
            entries.push(entry.into_path());
        }
    }
    entries.sort();

    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 8192];

    for path in entries {
        if let Ok(rel_path) = path.strip_prefix(dir) {
            // Normalize separators so Windows and Unix agree on the hash.
            hasher.update(rel_path.to_string_lossy().replace('\\', "/").as_bytes());
        }

        let mut file =
            std::fs::File::open(&path).fs_context("opening file for hashing", &path)?;
        loop {
            let n = file
                .read(&mut buffer)
                .fs_context("reading file for hash calculation", &path)?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
        }
    }

    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn output_hash_is_stable_and_content_sensitive() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("handler")).unwrap();
        fs::write(dir.path().join("handler/bootstrap"), b"\x7fELF").unwrap();

        let first = AssetHashType::Output.compute(dir.path()).unwrap();
        let second = AssetHashType::Output.compute(dir.path()).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);

        fs::write(dir.path().join("handler/bootstrap"), b"\x7fELF2").unwrap();
        assert_ne!(first, AssetHashType::Output.compute(dir.path()).unwrap());
    }

    #[test]
    fn renaming_a_file_changes_the_hash() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("bootstrap"), b"same").unwrap();
        let before = hash_directory(dir.path()).unwrap();
        fs::rename(dir.path().join("bootstrap"), dir.path().join("other")).unwrap();
        assert_ne!(before, hash_directory(dir.path()).unwrap());
    }

    #[test]
    fn custom_fingerprint_ignores_directory_contents() {
        let dir = TempDir::new().unwrap();
        let custom = AssetHashType::Custom("v42".to_string());
        let before = custom.compute(dir.path()).unwrap();
        fs::write(dir.path().join("bootstrap"), b"anything").unwrap();
        assert_eq!(before, custom.compute(dir.path()).unwrap());
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(hash_directory(&dir.path().join("missing")).is_err());
    }
}
