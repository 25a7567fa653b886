//! Key checks shared by the backends and the manager.
//!
//! Object keys are opaque to the remote store, but the local backend and
//! `download_as_local_file` map them onto the filesystem, so those paths go
//! through [`key_to_relative_path`].

use crate::traits::{StorageError, StorageResult};
use std::path::{Component, Path, PathBuf};

/// Longest key S3 accepts, in bytes.
pub const MAX_KEY_BYTES: usize = 1024;

pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey("Storage key is empty".to_string()));
    }
    if key.len() > MAX_KEY_BYTES {
        return Err(StorageError::InvalidKey(format!(
            "Storage key is {} bytes, the limit is {}",
            key.len(),
            MAX_KEY_BYTES
        )));
    }
    Ok(())
}

/// Turn a key into a relative path that cannot escape the directory it is joined to.
pub fn key_to_relative_path(key: &str) -> StorageResult<PathBuf> {
    validate_key(key)?;

    if key.contains("..") || key.starts_with('/') || key.contains('\\') {
        return Err(StorageError::InvalidKey(
            "Storage key contains invalid characters".to_string(),
        ));
    }

    let mut path = PathBuf::new();
    for component in Path::new(key).components() {
        match component {
            Component::Normal(part) => path.push(part),
            Component::CurDir => {}
            _ => {
                return Err(StorageError::InvalidKey(
                    "Storage key resolves outside storage directory".to_string(),
                ))
            }
        }
    }

    if path.as_os_str().is_empty() {
        return Err(StorageError::InvalidKey(
            "Storage key has no file name".to_string(),
        ));
    }

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_keys_map_to_nested_paths() {
        let path = key_to_relative_path("images/2024/cat.png").unwrap();
        assert_eq!(path, PathBuf::from("images").join("2024").join("cat.png"));
    }

    #[test]
    fn traversal_is_rejected() {
        for key in ["../etc/passwd", "a/../../b", "/etc/passwd", "a\\b", "./."] {
            assert!(
                matches!(key_to_relative_path(key), Err(StorageError::InvalidKey(_))),
                "{key} should be rejected"
            );
        }
    }

    #[test]
    fn empty_and_oversized_keys_are_rejected() {
        assert!(validate_key("").is_err());
        assert!(validate_key(&"k".repeat(MAX_KEY_BYTES)).is_ok());
        assert!(validate_key(&"k".repeat(MAX_KEY_BYTES + 1)).is_err());
    }
}
