//! SHA-256 content digests used to skip re-pushing identical content.

use std::fs::File;
use std::io;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::{io_err, SyncError};

/// Hex SHA-256 of the file at `path`, streamed.
pub fn file_digest(path: &Path) -> Result<String, SyncError> {
    let mut file = File::open(path).map_err(|e| io_err(path, e))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher).map_err(|e| io_err(path, e))?;
    Ok(hex::encode(hasher.finalize()))
}

/// Hex SHA-256 of an in-memory buffer.
pub fn bytes_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn file_and_bytes_digest_agree() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("theme.liquid");
        std::fs::write(&path, b"{{ content_for_layout }}").unwrap();
        assert_eq!(
            file_digest(&path).unwrap(),
            bytes_digest(b"{{ content_for_layout }}")
        );
    }

    #[test]
    fn missing_file_is_io_error() {
        let tmp = TempDir::new().unwrap();
        let err = file_digest(&tmp.path().join("nope")).unwrap_err();
        assert!(matches!(err, SyncError::Io { .. }), "got: {err}");
    }
}
