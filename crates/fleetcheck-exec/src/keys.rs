//! SSH private key loading

use std::path::Path;

use russh::keys::{PrivateKey, load_secret_key};
use tracing::{debug, warn};

/// Key loading errors
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("private key `{0}` not found")]
    NotFound(String),

    #[error("private key `{path}` could not be decoded: {message}")]
    Invalid { path: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Load an unencrypted private key from disk
///
/// # Errors
/// Returns `KeyError::NotFound` when the file does not exist and
/// `KeyError::Invalid` when it cannot be parsed as a private key.
pub fn load_private_key(path: &Path) -> Result<PrivateKey, KeyError> {
    let metadata = match std::fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(KeyError::NotFound(path.display().to_string()));
        }
        Err(e) => return Err(KeyError::Io(e)),
    };

    check_permissions(path, &metadata);

    let key = load_secret_key(path, None).map_err(|e| KeyError::Invalid {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    debug!(path = %path.display(), "loaded private key");
    Ok(key)
}

#[cfg(unix)]
fn check_permissions(path: &Path, metadata: &std::fs::Metadata) {
    use std::os::unix::fs::PermissionsExt;

    // group/other bits set
    if metadata.permissions().mode() & 0o77 != 0 {
        warn!(path = %path.display(), "private key permissions are too open (should be 600)");
    }
}

#[cfg(not(unix))]
fn check_permissions(_path: &Path, _metadata: &std::fs::Metadata) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing_key");

        let err = load_private_key(&path).unwrap_err();
        assert!(matches!(err, KeyError::NotFound(_)));
        assert!(err.to_string().contains("missing_key"));
    }

    #[test]
    fn test_garbage_key_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("id_rsa");
        std::fs::write(&path, "not a key").unwrap();

        let err = load_private_key(&path).unwrap_err();
        assert!(matches!(err, KeyError::Invalid { .. }));
    }
}
