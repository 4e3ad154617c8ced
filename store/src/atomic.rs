//! Atomic file replacement and startup loading.

use serde::de::DeserializeOwned;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::error;

use multiwallet_common::StorageError;

/// Temporary sibling of the target file, used for the write-then-rename swap.
fn tmp_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(".tmp");
    PathBuf::from(os)
}

/// Write `bytes` to a temporary file beside `path`, then atomically rename it
/// over `path`.
///
/// On any failure the target file keeps its previous contents and the
/// temporary file is removed; the rename consumes it on success, so the
/// temporary never outlives the call either way.
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let tmp = tmp_path(path);

    let result = async {
        fs::write(&tmp, bytes)
            .await
            .map_err(|e| StorageError::io(&tmp, e))?;
        fs::rename(&tmp, path)
            .await
            .map_err(|e| StorageError::io(path, e))
    }
    .await;

    if result.is_err() {
        let _ = fs::remove_file(&tmp).await;
    }

    result
}

/// Load a JSON collection at startup, tolerating an absent or unreadable
/// file.
///
/// A missing file is created empty so the first persist has a directory
/// entry to replace. An empty file is an empty collection. A file that
/// cannot be read or parsed is logged and the collection starts empty; the
/// next successful persist overwrites it.
pub(crate) async fn load_or_init<T: DeserializeOwned>(path: &Path, file_kind: &str) -> Vec<T> {
    match fs::read(path).await {
        Ok(bytes) => {
            if bytes.iter().all(u8::is_ascii_whitespace) {
                return Vec::new();
            }
            match serde_json::from_slice(&bytes) {
                Ok(items) => items,
                Err(e) => {
                    error!(
                        path = %path.display(),
                        file = file_kind,
                        error = %e,
                        "Failed to parse backing file, starting empty"
                    );
                    Vec::new()
                }
            }
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            if let Err(e) = fs::write(path, b"").await {
                error!(
                    path = %path.display(),
                    file = file_kind,
                    error = %e,
                    "Failed to create backing file"
                );
            }
            Vec::new()
        }
        Err(e) => {
            error!(
                path = %path.display(),
                file = file_kind,
                error = %e,
                "Failed to read backing file, starting empty"
            );
            Vec::new()
        }
    }
}
