//! Creation and verification of the cache root directory tree.

use crate::cache::paths::CachePaths;
use crate::constants::WRITE_PROBE_PREFIX;
use crate::core::CacheError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs as async_fs;
use tracing::debug;

/// Make sure the cache root and its subtrees exist and are writable.
///
/// Idempotent and safe to run concurrently from several processes: an
/// existing directory (including one created by a racing process a moment
/// ago) is success. Fails with [`CacheError::CacheUnwritable`] when any of
/// the directories exists as something other than a directory, cannot be
/// created, or rejects writes.
pub async fn ensure_ready(paths: &CachePaths) -> Result<(), CacheError> {
    let root = paths.root();
    check_not_a_file(root).await?;

    for dir in [paths.gopath_dir(), paths.binary_dir(), paths.locks_dir(), paths.markers_dir()] {
        check_not_a_file(&dir).await?;
        async_fs::create_dir_all(&dir).await.map_err(|e| create_failure(&dir, e))?;
    }

    for dir in [root.to_path_buf(), paths.gopath_dir(), paths.binary_dir()] {
        verify_directory(&dir).await?;
        probe_writable(dir).await?;
    }

    debug!(root = %root.display(), "Cache root ready");
    Ok(())
}

async fn check_not_a_file(path: &Path) -> Result<(), CacheError> {
    match async_fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(CacheError::CacheUnwritable {
            path: path.to_path_buf(),
            reason: "path exists but is not a directory".to_string(),
            source: None,
        }),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(CacheError::CacheUnwritable {
            path: path.to_path_buf(),
            reason: "cannot inspect path".to_string(),
            source: Some(e),
        }),
    }
}

async fn verify_directory(path: &Path) -> Result<(), CacheError> {
    let meta = async_fs::metadata(path).await.map_err(|e| CacheError::CacheUnwritable {
        path: path.to_path_buf(),
        reason: "directory vanished after creation".to_string(),
        source: Some(e),
    })?;
    if meta.is_dir() {
        Ok(())
    } else {
        Err(CacheError::CacheUnwritable {
            path: path.to_path_buf(),
            reason: "path exists but is not a directory".to_string(),
            source: None,
        })
    }
}

async fn probe_writable(dir: PathBuf) -> Result<(), CacheError> {
    let probe_dir = dir.clone();
    let result = tokio::task::spawn_blocking(move || {
        tempfile::Builder::new().prefix(WRITE_PROBE_PREFIX).tempfile_in(&probe_dir).map(drop)
    })
    .await
    .map_err(|e| CacheError::CacheUnwritable {
        path: dir.clone(),
        reason: format!("write probe task failed: {e}"),
        source: None,
    })?;

    result.map_err(|e| CacheError::CacheUnwritable {
        path: dir,
        reason: "directory is not writable by the current user".to_string(),
        source: Some(e),
    })
}

fn create_failure(dir: &Path, e: std::io::Error) -> CacheError {
    let reason = match e.kind() {
        ErrorKind::PermissionDenied => "permission denied creating directory".to_string(),
        ErrorKind::NotADirectory | ErrorKind::AlreadyExists => {
            "a parent path exists but is not a directory".to_string()
        }
        ErrorKind::StorageFull => "no space left on device".to_string(),
        _ => "failed to create directory".to_string(),
    };
    CacheError::CacheUnwritable {
        path: dir.to_path_buf(),
        reason,
        source: Some(e),
    }
}
