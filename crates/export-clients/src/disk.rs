//! Free disk space probe for the archive output location.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use export_common::{ExportError, ExportResult};

/// Free and total capacity of the filesystem holding a path, in bytes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct StorageStatus {
    pub free: u64,
    pub size: u64,
}

/// The disk probe collaborator interface.
#[async_trait]
pub trait DiskProbe: Send + Sync {
    /// Report free and total space of the filesystem containing `path`.
    async fn free_and_total(&self, path: &Path) -> ExportResult<StorageStatus>;
}

/// `statvfs(3)`-backed probe.
#[derive(Debug, Clone, Default)]
pub struct StatvfsProbe;

#[async_trait]
impl DiskProbe for StatvfsProbe {
    async fn free_and_total(&self, path: &Path) -> ExportResult<StorageStatus> {
        let path: PathBuf = path.to_path_buf();
        tokio::task::spawn_blocking(move || {
            let stat = nix::sys::statvfs::statvfs(&path).map_err(|e| {
                ExportError::Collaborator(format!(
                    "Failed to stat filesystem at {}: {}",
                    path.display(),
                    e
                ))
            })?;
            let fragment = stat.fragment_size() as u64;
            Ok(StorageStatus {
                free: stat.blocks_available() as u64 * fragment,
                size: stat.blocks() as u64 * fragment,
            })
        })
        .await
        .map_err(|e| ExportError::Collaborator(format!("Disk probe task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_probe_reports_capacity() {
        let dir = tempfile::tempdir().unwrap();
        let status = StatvfsProbe.free_and_total(dir.path()).await.unwrap();
        assert!(status.size > 0);
        assert!(status.free <= status.size);
    }

    #[tokio::test]
    async fn test_probe_missing_path_fails() {
        let result = StatvfsProbe
            .free_and_total(Path::new("/definitely/not/a/real/path"))
            .await;
        assert!(result.is_err());
    }
}
