use crate::core::Storage;
use crate::utils::error::Result;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Writes the CSV table into a directory on the local disk.
///
/// The bytes go to a `.tmp` sibling first and are renamed over the target, so
/// an interrupted run leaves either the previous file or the new one.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    output_dir: PathBuf,
}

impl LocalStorage {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn target(&self, file_name: &str) -> PathBuf {
        self.output_dir.join(file_name)
    }
}

fn staging_path(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    target.with_file_name(name)
}

impl Storage for LocalStorage {
    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(fs::try_exists(self.target(path)).await?)
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let target = self.target(path);

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }

        let staging = staging_path(&target);
        fs::write(&staging, data).await?;

        if let Err(e) = fs::rename(&staging, &target).await {
            tracing::warn!("⚠️ Could not move {} into place: {}", staging.display(), e);
            // best effort; the rename error is the one worth reporting
            let _ = fs::remove_file(&staging).await;
            return Err(e.into());
        }

        tracing::debug!("Wrote {} bytes to {}", data.len(), target.display());
        Ok(())
    }
}
