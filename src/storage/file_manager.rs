use log::{debug, warn};
use std::path::{Component, Path, PathBuf};
use tokio::fs as async_fs;

use crate::utils::{P2PError, Result};

/// The directory whose regular files this node exposes and receives into.
#[derive(Debug, Clone)]
pub struct SharedDirectory {
    root: PathBuf,
}

impl SharedDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if root.to_string_lossy().trim().is_empty() {
            return Err(P2PError::ConfigError("Invalid shared directory".to_string()));
        }
        Ok(Self { root })
    }

    /// Create the directory if it does not exist yet.
    pub async fn ensure_exists(&self) -> Result<()> {
        async_fs::create_dir_all(&self.root)
            .await
            .map_err(|e| P2PError::IoError(format!("Failed to create directory: {}", e)))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a filename received from a peer onto the directory.
    ///
    /// Only a single plain path component is accepted.
    pub fn resolve(&self, filename: &str) -> Result<PathBuf> {
        let mut components = Path::new(filename).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) => Ok(self.root.join(name)),
            _ => Err(P2PError::FileNotFound(filename.to_string())),
        }
    }

    /// Whether a regular file of that exact name is present.
    pub async fn contains(&self, filename: &str) -> bool {
        match self.resolve(filename) {
            Ok(path) => async_fs::metadata(&path)
                .await
                .map(|m| m.is_file())
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Names of the regular files directly inside the directory, sorted.
    pub async fn list_files(&self) -> Result<Vec<String>> {
        let mut entries = async_fs::read_dir(&self.root)
            .await
            .map_err(|e| P2PError::IoError(format!("Failed to read directory: {}", e)))?;

        let mut filenames = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| P2PError::IoError(format!("Failed to read directory entry: {}", e)))?
        {
            match entry.file_type().await {
                Ok(file_type) if file_type.is_file() => {
                    filenames.push(entry.file_name().to_string_lossy().to_string());
                }
                Ok(_) => {}
                Err(e) => warn!("Skipping {:?}: {}", entry.path(), e),
            }
        }

        filenames.sort();
        debug!("Listed {} files in {:?}", filenames.len(), self.root);
        Ok(filenames)
    }

    /// Where an incoming copy of `filename` should be written.
    ///
    /// An existing file is never reused; the copy gets a `.<epoch millis>` suffix.
    pub async fn destination_path(&self, filename: &str) -> Result<PathBuf> {
        let path = self.resolve(filename)?;
        if async_fs::try_exists(&path).await.unwrap_or(true) {
            let renamed = format!("{}.{}", filename, chrono::Utc::now().timestamp_millis());
            debug!("{:?} exists, writing to {} instead", path, renamed);
            return Ok(self.root.join(renamed));
        }
        Ok(path)
    }
}
