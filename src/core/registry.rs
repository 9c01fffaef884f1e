use log::{debug, info};
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::RwLock;

use crate::core::PeerAddress;
use crate::utils::{P2PError, Result};

/// The set of hosts this node knows about.
///
/// All mutation happens inside [`PeerRegistry::merge`], which holds the write
/// lock for the whole union so concurrent merges never drop entries.
pub struct PeerRegistry {
    path: PathBuf,
    peers: RwLock<HashSet<PeerAddress>>,
}

impl PeerRegistry {
    pub fn new(path: impl Into<PathBuf>, peers: impl IntoIterator<Item = PeerAddress>) -> Self {
        Self {
            path: path.into(),
            peers: RwLock::new(peers.into_iter().collect()),
        }
    }

    /// Read one host per line. A missing or empty file yields `{127.0.0.1}`.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading locally existing peer register from {:?}", path);

        let mut peers: HashSet<PeerAddress> = match fs::read_to_string(path).await {
            Ok(content) => content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(PeerAddress::new)
                .collect(),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No peer register at {:?}, starting from loopback", path);
                HashSet::new()
            }
            Err(e) => {
                return Err(P2PError::IoError(format!(
                    "Failed to read peer register {:?}: {}",
                    path, e
                )));
            }
        };

        if peers.is_empty() {
            peers.insert(PeerAddress::loopback());
        }

        Ok(Self::new(path, peers))
    }

    /// Overwrite the backing file with the current set, one host per line.
    pub async fn persist(&self) -> Result<()> {
        info!("Persisting the current peer register to {:?}", self.path);

        let content: String = self
            .peers
            .read()
            .await
            .iter()
            .map(|peer| format!("{}\n", peer))
            .collect();

        fs::write(&self.path, content).await.map_err(|e| {
            P2PError::IoError(format!(
                "Failed to persist peer register {:?}: {}",
                self.path, e
            ))
        })
    }

    /// Union `incoming` into the registry and return the merged set.
    pub async fn merge(&self, incoming: HashSet<PeerAddress>) -> HashSet<PeerAddress> {
        let mut peers = self.peers.write().await;
        let before = peers.len();
        peers.extend(incoming);

        if peers.len() > before {
            info!("Peer register grew from {} to {} hosts", before, peers.len());
        }
        peers.clone()
    }

    pub async fn snapshot(&self) -> HashSet<PeerAddress> {
        self.peers.read().await.clone()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn set(hosts: &[&str]) -> HashSet<PeerAddress> {
        hosts.iter().map(|h| PeerAddress::new(*h)).collect()
    }

    #[tokio::test]
    async fn test_load_missing_file_defaults_to_loopback() {
        let dir = tempfile::tempdir().unwrap();
        let registry = PeerRegistry::load(dir.path().join("absent.txt")).await.unwrap();

        assert_eq!(registry.snapshot().await, set(&["127.0.0.1"]));
    }

    #[tokio::test]
    async fn test_load_reads_one_host_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("peers.txt");
        std::fs::write(&path, "10.0.0.2\n10.0.0.3\n\n10.0.0.2\n").unwrap();

        let registry = PeerRegistry::load(&path).await.unwrap();
        assert_eq!(registry.snapshot().await, set(&["10.0.0.2", "10.0.0.3"]));
    }

    #[tokio::test]
    async fn test_load_empty_file_defaults_to_loopback() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("peers.txt");
        std::fs::write(&path, "\n").unwrap();

        let registry = PeerRegistry::load(&path).await.unwrap();
        assert_eq!(registry.snapshot().await, set(&["127.0.0.1"]));
    }

    #[tokio::test]
    async fn test_load_fails_on_unreadable_path() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be read as a file.
        let result = PeerRegistry::load(dir.path()).await;
        assert!(matches!(result, Err(P2PError::IoError(_))));
    }

    #[tokio::test]
    async fn test_persist_overwrites_previous_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("peers.txt");
        std::fs::write(&path, "stale-1\nstale-2\nstale-3\nstale-4\n").unwrap();

        let registry = PeerRegistry::new(&path, set(&["10.0.0.7"]));
        registry.persist().await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "10.0.0.7\n");
        let reloaded = PeerRegistry::load(&path).await.unwrap();
        assert_eq!(reloaded.snapshot().await, set(&["10.0.0.7"]));
    }

    #[tokio::test]
    async fn test_merge_is_idempotent() {
        let registry = PeerRegistry::new("unused", set(&["a"]));
        let once = registry.merge(set(&["b", "c"])).await;
        let twice = registry.merge(set(&["b", "c"])).await;

        assert_eq!(once, set(&["a", "b", "c"]));
        assert_eq!(once, twice);
    }

    #[tokio::test]
    async fn test_merge_is_order_independent() {
        let stepwise = PeerRegistry::new("unused", set(&["r"]));
        stepwise.merge(set(&["a1", "a2"])).await;
        let stepwise = stepwise.merge(set(&["b1", "a2"])).await;

        let reversed = PeerRegistry::new("unused", set(&["r"]));
        reversed.merge(set(&["b1", "a2"])).await;
        let reversed = reversed.merge(set(&["a1", "a2"])).await;

        let combined = PeerRegistry::new("unused", set(&["r"]));
        let combined = combined.merge(set(&["a1", "a2", "b1"])).await;

        assert_eq!(stepwise, combined);
        assert_eq!(reversed, combined);
    }

    #[tokio::test]
    async fn test_concurrent_merges_keep_every_entry() {
        let registry = Arc::new(PeerRegistry::new("unused", set(&["seed"])));

        let mut handles = Vec::new();
        for i in 0..64 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                let first = format!("10.0.{}.1", i);
                let second = format!("10.0.{}.2", i);
                registry.merge(set(&[first.as_str(), second.as_str()])).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(registry.snapshot().await.len(), 1 + 64 * 2);
    }
}
