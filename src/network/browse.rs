use log::error;
use std::sync::Arc;

use crate::core::{BrowseOutput, PeerAddress, PeerRegistry};
use crate::network::PeerClient;
use crate::storage::SharedDirectory;

pub struct Browser {
    registry: Arc<PeerRegistry>,
    client: Arc<dyn PeerClient>,
    shared: SharedDirectory,
}

impl Browser {
    pub fn new(
        registry: Arc<PeerRegistry>,
        client: Arc<dyn PeerClient>,
        shared: SharedDirectory,
    ) -> Self {
        Self {
            registry,
            client,
            shared,
        }
    }

    /// List a remote peer's shared files, announcing our registry on the way.
    ///
    /// Failures come back as an `error_status`, never as an error.
    pub async fn browse(&self, host: &PeerAddress) -> BrowseOutput {
        let known_peers = self.registry.snapshot().await;
        match self.client.browse(host, known_peers).await {
            Ok(output) => output,
            Err(e) => {
                error!("Error browsing host {}: {}", host, e);
                BrowseOutput::error(format!("Error browsing: {}", e))
            }
        }
    }

    /// Point-in-time listing of the local shared directory.
    pub async fn browse_local(&self) -> BrowseOutput {
        match self.shared.list_files().await {
            Ok(filenames) => BrowseOutput::files(filenames),
            Err(e) => {
                error!("Error browsing location {:?}: {}", self.shared.root(), e);
                BrowseOutput::error(format!("Error browsing: {}", e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::testing::{FakeClient, FakePeer, hosts};

    #[tokio::test]
    async fn test_browse_local_lists_regular_files_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();
        std::fs::write(dir.path().join("b.txt"), "b").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        let browser = Browser::new(
            Arc::new(PeerRegistry::new("unused", hosts(&["127.0.0.1"]))),
            Arc::new(FakeClient::new()),
            SharedDirectory::new(dir.path()).unwrap(),
        );

        let output = browser.browse_local().await;
        assert_eq!(output.filenames, vec!["a.txt", "b.txt"]);
        assert!(output.error_status.is_none());
    }

    #[tokio::test]
    async fn test_browse_local_reports_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let browser = Browser::new(
            Arc::new(PeerRegistry::new("unused", hosts(&["127.0.0.1"]))),
            Arc::new(FakeClient::new()),
            SharedDirectory::new(dir.path().join("gone")).unwrap(),
        );

        let output = browser.browse_local().await;
        assert!(output.filenames.is_empty());
        assert!(output.error_status.is_some());
    }

    #[tokio::test]
    async fn test_browse_remote_announces_registry() {
        let client = Arc::new(
            FakeClient::new().with_peer("10.0.0.8", FakePeer::default().sharing("x.txt")),
        );
        let browser = Browser::new(
            Arc::new(PeerRegistry::new("unused", hosts(&["10.0.0.1"]))),
            client.clone(),
            SharedDirectory::new("unused").unwrap(),
        );

        let output = browser.browse(&"10.0.0.8".into()).await;
        assert_eq!(output.filenames, vec!["x.txt"]);
        assert_eq!(client.known_by("10.0.0.8").await, hosts(&["10.0.0.1"]));
    }

    #[tokio::test]
    async fn test_browse_failure_becomes_error_status() {
        let browser = Browser::new(
            Arc::new(PeerRegistry::new("unused", hosts(&["127.0.0.1"]))),
            Arc::new(FakeClient::new()),
            SharedDirectory::new("unused").unwrap(),
        );

        let output = browser.browse(&"10.0.0.9".into()).await;
        assert!(output.filenames.is_empty());
        assert!(output.error_status.unwrap().starts_with("Error browsing"));
    }
}
