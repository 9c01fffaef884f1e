use log::{debug, error, info, warn};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio::time::{Duration, timeout};

use crate::core::{PeerAddress, PeerRegistry, SearchResponse};
use crate::network::PeerClient;
use crate::network::connection::TEARDOWN_WAIT;
use crate::storage::SharedDirectory;
use crate::utils::{P2PError, Result};

pub const POOL_TEARDOWN_WAIT: Duration = Duration::from_secs(5);

/// Finds which known peer holds a file.
///
/// Every known peer is queried concurrently; the first positive answer wins
/// and the remaining queries are aborted. A peer that errors counts as a
/// peer that does not have the file.
pub struct SearchEngine {
    registry: Arc<PeerRegistry>,
    client: Arc<dyn PeerClient>,
    shared: SharedDirectory,
}

impl SearchEngine {
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

    pub async fn search(&self, filename: &str) -> Result<SearchResponse> {
        let hosts = self.registry.snapshot().await;
        if hosts.is_empty() {
            return Err(P2PError::NotFoundOnPeers(filename.to_string()));
        }

        let mut pool = JoinSet::new();
        for host in hosts {
            let client = self.client.clone();
            let filename = filename.to_string();

            pool.spawn(async move {
                info!("Searching peer {} for {}", host, filename);
                match timeout(TEARDOWN_WAIT, client.search(&host, &filename)).await {
                    Ok(Ok(response)) => response,
                    Ok(Err(e)) => {
                        error!("Error searching host {} for {}: {}", host, filename, e);
                        SearchResponse::not_found(host, &filename)
                    }
                    Err(_) => {
                        warn!(
                            "Host {} did not answer the search for {} within {:?}",
                            host, filename, TEARDOWN_WAIT
                        );
                        SearchResponse::not_found(host, &filename)
                    }
                }
            });
        }

        let mut winner = None;
        while let Some(joined) = pool.join_next().await {
            match joined {
                Ok(response) if response.found => {
                    winner = Some(response);
                    break;
                }
                Ok(response) => debug!("{} does not have {}", response.host_address, filename),
                Err(e) => warn!("Search task for {} did not complete: {}", filename, e),
            }
        }

        Self::tear_down(pool).await;

        winner.ok_or_else(|| P2PError::NotFoundOnPeers(filename.to_string()))
    }

    /// Abort whatever is still in flight and wait a bounded time for it to unwind.
    async fn tear_down(mut pool: JoinSet<SearchResponse>) {
        if pool.is_empty() {
            return;
        }

        debug!("Cancelling {} outstanding searches", pool.len());
        pool.abort_all();
        let drained = timeout(POOL_TEARDOWN_WAIT, async {
            while pool.join_next().await.is_some() {}
        })
        .await;

        if drained.is_err() {
            warn!("Search pool did not shut down within {:?}", POOL_TEARDOWN_WAIT);
        }
    }

    /// Answer a search from a remote peer against the local shared directory.
    pub async fn search_local(&self, filename: &str, responder: PeerAddress) -> SearchResponse {
        SearchResponse {
            host_address: responder,
            filename: filename.to_string(),
            found: self.shared.contains(filename).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::testing::{FakeClient, FakePeer, hosts};
    use std::time::Instant;

    fn engine(peers: &[&str], client: Arc<FakeClient>) -> SearchEngine {
        SearchEngine::new(
            Arc::new(PeerRegistry::new("unused", hosts(peers))),
            client,
            SharedDirectory::new("unused").unwrap(),
        )
    }

    #[tokio::test]
    async fn test_only_holder_wins_and_rest_are_cancelled() {
        let client = Arc::new(
            FakeClient::new()
                .with_peer("A", FakePeer::default().delayed(Duration::from_secs(30)))
                .with_peer("B", FakePeer::default().sharing("foo.txt"))
                .with_peer("C", FakePeer::default().delayed(Duration::from_secs(30))),
        );

        let started = Instant::now();
        let response = engine(&["A", "B", "C"], client.clone())
            .search("foo.txt")
            .await
            .unwrap();

        assert_eq!(response.host_address, PeerAddress::new("B"));
        assert_eq!(response.filename, "foo.txt");
        assert!(response.found);
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(!client.finished("A"));
        assert!(!client.finished("C"));
    }

    #[tokio::test]
    async fn test_slow_holder_still_wins_over_fast_misses() {
        let client = Arc::new(
            FakeClient::new()
                .with_peer("A", FakePeer::default())
                .with_peer(
                    "B",
                    FakePeer::default()
                        .sharing("foo.txt")
                        .delayed(Duration::from_millis(200)),
                )
                .with_peer("C", FakePeer::default().failing()),
        );

        let response = engine(&["A", "B", "C"], client).search("foo.txt").await.unwrap();
        assert_eq!(response.host_address, PeerAddress::new("B"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_peer_is_a_miss_after_teardown_wait() {
        let client = Arc::new(
            FakeClient::new()
                .with_peer("A", FakePeer::default().delayed(Duration::from_secs(60)))
                .with_peer("B", FakePeer::default()),
        );

        let started = tokio::time::Instant::now();
        let error = engine(&["A", "B"], client.clone())
            .search("foo.txt")
            .await
            .unwrap_err();

        assert!(matches!(error, P2PError::NotFoundOnPeers(_)));
        assert!(started.elapsed() >= TEARDOWN_WAIT);
        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(!client.finished("A"));
    }

    #[tokio::test]
    async fn test_empty_registry_fails_without_network_calls() {
        let client = Arc::new(FakeClient::new());
        let error = engine(&[], client.clone()).search("foo.txt").await.unwrap_err();

        assert_eq!(
            error.to_string(),
            "foo.txt not found with any of the known peers"
        );
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn test_errors_count_as_misses() {
        let client = Arc::new(
            FakeClient::new()
                .with_peer("A", FakePeer::default().failing())
                .with_peer("B", FakePeer::default().sharing("other.txt")),
        );

        let error = engine(&["A", "B", "unreachable"], client.clone())
            .search("foo.txt")
            .await
            .unwrap_err();

        assert!(matches!(error, P2PError::NotFoundOnPeers(name) if name == "foo.txt"));
        assert_eq!(client.calls(), 3);
    }

    #[tokio::test]
    async fn test_search_local_checks_shared_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("here.txt"), "x\n").unwrap();

        let engine = SearchEngine::new(
            Arc::new(PeerRegistry::new("unused", hosts(&[]))),
            Arc::new(FakeClient::new()),
            SharedDirectory::new(dir.path()).unwrap(),
        );

        let me = PeerAddress::new("10.0.0.5");
        assert!(engine.search_local("here.txt", me.clone()).await.found);
        let miss = engine.search_local("gone.txt", me.clone()).await;
        assert!(!miss.found);
        assert_eq!(miss.host_address, me);
    }
}
