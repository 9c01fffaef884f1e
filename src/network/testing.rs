//! In-memory `PeerClient` for exercising the coordinators without sockets.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Mutex;
use tokio::time::{Duration, sleep};

use crate::core::{BrowseOutput, PeerAddress, SearchResponse};
use crate::network::PeerClient;
use crate::utils::{P2PError, Result};

pub fn hosts(names: &[&str]) -> HashSet<PeerAddress> {
    names.iter().map(|name| PeerAddress::new(*name)).collect()
}

#[derive(Default)]
pub struct FakePeer {
    known: Mutex<HashSet<PeerAddress>>,
    files: Vec<String>,
    delay: Duration,
    failing: bool,
    finished: AtomicBool,
}

impl FakePeer {
    pub fn knowing(self, names: &[&str]) -> Self {
        Self {
            known: Mutex::new(hosts(names)),
            ..self
        }
    }

    pub fn sharing(mut self, filename: &str) -> Self {
        self.files.push(filename.to_string());
        self
    }

    pub fn delayed(self, delay: Duration) -> Self {
        Self { delay, ..self }
    }

    pub fn failing(self) -> Self {
        Self {
            failing: true,
            ..self
        }
    }
}

#[derive(Default)]
pub struct FakeClient {
    peers: HashMap<PeerAddress, FakePeer>,
    calls: AtomicUsize,
}

impl FakeClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_peer(mut self, host: &str, peer: FakePeer) -> Self {
        self.peers.insert(PeerAddress::new(host), peer);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Whether a search against `host` ran to completion.
    pub fn finished(&self, host: &str) -> bool {
        self.peers
            .get(&PeerAddress::new(host))
            .map(|peer| peer.finished.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    pub async fn known_by(&self, host: &str) -> HashSet<PeerAddress> {
        match self.peers.get(&PeerAddress::new(host)) {
            Some(peer) => peer.known.lock().await.clone(),
            None => HashSet::new(),
        }
    }

    async fn reach(&self, host: &PeerAddress) -> Result<&FakePeer> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let peer = self
            .peers
            .get(host)
            .ok_or_else(|| P2PError::ConnectionFailed(format!("{} unreachable", host)))?;

        sleep(peer.delay).await;
        if peer.failing {
            return Err(P2PError::NetworkError(format!("{} failed", host)));
        }
        Ok(peer)
    }
}

#[async_trait]
impl PeerClient for FakeClient {
    async fn bootstrap(
        &self,
        host: &PeerAddress,
        known_peers: HashSet<PeerAddress>,
    ) -> Result<HashSet<PeerAddress>> {
        let peer = self.reach(host).await?;
        let mut known = peer.known.lock().await;
        known.extend(known_peers);
        Ok(known.clone())
    }

    async fn browse(
        &self,
        host: &PeerAddress,
        known_peers: HashSet<PeerAddress>,
    ) -> Result<BrowseOutput> {
        let peer = self.reach(host).await?;
        peer.known.lock().await.extend(known_peers);
        Ok(BrowseOutput::files(peer.files.clone()))
    }

    async fn search(&self, host: &PeerAddress, filename: &str) -> Result<SearchResponse> {
        let peer = self.reach(host).await?;
        peer.finished.store(true, Ordering::SeqCst);
        Ok(SearchResponse {
            host_address: host.clone(),
            filename: filename.to_string(),
            found: peer.files.iter().any(|f| f == filename),
        })
    }
}
