use log::{error, info};
use std::collections::HashSet;
use std::sync::Arc;

use crate::core::{PeerAddress, PeerRegistry};
use crate::network::PeerClient;

/// Exchanges registries with the seed host at startup and merges the
/// registries that callers announce to this node.
pub struct Bootstrapper {
    seed: PeerAddress,
    registry: Arc<PeerRegistry>,
    client: Arc<dyn PeerClient>,
}

impl Bootstrapper {
    pub fn new(seed: PeerAddress, registry: Arc<PeerRegistry>, client: Arc<dyn PeerClient>) -> Self {
        Self {
            seed,
            registry,
            client,
        }
    }

    /// Failures are logged and swallowed; the node keeps its current registry.
    pub async fn bootstrap(&self) {
        info!("Bootstrapping from {}...", self.seed);

        let known_peers = self.registry.snapshot().await;
        match self.client.bootstrap(&self.seed, known_peers).await {
            Ok(remote_peers) => {
                let merged = self.registry.merge(remote_peers).await;
                info!("Updated list of known peers: {:?}", sorted(&merged));
            }
            Err(e) => {
                error!("Failed bootstrapping from {}: {}", self.seed, e);
            }
        }
    }

    pub async fn merge_peer_register(
        &self,
        incoming: HashSet<PeerAddress>,
    ) -> HashSet<PeerAddress> {
        self.registry.merge(incoming).await
    }
}

pub(crate) fn sorted(peers: &HashSet<PeerAddress>) -> Vec<&PeerAddress> {
    let mut peers: Vec<_> = peers.iter().collect();
    peers.sort();
    peers
}
