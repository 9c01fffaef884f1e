use async_trait::async_trait;
use log::{debug, error, info};
use std::sync::Arc;

use crate::core::{Message, Payload, PeerAddress};
use crate::network::bootstrap::sorted;
use crate::network::{Bootstrapper, Browser, Connection, SearchEngine};
use crate::storage::SharedDirectory;
use crate::transfer::{Downloader, UploadReceiver};
use crate::utils::{P2PError, Result};

/// A handler for the requests arriving on accepted connections.
#[async_trait]
pub trait Service: Send + Sync {
    fn accepts(&self, payload: &Payload) -> bool;

    /// Handle `request`, which opened `connection`, and everything that follows it.
    async fn serve(&self, request: Message, connection: &mut Connection) -> Result<()>;
}

/// Answers every request type a peer exposes.
pub struct PeerServices {
    bootstrapper: Arc<Bootstrapper>,
    browser: Arc<Browser>,
    search_engine: Arc<SearchEngine>,
    downloader: Arc<Downloader>,
    shared: SharedDirectory,
}

impl PeerServices {
    pub fn new(
        bootstrapper: Arc<Bootstrapper>,
        browser: Arc<Browser>,
        search_engine: Arc<SearchEngine>,
        downloader: Arc<Downloader>,
        shared: SharedDirectory,
    ) -> Self {
        Self {
            bootstrapper,
            browser,
            search_engine,
            downloader,
            shared,
        }
    }
}

#[async_trait]
impl Service for PeerServices {
    fn accepts(&self, payload: &Payload) -> bool {
        payload.is_request()
    }

    async fn serve(&self, request: Message, connection: &mut Connection) -> Result<()> {
        debug!("Serving {} from {}", request.kind(), connection.peer());

        if matches!(
            request.payload,
            Payload::UploadChunk { .. } | Payload::UploadCompleted | Payload::UploadFailed { .. }
        ) {
            return UploadReceiver::new(self.shared.clone())
                .serve(request, connection)
                .await;
        }

        match request.payload {
            Payload::BootstrapRequest { known_peers } => {
                let merged = self.bootstrapper.merge_peer_register(known_peers).await;
                info!("Merged registry after bootstrap: {:?}", sorted(&merged));
                connection.send(&Message::bootstrap_response(merged)).await
            }
            Payload::BrowseRequest { known_peers } => {
                self.bootstrapper.merge_peer_register(known_peers).await;
                let output = self.browser.browse_local().await;
                connection.send(&Message::browse_response(output)).await
            }
            Payload::SearchRequest { filename } => {
                let responder = PeerAddress::new(connection.local_addr()?.ip().to_string());
                let response = self.search_engine.search_local(&filename, responder).await;
                info!("Answering search for {}: found={}", filename, response.found);
                connection.send(&Message::search_response(response)).await
            }
            Payload::DownloadRequest { filename } => {
                self.downloader.stream_file(&filename, connection).await
            }
            other => {
                let reason = format!("Unsupported request {}", other.kind());
                error!("{} from {}", reason, connection.peer());
                connection.send(&Message::error(reason.clone())).await?;
                Err(P2PError::InvalidResponse(reason))
            }
        }
    }
}
