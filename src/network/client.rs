use async_trait::async_trait;
use log::debug;
use std::collections::HashSet;

use crate::core::{BrowseOutput, Message, Payload, PeerAddress, SearchResponse, TransferChunk};
use crate::network::Connection;
use crate::network::connection::{MessageReader, MessageWriter};
use crate::utils::{P2PError, Result};

/// The unary RPCs a node issues toward other peers.
#[async_trait]
pub trait PeerClient: Send + Sync {
    async fn bootstrap(
        &self,
        host: &PeerAddress,
        known_peers: HashSet<PeerAddress>,
    ) -> Result<HashSet<PeerAddress>>;

    async fn browse(
        &self,
        host: &PeerAddress,
        known_peers: HashSet<PeerAddress>,
    ) -> Result<BrowseOutput>;

    async fn search(&self, host: &PeerAddress, filename: &str) -> Result<SearchResponse>;
}

/// Talks to peers over TCP on the network-wide port.
#[derive(Debug, Clone)]
pub struct RemoteClient {
    port: u16,
}

impl RemoteClient {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    /// Send one request and wait for exactly one reply.
    async fn exchange(&self, host: &PeerAddress, request: Message) -> Result<Message> {
        let mut connection = Connection::open(host, self.port).await?;
        let result = async {
            connection.send(&request).await?;
            connection.expect().await
        }
        .await;
        connection.close().await;

        let reply = result?;
        if let Payload::Error { message } = &reply.payload {
            return Err(P2PError::InvalidResponse(format!(
                "{} rejected {}: {}",
                host,
                request.kind(),
                message
            )));
        }
        Ok(reply)
    }

    /// Ask `host` to stream `filename` back line by line.
    pub async fn download(&self, host: &PeerAddress, filename: &str) -> Result<DownloadStream> {
        let mut connection = Connection::open(host, self.port).await?;
        if let Err(e) = connection
            .send(&Message::download_request(filename.to_string()))
            .await
        {
            connection.close().await;
            return Err(e);
        }

        Ok(DownloadStream {
            connection: Some(connection),
            filename: filename.to_string(),
        })
    }

    /// Open a client-streaming upload toward `host`.
    pub async fn upload(&self, host: &PeerAddress) -> Result<(MessageWriter, MessageReader)> {
        let connection = Connection::open(host, self.port).await?;
        let (reader, writer) = connection.split();
        Ok((writer, reader))
    }
}

#[async_trait]
impl PeerClient for RemoteClient {
    async fn bootstrap(
        &self,
        host: &PeerAddress,
        known_peers: HashSet<PeerAddress>,
    ) -> Result<HashSet<PeerAddress>> {
        let reply = self
            .exchange(host, Message::bootstrap_request(known_peers))
            .await?;
        match reply.payload {
            Payload::BootstrapResponse { known_peers } => Ok(known_peers),
            other => Err(unexpected("BootstrapResponse", &other)),
        }
    }

    async fn browse(
        &self,
        host: &PeerAddress,
        known_peers: HashSet<PeerAddress>,
    ) -> Result<BrowseOutput> {
        let reply = self.exchange(host, Message::browse_request(known_peers)).await?;
        match reply.payload {
            Payload::BrowseResponse { output } => Ok(output),
            other => Err(unexpected("BrowseResponse", &other)),
        }
    }

    async fn search(&self, host: &PeerAddress, filename: &str) -> Result<SearchResponse> {
        let reply = self
            .exchange(host, Message::search_request(filename.to_string()))
            .await?;
        match reply.payload {
            Payload::SearchResponse { response } => Ok(response),
            other => Err(unexpected("SearchResponse", &other)),
        }
    }
}

fn unexpected(expected: &str, got: &Payload) -> P2PError {
    P2PError::InvalidResponse(format!("Expected {}, got {}", expected, got.kind()))
}

/// Lines of a remote file as the serving peer sends them.
pub struct DownloadStream {
    connection: Option<Connection>,
    filename: String,
}

impl DownloadStream {
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Next line, or `None` once the sender reports completion.
    pub async fn next_chunk(&mut self) -> Result<Option<TransferChunk>> {
        let Some(connection) = self.connection.as_mut() else {
            return Ok(None);
        };

        let outcome = match connection.receive().await {
            Ok(Some(message)) => match message.payload {
                Payload::DownloadChunk { chunk } => return Ok(Some(chunk)),
                Payload::DownloadCompleted => Ok(None),
                Payload::DownloadFailed { reason } | Payload::Error { message: reason } => {
                    Err(P2PError::TransferFailed(reason))
                }
                other => Err(unexpected("DownloadChunk", &other)),
            },
            Ok(None) => Err(P2PError::TransferFailed(format!(
                "{} closed before completing {}",
                connection.peer(),
                self.filename
            ))),
            Err(e) => Err(e),
        };

        self.close().await;
        outcome
    }

    pub async fn close(&mut self) {
        if let Some(connection) = self.connection.take() {
            debug!("Closing download stream for {}", self.filename);
            connection.close().await;
        }
    }
}
