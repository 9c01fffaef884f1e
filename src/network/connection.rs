use log::{debug, warn};
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time::{Duration, timeout};

use crate::core::{Message, PeerAddress};
use crate::network::Transport;
use crate::utils::{P2PError, Result};

pub const RECEIVE_TIMEOUT: Duration = Duration::from_secs(10);
pub const TEARDOWN_WAIT: Duration = Duration::from_secs(5);

/// A single logical exchange with one peer.
///
/// Connections are opened per call and closed with a bounded wait; they are
/// never pooled.
pub struct Connection {
    stream: TcpStream,
    peer: String,
}

impl Connection {
    pub async fn open(host: &PeerAddress, port: u16) -> Result<Self> {
        let stream = Transport::connect(host, port).await?;
        Ok(Self {
            stream,
            peer: format!("{}:{}", host, port),
        })
    }

    pub fn accepted(stream: TcpStream, addr: SocketAddr) -> Self {
        Self {
            stream,
            peer: addr.to_string(),
        }
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.stream.local_addr()?)
    }

    pub async fn send(&mut self, message: &Message) -> Result<()> {
        send_to(&mut self.stream, &self.peer, message).await
    }

    pub async fn receive(&mut self) -> Result<Option<Message>> {
        receive_from(&mut self.stream, &self.peer).await
    }

    /// Receive a frame that must be present.
    pub async fn expect(&mut self) -> Result<Message> {
        self.receive().await?.ok_or_else(|| {
            P2PError::InvalidResponse(format!("{} closed the connection early", self.peer))
        })
    }

    pub fn split(self) -> (MessageReader, MessageWriter) {
        let (read, write) = self.stream.into_split();
        (
            MessageReader {
                inner: read,
                peer: self.peer.clone(),
            },
            MessageWriter {
                inner: write,
                peer: self.peer,
            },
        )
    }

    pub async fn close(mut self) {
        shutdown(&mut self.stream, &self.peer).await;
    }
}

pub struct MessageReader {
    inner: OwnedReadHalf,
    peer: String,
}

impl MessageReader {
    pub async fn receive(&mut self) -> Result<Option<Message>> {
        receive_from(&mut self.inner, &self.peer).await
    }
}

pub struct MessageWriter {
    inner: OwnedWriteHalf,
    peer: String,
}

impl MessageWriter {
    pub async fn send(&mut self, message: &Message) -> Result<()> {
        send_to(&mut self.inner, &self.peer, message).await
    }

    pub async fn close(mut self) {
        shutdown(&mut self.inner, &self.peer).await;
    }
}

async fn send_to<W>(writer: &mut W, peer: &str, message: &Message) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    Transport::send_message(writer, message).await?;
    debug!("Sent {} ({}) to {}", message.kind(), message.id, peer);
    Ok(())
}

async fn receive_from<R>(reader: &mut R, peer: &str) -> Result<Option<Message>>
where
    R: AsyncRead + Unpin,
{
    let message = timeout(RECEIVE_TIMEOUT, Transport::receive_message(reader))
        .await
        .map_err(|_| P2PError::NetworkError(format!("Receive timeout from {}", peer)))??;

    if let Some(message) = &message {
        debug!("Received {} ({}) from {}", message.kind(), message.id, peer);
    }
    Ok(message)
}

async fn shutdown<W>(writer: &mut W, peer: &str)
where
    W: AsyncWrite + Unpin,
{
    match timeout(TEARDOWN_WAIT, writer.shutdown()).await {
        Ok(Ok(())) => debug!("Closed connection to {}", peer),
        Ok(Err(e)) => debug!("Error closing connection to {}: {}", peer, e),
        Err(_) => warn!("Connection to {} did not close within {:?}", peer, TEARDOWN_WAIT),
    }
}
