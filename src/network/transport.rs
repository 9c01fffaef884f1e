use log::{debug, info};
use std::io::ErrorKind;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{Duration, timeout};

use crate::core::{Message, PeerAddress};
use crate::utils::{P2PError, Result};

pub const MAX_MESSAGE_SIZE: usize = 10_000_000;
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

pub struct Transport;

impl Transport {
    pub async fn connect(host: &PeerAddress, port: u16) -> Result<TcpStream> {
        let stream = timeout(CONNECT_TIMEOUT, TcpStream::connect((host.as_str(), port)))
            .await
            .map_err(|_| {
                P2PError::ConnectionFailed(format!("Timed out connecting to {}:{}", host, port))
            })?
            .map_err(|e| {
                P2PError::ConnectionFailed(format!("Failed to connect to {}:{}: {}", host, port, e))
            })?;

        stream
            .set_nodelay(true)
            .map_err(|e| P2PError::NetworkError(format!("Failed to set TCP_NODELAY: {}", e)))?;

        debug!("Connected to {}:{}", host, port);
        Ok(stream)
    }

    pub async fn listen(port: u16) -> Result<TcpListener> {
        let addr = format!("0.0.0.0:{}", port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| P2PError::NetworkError(format!("Failed to bind to {}: {}", addr, e)))?;

        info!("Listening on {}", addr);
        Ok(listener)
    }

    pub async fn send_data<W>(writer: &mut W, data: &[u8]) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        if data.len() > MAX_MESSAGE_SIZE {
            return Err(P2PError::MessageTooLarge(data.len()));
        }

        writer.write_u32(data.len() as u32).await?;
        writer.write_all(data).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Read one frame. `None` means the peer closed the stream between frames.
    pub async fn receive_data<R>(reader: &mut R, max_size: usize) -> Result<Option<Vec<u8>>>
    where
        R: AsyncRead + Unpin,
    {
        let len = match reader.read_u32().await {
            Ok(len) => len as usize,
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if len > max_size {
            return Err(P2PError::MessageTooLarge(len));
        }

        let mut buffer = vec![0u8; len];
        reader.read_exact(&mut buffer).await?;

        Ok(Some(buffer))
    }

    pub async fn send_message<W>(writer: &mut W, message: &Message) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let serialized = serde_json::to_vec(message)?;
        Self::send_data(writer, &serialized).await
    }

    pub async fn receive_message<R>(reader: &mut R) -> Result<Option<Message>>
    where
        R: AsyncRead + Unpin,
    {
        match Self::receive_data(reader, MAX_MESSAGE_SIZE).await? {
            Some(buffer) => Ok(Some(serde_json::from_slice(&buffer)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Payload;

    #[tokio::test]
    async fn test_frames_survive_a_pipe() {
        let (mut client, mut server) = tokio::io::duplex(1024);

        let sent = Message::download_chunk("a.txt".to_string(), "first line".to_string());
        Transport::send_message(&mut client, &sent).await.unwrap();
        Transport::send_message(&mut client, &Message::download_completed())
            .await
            .unwrap();
        drop(client);

        let first = Transport::receive_message(&mut server).await.unwrap().unwrap();
        assert_eq!(first.id, sent.id);
        assert_eq!(first.payload, sent.payload);

        let second = Transport::receive_message(&mut server).await.unwrap().unwrap();
        assert_eq!(second.payload, Payload::DownloadCompleted);

        assert!(Transport::receive_message(&mut server).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rejects_oversized_frame() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_u32(64).await.unwrap();

        let result = Transport::receive_data(&mut server, 16).await;
        assert!(matches!(result, Err(P2PError::MessageTooLarge(64))));
    }
}
