use log::{error, info};
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::core::{Message, Payload, TransferChunk, UploadResponse};
use crate::network::Connection;
use crate::storage::SharedDirectory;
use crate::utils::{P2PError, Result};

/// Server-side state of one upload stream.
///
/// The destination is chosen when the first chunk arrives and every later
/// chunk of the same stream is appended to it.
pub struct UploadReceiver {
    shared: SharedDirectory,
    destination: Option<(PathBuf, File)>,
    lines: usize,
}

impl UploadReceiver {
    pub fn new(shared: SharedDirectory) -> Self {
        Self {
            shared,
            destination: None,
            lines: 0,
        }
    }

    pub fn destination(&self) -> Option<&Path> {
        self.destination.as_ref().map(|(path, _)| path.as_path())
    }

    pub async fn accept(&mut self, chunk: TransferChunk) -> Result<()> {
        if self.destination.is_none() {
            let path = self.shared.destination_path(&chunk.filename).await?;
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .await
                .map_err(|e| P2PError::IoError(format!("Failed to open {:?}: {}", path, e)))?;
            info!("ReceivingPeer:Saving upload of {} as {:?}", chunk.filename, path);
            self.destination = Some((path, file));
        }

        if let Some((path, file)) = self.destination.as_mut() {
            let mut line = chunk.content;
            line.push('\n');
            file.write_all(line.as_bytes())
                .await
                .map_err(|e| P2PError::IoError(format!("Error persisting to {:?}: {}", path, e)))?;
            self.lines += 1;
        }
        Ok(())
    }

    pub async fn complete(mut self) -> UploadResponse {
        match self.destination.as_mut() {
            Some((path, file)) => {
                if let Err(e) = file.flush().await {
                    return UploadResponse {
                        status_message: format!("ReceivingPeer:Error saving {:?}: {}", path, e),
                        received_ok: false,
                    };
                }
                let status_message = format!(
                    "ReceivingPeer:Uploaded content received and saved as {}",
                    path.display()
                );
                info!("{} ({} lines)", status_message, self.lines);
                UploadResponse {
                    status_message,
                    received_ok: true,
                }
            }
            None => UploadResponse {
                status_message: "ReceivingPeer:No content received".to_string(),
                received_ok: false,
            },
        }
    }

    /// Keep whatever arrived before the sender gave up.
    async fn abandon(&mut self) {
        if let Some((path, file)) = self.destination.as_mut() {
            match file.flush().await {
                Ok(()) => info!("ReceivingPeer:Kept {} lines in {:?}", self.lines, path),
                Err(e) => error!("ReceivingPeer:Error saving {:?}: {}", path, e),
            }
        }
    }

    /// Drive the stream that `first` opened until the sender completes or aborts.
    pub async fn serve(mut self, first: Message, connection: &mut Connection) -> Result<()> {
        let mut next = Some(first);
        loop {
            let Some(message) = next.take() else {
                match connection.receive().await? {
                    Some(message) => next = Some(message),
                    None => {
                        error!(
                            "ReceivingPeer:{} closed the upload stream before completing it",
                            connection.peer()
                        );
                        self.abandon().await;
                        return Ok(());
                    }
                }
                continue;
            };

            match message.payload {
                Payload::UploadChunk { chunk } => {
                    if let Err(e) = self.accept(chunk).await {
                        error!("ReceivingPeer:Error processing uploaded content: {}", e);
                        connection.send(&Message::error(e.to_string())).await?;
                        return Err(e);
                    }
                }
                Payload::UploadCompleted => {
                    let response = self.complete().await;
                    return connection
                        .send(&Message::upload_response(
                            response.status_message,
                            response.received_ok,
                        ))
                        .await;
                }
                Payload::UploadFailed { reason } => {
                    error!(
                        "ReceivingPeer:Sender {} aborted the upload: {}",
                        connection.peer(),
                        reason
                    );
                    self.abandon().await;
                    return Ok(());
                }
                other => {
                    let reason = format!("Unexpected {} inside an upload stream", other.kind());
                    connection.send(&Message::error(reason.clone())).await?;
                    return Err(P2PError::InvalidResponse(reason));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(filename: &str, content: &str) -> TransferChunk {
        TransferChunk {
            filename: filename.to_string(),
            content: content.to_string(),
        }
    }

    #[tokio::test]
    async fn test_appends_chunks_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut receiver = UploadReceiver::new(SharedDirectory::new(dir.path()).unwrap());

        for line in ["one", "two", "three"] {
            receiver.accept(chunk("up.txt", line)).await.unwrap();
        }
        let response = receiver.complete().await;

        assert!(response.received_ok);
        assert!(response.status_message.ends_with("up.txt"));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("up.txt")).unwrap(),
            "one\ntwo\nthree\n"
        );
    }

    #[tokio::test]
    async fn test_destination_is_fixed_by_first_chunk() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("up.txt"), "original\n").unwrap();
        let mut receiver = UploadReceiver::new(SharedDirectory::new(dir.path()).unwrap());

        receiver.accept(chunk("up.txt", "new 1")).await.unwrap();
        let destination = receiver.destination().unwrap().to_path_buf();
        receiver.accept(chunk("up.txt", "new 2")).await.unwrap();
        assert_eq!(receiver.destination().unwrap(), destination);
        receiver.complete().await;

        assert_ne!(destination, dir.path().join("up.txt"));
        assert_eq!(std::fs::read_to_string(&destination).unwrap(), "new 1\nnew 2\n");
        assert_eq!(
            std::fs::read_to_string(dir.path().join("up.txt")).unwrap(),
            "original\n"
        );
    }

    #[tokio::test]
    async fn test_empty_stream_is_not_acknowledged_as_ok() {
        let dir = tempfile::tempdir().unwrap();
        let receiver = UploadReceiver::new(SharedDirectory::new(dir.path()).unwrap());

        let response = receiver.complete().await;
        assert!(!response.received_ok);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
