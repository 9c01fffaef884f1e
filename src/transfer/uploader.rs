use log::{error, info, warn};
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::oneshot;
use tokio::time::{Duration, timeout};

use crate::core::{Message, Payload, PeerAddress, UploadResponse};
use crate::network::RemoteClient;
use crate::network::connection::{MessageReader, MessageWriter};
use crate::storage::SharedDirectory;
use crate::utils::{P2PError, Result};

pub const ACK_WAIT: Duration = Duration::from_secs(5);
const USAGE: &str = "Usage: upload <filename>:<host>";

/// Pushes a file from the local shared directory to another peer.
pub struct Uploader {
    client: RemoteClient,
    shared: SharedDirectory,
}

impl Uploader {
    pub fn new(client: RemoteClient, shared: SharedDirectory) -> Self {
        Self { client, shared }
    }

    /// `argument` has the shape `<filename>:<host>`.
    ///
    /// Returns the local status line. Only an error reported on the stream
    /// fails the call. A late or negative acknowledgement is logged.
    pub async fn upload(&self, argument: &str) -> Result<String> {
        let (path, filename, host) = self.validate_and_parse(argument).await?;
        info!("Uploading {:?} to {}", path, host);

        let (mut writer, reader) = self.client.upload(&host).await?;

        if let Err(e) = stream_content(&path, &filename, &mut writer).await {
            writer.close().await;
            let message = format!("Error uploading file {}, {}", path.display(), e);
            error!("{}", message);
            return Err(P2PError::TransferFailed(message));
        }

        let (done_tx, done_rx) = oneshot::channel();
        tokio::spawn(async move {
            let outcome = await_response(reader).await;
            match &outcome {
                Ok(response) => info!("UploadingPeer:Received upload response {:?}", response),
                Err(e) => error!("UploadingPeer:Error receiving upload response: {}", e),
            }
            let _ = done_tx.send(outcome);
        });

        let acknowledged = match timeout(ACK_WAIT, done_rx).await {
            Ok(Ok(outcome)) => outcome.map(Some),
            Ok(Err(_)) => Err(P2PError::NetworkError(
                "Upload response channel closed".to_string(),
            )),
            Err(_) => {
                warn!("Upload can not finish within {:?}", ACK_WAIT);
                Ok(None)
            }
        };
        writer.close().await;

        if let Some(response) = acknowledged? {
            if !response.received_ok {
                warn!(
                    "{} acknowledged the upload of {:?} without saving it: {}",
                    host, path, response.status_message
                );
            }
        }
        Ok(format!("streamed contents of {} OK", path.display()))
    }

    async fn validate_and_parse(&self, argument: &str) -> Result<(PathBuf, String, PeerAddress)> {
        let parts: Vec<&str> = argument.split(':').collect();
        let [filename, host] = parts[..] else {
            return Err(P2PError::InvalidCommand(format!(
                "Invalid upload command; {}",
                USAGE
            )));
        };

        let (filename, host) = (filename.trim(), host.trim());
        if filename.is_empty() {
            return Err(P2PError::InvalidCommand(format!("Invalid filename; {}", USAGE)));
        }
        if host.is_empty() {
            return Err(P2PError::InvalidCommand(format!("Invalid hostname; {}", USAGE)));
        }
        if !self.shared.contains(filename).await {
            return Err(P2PError::InvalidCommand(format!(
                "file {} notfound; {}",
                filename, USAGE
            )));
        }

        let path = self.shared.resolve(filename)?;
        Ok((path, filename.to_string(), PeerAddress::new(host)))
    }
}

/// Send every line of `path` as a chunk, then the end marker.
///
/// A read failure is reported to the receiver before it is returned.
async fn stream_content(path: &Path, filename: &str, writer: &mut MessageWriter) -> Result<()> {
    let file = match File::open(path).await {
        Ok(file) => file,
        Err(e) => {
            notify_failure(writer, &e).await;
            return Err(e.into());
        }
    };

    let mut lines = BufReader::new(file).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                writer
                    .send(&Message::upload_chunk(filename.to_string(), line))
                    .await?;
            }
            Ok(None) => break,
            Err(e) => {
                notify_failure(writer, &e).await;
                return Err(e.into());
            }
        }
    }

    writer.send(&Message::upload_completed()).await
}

async fn notify_failure(writer: &mut MessageWriter, cause: &std::io::Error) {
    if let Err(e) = writer.send(&Message::upload_failed(cause.to_string())).await {
        warn!("Could not tell the receiver the upload was aborted: {}", e);
    }
}

async fn await_response(mut reader: MessageReader) -> Result<UploadResponse> {
    match reader.receive().await? {
        Some(message) => match message.payload {
            Payload::UploadResponse { response } => Ok(response),
            Payload::Error { message } => Err(P2PError::TransferFailed(message)),
            other => Err(P2PError::InvalidResponse(format!(
                "Expected UploadResponse, got {}",
                other.kind()
            ))),
        },
        None => Err(P2PError::TransferFailed(
            "Receiver closed the stream without acknowledging".to_string(),
        )),
    }
}
