use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};

use crate::core::Message;
use crate::network::{Connection, DownloadStream, RemoteClient, SearchEngine};
use crate::storage::SharedDirectory;
use crate::utils::{P2PError, Result};

pub struct Downloader {
    search_engine: Arc<SearchEngine>,
    client: RemoteClient,
    shared: SharedDirectory,
}

impl Downloader {
    pub fn new(
        search_engine: Arc<SearchEngine>,
        client: RemoteClient,
        shared: SharedDirectory,
    ) -> Self {
        Self {
            search_engine,
            client,
            shared,
        }
    }

    /// Locate `filename` among the known peers and pull it from the first holder.
    pub async fn download(&self, filename: &str) -> Result<PathBuf> {
        let response = self.search_engine.search(filename).await?;
        info!("Search response received: {}", response);

        let stream = self
            .client
            .download(&response.host_address, &response.filename)
            .await?;
        self.persist(stream).await
    }

    /// Write the stream into the shared directory, one line per chunk, in arrival order.
    ///
    /// Nothing is created when the stream carries no lines.
    pub async fn persist(&self, mut stream: DownloadStream) -> Result<PathBuf> {
        let filename = stream.filename().to_string();

        let first = match stream.next_chunk().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => {
                error!("Empty download stream for {}", filename);
                return Err(P2PError::EmptyTransfer(filename));
            }
            Err(e) => {
                error!("Download of {} yielded nothing: {}", filename, e);
                return Err(P2PError::EmptyTransfer(filename));
            }
        };

        let path = self.shared.destination_path(&filename).await?;
        let written = async {
            let mut writer = create_new(&path).await?;
            write_line(&mut writer, &path, &first.content).await?;

            let mut lines = 1usize;
            while let Some(chunk) = stream.next_chunk().await? {
                write_line(&mut writer, &path, &chunk.content).await?;
                lines += 1;
            }

            writer
                .flush()
                .await
                .map_err(|e| P2PError::IoError(format!("Failed to flush {:?}: {}", path, e)))?;
            Ok::<_, P2PError>(lines)
        }
        .await;
        stream.close().await;

        let lines = written.map_err(|e| {
            error!("Error downloading {} into {:?}: {}", filename, path, e);
            e
        })?;

        info!(
            "Downloading of {} complete ({} lines into {:?})",
            filename, lines, path
        );
        Ok(path)
    }

    /// Serve a download request: stream the named file line by line.
    pub async fn stream_file(&self, filename: &str, connection: &mut Connection) -> Result<()> {
        info!("Processing download request for {} from {}", filename, connection.peer());

        let file = match self.open_shared(filename).await {
            Ok(file) => file,
            Err(e) => {
                warn!("Cannot serve {}: {}", filename, e);
                return connection
                    .send(&Message::download_failed(e.to_string()))
                    .await;
            }
        };

        let mut lines = BufReader::new(file).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    connection
                        .send(&Message::download_chunk(filename.to_string(), line))
                        .await?;
                }
                Ok(None) => break,
                Err(e) => {
                    error!("Error reading file {}: {}", filename, e);
                    connection
                        .send(&Message::download_failed(format!(
                            "Error reading {}: {}",
                            filename, e
                        )))
                        .await?;
                    return Err(P2PError::IoError(e.to_string()));
                }
            }
        }

        connection.send(&Message::download_completed()).await
    }

    async fn open_shared(&self, filename: &str) -> Result<File> {
        let path = self.shared.resolve(filename)?;
        File::open(&path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => P2PError::FileNotFound(filename.to_string()),
            _ => P2PError::IoError(format!("Failed to open {:?}: {}", path, e)),
        })
    }
}

async fn create_new(path: &Path) -> Result<BufWriter<File>> {
    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
        .map_err(|e| P2PError::IoError(format!("Failed to create {:?}: {}", path, e)))?;
    Ok(BufWriter::new(file))
}

async fn write_line(writer: &mut BufWriter<File>, path: &Path, content: &str) -> Result<()> {
    writer.write_all(content.as_bytes()).await?;
    writer
        .write_all(b"\n")
        .await
        .map_err(|e| P2PError::IoError(format!("Failed to write {:?}: {}", path, e)))
}
