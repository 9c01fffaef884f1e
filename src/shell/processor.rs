use log::{error, info};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::core::{PeerAddress, PeerRegistry};
use crate::network::bootstrap::sorted;
use crate::network::{Browser, SearchEngine};
use crate::shell::command::{Command, USAGE, UserCommand};
use crate::transfer::{Downloader, Uploader};
use crate::utils::Result;

const PROMPT: &str = "\n>> ";

/// The interactive loop: reads one command per line and prints the outcome.
///
/// A failing command is reported and the loop carries on; only `quit` or the
/// end of input ends it.
pub struct CommandProcessor {
    registry: Arc<PeerRegistry>,
    browser: Arc<Browser>,
    search_engine: Arc<SearchEngine>,
    downloader: Arc<Downloader>,
    uploader: Arc<Uploader>,
}

impl CommandProcessor {
    pub fn new(
        registry: Arc<PeerRegistry>,
        browser: Arc<Browser>,
        search_engine: Arc<SearchEngine>,
        downloader: Arc<Downloader>,
        uploader: Arc<Uploader>,
    ) -> Self {
        Self {
            registry,
            browser,
            search_engine,
            downloader,
            uploader,
        }
    }

    pub async fn serve_user_requests<R, W>(&self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        loop {
            writer.write_all(PROMPT.as_bytes()).await?;
            writer.flush().await?;

            let Some(line) = lines.next_line().await? else {
                display(&mut writer, "Exiting...").await?;
                return Ok(());
            };
            if line.trim().is_empty() {
                continue;
            }

            info!("Processing \"{}\"", line.trim());
            let command = match UserCommand::parse(&line) {
                Ok(command) => command,
                Err(e) => {
                    error!("Invalid user command {:?}: {}", line, e);
                    display(&mut writer, "Invalid command!").await?;
                    display(&mut writer, USAGE).await?;
                    continue;
                }
            };

            if command.command == Command::Quit {
                display(&mut writer, "Exiting...").await?;
                return Ok(());
            }
            self.process(&command, &mut writer).await?;
        }
    }

    async fn process<W>(&self, command: &UserCommand, writer: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        match command.command {
            Command::Help => display(writer, USAGE).await,
            Command::ListPeers => {
                let peers = self.registry.snapshot().await;
                display(writer, "Known peers:").await?;
                for peer in sorted(&peers) {
                    display(writer, peer.as_str()).await?;
                }
                Ok(())
            }
            Command::Browse => {
                let host = PeerAddress::new(command.argument());
                let output = self.browser.browse(&host).await;
                if let Some(status) = &output.error_status {
                    return display(writer, status).await;
                }
                display(writer, &format!("Files shared by {}:", host)).await?;
                for filename in &output.filenames {
                    display(writer, filename).await?;
                }
                Ok(())
            }
            Command::Search => match self.search_engine.search(command.argument()).await {
                Ok(response) => display(writer, &format!("Found:{}", response)).await,
                Err(e) => display(writer, &format!("NotFound:{}", e)).await,
            },
            Command::Download => {
                let filename = command.argument();
                match self.downloader.download(filename).await {
                    Ok(path) => {
                        let message =
                            format!("Downloading of {} complete: {}", filename, path.display());
                        display(writer, &message).await
                    }
                    Err(e) => display(writer, &e.to_string()).await,
                }
            }
            Command::Upload => match self.uploader.upload(command.argument()).await {
                Ok(status) => display(writer, &status).await,
                Err(e) => display(writer, &e.to_string()).await,
            },
            Command::Quit => Ok(()),
        }
    }
}

async fn display<W>(writer: &mut W, text: &str) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(text.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}
