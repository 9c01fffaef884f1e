use log::{error, info};
use std::sync::Arc;
use tokio::io::{self, BufReader};

use crate::core::{Config, PeerRegistry};
use crate::network::{
    Bootstrapper, Browser, Listener, PeerClient, PeerServices, RemoteClient, SearchEngine,
    Service,
};
use crate::shell::CommandProcessor;
use crate::storage::SharedDirectory;
use crate::transfer::{Downloader, Uploader};
use crate::utils::Result;

/// A peer: the listener serving other nodes plus the interactive command loop.
pub struct Node {
    config: Config,
    registry: Arc<PeerRegistry>,
    bootstrapper: Arc<Bootstrapper>,
    processor: CommandProcessor,
    listener: Listener,
}

impl Node {
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let shared = SharedDirectory::new(config.shared_dir.clone())?;
        shared.ensure_exists().await?;
        let registry = Arc::new(PeerRegistry::load(&config.registry_path).await?);

        let remote = RemoteClient::new(config.port);
        let client: Arc<dyn PeerClient> = Arc::new(remote.clone());

        let bootstrapper = Arc::new(Bootstrapper::new(
            config.seed(),
            registry.clone(),
            client.clone(),
        ));
        let browser = Arc::new(Browser::new(registry.clone(), client.clone(), shared.clone()));
        let search_engine = Arc::new(SearchEngine::new(registry.clone(), client, shared.clone()));
        let downloader = Arc::new(Downloader::new(
            search_engine.clone(),
            remote.clone(),
            shared.clone(),
        ));
        let uploader = Arc::new(Uploader::new(remote, shared.clone()));

        let services: Arc<dyn Service> = Arc::new(PeerServices::new(
            bootstrapper.clone(),
            browser.clone(),
            search_engine.clone(),
            downloader.clone(),
            shared,
        ));
        let listener = Listener::new(config.port, vec![services])?;

        let processor = CommandProcessor::new(
            registry.clone(),
            browser,
            search_engine,
            downloader,
            uploader,
        );

        Ok(Self {
            config,
            registry,
            bootstrapper,
            processor,
            listener,
        })
    }

    /// Serve until the user quits, input ends or Ctrl+C arrives.
    pub async fn run(mut self) -> Result<()> {
        info!(
            "Starting peer on port {} sharing {:?}",
            self.config.port, self.config.shared_dir
        );
        self.listener.start().await?;

        let (bootstrapper, processor) = (&self.bootstrapper, &self.processor);
        let session = async {
            bootstrapper.bootstrap().await;
            processor
                .serve_user_requests(BufReader::new(io::stdin()), io::stdout())
                .await
        };

        let outcome = tokio::select! {
            outcome = session => outcome,
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl+C received, shutting down");
                Ok(())
            }
        };
        if let Err(e) = &outcome {
            error!("Command loop failed: {}", e);
        }

        self.listener.stop();
        self.listener.await_termination().await;
        self.registry.persist().await?;
        info!("Registry saved to {:?}", self.registry.path());

        outcome
    }
}
