use clap::Parser;
use log::error;
use mini_share::core::DEFAULT_PORT;
use mini_share::utils::setup_logging;
use mini_share::{Config, Node};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mini-share")]
#[command(about = "Share text files with the peers of a small overlay network")]
#[command(version)]
struct Cli {
    /// Port used by every peer of the network, for listening and for outbound calls
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,
    /// Directory to share files from and receive files into
    #[arg(short, long, default_value = "./share")]
    dir: PathBuf,
    /// Host contacted once at startup to exchange known peers
    #[arg(short, long, default_value = "localhost")]
    seed: String,
    /// File holding the known peers between runs
    #[arg(short, long, default_value = "./share/PeerRegister.txt")]
    registry: PathBuf,
}

#[tokio::main]
async fn main() {
    setup_logging();

    let cli = Cli::parse();
    let config = Config {
        seed_host: cli.seed,
        port: cli.port,
        shared_dir: cli.dir,
        registry_path: cli.registry,
    };

    let outcome = match Node::new(config).await {
        Ok(node) => node.run().await,
        Err(e) => Err(e),
    };

    // The stdin reader may still be blocked after Ctrl+C.
    match outcome {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            error!("Peer stopped: {}", e);
            std::process::exit(1);
        }
    }
}
