//! Mini Share
//!
//! A decentralized overlay for sharing text files between peers. Every node
//! listens on one network-wide port, keeps a registry of known peers and lets
//! its user search, browse, download and upload files.

pub mod core;
pub mod network;
pub mod shell;
pub mod storage;
pub mod transfer;
pub mod utils;

pub use core::{Config, Node, PeerAddress, PeerRegistry};
pub use network::{Listener, PeerServices, RemoteClient};
pub use storage::SharedDirectory;
pub use utils::error::{P2PError, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
