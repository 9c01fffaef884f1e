pub mod bootstrap;
pub mod browse;
pub mod client;
pub mod connection;
pub mod listener;
pub mod search;
pub mod services;
pub mod transport;

#[cfg(test)]
pub mod testing;

pub use bootstrap::Bootstrapper;
pub use browse::Browser;
pub use client::{DownloadStream, PeerClient, RemoteClient};
pub use connection::Connection;
pub use listener::Listener;
pub use search::SearchEngine;
pub use services::{PeerServices, Service};
pub use transport::Transport;
