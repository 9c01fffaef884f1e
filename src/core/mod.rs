pub mod config;
pub mod node;
pub mod protocol;
pub mod registry;

pub use config::{Config, DEFAULT_PORT, is_valid_port};
pub use node::Node;
pub use protocol::{
    BrowseOutput, Message, Payload, PeerAddress, SearchResponse, TransferChunk, UploadResponse,
};
pub use registry::PeerRegistry;
