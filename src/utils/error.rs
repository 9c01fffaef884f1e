use thiserror::Error;

pub type Result<T> = std::result::Result<T, P2PError>;

#[derive(Error, Debug)]
pub enum P2PError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("{0} not found with any of the known peers")]
    NotFoundOnPeers(String),

    #[error("Empty transfer: nothing received for {0}")]
    EmptyTransfer(String),

    #[error("Transfer failed: {0}")]
    TransferFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Message too large: {0} bytes")]
    MessageTooLarge(usize),

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<std::io::Error> for P2PError {
    fn from(err: std::io::Error) -> Self {
        P2PError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for P2PError {
    fn from(err: serde_json::Error) -> Self {
        P2PError::SerializationError(err.to_string())
    }
}
