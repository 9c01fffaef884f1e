use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

pub const LOOPBACK: &str = "127.0.0.1";

/// A host known to run a peer. Ports are not carried; the network shares one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerAddress(String);

impl PeerAddress {
    pub fn new(host: impl Into<String>) -> Self {
        Self(host.into())
    }

    pub fn loopback() -> Self {
        Self::new(LOOPBACK)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerAddress {
    fn from(host: &str) -> Self {
        Self::new(host)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub host_address: PeerAddress,
    pub filename: String,
    pub found: bool,
}

impl SearchResponse {
    pub fn not_found(host_address: PeerAddress, filename: &str) -> Self {
        Self {
            host_address,
            filename: filename.to_string(),
            found: false,
        }
    }
}

impl fmt::Display for SearchResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{host_address: {}, filename: {}, found: {}}}",
            self.host_address, self.filename, self.found
        )
    }
}

/// Snapshot of a shared directory, or the reason it could not be taken.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowseOutput {
    pub filenames: Vec<String>,
    pub error_status: Option<String>,
}

impl BrowseOutput {
    pub fn files(filenames: Vec<String>) -> Self {
        Self {
            filenames,
            error_status: None,
        }
    }

    pub fn error(status: String) -> Self {
        Self {
            filenames: Vec::new(),
            error_status: Some(status),
        }
    }
}

/// One line of a file in flight, tagged with the file it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferChunk {
    pub filename: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    /// Carries a human readable status rather than a file name.
    pub status_message: String,
    pub received_ok: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub timestamp: u64,
    pub payload: Payload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Payload {
    // Registry exchange
    BootstrapRequest { known_peers: HashSet<PeerAddress> },
    BootstrapResponse { known_peers: HashSet<PeerAddress> },

    // Browsing
    BrowseRequest { known_peers: HashSet<PeerAddress> },
    BrowseResponse { output: BrowseOutput },

    // Lookup
    SearchRequest { filename: String },
    SearchResponse { response: SearchResponse },

    // Server -> client streaming
    DownloadRequest { filename: String },
    DownloadChunk { chunk: TransferChunk },
    DownloadCompleted,
    DownloadFailed { reason: String },

    // Client -> server streaming
    UploadChunk { chunk: TransferChunk },
    UploadCompleted,
    UploadFailed { reason: String },
    UploadResponse { response: UploadResponse },

    Error { message: String },
}

impl Payload {
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::BootstrapRequest { .. } => "BootstrapRequest",
            Payload::BootstrapResponse { .. } => "BootstrapResponse",
            Payload::BrowseRequest { .. } => "BrowseRequest",
            Payload::BrowseResponse { .. } => "BrowseResponse",
            Payload::SearchRequest { .. } => "SearchRequest",
            Payload::SearchResponse { .. } => "SearchResponse",
            Payload::DownloadRequest { .. } => "DownloadRequest",
            Payload::DownloadChunk { .. } => "DownloadChunk",
            Payload::DownloadCompleted => "DownloadCompleted",
            Payload::DownloadFailed { .. } => "DownloadFailed",
            Payload::UploadChunk { .. } => "UploadChunk",
            Payload::UploadCompleted => "UploadCompleted",
            Payload::UploadFailed { .. } => "UploadFailed",
            Payload::UploadResponse { .. } => "UploadResponse",
            Payload::Error { .. } => "Error",
        }
    }

    /// Whether a connection may open with this payload.
    pub fn is_request(&self) -> bool {
        matches!(
            self,
            Payload::BootstrapRequest { .. }
                | Payload::BrowseRequest { .. }
                | Payload::SearchRequest { .. }
                | Payload::DownloadRequest { .. }
                | Payload::UploadChunk { .. }
                | Payload::UploadCompleted
                | Payload::UploadFailed { .. }
        )
    }
}

impl Message {
    pub fn new(payload: Payload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default(),
            payload,
        }
    }

    pub fn kind(&self) -> &'static str {
        self.payload.kind()
    }

    pub fn bootstrap_request(known_peers: HashSet<PeerAddress>) -> Self {
        Self::new(Payload::BootstrapRequest { known_peers })
    }

    pub fn bootstrap_response(known_peers: HashSet<PeerAddress>) -> Self {
        Self::new(Payload::BootstrapResponse { known_peers })
    }

    pub fn browse_request(known_peers: HashSet<PeerAddress>) -> Self {
        Self::new(Payload::BrowseRequest { known_peers })
    }

    pub fn browse_response(output: BrowseOutput) -> Self {
        Self::new(Payload::BrowseResponse { output })
    }

    pub fn search_request(filename: String) -> Self {
        Self::new(Payload::SearchRequest { filename })
    }

    pub fn search_response(response: SearchResponse) -> Self {
        Self::new(Payload::SearchResponse { response })
    }

    pub fn download_request(filename: String) -> Self {
        Self::new(Payload::DownloadRequest { filename })
    }

    pub fn download_chunk(filename: String, content: String) -> Self {
        Self::new(Payload::DownloadChunk {
            chunk: TransferChunk { filename, content },
        })
    }

    pub fn download_completed() -> Self {
        Self::new(Payload::DownloadCompleted)
    }

    pub fn download_failed(reason: String) -> Self {
        Self::new(Payload::DownloadFailed { reason })
    }

    pub fn upload_chunk(filename: String, content: String) -> Self {
        Self::new(Payload::UploadChunk {
            chunk: TransferChunk { filename, content },
        })
    }

    pub fn upload_completed() -> Self {
        Self::new(Payload::UploadCompleted)
    }

    pub fn upload_failed(reason: String) -> Self {
        Self::new(Payload::UploadFailed { reason })
    }

    pub fn upload_response(status_message: String, received_ok: bool) -> Self {
        Self::new(Payload::UploadResponse {
            response: UploadResponse {
                status_message,
                received_ok,
            },
        })
    }

    pub fn error(message: String) -> Self {
        Self::new(Payload::Error { message })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_address_serializes_as_plain_string() {
        let json = serde_json::to_string(&PeerAddress::new("10.0.0.2")).unwrap();
        assert_eq!(json, "\"10.0.0.2\"");
    }

    #[test]
    fn test_message_wire_shape() {
        let message = Message::search_request("foo.txt".to_string());
        let value = serde_json::to_value(&message).unwrap();

        assert_eq!(value["payload"]["type"], "SearchRequest");
        assert_eq!(value["payload"]["data"]["filename"], "foo.txt");

        let decoded: Message = serde_json::from_value(value).unwrap();
        assert_eq!(decoded.id, message.id);
        assert_eq!(decoded.payload, message.payload);
    }

    #[test]
    fn test_request_classification() {
        assert!(Message::download_request("a".into()).payload.is_request());
        assert!(Message::upload_chunk("a".into(), "l".into()).payload.is_request());
        assert!(!Message::download_completed().payload.is_request());
        assert!(!Message::error("boom".into()).payload.is_request());
    }
}
