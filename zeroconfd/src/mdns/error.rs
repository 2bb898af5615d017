use std::io;
use std::net::SocketAddr;

#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    #[error("Failed to open socket for {group}: {source}")]
    Bind {
        group: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("Failed to join multicast group {group}: {source}")]
    Join {
        group: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("Read failed: {0}")]
    Read(#[source] io::Error),

    #[error("Failed to encode response: {0}")]
    Encode(#[from] hickory_proto::ProtoError),

    #[error("Receive task ended: {0}")]
    Task(String),
}
