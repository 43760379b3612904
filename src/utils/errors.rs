use std::io;
use thiserror::Error;
use tokio_util::codec::LinesCodecError;

/// Unified error type for the node
#[derive(Error, Debug)]
pub enum NodeError {
    #[error("Network error: {0}")]
    NetworkError(#[from] io::Error),

    #[error("Framing error: {0}")]
    FramingError(#[from] LinesCodecError),

    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Unknown peer: {0}")]
    UnknownPeer(u64),

}

/// Convenience alias
pub type Result<T> = std::result::Result<T, NodeError>;
