//! Client error types.

use std::io;

use corbel_protocol::{FrameError, Status};

/// Errors returned by client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The transport failed, including operation deadlines expiring.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// The reply frame was malformed or the connection closed mid-frame.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// The server answered with a protocol error sentinel.
    #[error("server error {}: {}", .0.code(), .0.text())]
    Status(Status),
}

impl ClientError {
    /// The protocol error code, for [`ClientError::Status`].
    pub fn code(&self) -> Option<u16> {
        match self {
            ClientError::Status(status) => Some(status.code()),
            _ => None,
        }
    }

    /// True if the error is an operation deadline expiring.
    pub fn is_timeout(&self) -> bool {
        match self {
            ClientError::Io(err) => {
                matches!(err.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
            }
            ClientError::Frame(err) => err.is_timeout(),
            ClientError::Status(_) => false,
        }
    }
}
