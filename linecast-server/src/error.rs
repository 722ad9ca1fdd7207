//! Error types for server operations.

use crate::registry::ConnectionId;
use thiserror::Error;

/// Error type for server operations.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Transport error, including bind failures at start.
    #[error("transport error: {0}")]
    Transport(#[from] linecast_transport::TransportError),

    /// `start` was called while a session is already running.
    #[error("server already running")]
    AlreadyRunning,

    /// Accepting a connection failed while running.
    #[error("accept error: {0}")]
    Accept(#[source] std::io::Error),

    /// Reading from a connection failed while running.
    #[error("connection {id} error: {source}")]
    Connection {
        /// Connection ID.
        id: ConnectionId,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl ServerError {
    /// Creates a connection error.
    pub fn connection(id: ConnectionId, source: std::io::Error) -> Self {
        Self::Connection { id, source }
    }
}
