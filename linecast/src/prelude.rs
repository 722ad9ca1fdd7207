//! Prelude module for convenient imports.
//!
//! ```ignore
//! use linecast::prelude::*;
//! ```

pub use linecast_server::{
    ConnectionId, DEFAULT_BUFFER_SIZE, Server, ServerBuilder, ServerConfig, ServerError,
    ServerEvent,
};
pub use linecast_transport::{NetworkKind, TransportError};
