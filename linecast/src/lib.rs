//! # linecast
//!
//! Minimal concurrent TCP broadcast server.
//!
//! Accepts stream connections, reads trimmed text chunks from each and hands
//! them to an embedder-supplied handler, which typically relays them to the
//! other peers.
//!
//! ## Quick Start
//!
//! ```ignore
//! use linecast::prelude::*;
//!
//! let server = Server::new();
//! let relay = server.clone();
//! server.on_message(move |id, msg| {
//!     relay.send_message_to_all_except(format!("Message from {}: {}\r\n", id, msg), id);
//! });
//!
//! // Runs until `stop` is called from another task.
//! server.start("tcp", ":9876").await?;
//! ```
//!
//! ## Crate Organization
//!
//! - [`transport`] - TCP listener, connections and chunk codec
//! - [`server`] - Registry, callbacks and lifecycle controller

pub mod prelude;

/// Network transport layer.
pub mod transport {
    pub use linecast_transport::*;
}

/// Connection registry and broadcast engine.
pub mod server {
    pub use linecast_server::*;
}

pub use linecast_server::{Server, ServerBuilder, ServerError, ServerEvent};
