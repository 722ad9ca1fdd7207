//! # linecast Server
//!
//! Connection registry and broadcast engine.
//!
//! This crate provides:
//! - [`Server`] - lifecycle controller with start/stop and broadcast
//! - [`ConnectionRegistry`] - concurrency-safe map of live connections
//! - [`CallbackHub`] - optional error, event and message handlers
//! - Per-connection handler tasks reading trimmed chunks

pub mod builder;
pub mod callbacks;
mod connection;
pub mod error;
pub mod registry;
pub mod server;

pub use builder::{DEFAULT_BUFFER_SIZE, ServerBuilder, ServerConfig};
pub use callbacks::{CallbackHub, ServerEvent};
pub use error::ServerError;
pub use registry::{ConnectionHandle, ConnectionId, ConnectionRegistry, Registration};
pub use server::Server;
