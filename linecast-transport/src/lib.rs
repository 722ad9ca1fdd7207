//! # linecast Transport
//!
//! Network transport layer for linecast.
//!
//! This crate provides:
//! - [`tcp`] - TCP listener and connections with trimmed chunk framing
//! - [`error`] - Transport error type

pub mod error;
pub mod tcp;

pub use error::TransportError;
pub use tcp::{ChunkCodec, NetworkKind, TcpConnection, TcpServer, TcpServerConfig};
