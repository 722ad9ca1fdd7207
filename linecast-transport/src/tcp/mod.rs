//! TCP transport module.
//!
//! Provides the TCP listener, accepted connections and the chunk codec used to
//! split inbound byte streams into trimmed payloads.

pub mod address;
pub mod framing;
pub mod server;

pub use address::NetworkKind;
pub use framing::ChunkCodec;
pub use server::{TcpConnection, TcpServer, TcpServerConfig};
