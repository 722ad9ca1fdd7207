//! TCP listener implementation.

use super::address::NetworkKind;
use super::framing::{ChunkCodec, DEFAULT_CHUNK_SIZE};
use crate::error::TransportError;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use socket2::{Domain, Protocol, Socket, Type};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::Framed;

/// Configuration for the TCP listener.
#[derive(Debug, Clone)]
pub struct TcpServerConfig {
    /// Network kind to listen on.
    pub network: NetworkKind,
    /// Address in `host:port` form; an empty host means every interface.
    pub address: String,
    /// Listen backlog.
    pub backlog: u32,
    /// Enable SO_REUSEADDR on the listening socket.
    pub reuse_address: bool,
    /// Enable TCP_NODELAY on accepted connections.
    pub tcp_nodelay: bool,
    /// Maximum bytes per inbound chunk.
    pub chunk_size: usize,
}

impl Default for TcpServerConfig {
    fn default() -> Self {
        Self {
            network: NetworkKind::Tcp,
            address: ":9876".to_string(),
            backlog: 1024,
            reuse_address: true,
            tcp_nodelay: true,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl TcpServerConfig {
    /// Creates a new listener config for the given network kind and address.
    #[must_use]
    pub fn new(network: NetworkKind, address: impl Into<String>) -> Self {
        Self {
            network,
            address: address.into(),
            ..Default::default()
        }
    }

    /// Sets the listen backlog.
    #[must_use]
    pub fn backlog(mut self, backlog: u32) -> Self {
        self.backlog = backlog;
        self
    }

    /// Sets SO_REUSEADDR.
    #[must_use]
    pub fn reuse_address(mut self, enabled: bool) -> Self {
        self.reuse_address = enabled;
        self
    }

    /// Sets TCP_NODELAY for accepted connections.
    #[must_use]
    pub fn tcp_nodelay(mut self, enabled: bool) -> Self {
        self.tcp_nodelay = enabled;
        self
    }

    /// Sets the maximum inbound chunk size.
    #[must_use]
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }
}

/// TCP listener producing [`TcpConnection`]s.
pub struct TcpServer {
    listener: TcpListener,
    config: Arc<TcpServerConfig>,
}

impl TcpServer {
    /// Resolves the configured address and binds the first candidate that
    /// accepts a listener.
    ///
    /// # Arguments
    /// * `config` - Listener configuration
    ///
    /// # Errors
    /// Returns `TransportError` if the address is invalid or no candidate
    /// could be bound.
    pub async fn bind(config: TcpServerConfig) -> Result<Self, TransportError> {
        let candidates = config.network.resolve(&config.address).await?;

        let mut last_err = None;
        for addr in candidates {
            match listen_on(addr, &config) {
                Ok(listener) => {
                    tracing::debug!("Listener bound on {}", addr);
                    return Ok(Self {
                        listener,
                        config: Arc::new(config),
                    });
                }
                Err(e) => {
                    tracing::debug!("Bind on {} failed: {}", addr, e);
                    last_err = Some(TransportError::bind(addr.to_string(), e));
                }
            }
        }

        Err(last_err.unwrap_or_else(|| TransportError::AddressResolution {
            network: config.network.to_string(),
            address: config.address.clone(),
        }))
    }

    /// Accepts a new connection.
    ///
    /// # Returns
    /// A new `TcpConnection` for the accepted client.
    ///
    /// # Errors
    /// Returns IO error if accept fails.
    pub async fn accept(&self) -> std::io::Result<TcpConnection> {
        let (stream, addr) = self.listener.accept().await?;
        stream.set_nodelay(self.config.tcp_nodelay)?;
        Ok(TcpConnection::new(stream, addr, self.config.chunk_size))
    }

    /// Returns the local address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Returns the listener configuration.
    #[must_use]
    pub fn config(&self) -> &TcpServerConfig {
        &self.config
    }
}

fn listen_on(addr: SocketAddr, config: &TcpServerConfig) -> std::io::Result<TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(config.reuse_address)?;
    if addr.is_ipv6() {
        socket.set_only_v6(config.network == NetworkKind::Tcp6)?;
    }
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(i32::try_from(config.backlog).unwrap_or(i32::MAX))?;
    TcpListener::from_std(socket.into())
}

/// An accepted TCP connection.
pub struct TcpConnection {
    framed: Framed<TcpStream, ChunkCodec>,
    peer_addr: SocketAddr,
}

impl TcpConnection {
    /// Wraps a connected stream.
    ///
    /// # Arguments
    /// * `stream` - Connected stream
    /// * `peer_addr` - Address of the remote peer
    /// * `chunk_size` - Maximum bytes per inbound chunk
    #[must_use]
    pub fn new(stream: TcpStream, peer_addr: SocketAddr, chunk_size: usize) -> Self {
        let codec = ChunkCodec::new(chunk_size);
        let capacity = codec.max_chunk();
        Self {
            framed: Framed::with_capacity(stream, codec, capacity),
            peer_addr,
        }
    }

    /// Returns the peer address.
    #[must_use]
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Writes bytes to the peer verbatim.
    ///
    /// # Arguments
    /// * `payload` - Bytes to send
    ///
    /// # Errors
    /// Returns IO error if the write fails.
    pub async fn send(&mut self, payload: Bytes) -> std::io::Result<()> {
        self.framed.send(payload).await
    }

    /// Receives the next trimmed, non-empty chunk.
    ///
    /// # Returns
    /// `Some(Ok(bytes))` for a payload, `Some(Err(_))` on a read failure and
    /// `None` on a clean end-of-stream.
    pub async fn recv(&mut self) -> Option<std::io::Result<Bytes>> {
        self.framed.next().await
    }

    /// Flushes pending writes and shuts down the write side.
    pub async fn close(mut self) -> std::io::Result<()> {
        SinkExt::<Bytes>::close(&mut self.framed).await
    }
}
