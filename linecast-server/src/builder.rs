//! Server configuration and builder.

use crate::server::Server;
use linecast_transport::tcp::framing::DEFAULT_CHUNK_SIZE;

/// Read buffer size applied at start when none is configured.
pub const DEFAULT_BUFFER_SIZE: usize = DEFAULT_CHUNK_SIZE;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Per-read buffer capacity in bytes; `0` means [`DEFAULT_BUFFER_SIZE`].
    pub buffer_size: usize,
    /// Listen backlog.
    pub backlog: u32,
    /// Enable SO_REUSEADDR on the listener.
    pub reuse_address: bool,
    /// Enable TCP_NODELAY on accepted connections.
    pub tcp_nodelay: bool,
    /// Maximum number of live connections; `None` means unlimited.
    pub max_connections: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            buffer_size: 0,
            backlog: 1024,
            reuse_address: true,
            tcp_nodelay: true,
            max_connections: None,
        }
    }
}

/// Builder for configuring and creating a server.
#[derive(Debug, Clone, Default)]
pub struct ServerBuilder {
    config: ServerConfig,
}

impl ServerBuilder {
    /// Creates a new server builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the per-read buffer size.
    #[must_use]
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.config.buffer_size = size;
        self
    }

    /// Sets the listen backlog.
    #[must_use]
    pub fn backlog(mut self, backlog: u32) -> Self {
        self.config.backlog = backlog;
        self
    }

    /// Sets SO_REUSEADDR on the listener.
    #[must_use]
    pub fn reuse_address(mut self, enabled: bool) -> Self {
        self.config.reuse_address = enabled;
        self
    }

    /// Sets TCP_NODELAY on accepted connections.
    #[must_use]
    pub fn tcp_nodelay(mut self, enabled: bool) -> Self {
        self.config.tcp_nodelay = enabled;
        self
    }

    /// Sets the maximum number of live connections.
    #[must_use]
    pub fn max_connections(mut self, max: usize) -> Self {
        self.config.max_connections = Some(max);
        self
    }

    /// Returns the configuration built so far.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Builds the server.
    #[must_use]
    pub fn build(self) -> Server {
        Server::with_config(self.config)
    }
}
