//! Server lifecycle controller.

use crate::builder::{DEFAULT_BUFFER_SIZE, ServerBuilder, ServerConfig};
use crate::callbacks::{CallbackHub, ServerEvent};
use crate::connection::handle_connection;
use crate::error::ServerError;
use crate::registry::{ConnectionId, ConnectionRegistry};
use bytes::Bytes;
use linecast_transport::{NetworkKind, TcpServer, TcpServerConfig};
use parking_lot::RwLock;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

struct Lifecycle {
    running: bool,
    buffer_size: usize,
    shutdown: Option<CancellationToken>,
    local_addr: Option<SocketAddr>,
}

/// State shared between the controller, the accept loop and connection tasks.
pub(crate) struct Shared {
    pub(crate) registry: ConnectionRegistry,
    pub(crate) callbacks: CallbackHub,
    config: ServerConfig,
    lifecycle: RwLock<Lifecycle>,
}

impl Shared {
    pub(crate) fn is_running(&self) -> bool {
        self.lifecycle.read().running
    }
}

/// Broadcast server handle.
///
/// Cloning is cheap; every clone controls the same server. `start` runs the
/// accept loop on the calling task until `stop` is called from elsewhere.
#[derive(Clone)]
pub struct Server {
    shared: Arc<Shared>,
}

impl Server {
    /// Creates a server with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ServerConfig::default())
    }

    /// Returns a builder for a configured server.
    #[must_use]
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Creates a server with the given configuration.
    #[must_use]
    pub fn with_config(config: ServerConfig) -> Self {
        let lifecycle = Lifecycle {
            running: false,
            buffer_size: config.buffer_size,
            shutdown: None,
            local_addr: None,
        };
        Self {
            shared: Arc::new(Shared {
                registry: ConnectionRegistry::new(),
                callbacks: CallbackHub::new(),
                config,
                lifecycle: RwLock::new(lifecycle),
            }),
        }
    }

    /// Sets the error handler.
    pub fn on_error<F>(&self, handler: F)
    where
        F: Fn(&ServerError) + Send + Sync + 'static,
    {
        self.shared.callbacks.set_error_handler(handler);
    }

    /// Sets the lifecycle event handler.
    pub fn on_event<F>(&self, handler: F)
    where
        F: Fn(ServerEvent) + Send + Sync + 'static,
    {
        self.shared.callbacks.set_event_handler(handler);
    }

    /// Sets the inbound message handler.
    pub fn on_message<F>(&self, handler: F)
    where
        F: Fn(ConnectionId, &str) + Send + Sync + 'static,
    {
        self.shared.callbacks.set_message_handler(handler);
    }

    /// Binds `address` on `network` (`tcp`, `tcp4` or `tcp6`) and accepts
    /// connections until [`stop`](Self::stop) is called.
    ///
    /// # Arguments
    /// * `network` - Network kind, `tcp` listens on both IPv6 and IPv4
    /// * `address` - Listen address; `":9876"` means every interface
    ///
    /// # Returns
    /// `Ok(())` once the server has been stopped.
    ///
    /// # Errors
    /// Returns `ServerError` if the server is already running or the
    /// listener cannot be bound. The error is also passed to the error
    /// handler.
    pub async fn start(&self, network: &str, address: &str) -> Result<(), ServerError> {
        let buffer_size = match self.buffer_size() {
            0 => DEFAULT_BUFFER_SIZE,
            n => n,
        };

        let listener = match self.bind(network, address, buffer_size).await {
            Ok(listener) => listener,
            Err(e) => {
                tracing::warn!("Server failed to start on {} {}: {}", network, address, e);
                self.shared.callbacks.notify_error(&e);
                return Err(e);
            }
        };

        let shutdown = CancellationToken::new();
        let epoch = {
            let mut lifecycle = self.shared.lifecycle.write();
            if lifecycle.running {
                drop(lifecycle);
                let e = ServerError::AlreadyRunning;
                self.shared.callbacks.notify_error(&e);
                return Err(e);
            }
            lifecycle.running = true;
            lifecycle.buffer_size = buffer_size;
            lifecycle.shutdown = Some(shutdown.clone());
            lifecycle.local_addr = listener.local_addr().ok();
            self.shared.registry.open();
            self.shared.registry.epoch()
        };

        match listener.local_addr() {
            Ok(addr) => tracing::info!("Server listening on {}", addr),
            Err(_) => tracing::info!("Server listening on {} {}", network, address),
        }
        self.shared.callbacks.notify_event(ServerEvent::Started);

        self.accept_loop(&listener, &shutdown, epoch).await;

        tracing::debug!("Accept loop finished, closing listener");
        Ok(())
    }

    async fn bind(
        &self,
        network: &str,
        address: &str,
        buffer_size: usize,
    ) -> Result<TcpServer, ServerError> {
        if self.is_running() {
            return Err(ServerError::AlreadyRunning);
        }

        let network: NetworkKind = network.parse()?;
        let config = &self.shared.config;
        let transport = TcpServerConfig::new(network, address)
            .backlog(config.backlog)
            .reuse_address(config.reuse_address)
            .tcp_nodelay(config.tcp_nodelay)
            .chunk_size(buffer_size);

        Ok(TcpServer::bind(transport).await?)
    }

    async fn accept_loop(
        &self,
        listener: &TcpServer,
        shutdown: &CancellationToken,
        epoch: u64,
    ) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,

                accepted = listener.accept() => match accepted {
                    Ok(connection) => {
                        if let Some(max) = self.shared.config.max_connections
                            && self.shared.registry.len() >= max
                        {
                            tracing::warn!(
                                "Max connections reached, rejecting {}",
                                connection.peer_addr()
                            );
                            continue;
                        }
                        tokio::spawn(handle_connection(
                            Arc::clone(&self.shared),
                            connection,
                            epoch,
                        ));
                    }
                    Err(e) => {
                        if !self.is_running() {
                            break;
                        }
                        tracing::warn!("Accept error: {}", e);
                        self.shared.callbacks.notify_error(&ServerError::Accept(e));
                    }
                },
            }
        }
    }

    /// Stops the server: closes every connection and the listener.
    ///
    /// Connection tasks and the accept loop exit on their own shortly after.
    /// Calling `stop` on a stopped server does nothing.
    pub fn stop(&self) {
        let shutdown = {
            let mut lifecycle = self.shared.lifecycle.write();
            if !lifecycle.running {
                return;
            }
            lifecycle.running = false;
            lifecycle.local_addr = None;
            lifecycle.shutdown.take()
        };

        let closed = self.shared.registry.reset();
        let count = closed.len();
        for (id, handle) in closed {
            tracing::debug!("Closing connection {} to {}", id, handle.peer_addr());
            handle.close();
        }

        if let Some(token) = shutdown {
            token.cancel();
        }

        tracing::info!("Server stopped, closed {} connections", count);
        self.shared.callbacks.notify_event(ServerEvent::Stopped);
    }

    /// Sends `payload` verbatim to every connection.
    ///
    /// Delivery is best-effort: connections that have gone away are skipped.
    ///
    /// # Arguments
    /// * `payload` - Bytes to send; no framing is added
    pub fn send_message_to_all(&self, payload: impl AsRef<[u8]>) {
        let payload = Bytes::copy_from_slice(payload.as_ref());
        self.shared.registry.for_each(|id, handle| {
            if !handle.send(payload.clone()) {
                tracing::debug!("Skipping closed connection {}", id);
            }
        });
    }

    /// Sends `payload` verbatim to every connection except `except`.
    ///
    /// # Arguments
    /// * `payload` - Bytes to send; no framing is added
    /// * `except` - Connection to skip, usually the sender
    pub fn send_message_to_all_except(&self, payload: impl AsRef<[u8]>, except: ConnectionId) {
        let payload = Bytes::copy_from_slice(payload.as_ref());
        self.shared.registry.for_each_except(except, |id, handle| {
            if !handle.send(payload.clone()) {
                tracing::debug!("Skipping closed connection {}", id);
            }
        });
    }

    /// Closes a single connection without reporting an error.
    ///
    /// # Arguments
    /// * `id` - Connection to close
    ///
    /// # Returns
    /// `false` if no such connection is registered.
    pub fn close_connection(&self, id: ConnectionId) -> bool {
        match self.shared.registry.unregister(id) {
            Some(handle) => {
                tracing::debug!("Closing connection {} to {}", id, handle.peer_addr());
                handle.close();
                true
            }
            None => false,
        }
    }

    /// Returns the per-read buffer size.
    #[must_use]
    pub fn buffer_size(&self) -> usize {
        self.shared.lifecycle.read().buffer_size
    }

    /// Sets the per-read buffer size used from the next start.
    ///
    /// # Arguments
    /// * `size` - Bytes per read; `0` selects the default at start
    pub fn set_buffer_size(&self, size: usize) {
        self.shared.lifecycle.write().buffer_size = size;
    }

    /// Returns true while the server is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    /// Returns the bound listener address while running.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.shared.lifecycle.read().local_addr
    }

    /// Returns the number of registered connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.shared.registry.len()
    }

    /// Returns the registered connection IDs in ascending order.
    #[must_use]
    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        self.shared.registry.ids()
    }
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}
