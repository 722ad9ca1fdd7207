//! Connection registry.
//!
//! The registry is the single authority on which connections are live. Each
//! entry owns the only sender into its connection's outbound queue and the
//! token that tells the connection task to drop its socket, so removing an
//! entry and closing its handle closes that connection.

use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::net::SocketAddr;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

/// Identifier assigned to an accepted connection, unique within a session.
pub type ConnectionId = u64;

/// Registry-owned handle to a live connection.
#[derive(Debug)]
pub struct ConnectionHandle {
    peer_addr: SocketAddr,
    outbound: UnboundedSender<Bytes>,
    closer: CancellationToken,
}

impl ConnectionHandle {
    /// Creates a handle for a connection task.
    ///
    /// # Arguments
    /// * `peer_addr` - Address of the remote peer
    /// * `outbound` - Sender into the connection's outbound queue
    /// * `closer` - Token the connection task watches; cancelling it makes
    ///   the task drop its socket without flushing
    #[must_use]
    pub fn new(
        peer_addr: SocketAddr,
        outbound: UnboundedSender<Bytes>,
        closer: CancellationToken,
    ) -> Self {
        Self {
            peer_addr,
            outbound,
            closer,
        }
    }

    /// Returns the peer address.
    #[must_use]
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Queues bytes for the connection.
    ///
    /// # Arguments
    /// * `payload` - Bytes written verbatim to the peer
    ///
    /// # Returns
    /// `false` if the connection has already gone away.
    pub fn send(&self, payload: Bytes) -> bool {
        self.outbound.send(payload).is_ok()
    }

    /// Closes the connection immediately. Queued bytes are discarded, and a
    /// write blocked on a peer that does not read is abandoned.
    pub fn close(self) {
        self.closer.cancel();
    }
}

/// Proof of registration held by a connection task.
///
/// Carries the session epoch so a task outliving its session never removes
/// an id that a later session has reassigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registration {
    /// Assigned connection ID.
    pub id: ConnectionId,
    epoch: u64,
}

struct Inner {
    accepting: bool,
    epoch: u64,
    next_id: ConnectionId,
    connections: HashMap<ConnectionId, ConnectionHandle>,
}

/// Concurrency-safe map of connection IDs to handles.
pub struct ConnectionRegistry {
    inner: RwLock<Inner>,
}

impl ConnectionRegistry {
    /// Creates a closed, empty registry. Call [`open`](Self::open) before
    /// registering connections.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                accepting: false,
                epoch: 0,
                next_id: 0,
                connections: HashMap::new(),
            }),
        }
    }

    /// Opens the registry for registrations.
    pub fn open(&self) {
        self.inner.write().accepting = true;
    }

    /// Returns true while registrations are accepted.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.inner.read().accepting
    }

    /// Returns the current session epoch.
    ///
    /// The epoch advances on every [`reset`](Self::reset); capture it when a
    /// connection is accepted and pass it to [`register_in`](Self::register_in).
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.inner.read().epoch
    }

    /// Registers a handle under the next ID of the current session.
    ///
    /// # Arguments
    /// * `handle` - Handle to the accepted connection
    ///
    /// # Returns
    /// The registration, or `None` if the registry is closed; the caller then
    /// owns the connection and should drop it.
    pub fn register(&self, handle: ConnectionHandle) -> Option<Registration> {
        let epoch = self.epoch();
        self.register_in(epoch, handle)
    }

    /// Registers a handle only if `epoch` is still the current session.
    ///
    /// # Arguments
    /// * `epoch` - Session epoch captured when the connection was accepted
    /// * `handle` - Handle to the accepted connection
    ///
    /// # Returns
    /// `None` if the registry is closed or the session has moved on.
    pub fn register_in(&self, epoch: u64, handle: ConnectionHandle) -> Option<Registration> {
        let mut inner = self.inner.write();
        if !inner.accepting || inner.epoch != epoch {
            return None;
        }
        let id = inner.next_id;
        inner.next_id += 1;
        inner.connections.insert(id, handle);
        Some(Registration { id, epoch })
    }

    /// Removes a connection by ID. No-op if absent.
    pub fn unregister(&self, id: ConnectionId) -> Option<ConnectionHandle> {
        self.inner.write().connections.remove(&id)
    }

    /// Removes the connection behind `registration` if it still belongs to
    /// the current session.
    pub fn release(&self, registration: &Registration) -> Option<ConnectionHandle> {
        let mut inner = self.inner.write();
        if inner.epoch != registration.epoch {
            return None;
        }
        inner.connections.remove(&registration.id)
    }

    /// Visits every registered connection under the read lock.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(ConnectionId, &ConnectionHandle),
    {
        for (id, handle) in self.inner.read().connections.iter() {
            f(*id, handle);
        }
    }

    /// Visits every registered connection except `skip`.
    pub fn for_each_except<F>(&self, skip: ConnectionId, mut f: F)
    where
        F: FnMut(ConnectionId, &ConnectionHandle),
    {
        self.for_each(|id, handle| {
            if id != skip {
                f(id, handle);
            }
        });
    }

    /// Clears the registry, resets the ID counter and closes it to further
    /// registrations.
    ///
    /// # Returns
    /// The removed handles; the caller is expected to close them.
    pub fn reset(&self) -> Vec<(ConnectionId, ConnectionHandle)> {
        let mut inner = self.inner.write();
        inner.accepting = false;
        inner.next_id = 0;
        inner.epoch += 1;
        inner.connections.drain().collect()
    }

    /// Returns the number of registered connections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().connections.len()
    }

    /// Returns true if no connections are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().connections.is_empty()
    }

    /// Returns true if `id` is registered.
    #[must_use]
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.inner.read().connections.contains_key(&id)
    }

    /// Returns all registered IDs in ascending order.
    #[must_use]
    pub fn ids(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<_> = self.inner.read().connections.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
