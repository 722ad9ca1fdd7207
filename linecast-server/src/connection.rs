//! Per-connection handler loop.
//!
//! One task per accepted connection. The task reads trimmed chunks and hands
//! them to the message handler, and drains the outbound queue filled by
//! broadcasts. It exits when the peer goes away, a read fails, or the
//! registry closes its handle.

use crate::callbacks::ServerEvent;
use crate::error::ServerError;
use crate::registry::ConnectionHandle;
use crate::server::Shared;
use bytes::Bytes;
use linecast_transport::TcpConnection;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Why a connection loop ended.
#[derive(Debug)]
enum Closure {
    /// The peer closed its side cleanly.
    EndOfStream,
    /// Reading failed.
    Failed(std::io::Error),
    /// The server closed the registry handle.
    Forced,
}

/// Registers the connection and runs it until it closes.
///
/// # Arguments
/// * `shared` - Server state
/// * `connection` - The accepted connection
/// * `epoch` - Registry session epoch at accept time
pub(crate) async fn handle_connection(
    shared: Arc<Shared>,
    mut connection: TcpConnection,
    epoch: u64,
) {
    let peer_addr = connection.peer_addr();
    let (tx, mut rx) = mpsc::unbounded_channel::<Bytes>();
    let closer = CancellationToken::new();

    let Some(registration) = shared.registry.register_in(
        epoch,
        ConnectionHandle::new(peer_addr, tx, closer.clone()),
    ) else {
        tracing::debug!("Dropping connection from {} after shutdown", peer_addr);
        return;
    };
    let id = registration.id;

    tracing::debug!("Connection {} accepted from {}", id, peer_addr);
    shared.callbacks.notify_event(ServerEvent::ConnectionAccepted);

    let closure = loop {
        tokio::select! {
            _ = closer.cancelled() => break Closure::Forced,

            inbound = connection.recv() => match inbound {
                Some(Ok(payload)) => {
                    shared
                        .callbacks
                        .notify_message(id, &String::from_utf8_lossy(&payload));
                }
                Some(Err(e)) => break Closure::Failed(e),
                None => break Closure::EndOfStream,
            },

            outbound = rx.recv() => match outbound {
                Some(payload) => {
                    // A peer that stops reading blocks the write; closing
                    // must still win.
                    tokio::select! {
                        _ = closer.cancelled() => break Closure::Forced,
                        sent = connection.send(payload) => {
                            if let Err(e) = sent {
                                tracing::debug!("Connection {} write error: {}", id, e);
                            }
                        }
                    }
                }
                None => break Closure::Forced,
            },
        }
    };

    match closure {
        Closure::Forced => {
            // Dropping the socket discards unsent bytes.
            tracing::debug!("Connection {} closed by server", id);
            drop(connection);
        }
        Closure::EndOfStream => {
            tracing::debug!("Connection {} disconnected", id);
            shared.registry.release(&registration);
            close_gracefully(id, connection).await;
        }
        Closure::Failed(e) => {
            if shared.is_running() {
                tracing::warn!("Connection {} read error: {}", id, e);
                shared
                    .callbacks
                    .notify_error(&ServerError::connection(id, e));
            } else {
                tracing::debug!("Connection {} read error during shutdown: {}", id, e);
            }
            shared.registry.release(&registration);
            close_gracefully(id, connection).await;
        }
    }

    shared.callbacks.notify_event(ServerEvent::ConnectionClosed);
}

/// Shuts down the write side. Every completed send has already been flushed,
/// so this never waits on the peer.
async fn close_gracefully(id: u64, connection: TcpConnection) {
    if let Err(e) = connection.close().await {
        tracing::debug!("Connection {} close error: {}", id, e);
    }
}
