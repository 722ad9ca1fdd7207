//! Benchmark helpers for linecast.

use bytes::Bytes;
use linecast_server::{ConnectionHandle, ConnectionRegistry};
use std::net::{Ipv4Addr, SocketAddr};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio_util::sync::CancellationToken;

/// Peer address used for synthetic connections.
pub const BENCH_PEER: SocketAddr = SocketAddr::new(std::net::IpAddr::V4(Ipv4Addr::LOCALHOST), 9876);

/// Builds an open registry holding `count` connections.
///
/// The receivers are returned so the queues stay open for the benchmark.
#[must_use]
pub fn populated_registry(count: usize) -> (ConnectionRegistry, Vec<UnboundedReceiver<Bytes>>) {
    let registry = ConnectionRegistry::new();
    registry.open();

    let mut receivers = Vec::with_capacity(count);
    for _ in 0..count {
        let (tx, rx) = mpsc::unbounded_channel();
        registry.register(ConnectionHandle::new(BENCH_PEER, tx, CancellationToken::new()));
        receivers.push(rx);
    }
    (registry, receivers)
}

/// Drains every queued payload, returning the number drained.
pub fn drain(receivers: &mut [UnboundedReceiver<Bytes>]) -> usize {
    let mut drained = 0;
    for rx in receivers {
        while rx.try_recv().is_ok() {
            drained += 1;
        }
    }
    drained
}
