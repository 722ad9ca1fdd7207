//! End-to-end tests driving a live server over loopback TCP.

use linecast_server::{Server, ServerBuilder, ServerError, ServerEvent};
use parking_lot::Mutex;
use socket2::SockRef;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::task::JoinHandle;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);
const QUIET: Duration = Duration::from_millis(200);

#[derive(Clone, Copy)]
enum Relay {
    None,
    All,
    AllExcept,
}

struct Harness {
    server: Server,
    addr: SocketAddr,
    events: UnboundedReceiver<ServerEvent>,
    messages: UnboundedReceiver<(u64, String)>,
    errors: Arc<Mutex<Vec<String>>>,
    task: JoinHandle<Result<(), ServerError>>,
}

impl Harness {
    async fn start(server: Server, relay: Relay) -> Self {
        let (event_tx, events) = mpsc::unbounded_channel();
        let (message_tx, messages) = mpsc::unbounded_channel();
        let errors = Arc::new(Mutex::new(Vec::new()));

        server.on_event(move |event| {
            let _ = event_tx.send(event);
        });
        let e = Arc::clone(&errors);
        server.on_error(move |err| e.lock().push(err.to_string()));
        let relay_server = server.clone();
        server.on_message(move |id, msg| {
            let line = format!("{}: {}\r\n", id, msg);
            match relay {
                Relay::None => {}
                Relay::All => relay_server.send_message_to_all(&line),
                Relay::AllExcept => relay_server.send_message_to_all_except(&line, id),
            }
            let _ = message_tx.send((id, msg.to_string()));
        });

        let runner = server.clone();
        let task = tokio::spawn(async move { runner.start("tcp", "127.0.0.1:0").await });

        let mut harness = Self {
            addr: "127.0.0.1:0".parse().unwrap(),
            server,
            events,
            messages,
            errors,
            task,
        };
        assert_eq!(harness.next_event().await, ServerEvent::Started);
        harness.addr = harness.server.local_addr().unwrap();
        harness
    }

    async fn next_event(&mut self) -> ServerEvent {
        timeout(WAIT, self.events.recv()).await.unwrap().unwrap()
    }

    async fn next_message(&mut self) -> (u64, String) {
        timeout(WAIT, self.messages.recv()).await.unwrap().unwrap()
    }

    async fn connect(&mut self) -> TcpStream {
        let stream = TcpStream::connect(self.addr).await.unwrap();
        assert_eq!(self.next_event().await, ServerEvent::ConnectionAccepted);
        stream
    }
}

async fn read_exactly(stream: &mut TcpStream, len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    timeout(WAIT, stream.read_exact(&mut buf))
        .await
        .unwrap()
        .unwrap();
    buf
}

async fn assert_silent(stream: &mut TcpStream) {
    let mut buf = [0u8; 64];
    assert!(timeout(QUIET, stream.read(&mut buf)).await.is_err());
}

/// Queues far more than the socket buffers hold, so the connection task is
/// left blocked on a write to a peer that never reads.
async fn flood(server: &Server) {
    for _ in 0..64 {
        server.send_message_to_all(vec![b'x'; 1 << 20]);
    }
    tokio::time::sleep(QUIET).await;
}

async fn assert_closed(stream: &mut TcpStream) {
    let mut buf = [0u8; 64];
    let n = timeout(WAIT, stream.read(&mut buf)).await.unwrap().unwrap_or(0);
    assert_eq!(n, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_relay_except_sender_then_stop() {
    let mut h = Harness::start(Server::new(), Relay::AllExcept).await;

    let mut c1 = h.connect().await;
    let mut c2 = h.connect().await;
    let mut c3 = h.connect().await;
    assert_eq!(h.server.connection_ids(), vec![0, 1, 2]);

    c1.write_all(b"hello\r\n").await.unwrap();
    assert_eq!(h.next_message().await, (0, "hello".to_string()));
    assert_eq!(read_exactly(&mut c2, 10).await, b"0: hello\r\n");
    assert_eq!(read_exactly(&mut c3, 10).await, b"0: hello\r\n");
    assert_silent(&mut c1).await;

    drop(c2);
    assert_eq!(h.next_event().await, ServerEvent::ConnectionClosed);
    assert_eq!(h.server.connection_count(), 2);
    assert_eq!(h.server.connection_ids(), vec![0, 2]);

    h.server.stop();
    assert!(!h.server.is_running());
    assert_eq!(h.server.connection_count(), 0);

    assert_closed(&mut c1).await;
    assert_closed(&mut c3).await;

    // Connection tasks race the Stopped notification.
    let mut tail = Vec::new();
    for _ in 0..3 {
        tail.push(h.next_event().await);
    }
    let stopped = tail.iter().filter(|e| **e == ServerEvent::Stopped).count();
    let closed = tail
        .iter()
        .filter(|e| **e == ServerEvent::ConnectionClosed)
        .count();
    assert_eq!((stopped, closed), (1, 2));

    assert!(timeout(WAIT, h.task).await.unwrap().unwrap().is_ok());
    assert!(h.errors.lock().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_relay_all_includes_sender() {
    let mut h = Harness::start(Server::new(), Relay::All).await;

    let mut c1 = h.connect().await;
    let mut c2 = h.connect().await;

    c2.write_all(b"hey\n").await.unwrap();
    assert_eq!(read_exactly(&mut c1, 8).await, b"1: hey\r\n");
    assert_eq!(read_exactly(&mut c2, 8).await, b"1: hey\r\n");

    h.server.stop();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_connections_get_distinct_ids() {
    let mut h = Harness::start(Server::new(), Relay::None).await;
    let addr = h.addr;

    let clients: Vec<_> = (0..10)
        .map(|_| tokio::spawn(async move { TcpStream::connect(addr).await.unwrap() }))
        .collect();
    let mut streams = Vec::new();
    for client in clients {
        streams.push(client.await.unwrap());
    }
    for _ in 0..10 {
        assert_eq!(h.next_event().await, ServerEvent::ConnectionAccepted);
    }

    assert_eq!(h.server.connection_count(), 10);
    assert_eq!(h.server.connection_ids(), (0..10).collect::<Vec<u64>>());

    h.server.stop();
    for stream in &mut streams {
        assert_closed(stream).await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_noise_only_payload_is_dropped() {
    let mut h = Harness::start(Server::new(), Relay::None).await;
    let mut c1 = h.connect().await;

    c1.write_all(b"\r\n\t").await.unwrap();
    c1.write_all(b"x\n").await.unwrap();

    assert_eq!(h.next_message().await, (0, "x".to_string()));
    assert!(timeout(QUIET, h.messages.recv()).await.is_err());

    h.server.stop();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_buffer_size_bounds_each_chunk() {
    let server = ServerBuilder::new().buffer_size(4).build();
    let mut h = Harness::start(server, Relay::None).await;
    let mut c1 = h.connect().await;

    c1.write_all(b"abcdefghij").await.unwrap();

    let mut received = String::new();
    while received.len() < 10 {
        let (_, chunk) = h.next_message().await;
        assert!(chunk.len() <= 4);
        received.push_str(&chunk);
    }
    assert_eq!(received, "abcdefghij");

    h.server.stop();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_restart_begins_fresh_id_space() {
    let mut h = Harness::start(Server::new(), Relay::None).await;
    let old_addr = h.addr;
    let _c1 = h.connect().await;
    let _c2 = h.connect().await;
    assert_eq!(h.server.connection_ids(), vec![0, 1]);

    h.server.stop();
    h.server.stop();
    for _ in 0..3 {
        let event = h.next_event().await;
        assert!(matches!(
            event,
            ServerEvent::Stopped | ServerEvent::ConnectionClosed
        ));
    }
    assert!(timeout(WAIT, h.task).await.unwrap().unwrap().is_ok());
    assert!(timeout(QUIET, h.events.recv()).await.map_or(true, |e| e.is_none()));
    assert!(TcpStream::connect(old_addr).await.is_err());

    let mut h = Harness::start(h.server, Relay::None).await;
    let _c3 = h.connect().await;
    assert_eq!(h.server.connection_ids(), vec![0]);

    h.server.stop();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_close_connection_is_silent() {
    let mut h = Harness::start(Server::new(), Relay::None).await;
    let mut c1 = h.connect().await;
    let _c2 = h.connect().await;

    assert!(h.server.close_connection(0));
    assert!(!h.server.close_connection(0));
    assert_closed(&mut c1).await;
    assert_eq!(h.next_event().await, ServerEvent::ConnectionClosed);
    assert_eq!(h.server.connection_ids(), vec![1]);
    assert!(h.errors.lock().is_empty());

    h.server.stop();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_bind_failure_is_reported() {
    let mut h = Harness::start(Server::new(), Relay::None).await;

    let second = Server::new();
    let errors = Arc::new(Mutex::new(Vec::new()));
    let e = Arc::clone(&errors);
    second.on_error(move |err| e.lock().push(err.to_string()));

    let result = second.start("tcp", &h.addr.to_string()).await;
    assert!(matches!(result, Err(ServerError::Transport(_))));
    assert_eq!(errors.lock().len(), 1);
    assert!(!second.is_running());

    let result = h.server.start("tcp", "127.0.0.1:0").await;
    assert!(matches!(result, Err(ServerError::AlreadyRunning)));

    h.server.stop();
    assert_eq!(h.next_event().await, ServerEvent::Stopped);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_stop_closes_connection_stuck_on_slow_reader() {
    let mut h = Harness::start(Server::new(), Relay::None).await;
    let _stalled = h.connect().await;

    flood(&h.server).await;
    h.server.stop();

    let mut tail = vec![h.next_event().await, h.next_event().await];
    tail.sort_by_key(|e| *e == ServerEvent::Stopped);
    assert_eq!(tail, vec![ServerEvent::ConnectionClosed, ServerEvent::Stopped]);
    assert_eq!(h.server.connection_count(), 0);
    assert!(timeout(WAIT, h.task).await.unwrap().unwrap().is_ok());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_close_connection_stuck_on_slow_reader() {
    let mut h = Harness::start(Server::new(), Relay::None).await;
    let _stalled = h.connect().await;

    flood(&h.server).await;
    assert!(h.server.close_connection(0));

    assert_eq!(h.next_event().await, ServerEvent::ConnectionClosed);
    assert_eq!(h.server.connection_count(), 0);
    assert!(h.errors.lock().is_empty());

    h.server.stop();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_peer_reset_is_reported() {
    let mut h = Harness::start(Server::new(), Relay::None).await;
    let c1 = h.connect().await;
    let _c2 = h.connect().await;

    // Zero linger turns the close into a reset.
    SockRef::from(&c1).set_linger(Some(Duration::ZERO)).unwrap();
    drop(c1);

    assert_eq!(h.next_event().await, ServerEvent::ConnectionClosed);
    {
        let errors = h.errors.lock();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("connection 0 error:"), "{}", errors[0]);
    }
    assert_eq!(h.server.connection_ids(), vec![1]);

    h.server.stop();
}
