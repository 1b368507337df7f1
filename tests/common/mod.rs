//! Test helpers for directory integration tests.
//!
//! Provides a running directory on an ephemeral port and a raw line client.

#![allow(dead_code)]

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::timeout;

use roomcast::config::{RoomsConfig, ServerConfig};
use roomcast::{DirectoryServer, Event, RoomRegistry, SessionSet};

/// Default timeout for test operations.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// A directory server running in the background.
pub struct TestDirectory {
    pub addr: SocketAddr,
    pub registry: Arc<RoomRegistry>,
    pub sessions: SessionSet,
    handle: JoinHandle<roomcast::Result<()>>,
}

impl TestDirectory {
    /// Start a directory with default room settings.
    pub async fn start() -> Self {
        Self::start_with(RoomsConfig::default()).await
    }

    /// Start a directory with the given room settings.
    pub async fn start_with(rooms: RoomsConfig) -> Self {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            max_connections: 16,
        };
        let server = DirectoryServer::bind(&config, Arc::new(RoomRegistry::new(rooms)))
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        let registry = server.registry();
        let sessions = server.sessions();
        let handle = tokio::spawn(server.run());

        Self {
            addr,
            registry,
            sessions,
            handle,
        }
    }

    /// Stop accepting connections. Sessions already running keep going.
    pub fn stop(&self) {
        self.handle.abort();
    }

    /// Wait until the live session count reaches `count`.
    pub async fn wait_for_sessions(&self, count: usize) {
        timeout(DEFAULT_TIMEOUT, async {
            while self.sessions.len() != count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("expected {count} sessions, have {}", self.sessions.len()));
    }
}

impl Drop for TestDirectory {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Room settings with a tiny address space.
pub fn small_rooms(capacity: u32) -> RoomsConfig {
    RoomsConfig {
        group_base: Ipv4Addr::new(230, 0, 0, 0),
        group_capacity: capacity,
        base_port: 5000,
    }
}

/// Raw control-protocol client speaking one line at a time.
pub struct LineClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl LineClient {
    /// Connect to the directory.
    pub async fn connect(addr: SocketAddr) -> Self {
        Self::from_stream(TcpStream::connect(addr).await.unwrap())
    }

    /// Speak the line protocol over an already connected stream.
    pub fn from_stream(stream: TcpStream) -> Self {
        let (reader, writer) = stream.into_split();
        Self {
            reader: BufReader::new(reader),
            writer,
        }
    }

    /// Send one line; the newline is appended.
    pub async fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{line}\n").as_bytes())
            .await
            .unwrap();
    }

    /// Read one raw line without the newline.
    pub async fn recv_line(&mut self) -> String {
        let mut line = String::new();
        let read = timeout(DEFAULT_TIMEOUT, self.reader.read_line(&mut line))
            .await
            .expect("timed out waiting for a line")
            .unwrap();
        assert!(read > 0, "connection closed");
        line.trim_end().to_string()
    }

    /// Read and parse one event.
    pub async fn recv(&mut self) -> Event {
        let line = self.recv_line().await;
        Event::parse(&line).unwrap()
    }

    /// Read events up to and including the end-of-list marker.
    pub async fn recv_listing(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        loop {
            let event = self.recv().await;
            let done = event == Event::EndOfRoomList;
            events.push(event);
            if done {
                return events;
            }
        }
    }

    /// Assert that nothing arrives within a short window.
    pub async fn expect_silence(&mut self) {
        let mut line = String::new();
        let result = timeout(
            Duration::from_millis(150),
            self.reader.read_line(&mut line),
        )
        .await;
        assert!(result.is_err(), "unexpected line: {line:?}");
    }

    /// Close the write side, then drop the connection.
    pub async fn close(mut self) {
        let _ = self.writer.shutdown().await;
    }
}

/// A hand-driven directory: the test reads the client's commands and writes
/// the replies itself.
pub struct ScriptedDirectory {
    pub addr: SocketAddr,
    listener: TcpListener,
}

impl ScriptedDirectory {
    /// Listen on an ephemeral port.
    pub async fn bind() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        Self { addr, listener }
    }

    /// Accept the next client connection.
    pub async fn accept(&self) -> LineClient {
        let (stream, _) = timeout(DEFAULT_TIMEOUT, self.listener.accept())
            .await
            .expect("timed out waiting for a client")
            .unwrap();
        LineClient::from_stream(stream)
    }
}
