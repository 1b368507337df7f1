//! Control channel sessions.
//!
//! One session runs per accepted connection. It reads command lines,
//! applies them to the registry, and queues events for its own writer
//! task. Broadcasts from other sessions land in the same queue, so
//! replies and broadcasts reach the client in one well-defined order.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::registry::RoomRegistry;
use super::sessions::{SessionHandle, SessionSet};
use crate::protocol::{Command, Event};

/// Longest accepted command line in bytes. Longer lines are discarded.
pub const MAX_LINE_LENGTH: usize = 4096;

/// Session state representing the current phase of the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Connected, no participant name claimed yet.
    #[default]
    Connected,
    /// A command carrying a participant name has been seen.
    Identified,
    /// The connection is gone.
    Closed,
}

/// Command processing for one control connection.
pub struct ControlSession {
    /// Unique session identifier.
    id: Uuid,
    /// Remote peer address.
    peer_addr: SocketAddr,
    /// Current session state.
    state: SessionState,
    /// Participant name claimed by this connection.
    user: Option<String>,
    registry: Arc<RoomRegistry>,
    sessions: SessionSet,
    outbound: mpsc::UnboundedSender<Event>,
}

impl ControlSession {
    /// Create a new session.
    pub fn new(
        id: Uuid,
        peer_addr: SocketAddr,
        registry: Arc<RoomRegistry>,
        sessions: SessionSet,
        outbound: mpsc::UnboundedSender<Event>,
    ) -> Self {
        debug!(session = %id, peer = %peer_addr, "Created new session");
        Self {
            id,
            peer_addr,
            state: SessionState::Connected,
            user: None,
            registry,
            sessions,
            outbound,
        }
    }

    /// Get the session ID.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Get the peer address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Get the current session state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Get the claimed participant name.
    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    /// Record the participant name the first time one is seen.
    fn claim_identity(&mut self, user: &str) {
        if self.user.is_none() {
            info!(session = %self.id, user, "Session identified");
            self.user = Some(user.to_string());
            self.state = SessionState::Identified;
        }
    }

    /// Name used as room creator: the claimed identity, else the peer address.
    fn identity(&self) -> String {
        self.user
            .clone()
            .unwrap_or_else(|| self.peer_addr.to_string())
    }

    fn reply(&self, event: Event) {
        if self.outbound.send(event).is_err() {
            debug!(session = %self.id, "Reply dropped, writer is gone");
        }
    }

    /// Handle one raw line. Malformed lines are logged and discarded.
    pub async fn handle_line(&mut self, line: &str) {
        if line.trim().is_empty() {
            return;
        }
        match Command::parse(line) {
            Ok(command) => self.handle_command(command).await,
            Err(e) => warn!(session = %self.id, line, "Discarding malformed line: {}", e),
        }
    }

    /// Apply one parsed command.
    pub async fn handle_command(&mut self, command: Command) {
        if let Some(user) = command.user() {
            let user = user.to_string();
            self.claim_identity(&user);
        }

        match command {
            Command::GetRooms => self.send_room_list().await,
            Command::CreateRoom { name, .. } => self.create_room(name).await,
            Command::JoinRoom {
                room_id,
                room_name,
                user,
            } => match self.registry.get_room(room_id).await {
                Some(room) => info!(
                    session = %self.id,
                    room_id,
                    room = %room.name,
                    user = %user,
                    "User joined room"
                ),
                None => {
                    warn!(
                        session = %self.id,
                        room_id,
                        room = %room_name,
                        user = %user,
                        "Join for unknown room"
                    );
                    self.reply(Event::UnknownRoom(room_id));
                }
            },
            Command::LeaveRoom { room_name, user } => {
                info!(session = %self.id, room = %room_name, user = %user, "User left room");
            }
            Command::Unknown(name) => {
                debug!(session = %self.id, command = %name, "Unknown command");
                self.reply(Event::UnknownCommand);
            }
        }
    }

    async fn send_room_list(&self) {
        let rooms = self.registry.list_rooms().await;
        let count = rooms.len();
        for room in rooms {
            self.reply(Event::Room(room));
        }
        self.reply(Event::EndOfRoomList);
        debug!(session = %self.id, count, "Room list sent");
    }

    async fn create_room(&self, name: String) {
        let creator = self.identity();
        match self.registry.create_room(name.as_str(), creator).await {
            Ok(room) => {
                self.reply(Event::RoomCreated(room.clone()));
                let delivered = self
                    .sessions
                    .broadcast_except(self.id, &Event::NewRoom(room));
                debug!(session = %self.id, delivered, "Broadcast new room");
            }
            Err(e) => {
                warn!(session = %self.id, room = %name, "Room creation failed: {}", e);
                self.reply(Event::Error(format!("cannot create room {name}: {e}")));
            }
        }
    }

    /// Mark the session closed.
    pub fn close(&mut self) {
        self.state = SessionState::Closed;
    }
}

/// Serve one accepted control connection until it closes.
///
/// The session is part of the broadcast set for exactly as long as this
/// future runs.
pub async fn serve_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    registry: Arc<RoomRegistry>,
    sessions: SessionSet,
) {
    let id = Uuid::new_v4();
    let (read_half, write_half) = stream.into_split();
    let (outbound, queue) = mpsc::unbounded_channel();

    let writer = tokio::spawn(write_events(id, write_half, queue));
    let registration = sessions.insert(SessionHandle::new(id, peer_addr, outbound.clone()));
    let mut session = ControlSession::new(id, peer_addr, registry, sessions, outbound);
    info!(session = %id, peer = %peer_addr, "Session opened");

    let mut reader = BufReader::new(read_half);
    let mut buf = Vec::with_capacity(256);
    loop {
        match read_capped_line(&mut reader, &mut buf).await {
            Ok(LineRead::Eof) => break,
            Ok(LineRead::Oversized) => {
                warn!(session = %id, limit = MAX_LINE_LENGTH, "Discarding oversized line");
            }
            Ok(LineRead::Line) => {
                let line = String::from_utf8_lossy(&buf);
                session.handle_line(&line).await;
            }
            Err(e) => {
                warn!(session = %id, "Read error: {}", e);
                break;
            }
        }
    }

    drop(registration);
    session.close();
    writer.abort();
    info!(session = %id, user = ?session.user(), "Session closed");
}

/// Outcome of reading one command line.
#[derive(Debug, PartialEq, Eq)]
enum LineRead {
    /// A line (possibly unterminated at end of stream) is in the buffer.
    Line,
    /// The line exceeded [`MAX_LINE_LENGTH`] and was skipped up to its newline.
    Oversized,
    /// The peer closed the connection.
    Eof,
}

/// Read one line into `buf`, holding at most `MAX_LINE_LENGTH + 1` bytes.
async fn read_capped_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<LineRead>
where
    R: AsyncBufRead + Unpin,
{
    let limit = MAX_LINE_LENGTH as u64 + 1;

    buf.clear();
    if (&mut *reader).take(limit).read_until(b'\n', buf).await? == 0 {
        return Ok(LineRead::Eof);
    }
    if buf.len() <= MAX_LINE_LENGTH || buf.ends_with(b"\n") {
        return Ok(LineRead::Line);
    }

    loop {
        buf.clear();
        let read = (&mut *reader).take(limit).read_until(b'\n', buf).await?;
        if read == 0 || buf.ends_with(b"\n") {
            break;
        }
    }
    buf.clear();
    Ok(LineRead::Oversized)
}

/// Drain a session's outbound queue onto its socket.
async fn write_events(
    id: Uuid,
    mut stream: OwnedWriteHalf,
    mut queue: mpsc::UnboundedReceiver<Event>,
) {
    while let Some(event) = queue.recv().await {
        let line = format!("{event}\n");
        if let Err(e) = stream.write_all(line.as_bytes()).await {
            debug!(session = %id, "Write error: {}", e);
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;

    struct Harness {
        session: ControlSession,
        queue: mpsc::UnboundedReceiver<Event>,
        registry: Arc<RoomRegistry>,
        sessions: SessionSet,
    }

    fn harness() -> Harness {
        let registry = Arc::new(RoomRegistry::default());
        let sessions = SessionSet::new();
        let (tx, queue) = mpsc::unbounded_channel();
        let peer = SocketAddr::from((Ipv4Addr::LOCALHOST, 50000));
        let session = ControlSession::new(
            Uuid::new_v4(),
            peer,
            Arc::clone(&registry),
            sessions.clone(),
            tx,
        );
        Harness {
            session,
            queue,
            registry,
            sessions,
        }
    }

    fn drain(queue: &mut mpsc::UnboundedReceiver<Event>) -> Vec<Event> {
        let mut events = Vec::new();
        while let Ok(event) = queue.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_get_rooms_empty_registry() {
        let mut h = harness();
        h.session.handle_line("GetRooms").await;

        assert_eq!(drain(&mut h.queue), vec![Event::EndOfRoomList]);
    }

    #[tokio::test]
    async fn test_get_rooms_lists_in_order_then_marker() {
        let mut h = harness();
        let a = h.registry.create_room("a", "alice").await.unwrap();
        let b = h.registry.create_room("b", "bob").await.unwrap();

        h.session.handle_line("GetRooms").await;

        assert_eq!(
            drain(&mut h.queue),
            vec![Event::Room(a), Event::Room(b), Event::EndOfRoomList]
        );
    }

    #[tokio::test]
    async fn test_create_room_replies_and_broadcasts_to_others() {
        let mut h = harness();
        let (other_tx, mut other_rx) = mpsc::unbounded_channel();
        let _own = h.sessions.insert(SessionHandle::new(
            h.session.id(),
            h.session.peer_addr(),
            h.session.outbound.clone(),
        ));
        let _other = h.sessions.insert(SessionHandle::new(
            Uuid::new_v4(),
            SocketAddr::from((Ipv4Addr::LOCALHOST, 50001)),
            other_tx,
        ));

        h.session.handle_line("CreateRoom Lobby alice").await;

        let room = h.registry.get_room(1).await.unwrap();
        assert_eq!(room.creator, "alice");
        assert_eq!(drain(&mut h.queue), vec![Event::RoomCreated(room.clone())]);
        assert_eq!(drain(&mut other_rx), vec![Event::NewRoom(room)]);
    }

    #[tokio::test]
    async fn test_create_room_without_identity_uses_peer_address() {
        let mut h = harness();
        h.session.handle_line("CreateRoom Lobby").await;

        let room = h.registry.get_room(1).await.unwrap();
        assert_eq!(room.creator, "127.0.0.1:50000");
        assert_eq!(h.session.state(), SessionState::Connected);
    }

    #[tokio::test]
    async fn test_identity_is_claimed_once() {
        let mut h = harness();
        h.session.handle_line("LeaveRoom Lobby alice").await;
        h.session.handle_line("CreateRoom Tech mallory").await;

        assert_eq!(h.session.user(), Some("alice"));
        assert_eq!(h.session.state(), SessionState::Identified);
        assert_eq!(h.registry.get_room(1).await.unwrap().creator, "alice");
    }

    #[tokio::test]
    async fn test_create_room_exhausted_replies_error() {
        let registry = Arc::new(RoomRegistry::new(crate::config::RoomsConfig {
            group_capacity: 1,
            ..Default::default()
        }));
        let (tx, mut queue) = mpsc::unbounded_channel();
        let mut session = ControlSession::new(
            Uuid::new_v4(),
            SocketAddr::from((Ipv4Addr::LOCALHOST, 50000)),
            Arc::clone(&registry),
            SessionSet::new(),
            tx,
        );

        session.handle_line("CreateRoom a alice").await;
        session.handle_line("CreateRoom b alice").await;

        let events = drain(&mut queue);
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], Event::RoomCreated(_)));
        assert!(matches!(events[1], Event::Error(_)));
        assert_eq!(registry.room_count().await, 1);
    }

    #[tokio::test]
    async fn test_join_known_room_sends_nothing() {
        let mut h = harness();
        h.registry.create_room("Lobby", "alice").await.unwrap();

        h.session.handle_line("JoinRoom 1 Lobby bob").await;

        assert!(drain(&mut h.queue).is_empty());
        assert_eq!(h.session.user(), Some("bob"));
    }

    #[tokio::test]
    async fn test_join_unknown_room_replies_unknown_room() {
        let mut h = harness();
        h.session.handle_line("JoinRoom 42 Nowhere bob").await;

        assert_eq!(drain(&mut h.queue), vec![Event::UnknownRoom(42)]);
    }

    #[tokio::test]
    async fn test_unknown_command_then_continue() {
        let mut h = harness();
        h.session.handle_line("Frobnicate").await;
        h.session.handle_line("GetRooms").await;

        assert_eq!(
            drain(&mut h.queue),
            vec![Event::UnknownCommand, Event::EndOfRoomList]
        );
    }

    #[tokio::test]
    async fn test_malformed_line_is_discarded() {
        let mut h = harness();
        h.session.handle_line("JoinRoom notanumber Lobby bob").await;
        h.session.handle_line("CreateRoom").await;
        h.session.handle_line("").await;

        assert!(drain(&mut h.queue).is_empty());
        assert_eq!(h.registry.room_count().await, 0);
    }

    #[tokio::test]
    async fn test_close_sets_state() {
        let mut h = harness();
        h.session.close();
        assert_eq!(h.session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_read_capped_line_splits_lines() {
        let mut input: &[u8] = b"GetRooms\nCreateRoom Lobby alice\n";
        let mut buf = Vec::new();

        assert_eq!(read_capped_line(&mut input, &mut buf).await.unwrap(), LineRead::Line);
        assert_eq!(buf, b"GetRooms\n");
        assert_eq!(read_capped_line(&mut input, &mut buf).await.unwrap(), LineRead::Line);
        assert_eq!(buf, b"CreateRoom Lobby alice\n");
        assert_eq!(read_capped_line(&mut input, &mut buf).await.unwrap(), LineRead::Eof);
    }

    #[tokio::test]
    async fn test_read_capped_line_accepts_line_at_limit() {
        let mut data = vec![b'a'; MAX_LINE_LENGTH];
        data.push(b'\n');
        let mut input: &[u8] = &data;
        let mut buf = Vec::new();

        assert_eq!(read_capped_line(&mut input, &mut buf).await.unwrap(), LineRead::Line);
        assert_eq!(buf.len(), MAX_LINE_LENGTH + 1);
    }

    #[tokio::test]
    async fn test_read_capped_line_skips_oversized_line_with_bounded_buffer() {
        let mut data = vec![b'x'; MAX_LINE_LENGTH * 3];
        data.extend_from_slice(b"\nGetRooms\n");
        let mut input: &[u8] = &data;
        let mut buf = Vec::new();

        assert_eq!(
            read_capped_line(&mut input, &mut buf).await.unwrap(),
            LineRead::Oversized
        );
        assert!(buf.capacity() <= MAX_LINE_LENGTH * 2);

        // The next line is read normally
        assert_eq!(read_capped_line(&mut input, &mut buf).await.unwrap(), LineRead::Line);
        assert_eq!(buf, b"GetRooms\n");
    }

    #[tokio::test]
    async fn test_read_capped_line_unterminated_tail_is_a_line() {
        let mut input: &[u8] = b"GetRooms";
        let mut buf = Vec::new();

        assert_eq!(read_capped_line(&mut input, &mut buf).await.unwrap(), LineRead::Line);
        assert_eq!(buf, b"GetRooms");
        assert_eq!(read_capped_line(&mut input, &mut buf).await.unwrap(), LineRead::Eof);
    }
}
