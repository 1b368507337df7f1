//! Client control agent.
//!
//! Holds the control connection to the directory and a listener task that
//! applies incoming events to the local room list. Public operations write
//! a command and, where a reply is expected, wait on a [`PendingRequest`]
//! that the listener resolves.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{oneshot, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::pending::{PendingRequest, Resolution};
use super::presenter::Presenter;
use super::transport::ChatTransport;
use super::view::RoomListView;
use crate::config::{ChatConfig, Config};
use crate::protocol::{validate_token, Command, Event, RoomInfo};
use crate::{Result, RoomcastError};

/// Tunables for a [`ControlAgent`].
#[derive(Debug, Clone)]
pub struct AgentOptions {
    /// Upper bound on any wait for a reply. `None` waits forever.
    pub request_timeout: Option<Duration>,
    /// Settings for the chat transports this agent opens.
    pub chat: ChatConfig,
}

impl AgentOptions {
    /// Build options from the loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        let secs = config.client.request_timeout_secs;
        Self {
            request_timeout: (secs > 0).then(|| Duration::from_secs(secs)),
            chat: config.chat.clone(),
        }
    }
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// State shared between the agent and its listener task.
struct Shared {
    identity: String,
    view: Mutex<RoomListView>,
    listing: PendingRequest<()>,
    creation: PendingRequest<std::result::Result<RoomInfo, String>, String>,
    closed: AtomicBool,
    presenter: Arc<dyn Presenter>,
}

impl Shared {
    fn view(&self) -> MutexGuard<'_, RoomListView> {
        self.view.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn add_room(&self, room: &RoomInfo) {
        let added = self.view().push(room.clone());
        if added {
            self.presenter.room_added(room);
        }
    }

    fn dispatch(&self, event: Event) {
        match event {
            Event::Room(room) | Event::NewRoom(room) => self.add_room(&room),
            Event::RoomCreated(room) => {
                self.add_room(&room);
                if room.creator != self.identity {
                    return;
                }
                let name = room.name.clone();
                match self.creation.resolve_if(|wanted| *wanted == name, Ok(room)) {
                    Resolution::Delivered => debug!(room = %name, "Room creation confirmed"),
                    Resolution::Stale => debug!(room = %name, "Ignoring late creation reply"),
                    Resolution::Unclaimed => {}
                }
            }
            Event::EndOfRoomList => match self.listing.resolve(()) {
                Resolution::Stale => debug!("Ignoring end of an abandoned listing"),
                Resolution::Delivered | Resolution::Unclaimed => self.view().mark_complete(),
            },
            Event::Error(reason) => {
                warn!(reason = %reason, "Directory reported an error");
                self.presenter.notice(&format!("Directory error: {reason}"));
                self.creation.resolve(Err(reason));
            }
            Event::UnknownRoom(id) => {
                warn!(room_id = id, "Directory does not know the room");
                self.presenter.notice(&format!("Unknown room {id}"));
            }
            Event::UnknownCommand => {
                warn!("Directory did not understand a command");
            }
            Event::Unrecognized(name) => {
                debug!(event = %name, "Ignoring unrecognized event");
            }
        }
    }

    fn shut_down(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.listing.abandon();
        self.creation.abandon();
        self.presenter
            .notice("Connection to the directory server was lost.");
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Read events until the directory closes the connection.
async fn listen(shared: Arc<Shared>, reader: OwnedReadHalf) {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => {
                info!("Directory closed the control connection");
                break;
            }
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match Event::parse(line) {
                    Ok(event) => shared.dispatch(event),
                    Err(e) => warn!(line = %line, "Discarding malformed event: {}", e),
                }
            }
            Err(e) => {
                warn!("Control connection read error: {}", e);
                break;
            }
        }
    }

    shared.shut_down();
}

/// One client's connection to the directory.
pub struct ControlAgent {
    shared: Arc<Shared>,
    writer: AsyncMutex<OwnedWriteHalf>,
    listener: JoinHandle<()>,
    options: AgentOptions,
}

impl ControlAgent {
    /// Connect to the directory at `addr` as `identity`.
    ///
    /// The listener task is running by the time this returns.
    pub async fn connect(
        addr: SocketAddr,
        identity: &str,
        presenter: Arc<dyn Presenter>,
        options: AgentOptions,
    ) -> Result<Self> {
        validate_token("user name", identity)?;

        let stream = TcpStream::connect(addr).await.map_err(|e| {
            RoomcastError::ConnectionFailure(format!("cannot reach directory at {addr}: {e}"))
        })?;
        let (reader, writer) = stream.into_split();

        let shared = Arc::new(Shared {
            identity: identity.to_string(),
            view: Mutex::new(RoomListView::new()),
            listing: PendingRequest::new("room listing"),
            creation: PendingRequest::new("room creation"),
            closed: AtomicBool::new(false),
            presenter,
        });
        let listener = tokio::spawn(listen(Arc::clone(&shared), reader));
        info!(%addr, user = %identity, "Connected to directory");

        Ok(Self {
            shared,
            writer: AsyncMutex::new(writer),
            listener,
            options,
        })
    }

    /// The identity this agent presents.
    pub fn identity(&self) -> &str {
        &self.shared.identity
    }

    /// Whether the control connection has been lost.
    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Snapshot of the local room list.
    pub fn rooms(&self) -> Vec<RoomInfo> {
        self.shared.view().rooms().to_vec()
    }

    /// Find a room in the local list by id, falling back to name.
    pub fn find_room(&self, target: &str) -> Option<RoomInfo> {
        let view = self.shared.view();
        target
            .parse::<u32>()
            .ok()
            .and_then(|id| view.get(id))
            .or_else(|| view.find_by_name(target))
            .cloned()
    }

    /// Rebuild the local room list from the directory.
    pub async fn list_rooms(&self) -> Result<Vec<RoomInfo>> {
        let receiver = self.shared.listing.register(())?;
        self.shared.view().clear();
        self.shared.presenter.rooms_reset();

        self.request(&self.shared.listing, receiver, &Command::GetRooms)
            .await?;
        Ok(self.rooms())
    }

    /// Ask the directory for a new room and wait for its confirmation.
    pub async fn create_room(&self, name: &str) -> Result<RoomInfo> {
        validate_token("room name", name)?;
        let receiver = self.shared.creation.register(name.to_string())?;
        let command = Command::CreateRoom {
            name: name.to_string(),
            user: Some(self.shared.identity.clone()),
        };

        match self.request(&self.shared.creation, receiver, &command).await? {
            Ok(room) => {
                info!(room_id = room.id, name = %room.name, "Room created");
                Ok(room)
            }
            Err(reason) => Err(RoomcastError::Rejected(reason)),
        }
    }

    /// Create a room and join it.
    pub async fn create_and_join_room(&self, name: &str) -> Result<ChatTransport> {
        let room = self.create_room(name).await?;
        self.join_room(&room).await
    }

    /// Announce the join on the control channel and enter the chat group.
    pub async fn join_room(&self, room: &RoomInfo) -> Result<ChatTransport> {
        self.ensure_open()?;
        self.send(&Command::JoinRoom {
            room_id: room.id,
            room_name: room.name.clone(),
            user: self.shared.identity.clone(),
        })
        .await?;

        let transport =
            ChatTransport::join(room, &self.options.chat, Arc::clone(&self.shared.presenter))?;
        transport
            .send_system(&format!("User {} joined the room.", self.shared.identity))
            .await?;
        Ok(transport)
    }

    /// Announce the departure, tell the directory, and leave the chat group.
    pub async fn leave_room(&self, transport: ChatTransport) -> Result<()> {
        let departure = format!("User {} left the room.", self.shared.identity);
        if let Err(e) = transport.send_system(&departure).await {
            warn!("Could not announce departure: {}", e);
        }

        let command = Command::LeaveRoom {
            room_name: transport.room().name.clone(),
            user: self.shared.identity.clone(),
        };
        let notified = self.send(&command).await;
        let left = transport.leave().await;
        notified.and(left)
    }

    /// Send a chat message in the given room as this agent's identity.
    pub async fn say(&self, transport: &ChatTransport, text: &str) -> Result<()> {
        transport.send_chat(&self.shared.identity, text).await
    }

    fn ensure_open(&self) -> Result<()> {
        if self.shared.is_closed() {
            return Err(RoomcastError::ConnectionFailure(
                "directory connection is closed".to_string(),
            ));
        }
        Ok(())
    }

    async fn send(&self, command: &Command) -> Result<()> {
        let line = format!("{command}\n");
        let mut writer = self.writer.lock().await;
        writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| RoomcastError::ConnectionFailure(format!("control send failed: {e}")))?;
        debug!(command = command.name(), "Command sent");
        Ok(())
    }

    /// Send a command for a registered request and wait for its reply.
    async fn request<T, K>(
        &self,
        pending: &PendingRequest<T, K>,
        receiver: oneshot::Receiver<T>,
        command: &Command,
    ) -> Result<T> {
        let sent = match self.ensure_open() {
            Ok(()) => self.send(command).await,
            Err(e) => Err(e),
        };
        if let Err(e) = sent {
            pending.cancel();
            return Err(e);
        }
        self.wait(pending, receiver).await
    }

    async fn wait<T, K>(
        &self,
        pending: &PendingRequest<T, K>,
        receiver: oneshot::Receiver<T>,
    ) -> Result<T> {
        let received = match self.options.request_timeout {
            Some(limit) => tokio::time::timeout(limit, receiver)
                .await
                .map_err(|_| RoomcastError::Timeout(pending.kind().to_string()))?,
            None => receiver.await,
        };
        received.map_err(|_| {
            RoomcastError::ConnectionFailure(format!(
                "directory connection closed while waiting for {}",
                pending.kind()
            ))
        })
    }
}

impl Drop for ControlAgent {
    fn drop(&mut self) {
        self.listener.abort();
    }
}
