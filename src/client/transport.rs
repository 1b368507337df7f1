//! Per-room chat transport over UDP multicast.
//!
//! Chat traffic never touches the directory: every member of a room joins
//! the room's multicast group and datagrams are fanned out by the network.
//! Delivery, ordering and duplication are whatever UDP multicast gives.

use std::net::{IpAddr, Ipv4Addr, SocketAddrV4};
use std::sync::Arc;

use chrono::{DateTime, Local};
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::presenter::Presenter;
use crate::config::ChatConfig;
use crate::protocol::RoomInfo;
use crate::{Result, RoomcastError};

/// One received chat datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatLine {
    /// Decoded payload.
    pub text: String,
    /// Address the datagram came from.
    pub sender: IpAddr,
    /// Whether the payload starts with the system tag.
    pub system: bool,
    /// Local time of arrival.
    pub received_at: DateTime<Local>,
}

impl ChatLine {
    /// Classify a decoded payload.
    pub fn new(text: String, sender: IpAddr, system_tag: &str) -> Self {
        let system = !system_tag.is_empty() && text.starts_with(system_tag);
        Self {
            text,
            sender,
            system,
            received_at: Local::now(),
        }
    }

    /// Text for display. System lines carry no sender annotation.
    pub fn render(&self) -> String {
        if self.system {
            self.text.clone()
        } else {
            format!("[{}] {}", self.sender, self.text)
        }
    }
}

/// Decode exactly the `len` bytes a receive reported.
///
/// The buffer is reused between datagrams, so bytes past `len` belong to
/// an earlier, longer message and must not leak into this one.
pub fn decode_datagram(buf: &[u8], len: usize) -> String {
    let len = len.min(buf.len());
    String::from_utf8_lossy(&buf[..len]).into_owned()
}

/// Open a UDP socket bound to the room port and joined to its group.
fn open_socket(room: &RoomInfo, config: &ChatConfig) -> std::io::Result<std::net::UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    // Several members on one host share the room port
    socket.set_reuse_address(true)?;
    socket.bind(&SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, room.port).into())?;
    socket.join_multicast_v4(&room.group, &config.interface)?;
    socket.set_multicast_loop_v4(true)?;
    socket.set_multicast_ttl_v4(config.multicast_ttl)?;
    socket.set_nonblocking(true)?;
    Ok(socket.into())
}

/// Membership in one room's multicast group.
///
/// Owns the socket and the receiver task. [`ChatTransport::leave`] revokes
/// the membership and closes the socket; dropping the transport without
/// leaving stops the receiver and closes the socket as well.
pub struct ChatTransport {
    room: RoomInfo,
    interface: Ipv4Addr,
    system_tag: String,
    socket: Arc<UdpSocket>,
    receiver: Option<JoinHandle<()>>,
}

impl ChatTransport {
    /// Join the room's group and start delivering chat lines to `presenter`.
    pub fn join(
        room: &RoomInfo,
        config: &ChatConfig,
        presenter: Arc<dyn Presenter>,
    ) -> Result<Self> {
        let socket = open_socket(room, config).map_err(|e| {
            RoomcastError::ConnectionFailure(format!(
                "cannot join chat group {}: {e}",
                room.group_addr()
            ))
        })?;
        let socket = Arc::new(UdpSocket::from_std(socket)?);

        let receiver = tokio::spawn(receive_lines(
            Arc::clone(&socket),
            config.buffer_size.max(1),
            config.system_tag.clone(),
            presenter,
        ));
        info!(room_id = room.id, group = %room.group_addr(), "Joined chat group");

        Ok(Self {
            room: room.clone(),
            interface: config.interface,
            system_tag: config.system_tag.clone(),
            socket,
            receiver: Some(receiver),
        })
    }

    /// The room this transport belongs to.
    pub fn room(&self) -> &RoomInfo {
        &self.room
    }

    /// Send raw text to every member of the group.
    pub async fn send(&self, text: &str) -> Result<()> {
        self.socket
            .send_to(text.as_bytes(), self.room.group_addr())
            .await
            .map_err(|e| RoomcastError::ConnectionFailure(format!("chat send failed: {e}")))?;
        Ok(())
    }

    /// Send a chat message from `user`.
    pub async fn send_chat(&self, user: &str, text: &str) -> Result<()> {
        self.send(&format!("{user}: {text}")).await
    }

    /// Send a system line, rendered by members without a sender address.
    pub async fn send_system(&self, text: &str) -> Result<()> {
        self.send(&format!("{} {text}", self.system_tag)).await
    }

    /// Leave the group and release the socket.
    pub async fn leave(mut self) -> Result<()> {
        if let Some(receiver) = self.receiver.take() {
            receiver.abort();
            let _ = receiver.await;
        }
        let result = self
            .socket
            .leave_multicast_v4(self.room.group, self.interface);
        info!(room_id = self.room.id, group = %self.room.group_addr(), "Left chat group");
        // Dropping self closes the socket; the receiver held the only other reference
        result.map_err(RoomcastError::Io)
    }
}

impl Drop for ChatTransport {
    fn drop(&mut self) {
        if let Some(receiver) = self.receiver.take() {
            receiver.abort();
        }
    }
}

/// Receive datagrams until the socket fails or the task is aborted.
async fn receive_lines(
    socket: Arc<UdpSocket>,
    buffer_size: usize,
    system_tag: String,
    presenter: Arc<dyn Presenter>,
) {
    let mut buf = vec![0u8; buffer_size];
    loop {
        match socket.recv_from(&mut buf).await {
            Ok((len, from)) => {
                let line = ChatLine::new(decode_datagram(&buf, len), from.ip(), &system_tag);
                debug!(sender = %from, len, "Chat datagram received");
                presenter.chat_line(&line);
            }
            Err(e) => {
                warn!("Chat receiver stopped: {}", e);
                break;
            }
        }
    }
}
