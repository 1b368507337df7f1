//! Room registry for the directory.
//!
//! Owns every room and the counters used to hand out ids and multicast
//! groups. All state sits behind one lock so that id allocation, address
//! allocation and visibility happen as a single step.

use std::net::Ipv4Addr;

use tokio::sync::RwLock;
use tracing::info;

use crate::config::RoomsConfig;
use crate::protocol::RoomInfo;
use crate::{Result, RoomcastError};

/// State guarded by the registry lock.
struct RegistryState {
    /// Rooms in creation order.
    rooms: Vec<RoomInfo>,
    /// Id for the next room.
    next_id: u32,
    /// Offset above the group base for the next room.
    next_group: u32,
}

/// Registry of all rooms known to the directory.
///
/// Rooms are never removed or modified after creation.
pub struct RoomRegistry {
    config: RoomsConfig,
    state: RwLock<RegistryState>,
}

impl RoomRegistry {
    /// Create an empty registry.
    pub fn new(config: RoomsConfig) -> Self {
        Self {
            config,
            state: RwLock::new(RegistryState {
                rooms: Vec::new(),
                next_id: 1,
                next_group: 1,
            }),
        }
    }

    /// Create a new room.
    ///
    /// Fails without touching the registry when the id, group address or
    /// port space is exhausted.
    pub async fn create_room(
        &self,
        name: impl Into<String>,
        creator: impl Into<String>,
    ) -> Result<RoomInfo> {
        let mut state = self.state.write().await;

        let id = state.next_id;
        let group = self.group_address(state.next_group)?;
        let port = u16::try_from(id)
            .ok()
            .and_then(|offset| self.config.base_port.checked_add(offset))
            .ok_or_else(|| {
                RoomcastError::ResourceExhausted(format!("no port left for room {id}"))
            })?;
        let next_id = id
            .checked_add(1)
            .ok_or_else(|| RoomcastError::ResourceExhausted("room id space".to_string()))?;

        let room = RoomInfo::new(id, name, creator, group, port);
        state.rooms.push(room.clone());
        state.next_id = next_id;
        state.next_group += 1;

        info!(
            room_id = room.id,
            room = %room.name,
            creator = %room.creator,
            group = %room.group_addr(),
            "Room created"
        );
        Ok(room)
    }

    /// Derive the n-th group address above the configured base.
    fn group_address(&self, offset: u32) -> Result<Ipv4Addr> {
        if offset > self.config.group_capacity {
            return Err(RoomcastError::ResourceExhausted(format!(
                "all {} group addresses are in use",
                self.config.group_capacity
            )));
        }
        let group = u32::from(self.config.group_base)
            .checked_add(offset)
            .map(Ipv4Addr::from)
            .filter(Ipv4Addr::is_multicast)
            .ok_or_else(|| {
                RoomcastError::ResourceExhausted("multicast address range exhausted".to_string())
            })?;
        Ok(group)
    }

    /// Snapshot of all rooms in creation order.
    pub async fn list_rooms(&self) -> Vec<RoomInfo> {
        self.state.read().await.rooms.clone()
    }

    /// Get a room by id.
    pub async fn get_room(&self, id: u32) -> Option<RoomInfo> {
        self.state
            .read()
            .await
            .rooms
            .iter()
            .find(|room| room.id == id)
            .cloned()
    }

    /// Get the number of rooms.
    pub async fn room_count(&self) -> usize {
        self.state.read().await.rooms.len()
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new(RoomsConfig::default())
    }
}
