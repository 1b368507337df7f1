//! Client-side mirror of the directory's room list.

use crate::protocol::RoomInfo;

/// Local room list.
///
/// Rebuilt from scratch on every listing round-trip and extended by
/// creation broadcasts in between. A room id appears at most once, so a
/// room that shows up both as a listing row and as a concurrent `NewRoom`
/// is kept only once.
#[derive(Debug, Clone, Default)]
pub struct RoomListView {
    rooms: Vec<RoomInfo>,
    complete: bool,
}

impl RoomListView {
    /// Create an empty view.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every room and mark the view incomplete.
    pub fn clear(&mut self) {
        self.rooms.clear();
        self.complete = false;
    }

    /// Append a room.
    ///
    /// Returns false if a room with the same id is already present.
    pub fn push(&mut self, room: RoomInfo) -> bool {
        if self.contains(room.id) {
            return false;
        }
        self.rooms.push(room);
        true
    }

    /// Record that the end-of-list marker was seen.
    pub fn mark_complete(&mut self) {
        self.complete = true;
    }

    /// Whether a full listing has been received since the last clear.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Check whether a room id is present.
    pub fn contains(&self, id: u32) -> bool {
        self.rooms.iter().any(|room| room.id == id)
    }

    /// Get a room by id.
    pub fn get(&self, id: u32) -> Option<&RoomInfo> {
        self.rooms.iter().find(|room| room.id == id)
    }

    /// Find the first room with the given name.
    pub fn find_by_name(&self, name: &str) -> Option<&RoomInfo> {
        self.rooms.iter().find(|room| room.name == name)
    }

    /// Rooms in arrival order.
    pub fn rooms(&self) -> &[RoomInfo] {
        &self.rooms
    }

    /// Get the number of rooms.
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    /// Check whether the view is empty.
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}
