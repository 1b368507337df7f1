//! Events sent by the directory to clients.

use std::fmt;

use super::{Fields, ProtocolError, RoomInfo};

/// A parsed control event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// One row of a room listing.
    Room(RoomInfo),
    /// End of a room listing.
    EndOfRoomList,
    /// Creation confirmation, sent to the creating connection only.
    RoomCreated(RoomInfo),
    /// Creation broadcast, sent to every other connection.
    NewRoom(RoomInfo),
    /// A `JoinRoom` named a room id the directory does not know.
    UnknownRoom(u32),
    /// The directory did not understand the command.
    UnknownCommand,
    /// A request failed. Carries a human-readable reason.
    Error(String),
    /// An event type this client does not know. Holds the first token.
    Unrecognized(String),
}

impl Event {
    /// Get the event name as it appears on the wire.
    pub fn name(&self) -> &str {
        match self {
            Event::Room(_) => "Room",
            Event::EndOfRoomList => "EndOfRoomList",
            Event::RoomCreated(_) => "RoomCreated",
            Event::NewRoom(_) => "NewRoom",
            Event::UnknownRoom(_) => "UnknownRoom",
            Event::UnknownCommand => "UnknownCommand",
            Event::Error(_) => "Error",
            Event::Unrecognized(name) => name,
        }
    }

    /// Parse one event line.
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let trimmed = line.trim();
        let mut tokens = trimmed.split_ascii_whitespace();
        let keyword = tokens.next().ok_or(ProtocolError::Empty)?;

        match keyword {
            "Room" => Ok(Event::Room(RoomInfo::parse_fields(Fields::new(
                "Room", tokens,
            ))?)),
            "RoomCreated" => Ok(Event::RoomCreated(RoomInfo::parse_fields(Fields::new(
                "RoomCreated",
                tokens,
            ))?)),
            "NewRoom" => Ok(Event::NewRoom(RoomInfo::parse_fields(Fields::new(
                "NewRoom", tokens,
            ))?)),
            "EndOfRoomList" => {
                Fields::new("EndOfRoomList", tokens).finish()?;
                Ok(Event::EndOfRoomList)
            }
            "UnknownRoom" => {
                let mut fields = Fields::new("UnknownRoom", tokens);
                let id = fields.number("id")?;
                fields.finish()?;
                Ok(Event::UnknownRoom(id))
            }
            "UnknownCommand" => Ok(Event::UnknownCommand),
            "Error" => {
                let reason = trimmed[keyword.len()..].trim_start();
                Ok(Event::Error(reason.to_string()))
            }
            other => Ok(Event::Unrecognized(other.to_string())),
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Room(room) => write!(f, "Room {room}"),
            Event::EndOfRoomList => write!(f, "EndOfRoomList"),
            Event::RoomCreated(room) => write!(f, "RoomCreated {room}"),
            Event::NewRoom(room) => write!(f, "NewRoom {room}"),
            Event::UnknownRoom(id) => write!(f, "UnknownRoom {id}"),
            Event::UnknownCommand => write!(f, "UnknownCommand"),
            Event::Error(reason) => write!(f, "Error {reason}"),
            Event::Unrecognized(name) => write!(f, "{name}"),
        }
    }
}
