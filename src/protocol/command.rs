//! Commands sent by clients to the directory.

use std::fmt;

use super::{Fields, ProtocolError};

/// A parsed control command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Request the full room listing.
    GetRooms,
    /// Request a new room. `user` claims the session identity when present.
    CreateRoom { name: String, user: Option<String> },
    /// Announce that `user` joined a room.
    JoinRoom {
        room_id: u32,
        room_name: String,
        user: String,
    },
    /// Announce that `user` left a room.
    LeaveRoom { room_name: String, user: String },
    /// Anything the directory does not understand. Holds the first token.
    Unknown(String),
}

impl Command {
    /// Get the command name as it appears on the wire.
    pub fn name(&self) -> &str {
        match self {
            Command::GetRooms => "GetRooms",
            Command::CreateRoom { .. } => "CreateRoom",
            Command::JoinRoom { .. } => "JoinRoom",
            Command::LeaveRoom { .. } => "LeaveRoom",
            Command::Unknown(name) => name,
        }
    }

    /// The participant name this command carries, if any.
    pub fn user(&self) -> Option<&str> {
        match self {
            Command::CreateRoom { user, .. } => user.as_deref(),
            Command::JoinRoom { user, .. } | Command::LeaveRoom { user, .. } => Some(user),
            Command::GetRooms | Command::Unknown(_) => None,
        }
    }

    /// Parse one control line.
    ///
    /// A first token that names no command yields [`Command::Unknown`]; a
    /// known command with the wrong number of fields is a protocol error.
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let mut tokens = line.split_ascii_whitespace();
        let keyword = tokens.next().ok_or(ProtocolError::Empty)?;

        match keyword {
            "GetRooms" => {
                Fields::new("GetRooms", tokens).finish()?;
                Ok(Command::GetRooms)
            }
            "CreateRoom" => {
                let mut fields = Fields::new("CreateRoom", tokens);
                let name = fields.next("name")?.to_string();
                let user = fields.optional().map(str::to_string);
                fields.finish()?;
                Ok(Command::CreateRoom { name, user })
            }
            "JoinRoom" => {
                let mut fields = Fields::new("JoinRoom", tokens);
                let room_id = fields.number("id")?;
                let room_name = fields.next("name")?.to_string();
                let user = fields.next("user")?.to_string();
                fields.finish()?;
                Ok(Command::JoinRoom {
                    room_id,
                    room_name,
                    user,
                })
            }
            "LeaveRoom" => {
                let mut fields = Fields::new("LeaveRoom", tokens);
                let room_name = fields.next("name")?.to_string();
                let user = fields.next("user")?.to_string();
                fields.finish()?;
                Ok(Command::LeaveRoom { room_name, user })
            }
            other => Ok(Command::Unknown(other.to_string())),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::GetRooms => write!(f, "GetRooms"),
            Command::CreateRoom { name, user: None } => write!(f, "CreateRoom {name}"),
            Command::CreateRoom {
                name,
                user: Some(user),
            } => write!(f, "CreateRoom {name} {user}"),
            Command::JoinRoom {
                room_id,
                room_name,
                user,
            } => write!(f, "JoinRoom {room_id} {room_name} {user}"),
            Command::LeaveRoom { room_name, user } => write!(f, "LeaveRoom {room_name} {user}"),
            Command::Unknown(name) => write!(f, "{name}"),
        }
    }
}
