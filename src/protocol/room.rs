//! Room record as carried on the wire.

use std::fmt;
use std::net::{Ipv4Addr, SocketAddrV4};

use super::{Fields, ProtocolError};
use crate::{Result, RoomcastError};

/// A room as seen by sessions and clients.
///
/// This is always a copy; the registry owns the authoritative record and
/// never hands out references into its storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomInfo {
    /// Registry-assigned id, never reused.
    pub id: u32,
    /// Display name. Not unique.
    pub name: String,
    /// Identity of the participant that created the room.
    pub creator: String,
    /// Multicast group of the room's chat transport.
    pub group: Ipv4Addr,
    /// UDP port of the room's chat transport.
    pub port: u16,
}

impl RoomInfo {
    /// Create a new room record.
    pub fn new(
        id: u32,
        name: impl Into<String>,
        creator: impl Into<String>,
        group: Ipv4Addr,
        port: u16,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            creator: creator.into(),
            group,
            port,
        }
    }

    /// Socket address of the room's multicast group.
    pub fn group_addr(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.group, self.port)
    }

    /// Parse the `<id> <name> <creator> <addr> <port>` tail of a room line.
    pub(crate) fn parse_fields(mut fields: Fields<'_>) -> std::result::Result<Self, ProtocolError> {
        let id = fields.number("id")?;
        let name = fields.next("name")?;
        let creator = fields.next("creator")?;
        let group = fields.next("addr")?;
        let group: Ipv4Addr = group
            .parse()
            .map_err(|_| ProtocolError::InvalidAddress(group.to_string()))?;
        let port = fields.number("port")?;
        fields.finish()?;

        Ok(Self::new(id, name, creator, group, port))
    }
}

/// Renders the `<id> <name> <creator> <addr> <port>` tail of a room line.
impl fmt::Display for RoomInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {}",
            self.id, self.name, self.creator, self.group, self.port
        )
    }
}

/// Check that a room name or user name can travel as a single field.
pub fn validate_token(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(RoomcastError::Validation(format!("{field} must not be empty")));
    }
    if value.chars().any(char::is_whitespace) {
        return Err(RoomcastError::Validation(format!(
            "{field} must not contain whitespace: {value:?}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(line: &str) -> Fields<'_> {
        Fields::new("Room", line.split_ascii_whitespace())
    }

    #[test]
    fn test_room_display() {
        let room = RoomInfo::new(1, "Lobby", "alice", Ipv4Addr::new(230, 0, 0, 1), 5001);
        assert_eq!(room.to_string(), "1 Lobby alice 230.0.0.1 5001");
    }

    #[test]
    fn test_room_group_addr() {
        let room = RoomInfo::new(3, "Tech", "bob", Ipv4Addr::new(230, 0, 0, 3), 5003);
        assert_eq!(room.group_addr().to_string(), "230.0.0.3:5003");
    }

    #[test]
    fn test_parse_fields() {
        let room = RoomInfo::parse_fields(fields("7 Games carol 230.0.0.7 5007")).unwrap();
        assert_eq!(room.id, 7);
        assert_eq!(room.name, "Games");
        assert_eq!(room.creator, "carol");
        assert_eq!(room.group, Ipv4Addr::new(230, 0, 0, 7));
        assert_eq!(room.port, 5007);
    }

    #[test]
    fn test_parse_fields_missing_port() {
        let err = RoomInfo::parse_fields(fields("7 Games carol 230.0.0.7")).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::MissingField {
                command: "Room",
                field: "port"
            }
        );
    }

    #[test]
    fn test_parse_fields_bad_id() {
        let err = RoomInfo::parse_fields(fields("x Games carol 230.0.0.7 5007")).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidNumber { field: "id", .. }));
    }

    #[test]
    fn test_parse_fields_bad_address() {
        let err = RoomInfo::parse_fields(fields("1 Games carol 230.0.0 5001")).unwrap_err();
        assert_eq!(err, ProtocolError::InvalidAddress("230.0.0".to_string()));
    }

    #[test]
    fn test_parse_fields_trailing_garbage() {
        let err = RoomInfo::parse_fields(fields("1 Games carol 230.0.0.1 5001 extra")).unwrap_err();
        assert_eq!(err, ProtocolError::TooManyFields { command: "Room" });
    }

    #[test]
    fn test_validate_token() {
        assert!(validate_token("room name", "Lobby").is_ok());
        assert!(validate_token("room name", "").is_err());
        assert!(validate_token("room name", "My Room").is_err());
        assert!(validate_token("user", "tab\there").is_err());
    }
}
