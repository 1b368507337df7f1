//! roomcast - room directory and multicast chat
//!
//! A directory server hands out chat rooms, each backed by its own IPv4
//! multicast group, over a line-oriented TCP control protocol. Clients list
//! and create rooms through the directory and then talk to each other
//! directly over the room's group.

pub mod client;
pub mod config;
pub mod directory;
pub mod error;
pub mod logging;
pub mod protocol;

pub use client::{
    AgentOptions, ChatLine, ChatTransport, ControlAgent, NullPresenter, PendingRequest, Presenter,
    Resolution, RoomListView,
};
pub use config::Config;
pub use directory::{DirectoryServer, RoomRegistry, SessionSet};
pub use error::{Result, RoomcastError};
pub use protocol::{Command, Event, ProtocolError, RoomInfo};
