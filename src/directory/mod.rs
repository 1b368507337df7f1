//! Directory service.
//!
//! This module provides the server side of roomcast:
//! - The room registry with group address allocation
//! - One control session per connected client
//! - The live session set used for broadcast fan-out
//! - The TCP accept loop

mod listener;
mod registry;
mod session;
mod sessions;

pub use listener::{ConnectionPermit, DirectoryServer};
pub use registry::RoomRegistry;
pub use session::{serve_connection, ControlSession, SessionState, MAX_LINE_LENGTH};
pub use sessions::{SessionHandle, SessionRegistration, SessionSet};
