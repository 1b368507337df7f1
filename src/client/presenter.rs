//! Display surface seam.
//!
//! Background tasks (the control listener and the chat receiver) report
//! through a [`Presenter`]. Implementations are responsible for moving the
//! update onto whatever context their display requires.

use super::transport::ChatLine;
use crate::protocol::RoomInfo;

/// Receiver of everything the client wants to show.
pub trait Presenter: Send + Sync {
    /// The room list is about to be rebuilt.
    fn rooms_reset(&self) {}

    /// A room was added to the local room list.
    fn room_added(&self, room: &RoomInfo);

    /// A chat line arrived in the current room.
    fn chat_line(&self, line: &ChatLine);

    /// Something the user should know about (errors, lost connection).
    fn notice(&self, _text: &str) {}
}

/// Presenter that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPresenter;

impl Presenter for NullPresenter {
    fn room_added(&self, _room: &RoomInfo) {}

    fn chat_line(&self, _line: &ChatLine) {}
}
