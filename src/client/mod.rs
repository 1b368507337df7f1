//! Client side of roomcast.
//!
//! - `agent`: control connection to the directory and request correlation
//! - `pending`: single-slot rendezvous used by the agent
//! - `view`: local room list
//! - `transport`: multicast chat membership
//! - `presenter`: display seam for background tasks
//! - `command`: terminal slash-command parser

mod agent;
mod command;
mod pending;
mod presenter;
mod transport;
mod view;

pub use agent::{AgentOptions, ControlAgent};
pub use command::{format_help, get_command_help, parse_input, ClientCommand, ClientInput, CommandInfo};
pub use pending::{PendingRequest, Resolution};
pub use presenter::{NullPresenter, Presenter};
pub use transport::{decode_datagram, ChatLine, ChatTransport};
pub use view::RoomListView;
