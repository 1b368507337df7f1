//! Control channel wire protocol.
//!
//! One command or event per newline-terminated UTF-8 line, fields
//! separated by ASCII whitespace. Room names and user names are single
//! tokens and must not contain whitespace.

mod command;
mod event;
mod room;

use thiserror::Error;

pub use command::Command;
pub use event::Event;
pub use room::{validate_token, RoomInfo};

/// A control line that could not be parsed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The line contained no tokens.
    #[error("empty line")]
    Empty,

    /// A required field was missing.
    #[error("{command}: missing field `{field}`")]
    MissingField {
        command: &'static str,
        field: &'static str,
    },

    /// More fields than the command accepts.
    #[error("{command}: too many fields")]
    TooManyFields { command: &'static str },

    /// A numeric field did not parse.
    #[error("invalid number for `{field}`: {value}")]
    InvalidNumber { field: &'static str, value: String },

    /// A group address field did not parse as an IPv4 address.
    #[error("invalid group address: {0}")]
    InvalidAddress(String),
}

/// Cursor over the whitespace separated fields of one line.
pub(crate) struct Fields<'a> {
    command: &'static str,
    tokens: std::str::SplitAsciiWhitespace<'a>,
}

impl<'a> Fields<'a> {
    pub(crate) fn new(command: &'static str, tokens: std::str::SplitAsciiWhitespace<'a>) -> Self {
        Self { command, tokens }
    }

    /// Take the next required field.
    pub(crate) fn next(&mut self, field: &'static str) -> Result<&'a str, ProtocolError> {
        self.tokens.next().ok_or(ProtocolError::MissingField {
            command: self.command,
            field,
        })
    }

    /// Take the next field if there is one.
    pub(crate) fn optional(&mut self) -> Option<&'a str> {
        self.tokens.next()
    }

    /// Take the next required field and parse it as a number.
    pub(crate) fn number<T: std::str::FromStr>(
        &mut self,
        field: &'static str,
    ) -> Result<T, ProtocolError> {
        let value = self.next(field)?;
        value.parse().map_err(|_| ProtocolError::InvalidNumber {
            field,
            value: value.to_string(),
        })
    }

    /// Fail if any field is left over.
    pub(crate) fn finish(mut self) -> Result<(), ProtocolError> {
        match self.tokens.next() {
            Some(_) => Err(ProtocolError::TooManyFields {
                command: self.command,
            }),
            None => Ok(()),
        }
    }
}
