//! Error types for roomcast.

use thiserror::Error;

/// Common error type for roomcast.
#[derive(Error, Debug)]
pub enum RoomcastError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The control or chat channel could not be established or was lost.
    #[error("connection failure: {0}")]
    ConnectionFailure(String),

    /// Room id, group address or port space is used up.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// The directory answered a request with an error event.
    #[error("rejected by directory: {0}")]
    Rejected(String),

    /// A request of the same kind is already waiting for its reply.
    #[error("a {0} request is already in flight")]
    RequestInFlight(&'static str),

    /// A pending request was not answered in time.
    #[error("timed out waiting for {0}")]
    Timeout(String),

    /// Validation error for user input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for roomcast operations.
pub type Result<T> = std::result::Result<T, RoomcastError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_failure_display() {
        let err = RoomcastError::ConnectionFailure("server closed the connection".to_string());
        assert_eq!(
            err.to_string(),
            "connection failure: server closed the connection"
        );
    }

    #[test]
    fn test_rejected_display() {
        let err = RoomcastError::Rejected("room addresses exhausted".to_string());
        assert_eq!(
            err.to_string(),
            "rejected by directory: room addresses exhausted"
        );
    }

    #[test]
    fn test_request_in_flight_display() {
        let err = RoomcastError::RequestInFlight("room creation");
        assert_eq!(err.to_string(), "a room creation request is already in flight");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
        let err: RoomcastError = io_err.into();
        assert!(matches!(err, RoomcastError::Io(_)));
        assert!(err.to_string().contains("reset by peer"));
    }

    #[test]
    fn test_result_alias() {
        fn sample_ok() -> Result<u32> {
            Ok(7)
        }

        fn sample_err() -> Result<u32> {
            Err(RoomcastError::Validation("bad name".to_string()))
        }

        assert_eq!(sample_ok().unwrap(), 7);
        assert!(sample_err().is_err());
    }
}
