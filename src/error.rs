//! Error types for tracewire.

use thiserror::Error;

/// Main error type for all tracewire operations.
#[derive(Debug, Error)]
pub enum TracewireError {
    /// I/O error during socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error (configuration only).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// MsgPack serialization error.
    #[error("MsgPack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    /// MsgPack deserialization error.
    #[error("MsgPack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),

    /// Protocol error (bad frame length, truncated payload, etc.).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The peer sent a command code this protocol does not define.
    #[error("Unknown command code: {0}")]
    UnknownCommand(u8),

    /// The peer sent a valid command that is not a request.
    #[error("Unexpected command code {0} received as a request")]
    UnexpectedCommand(u8),

    /// A provider update block could not be walked record by record.
    #[error("Malformed provider update block: {0}")]
    MalformedUpdate(String),

    /// The peer closed the connection.
    #[error("End of stream")]
    EndOfStream,

    /// Transport failure that is not an I/O error.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Configuration rejected by validation.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// No free event chunk is available.
    #[error("Event chunk pool exhausted")]
    PoolExhausted,

    /// The event server already has an active session.
    #[error("Session limit reached")]
    SessionLimit,

    /// A provider with this id is already registered.
    #[error("Provider {0} already registered")]
    DuplicateProvider(u32),
}

impl TracewireError {
    /// Whether the session that produced this error should be torn down.
    ///
    /// Protocol violations reject the offending message only; stream
    /// termination and transport failures end the connection.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            TracewireError::Protocol(_)
                | TracewireError::UnknownCommand(_)
                | TracewireError::UnexpectedCommand(_)
                | TracewireError::MalformedUpdate(_)
                | TracewireError::PoolExhausted
        )
    }
}

/// Result type alias using TracewireError.
pub type Result<T> = std::result::Result<T, TracewireError>;
