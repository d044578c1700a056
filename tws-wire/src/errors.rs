//! Error types for the tws-wire library.

use thiserror::Error;

/// Top-level error type for the TWS socket client.
#[derive(Debug, Error)]
pub enum IBApiError {
    /// TCP connection failure or handshake I/O failure.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A request could not be encoded (e.g. a text field with an interior NUL).
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// An inbound field could not be parsed.
    #[error("Decoding error: {0}")]
    Decoding(String),

    /// The inbound buffer ends in the middle of a message.
    ///
    /// Internal signal used by the dispatcher to wait for more bytes; it never
    /// reaches the event channel.
    #[error("incomplete message")]
    Incomplete,

    /// Protocol-level error (bad handshake reply, etc.).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The negotiated server version is below what a feature needs.
    #[error("Upgrade required: server version {server_version} < {required} ({feature})")]
    UpgradeRequired {
        feature: &'static str,
        required: i32,
        server_version: i32,
    },

    /// Request issued while no session is established.
    #[error("Not connected")]
    NotConnected,

    /// `connect` called on a live session.
    #[error("Already connected")]
    AlreadyConnected,

    /// The server sent a message tag this client does not know.
    #[error("Unknown message id {0}")]
    UnknownMessage(i32),

    /// Connection was closed, by the peer or by a transport fault.
    #[error("Disconnected: {0}")]
    Disconnected(String),

    /// I/O error from the underlying transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type for this library.
pub type Result<T> = std::result::Result<T, IBApiError>;
