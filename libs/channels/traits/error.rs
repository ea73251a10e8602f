use thiserror::Error;

/// Main error type for the channel manager and its transports
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// WebSocket connection error
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Connection closed unexpectedly
    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    /// No transport handle could be acquired
    #[error("Transport unavailable: {0}")]
    TransportUnavailable(String),

    /// Channel subscription could not be sent
    #[error("Subscription to '{channel}' failed: {reason}")]
    Subscription { channel: String, reason: String },

    /// Message parsing error
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Timeout error
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// The manager was destroyed via `disconnect()`
    #[error("Channel manager destroyed")]
    Destroyed,

    /// A newer connect attempt replaced this one while it was in flight
    #[error("Connect attempt superseded by a newer one")]
    Superseded,
}

/// Result type for channel operations
pub type Result<T> = std::result::Result<T, ChannelError>;
