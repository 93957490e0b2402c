//! Error types and wire limit constants.

use thiserror::Error;

/// Maximum transactions per `sendtxbatch` request.
pub const MAX_TX_BATCH_SIZE: usize = 50;

/// The error type for every fallible operation in this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// `connect` was called on a live connection.
    #[error("already connected")]
    AlreadyConnected,

    /// The operation needs an established connection.
    #[error("not connected")]
    NotConnected,

    /// The server greeting did not arrive in time.
    #[error("connection timed out waiting for server greeting")]
    ConnectionTimeout,

    /// The operation was abandoned before it completed.
    #[error("operation cancelled")]
    Cancelled,

    /// The connection closed cleanly.
    #[error("transport closed")]
    TransportClosed,

    /// The underlying WebSocket transport failed.
    #[error("transport I/O error: {0}")]
    TransportIo(Box<tokio_tungstenite::tungstenite::Error>),

    /// An active subscription already holds this channel key.
    #[error("already subscribed to {0}")]
    AlreadySubscribed(String),

    /// No subscription holds this channel key.
    #[error("not subscribed to {0}")]
    NotSubscribed(String),

    /// A private channel was subscribed without an auth token.
    #[error("auth token required for private channel {0}")]
    AuthTokenRequired(String),

    /// The server did not confirm the subscription in time.
    #[error("subscription confirmation timed out for {0}")]
    SubscriptionTimeout(String),

    /// The server rejected the subscription.
    #[error("subscription failed ({code}): {message}")]
    SubscriptionFailed {
        /// Numeric server error code.
        code: i64,
        /// Server error message.
        message: String,
    },

    /// No order book is tracked for the market.
    #[error("no order book tracked for market {0}")]
    OrderBookNotFound(i16),

    /// A delta arrived out of sequence (messages were missed).
    #[error("sequence gap: expected {expected}, got {got}")]
    SequenceGap {
        /// The sequence the book expected next.
        expected: i64,
        /// The sequence the delta carried.
        got: i64,
    },

    /// A channel path could not be parsed.
    #[error("malformed channel: {0}")]
    ChannelFormat(String),

    /// A payload failed to encode or decode.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A transaction batch exceeded [`MAX_TX_BATCH_SIZE`].
    #[error("batch size {0} exceeds maximum of {MAX_TX_BATCH_SIZE}")]
    BatchTooLarge(usize),

    /// Reconnection gave up after the configured attempt limit.
    #[error("exceeded {0} reconnect attempts")]
    MaxReconnectAttemptsExceeded(u32),

    /// The configured endpoint URL is not a valid URL.
    #[error("invalid endpoint URL: {0}")]
    InvalidUrl(String),
}

/// Result type alias using the crate's [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;
        match err {
            WsError::ConnectionClosed | WsError::AlreadyClosed => Error::TransportClosed,
            other => Error::TransportIo(Box::new(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_gap_display_names_both_sequences() {
        let err = Error::SequenceGap {
            expected: 101,
            got: 103,
        };
        let text = err.to_string();
        assert!(text.contains("101"));
        assert!(text.contains("103"));
    }

    #[test]
    fn batch_too_large_display_names_limit() {
        let err = Error::BatchTooLarge(51);
        assert!(err.to_string().contains("51"));
        assert!(err.to_string().contains("50"));
    }

    #[test]
    fn closed_transport_errors_collapse() {
        use tokio_tungstenite::tungstenite::Error as WsError;
        assert!(matches!(
            Error::from(WsError::ConnectionClosed),
            Error::TransportClosed
        ));
        assert!(matches!(
            Error::from(WsError::AlreadyClosed),
            Error::TransportClosed
        ));
    }
}
