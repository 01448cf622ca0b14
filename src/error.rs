use std::time::Duration;

use thiserror::Error;

/// Transport-level failure. Always fatal to the session it happened on.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("timed out after {timeout:?} connecting to {addr}")]
    ConnectTimeout { addr: String, timeout: Duration },

    #[error("connection closed by peer")]
    Closed,

    #[error("read failed: {0}")]
    Read(#[source] std::io::Error),

    #[error("nothing received for {0:?}")]
    ReadTimeout(Duration),

    #[error("write failed: {0}")]
    Write(#[source] std::io::Error),

    #[error("failed to encode outbound message: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("inbound frame exceeded {0} bytes")]
    FrameTooLarge(usize),

    /// Any operation on a session that has already failed.
    #[error("session is no longer connected")]
    Inert,
}

/// A single inbound payload could not be understood. Never tears down the session.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("payload is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error("payload has an empty chat id")]
    MissingChatId,
}
