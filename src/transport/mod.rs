pub mod codec;
#[cfg(test)]
pub mod mock;
pub mod tcp;

use async_trait::async_trait;

use crate::error::ConnectionError;
use crate::message::{OutboundMessage, RawMessage};

/// Opens connections to the chat bus.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Performs the handshake and returns a live link.
    async fn connect(&self) -> Result<Box<dyn Transport>, ConnectionError>;

    /// Where this connector points, for log lines.
    fn describe(&self) -> String;
}

/// One open link to the chat bus.
///
/// Implementations surface every fault as a [`ConnectionError`] and never try
/// to recover on their own.
#[async_trait]
pub trait Transport: Send {
    /// Waits for the next inbound frame.
    async fn recv(&mut self) -> Result<RawMessage, ConnectionError>;

    /// Writes one message. Returns once the write has gone through.
    async fn send(&mut self, msg: &OutboundMessage) -> Result<(), ConnectionError>;
}
