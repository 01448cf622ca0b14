pub mod parser;

use std::fmt::{Debug, Formatter};

use serde::{Deserialize, Serialize};

/// Sender labels the bus core executes as commands instead of posting.
pub const CONTROL_SENDERS: [&str; 5] = ["<screenshot>", "<html>", "<restart>", "<refresh>", "<file>"];

/// How many characters of a message body end up in log lines.
const PREVIEW_CHARS: usize = 50;

/// The JSON object exchanged with the chat bus in both directions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub sender: String,
    pub content: String,
    pub chat_id: String,
}

/// One undecoded frame, byte for byte as it came off the wire.
#[derive(Clone, PartialEq, Eq)]
pub struct RawMessage {
    payload: Vec<u8>,
}

impl RawMessage {
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

/// A message on its way to the chat bus.
#[derive(Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub content: String,
    pub chat_id: String,
    /// Sender label shown by the bus. Written as `""` when unset.
    pub sender: Option<String>,
}

impl OutboundMessage {
    /// A reply addressed to `chat_id` with no sender override.
    pub fn reply(chat_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            chat_id: chat_id.into(),
            sender: None,
        }
    }

    pub fn with_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }

    pub fn to_envelope(&self) -> Envelope {
        Envelope {
            sender: self.sender.clone().unwrap_or_default(),
            content: self.content.clone(),
            chat_id: self.chat_id.clone(),
        }
    }
}

/// Whether the core would read `sender` as a command. Any `<...>` label is
/// reserved, not only the ones in [`CONTROL_SENDERS`].
pub fn is_control_sender(sender: &str) -> bool {
    let sender = sender.trim();
    sender.len() >= 2 && sender.starts_with('<') && sender.ends_with('>')
}

/// Shortens `text` for log output.
pub(crate) fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

impl Debug for RawMessage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Raw")
            .field("payload", &preview(&String::from_utf8_lossy(&self.payload)))
            .finish()
    }
}

impl Debug for OutboundMessage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Out")
            .field("msg", &preview(&self.content))
            .field("chat_id", &self.chat_id)
            .field("sender", &self.sender)
            .finish()
    }
}
