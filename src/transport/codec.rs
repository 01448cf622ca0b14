//! Framing for the chat bus stream.
//!
//! The bus writes JSON objects back to back with no delimiter, and TCP is free
//! to coalesce or split them. Frames are recovered by tracking brace depth
//! outside of string literals.

use tracing::debug;

use crate::error::ConnectionError;
use crate::message::OutboundMessage;

/// Incremental splitter for a stream of concatenated JSON objects.
pub struct FrameDecoder {
    buf: Vec<u8>,
    max_frame_bytes: usize,
    // Scan state for the frame at the front of `buf`.
    pos: usize,
    depth: usize,
    in_string: bool,
    escaped: bool,
}

impl FrameDecoder {
    pub fn new(max_frame_bytes: usize) -> Self {
        Self {
            buf: Vec::new(),
            max_frame_bytes,
            pos: 0,
            depth: 0,
            in_string: false,
            escaped: false,
        }
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Bytes received but not yet returned as a frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Pops the next complete frame, if the buffer holds one. Bytes are
    /// returned untouched; decoding is the parser's job.
    pub fn next_frame(&mut self) -> Result<Option<Vec<u8>>, ConnectionError> {
        if self.depth == 0 {
            self.skip_to_object();
        }

        while self.pos < self.buf.len() {
            let byte = self.buf[self.pos];
            self.pos += 1;

            if self.in_string {
                if self.escaped {
                    self.escaped = false;
                } else if byte == b'\\' {
                    self.escaped = true;
                } else if byte == b'"' {
                    self.in_string = false;
                }
                continue;
            }

            match byte {
                b'"' => self.in_string = true,
                b'{' => self.depth += 1,
                b'}' => {
                    self.depth -= 1;
                    if self.depth == 0 {
                        let frame: Vec<u8> = self.buf.drain(..self.pos).collect();
                        self.pos = 0;
                        if frame.len() > self.max_frame_bytes {
                            return Err(ConnectionError::FrameTooLarge(self.max_frame_bytes));
                        }
                        return Ok(Some(frame));
                    }
                }
                _ => {}
            }
        }

        if self.buf.len() > self.max_frame_bytes {
            return Err(ConnectionError::FrameTooLarge(self.max_frame_bytes));
        }
        Ok(None)
    }

    /// Drops anything in front of the next `{`.
    fn skip_to_object(&mut self) {
        let start = self
            .buf
            .iter()
            .position(|b| *b == b'{')
            .unwrap_or(self.buf.len());
        if start == 0 {
            return;
        }
        let skipped: Vec<u8> = self.buf.drain(..start).collect();
        if skipped.iter().any(|b| !b.is_ascii_whitespace()) {
            debug!(
                "Skipped {} bytes between frames: {:?}",
                skipped.len(),
                String::from_utf8_lossy(&skipped)
            );
        }
        self.pos = 0;
        self.in_string = false;
        self.escaped = false;
    }
}

/// Serializes an outbound message into the bytes written to the bus.
pub fn encode(msg: &OutboundMessage) -> Result<Vec<u8>, ConnectionError> {
    serde_json::to_vec(&msg.to_envelope()).map_err(ConnectionError::Encode)
}
