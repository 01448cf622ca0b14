//! The long-running driver: connect, pump messages, and on any transport fault
//! throw the session away and try again after a fixed delay.
//!
//! The delay is constant: no jitter, no growth, no retry limit.

use std::any::Any;
use std::convert::Infallible;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::error::ConnectionError;
use crate::message::parser::{parse, ParserConfig};
use crate::message::{OutboundMessage, RawMessage};
use crate::responder::Responder;
use crate::session::Session;
use crate::transport::Connector;

pub struct ReconnectLoop {
    connector: Box<dyn Connector>,
    parser: ParserConfig,
    responder: Box<dyn Responder>,
    backoff: Duration,
    reply_sender: Option<String>,
}

impl ReconnectLoop {
    pub fn new(
        connector: Box<dyn Connector>,
        parser: ParserConfig,
        responder: Box<dyn Responder>,
        backoff: Duration,
    ) -> Self {
        Self {
            connector,
            parser,
            responder,
            backoff,
            reply_sender: None,
        }
    }

    /// Sender label attached to every reply. Unset replies go out with an
    /// empty sender.
    pub fn with_reply_sender(mut self, sender: Option<String>) -> Self {
        self.reply_sender = sender;
        self
    }

    /// Runs forever. At most one session is alive at a time: the previous one
    /// is dropped before the delay, and the next is only opened after it.
    pub async fn run(&self) -> Infallible {
        loop {
            match Session::connect(self.connector.as_ref()).await {
                Ok(mut session) => {
                    let reason = self.drive(&mut session).await;
                    debug!("Session {} is now {:?}", session.id(), session.state());
                    let (received, sent) = session.counts();
                    warn!(
                        "Disconnected from chat bus (session {}, {} received, {} sent, up {}s): {}",
                        session.id(),
                        received,
                        sent,
                        session.uptime().num_seconds(),
                        reason
                    );
                }
                Err(e) => {
                    error!(
                        "Unable to connect to {}: {}",
                        self.connector.describe(),
                        e
                    );
                }
            }

            info!("Reconnecting in {}s", self.backoff.as_secs());
            tokio::time::sleep(self.backoff).await;
        }
    }

    /// Receive, parse, respond, send, strictly in that order, until the
    /// session fails. Returns the fault that ended it.
    async fn drive(&self, session: &mut Session) -> ConnectionError {
        while session.is_connected() {
            let raw = match session.receive().await {
                Ok(raw) => raw,
                Err(e) => return e,
            };
            debug!("Received {:?}", raw);

            let Some(reply) = self.handle(&raw) else {
                continue;
            };
            if let Err(e) = session.send(reply).await {
                return e;
            }
        }
        ConnectionError::Inert
    }

    /// Turns one inbound frame into at most one reply. Parse failures and
    /// responder panics are logged here and never reach the session.
    pub fn handle(&self, raw: &RawMessage) -> Option<OutboundMessage> {
        let msg = match parse(raw, &self.parser) {
            Ok(msg) => msg,
            Err(e) => {
                warn!("Failed to parse msg {:?}: {}", raw, e);
                return None;
            }
        };
        info!("in {}: {:?}", msg.chat_id, msg);
        debug!("Normalized to {} tokens: {:?}", msg.tokens().len(), msg.text());

        let reply = match catch_unwind(AssertUnwindSafe(|| self.responder.process(&msg))) {
            Ok(reply) => reply,
            Err(panic) => {
                error!(
                    "Responder failed on message in {}: {}",
                    msg.chat_id,
                    panic_message(panic.as_ref())
                );
                return None;
            }
        };

        let reply = reply.filter(|r| !r.is_empty())?;
        let mut out = OutboundMessage::reply(msg.chat_id, reply);
        if let Some(sender) = &self.reply_sender {
            out = out.with_sender(sender.clone());
        }
        info!("Sending message: {:?}", out);
        Some(out)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
