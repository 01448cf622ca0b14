//! Scripted in-memory transport for session and loop tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::time::Instant;

use super::{Connector, Transport};
use crate::error::ConnectionError;
use crate::message::{Envelope, OutboundMessage, RawMessage};

/// What a scripted session does on each `recv`.
#[derive(Debug, Clone)]
pub enum Step {
    Deliver(RawMessage),
    Fail,
}

/// What the connector does on each `connect`.
#[derive(Debug, Clone)]
pub enum Plan {
    Refuse,
    Session { steps: Vec<Step>, fail_send: bool },
}

impl Plan {
    pub fn session(steps: Vec<Step>) -> Self {
        Plan::Session {
            steps,
            fail_send: false,
        }
    }

    pub fn failing_send(steps: Vec<Step>) -> Self {
        Plan::Session {
            steps,
            fail_send: true,
        }
    }
}

pub fn frame(sender: &str, content: &str, chat_id: &str) -> RawMessage {
    let envelope = Envelope {
        sender: sender.to_string(),
        content: content.to_string(),
        chat_id: chat_id.to_string(),
    };
    RawMessage::new(serde_json::to_string(&envelope).unwrap())
}

/// Everything the mock observed.
#[derive(Debug, Default)]
pub struct MockLog {
    pub connects: Mutex<Vec<Instant>>,
    /// (connection index, message)
    pub sent: Mutex<Vec<(usize, OutboundMessage)>>,
}

impl MockLog {
    pub fn connect_count(&self) -> usize {
        self.connects.lock().unwrap().len()
    }

    pub fn sent(&self) -> Vec<(usize, OutboundMessage)> {
        self.sent.lock().unwrap().clone()
    }
}

/// Hands out one scripted transport per plan; hangs once the script runs out.
pub struct MockConnector {
    plans: Mutex<VecDeque<Plan>>,
    pub log: Arc<MockLog>,
}

impl MockConnector {
    pub fn new(plans: Vec<Plan>) -> Self {
        Self {
            plans: Mutex::new(plans.into()),
            log: Arc::new(MockLog::default()),
        }
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self) -> Result<Box<dyn Transport>, ConnectionError> {
        let index = {
            let mut connects = self.log.connects.lock().unwrap();
            connects.push(Instant::now());
            connects.len() - 1
        };
        let plan = self.plans.lock().unwrap().pop_front();
        match plan {
            Some(Plan::Refuse) => Err(ConnectionError::Connect {
                addr: "mock".to_string(),
                source: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
            }),
            Some(Plan::Session { steps, fail_send }) => Ok(Box::new(MockTransport {
                index,
                steps: steps.into(),
                fail_send,
                log: self.log.clone(),
            })),
            None => std::future::pending().await,
        }
    }

    fn describe(&self) -> String {
        "mock".to_string()
    }
}

pub struct MockTransport {
    index: usize,
    steps: VecDeque<Step>,
    fail_send: bool,
    log: Arc<MockLog>,
}

#[async_trait]
impl Transport for MockTransport {
    async fn recv(&mut self) -> Result<RawMessage, ConnectionError> {
        match self.steps.pop_front() {
            Some(Step::Deliver(raw)) => Ok(raw),
            Some(Step::Fail) => Err(ConnectionError::Closed),
            None => std::future::pending().await,
        }
    }

    async fn send(&mut self, msg: &OutboundMessage) -> Result<(), ConnectionError> {
        if self.fail_send {
            return Err(ConnectionError::Write(std::io::Error::from(
                std::io::ErrorKind::BrokenPipe,
            )));
        }
        self.log.sent.lock().unwrap().push((self.index, msg.clone()));
        Ok(())
    }
}
