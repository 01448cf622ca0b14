use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::ConnectionError;
use crate::message::{OutboundMessage, RawMessage};
use crate::transport::{Connector, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Connected,
    /// Terminal. Every operation fails with [`ConnectionError::Inert`].
    Failed,
}

/// One connection lifetime, from handshake to the first transport fault.
///
/// A session never repairs itself; the reconnect loop throws it away and
/// builds a new one.
pub struct Session {
    id: Uuid,
    state: SessionState,
    transport: Option<Box<dyn Transport>>,
    connected_at: DateTime<Utc>,
    received: u64,
    sent: u64,
}

impl Session {
    pub async fn connect(connector: &dyn Connector) -> Result<Self, ConnectionError> {
        let mut session = Self {
            id: Uuid::new_v4(),
            state: SessionState::Connecting,
            transport: None,
            connected_at: Utc::now(),
            received: 0,
            sent: 0,
        };
        debug!(
            "Session {} connecting to {}",
            session.id,
            connector.describe()
        );

        match connector.connect().await {
            Ok(transport) => {
                session.transport = Some(transport);
                session.state = SessionState::Connected;
                session.connected_at = Utc::now();
                info!("Session {} connected to {}", session.id, connector.describe());
                Ok(session)
            }
            Err(e) => {
                debug!("Session {} never connected: {}", session.id, e);
                Err(e)
            }
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Connected
    }

    /// Messages received / replies sent on this session.
    pub fn counts(&self) -> (u64, u64) {
        (self.received, self.sent)
    }

    pub fn uptime(&self) -> chrono::Duration {
        Utc::now() - self.connected_at
    }

    pub async fn receive(&mut self) -> Result<RawMessage, ConnectionError> {
        let result = self.live()?.recv().await;
        match result {
            Ok(raw) => {
                self.received += 1;
                Ok(raw)
            }
            Err(e) => {
                self.fail();
                Err(e)
            }
        }
    }

    pub async fn send(&mut self, msg: OutboundMessage) -> Result<(), ConnectionError> {
        let result = self.live()?.send(&msg).await;
        match result {
            Ok(()) => {
                self.sent += 1;
                Ok(())
            }
            Err(e) => {
                self.fail();
                Err(e)
            }
        }
    }

    fn live(&mut self) -> Result<&mut Box<dyn Transport>, ConnectionError> {
        match (self.state, self.transport.as_mut()) {
            (SessionState::Connected, Some(transport)) => Ok(transport),
            _ => Err(ConnectionError::Inert),
        }
    }

    /// Drops the transport, closing the underlying link.
    fn fail(&mut self) {
        self.state = SessionState::Failed;
        self.transport = None;
    }
}
