use std::time::Duration;

use async_trait::async_trait;
use socket2::{SockRef, TcpKeepalive};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use super::codec::{encode, FrameDecoder};
use super::{Connector, Transport};
use crate::config::BusConfig;
use crate::error::ConnectionError;
use crate::message::{OutboundMessage, RawMessage};

const READ_CHUNK: usize = 4096;
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(10);

/// Connects to the chat bus over plain TCP.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    addr: String,
    connect_timeout: Duration,
    read_timeout: Option<Duration>,
    keepalive: Duration,
    max_frame_bytes: usize,
}

impl TcpConnector {
    pub fn new(addr: impl Into<String>) -> Self {
        let defaults = BusConfig::default();
        Self {
            addr: addr.into(),
            connect_timeout: defaults.connect_timeout(),
            read_timeout: defaults.read_timeout(),
            keepalive: defaults.keepalive(),
            max_frame_bytes: defaults.max_frame_bytes,
        }
    }

    pub fn from_config(config: &BusConfig) -> Self {
        Self::new(config.address())
            .with_connect_timeout(config.connect_timeout())
            .with_read_timeout(config.read_timeout())
            .with_keepalive(config.keepalive())
            .with_max_frame_bytes(config.max_frame_bytes)
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_keepalive(mut self, idle: Duration) -> Self {
        self.keepalive = idle;
        self
    }

    pub fn with_max_frame_bytes(mut self, max: usize) -> Self {
        self.max_frame_bytes = max;
        self
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self) -> Result<Box<dyn Transport>, ConnectionError> {
        let stream = match tokio::time::timeout(
            self.connect_timeout,
            TcpStream::connect(&self.addr),
        )
        .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                return Err(ConnectionError::Connect {
                    addr: self.addr.clone(),
                    source,
                })
            }
            Err(_) => {
                return Err(ConnectionError::ConnectTimeout {
                    addr: self.addr.clone(),
                    timeout: self.connect_timeout,
                })
            }
        };

        // Replies are small and latency matters more than packet count.
        if let Err(e) = stream.set_nodelay(true) {
            warn!("Unable to disable Nagle on {}: {}", self.addr, e);
        }
        if let Err(e) = enable_keepalive(&stream, self.keepalive) {
            warn!("Unable to enable TCP keepalive on {}: {}", self.addr, e);
        }

        match stream.peer_addr() {
            Ok(peer) => info!("TCP connection established to {}", peer),
            Err(_) => info!("TCP connection established to {}", self.addr),
        }

        Ok(Box::new(TcpTransport {
            stream,
            decoder: FrameDecoder::new(self.max_frame_bytes),
            read_timeout: self.read_timeout,
            chunk: vec![0; READ_CHUNK],
        }))
    }

    fn describe(&self) -> String {
        format!("tcp://{}", self.addr)
    }
}

/// Lets the kernel notice a peer that disappeared without a FIN or RST, so a
/// blocked read fails instead of waiting forever.
fn enable_keepalive(stream: &TcpStream, idle: Duration) -> std::io::Result<()> {
    let keepalive = TcpKeepalive::new()
        .with_time(idle)
        .with_interval(KEEPALIVE_INTERVAL);
    SockRef::from(stream).set_tcp_keepalive(&keepalive)
}

/// A live TCP link. Buffered bytes die with it.
pub struct TcpTransport {
    stream: TcpStream,
    decoder: FrameDecoder,
    read_timeout: Option<Duration>,
    chunk: Vec<u8>,
}

impl TcpTransport {
    async fn read_chunk(&mut self) -> Result<usize, ConnectionError> {
        let read = self.stream.read(&mut self.chunk);
        let n = match self.read_timeout {
            Some(timeout) => tokio::time::timeout(timeout, read)
                .await
                .map_err(|_| ConnectionError::ReadTimeout(timeout))?,
            None => read.await,
        }
        .map_err(ConnectionError::Read)?;

        if n == 0 {
            return Err(ConnectionError::Closed);
        }
        Ok(n)
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn recv(&mut self) -> Result<RawMessage, ConnectionError> {
        loop {
            if let Some(frame) = self.decoder.next_frame()? {
                debug!(
                    "Inbound frame ({} bytes, {} still buffered)",
                    frame.len(),
                    self.decoder.buffered()
                );
                return Ok(RawMessage::new(frame));
            }
            let n = self.read_chunk().await?;
            self.decoder.extend(&self.chunk[..n]);
        }
    }

    async fn send(&mut self, msg: &OutboundMessage) -> Result<(), ConnectionError> {
        let bytes = encode(msg)?;
        self.stream
            .write_all(&bytes)
            .await
            .map_err(ConnectionError::Write)?;
        self.stream.flush().await.map_err(ConnectionError::Write)?;
        Ok(())
    }
}
