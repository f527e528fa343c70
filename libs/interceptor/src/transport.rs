//! # Capture and Injection Channels
//!
//! The pipeline only sees these traits. Implementations in this module:
//! - [`MemoryCapture`] / [`MemoryInjector`]: tokio mpsc backed, for tests and
//!   for embedding the pipeline behind another capture mechanism
//! - [`UdpRelay`]: one UDP socket that receives on `listen` and forwards
//!   every frame to `upstream`; one-directional
//!
//! Both traits take `&self` so a single channel can be shared by all
//! workers through an `Arc`.

use crate::config::TransportConfig;
use crate::error::{InterceptorError, InterceptorResult};
use async_trait::async_trait;
use bytes::Bytes;
use codec::MAX_FRAME_SIZE;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

const RECV_ERROR_BACKOFF: Duration = Duration::from_millis(10);

/// Source of captured frames
#[async_trait]
pub trait CaptureChannel: Send + Sync {
    /// Hook the channel into the capture point; failure prevents startup
    async fn install(&self) -> InterceptorResult<()> {
        Ok(())
    }

    /// Next captured frame, or `None` once the channel is closed
    async fn next_frame(&self) -> Option<Bytes>;
}

/// Sink that puts frames back on the wire
#[async_trait]
pub trait InjectionChannel: Send + Sync {
    /// Hook the channel into the injection point; failure prevents startup
    async fn install(&self) -> InterceptorResult<()> {
        Ok(())
    }

    async fn send(&self, frame: &[u8]) -> InterceptorResult<()>;
}

/// Capture channel fed through an mpsc sender
pub struct MemoryCapture {
    rx: Mutex<mpsc::Receiver<Bytes>>,
}

impl MemoryCapture {
    /// Capture channel plus the sender that feeds it
    ///
    /// Dropping every sender closes the channel.
    pub fn channel(buffer: usize) -> (mpsc::Sender<Bytes>, Self) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (tx, Self { rx: Mutex::new(rx) })
    }
}

#[async_trait]
impl CaptureChannel for MemoryCapture {
    async fn next_frame(&self) -> Option<Bytes> {
        self.rx.lock().await.recv().await
    }
}

/// Injection channel that hands frames to an mpsc receiver
pub struct MemoryInjector {
    tx: mpsc::UnboundedSender<Bytes>,
}

impl MemoryInjector {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Bytes>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl InjectionChannel for MemoryInjector {
    async fn send(&self, frame: &[u8]) -> InterceptorResult<()> {
        self.tx
            .send(Bytes::copy_from_slice(frame))
            .map_err(|_| InterceptorError::transport("injection receiver dropped"))
    }
}

/// UDP man-in-the-middle relay
///
/// Receives on `listen` and forwards to `upstream`. Datagrams larger than a
/// UDP payload are truncated by the socket and will fail header checks.
///
/// The relay is one-directional: datagrams arriving from `upstream` itself
/// are discarded, never captured, so replies cannot loop back upstream.
#[derive(Clone)]
pub struct UdpRelay {
    socket: Arc<UdpSocket>,
    upstream: SocketAddr,
}

impl UdpRelay {
    /// Bind the relay socket; `transport.upstream` is required
    pub async fn bind(config: &TransportConfig) -> InterceptorResult<Self> {
        let upstream = config.upstream.ok_or_else(|| {
            InterceptorError::config("transport.upstream is required for the UDP relay")
        })?;

        let socket = UdpSocket::bind(config.listen).await.map_err(|e| {
            InterceptorError::transport(format!(
                "Failed to bind UDP socket on {}: {}",
                config.listen, e
            ))
        })?;

        info!("UDP relay listening on {} → {}", config.listen, upstream);
        Ok(Self {
            socket: Arc::new(socket),
            upstream,
        })
    }

    pub fn local_addr(&self) -> InterceptorResult<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    pub fn upstream(&self) -> SocketAddr {
        self.upstream
    }
}

#[async_trait]
impl CaptureChannel for UdpRelay {
    async fn next_frame(&self) -> Option<Bytes> {
        let mut buf = vec![0u8; MAX_FRAME_SIZE];
        loop {
            match self.socket.recv_from(&mut buf).await {
                Ok((len, peer)) if peer == self.upstream => {
                    debug!(len, %peer, "Discarding datagram from upstream");
                }
                Ok((len, peer)) => {
                    debug!(len, %peer, "Captured datagram");
                    buf.truncate(len);
                    return Some(Bytes::from(buf));
                }
                Err(e) => {
                    // ICMP errors from earlier sends surface here on some
                    // platforms; the socket stays usable.
                    warn!("UDP receive error: {}", e);
                    tokio::time::sleep(RECV_ERROR_BACKOFF).await;
                }
            }
        }
    }
}

#[async_trait]
impl InjectionChannel for UdpRelay {
    async fn send(&self, frame: &[u8]) -> InterceptorResult<()> {
        let sent = self
            .socket
            .send_to(frame, self.upstream)
            .await
            .map_err(|e| {
                InterceptorError::transport(format!("UDP send to {} failed: {}", self.upstream, e))
            })?;
        if sent != frame.len() {
            return Err(InterceptorError::transport(format!(
                "short UDP send: {} of {} bytes",
                sent,
                frame.len()
            )));
        }
        Ok(())
    }
}
