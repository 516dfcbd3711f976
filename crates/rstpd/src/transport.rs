//! Frame transmission towards the switch.
//!
//! The engine never waits on the wire: its transmit hands frames to a
//! bounded channel and the sender task spawned here moves them to the
//! [`FrameTransport`], retrying a busy transport a bounded number of
//! times.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Reasons a transport refuses a frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    /// Transmit ring is full; the frame may be retried.
    #[error("Transport busy")]
    Busy,

    #[error("Link down on port {0}")]
    LinkDown(usize),

    #[error("Send failed: {0}")]
    Failed(String),
}

/// Sends complete frames out of switch ports.
#[async_trait]
pub trait FrameTransport: Send + Sync {
    async fn send(&self, port: usize, frame: &[u8]) -> Result<(), SendError>;
}

/// A frame built by the engine, waiting for the sender task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundFrame {
    pub port: usize,
    pub frame: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Wait between attempts on a busy transport.
    pub interval: Duration,
    /// Attempts per frame, the first included.
    pub attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(50),
            attempts: 3,
        }
    }
}

/// Sends one frame, retrying while the transport is busy. Returns the
/// number of attempts used.
pub async fn send_with_retry(
    transport: &dyn FrameTransport,
    frame: &OutboundFrame,
    policy: RetryPolicy,
) -> Result<u32, SendError> {
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        match transport.send(frame.port, &frame.frame).await {
            Ok(()) => return Ok(attempt),
            Err(SendError::Busy) if attempt < attempts => {
                trace!(port = frame.port, attempt, "transport busy, retrying");
                tokio::time::sleep(policy.interval).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Spawns the task draining `rx` into `transport` until the channel
/// closes or `cancel` fires. Failed frames are logged and dropped; the
/// protocol's periodic transmit covers for them.
pub fn spawn_sender(
    mut rx: mpsc::Receiver<OutboundFrame>,
    transport: Arc<dyn FrameTransport>,
    policy: RetryPolicy,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let frame = tokio::select! {
                _ = cancel.cancelled() => break,
                frame = rx.recv() => match frame {
                    Some(frame) => frame,
                    None => break,
                },
            };
            if let Err(e) = send_with_retry(transport.as_ref(), &frame, policy).await {
                warn!(port = frame.port, error = %e, "dropping bpdu");
            }
        }
        debug!("sender task stopped");
    })
}

/// Transport that only logs what it would send.
#[derive(Debug, Default)]
pub struct LoggingTransport;

#[async_trait]
impl FrameTransport for LoggingTransport {
    async fn send(&self, port: usize, frame: &[u8]) -> Result<(), SendError> {
        debug!(port, len = frame.len(), "send bpdu");
        Ok(())
    }
}
