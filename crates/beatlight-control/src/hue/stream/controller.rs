//! Streaming (UDP) transport controller

use super::protocol::{self, MAX_PAYLOAD_SIZE};
use crate::hue::models::{EffectFrame, FastEffectConfig};
use crate::hue::router::FastEffectSink;
use crate::{ControlError, Result};
use parking_lot::Mutex;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use tracing::{debug, error, info, warn};

/// Snapshot of the transport counters (cumulative over all sessions)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TransportStats {
    pub frames_sent: u64,
    pub packets_sent: u64,
    pub packets_failed: u64,
}

impl TransportStats {
    /// Failed packets as a percentage of attempted packets (0 when idle)
    pub fn packet_loss_pct(&self) -> f64 {
        let total = self.packets_sent + self.packets_failed;
        if total == 0 {
            return 0.0;
        }
        self.packets_failed as f64 * 100.0 / total as f64
    }
}

struct Session {
    socket: UdpSocket,
    target: SocketAddr,
}

/// Sends effect frames as sequence-numbered UDP packets.
///
/// All methods take `&self`; the session lock serializes sends so that the
/// sequence order is the order packets leave the socket.
pub struct FastEffectController {
    config: FastEffectConfig,
    session: Mutex<Option<Session>>,
    sequence: AtomicU32,
    frames_sent: AtomicU64,
    packets_sent: AtomicU64,
    packets_failed: AtomicU64,
}

impl FastEffectController {
    pub fn new(config: FastEffectConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            session: Mutex::new(None),
            sequence: AtomicU32::new(0),
            frames_sent: AtomicU64::new(0),
            packets_sent: AtomicU64::new(0),
            packets_failed: AtomicU64::new(0),
        })
    }

    /// Bind a socket and resolve the target. The sequence restarts at 0.
    ///
    /// Calling this while a session is active does nothing.
    pub fn start_session(&self) -> Result<()> {
        let mut session = self.session.lock();
        if session.is_some() {
            warn!("Session already active, ignoring start_session");
            return Ok(());
        }

        let target_str = self.config.target();
        let target = target_str
            .to_socket_addrs()
            .map_err(|e| ControlError::InvalidAddress(format!("{}: {}", target_str, e)))?
            .next()
            .ok_or_else(|| ControlError::InvalidAddress(target_str.clone()))?;

        let bind_addr = if target.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(bind_addr).map_err(|e| {
            error!("Failed to create UDP socket: {}", e);
            e
        })?;

        self.sequence.store(0, Ordering::SeqCst);
        *session = Some(Session { socket, target });
        info!("Started UDP session to {} ({})", target_str, target);
        Ok(())
    }

    /// Encode and transmit one frame, returning the sequence number it
    /// carried. Empty frames are skipped and yield `Ok(None)`.
    ///
    /// Send failures are counted and returned, never retried.
    pub fn try_send_frame(&self, frame: &EffectFrame) -> Result<Option<u32>> {
        let guard = self.session.lock();
        let session = guard.as_ref().ok_or(ControlError::SessionInactive)?;
        if frame.is_empty() {
            return Ok(None);
        }

        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        let packet = protocol::encode_frame(frame, sequence);
        if packet.len() > MAX_PAYLOAD_SIZE {
            warn!(
                "Payload size {} exceeds maximum {}, sending anyway",
                packet.len(),
                MAX_PAYLOAD_SIZE
            );
        }

        if let Err(e) = session.socket.send_to(&packet, session.target) {
            self.packets_failed.fetch_add(1, Ordering::Relaxed);
            return Err(e.into());
        }
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
        self.packets_sent.fetch_add(1, Ordering::Relaxed);
        Ok(Some(sequence))
    }

    /// Fire-and-forget variant of [`try_send_frame`](Self::try_send_frame)
    /// that logs instead of returning errors.
    pub fn send_frame(&self, frame: &EffectFrame) {
        match self.try_send_frame(frame) {
            Ok(Some(sequence)) => debug!(
                "Sent frame with sequence {} containing {} updates",
                sequence,
                frame.len()
            ),
            Ok(None) => debug!("Empty frame, skipping"),
            Err(ControlError::SessionInactive) => warn!("Session not active, cannot send frame"),
            Err(e) => error!("Failed to send UDP packet: {}", e),
        }
    }

    /// Close the socket. Does nothing when no session is active.
    pub fn stop_session(&self) {
        if self.session.lock().take().is_none() {
            debug!("Session not active, ignoring stop_session");
            return;
        }
        let stats = self.stats();
        info!(
            "Stopped UDP session. Frames sent: {}, packets sent: {}, packets failed: {}",
            stats.frames_sent, stats.packets_sent, stats.packets_failed
        );
    }

    pub fn is_session_active(&self) -> bool {
        self.session.lock().is_some()
    }

    /// Sequence number the next packet will carry
    pub fn current_sequence(&self) -> u32 {
        self.sequence.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> TransportStats {
        TransportStats {
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            packets_sent: self.packets_sent.load(Ordering::Relaxed),
            packets_failed: self.packets_failed.load(Ordering::Relaxed),
        }
    }

    pub fn packet_loss_pct(&self) -> f64 {
        self.stats().packet_loss_pct()
    }

    pub fn config(&self) -> &FastEffectConfig {
        &self.config
    }
}

impl FastEffectSink for FastEffectController {
    fn send_frame(&self, frame: &EffectFrame) {
        FastEffectController::send_frame(self, frame);
    }
}

impl Drop for FastEffectController {
    fn drop(&mut self) {
        self.stop_session();
    }
}
