//! Frame streaming engine.
//!
//! Orchestrates the full update pipeline:
//!
//! 1. [`HybridCodec`] picks the cheapest encoding for the frame.
//! 2. [`Packet`] constructors frame the payload.
//! 3. The [`SinkRegistry`] snapshot receives the broadcast.
//! 4. For tiled updates, the [`ReadyGate`] paces transmission: after
//!    each band the streamer clears the gate and waits for the
//!    client's readiness signal, bounded by a timeout.
//!
//! A readiness timeout is not fatal — the streamer logs a warning and
//! advances, accepting that the client may still be rendering the
//! previous band. Per-sink send failures are equally isolated: they
//! are counted and logged, and the broadcast continues to the other
//! sinks.

use std::sync::Arc;
use std::time::Duration;

use futures::future;
use tracing::{debug, warn};

use crate::codec::{Encoding, HybridCodec, rle};
use crate::error::CastError;
use crate::gate::ReadyGate;
use crate::geometry::DisplayGeometry;
use crate::protocol::{DisplayCommand, Packet};
use crate::registry::SinkRegistry;

// ── StreamerConfig ───────────────────────────────────────────────

/// Configuration for [`FrameStreamer`].
#[derive(Debug, Clone, Copy)]
pub struct StreamerConfig {
    /// Dimensions and tile partition of the target display.
    pub geometry: DisplayGeometry,
    /// How long to wait for a readiness signal after each tile.
    pub ready_timeout: Duration,
}

impl StreamerConfig {
    /// Default pacing: 30 seconds per tile, matching the slowest
    /// full-refresh e-paper panels.
    pub fn new(geometry: DisplayGeometry) -> Self {
        Self {
            geometry,
            ready_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }
}

// ── Reports & statistics ─────────────────────────────────────────

/// Outcome of a single update drive.
#[derive(Debug, Clone, Default)]
pub struct UpdateReport {
    /// Uncompressed bytes the update covered.
    pub raw_bytes: usize,
    /// Payload bytes actually handed to the sinks.
    pub sent_bytes: usize,
    /// Packets broadcast.
    pub packets: usize,
    /// Tiles whose readiness wait elapsed without a signal.
    pub ready_timeouts: usize,
    /// Encoding chosen for the update payload, if any was sent.
    pub encoding: Option<Encoding>,
}

impl UpdateReport {
    /// Overall compression ratio for this update, as a percentage.
    pub fn compression_ratio(&self) -> f64 {
        rle::compression_ratio(self.raw_bytes, self.sent_bytes)
    }
}

/// Cumulative counters across the streamer's lifetime.
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamStats {
    pub raw_bytes: u64,
    pub sent_bytes: u64,
    pub packets_sent: u64,
    pub ready_timeouts: u64,
    pub send_failures: u64,
}

impl StreamStats {
    /// Lifetime compression ratio, as a percentage.
    pub fn compression_ratio(&self) -> f64 {
        rle::compression_ratio(self.raw_bytes as usize, self.sent_bytes as usize)
    }
}

// ── FrameStreamer ────────────────────────────────────────────────

/// Drives frame updates to every registered sink.
///
/// Owns the packet sequence counter, the hybrid encoder's baseline,
/// and the readiness gate. One streamer instance drives one display
/// geometry; all of its state is private to that instance, so there
/// are no process-wide counters to reset between runs.
///
/// A tiled update cycles `SendingTile(i)` → `AwaitingReady(i)` for
/// each band in index order. The final band waits too, so a caller
/// returning from [`send_tiled_update`](Self::send_tiled_update)
/// knows the client has (or had the chance to) finish rendering.
pub struct FrameStreamer {
    registry: Arc<SinkRegistry>,
    gate: Arc<ReadyGate>,
    hybrid: HybridCodec,
    config: StreamerConfig,
    seq_id: u16,
    stats: StreamStats,
}

impl FrameStreamer {
    pub fn new(registry: Arc<SinkRegistry>, config: StreamerConfig) -> Self {
        Self {
            registry,
            gate: Arc::new(ReadyGate::new()),
            hybrid: HybridCodec::new(),
            config,
            seq_id: 0,
            stats: StreamStats::default(),
        }
    }

    /// The gate a connection reader signals when its client reports
    /// readiness.
    pub fn ready_gate(&self) -> Arc<ReadyGate> {
        Arc::clone(&self.gate)
    }

    /// Cumulative statistics since construction.
    pub fn stats(&self) -> StreamStats {
        self.stats
    }

    /// The display geometry this streamer targets.
    pub fn geometry(&self) -> DisplayGeometry {
        self.config.geometry
    }

    /// Drop the delta baseline so the next whole-frame update is sent
    /// in full. Call when a client (re)connects with unknown panel
    /// contents.
    pub fn reset_baseline(&mut self) {
        self.hybrid.reset();
    }

    // ── Update drives ────────────────────────────────────────────

    /// Broadcast a whole-frame update, letting the hybrid selector
    /// choose between a full run-length payload and a delta list.
    ///
    /// Fails with [`CastError::FrameSize`] if `frame` does not match
    /// the display geometry. With no connected sinks the update is
    /// skipped entirely — the encoder baseline does not advance.
    pub async fn send_full_update(&mut self, frame: &[u8]) -> Result<UpdateReport, CastError> {
        self.check_frame_len(frame)?;
        if self.registry.is_empty() {
            warn!("no connected sinks; skipping full update");
            return Ok(UpdateReport::default());
        }

        let result = self.hybrid.compress_update(frame);
        let encoding = result.encoding;
        let sent_bytes = result.payload.len();

        let seq = self.next_seq();
        let packet = match encoding {
            Encoding::Delta => Packet::delta_update(seq, result.payload)?,
            _ => Packet::full_update(seq, result.payload)?,
        };

        self.broadcast(packet).await;
        self.stats.raw_bytes += frame.len() as u64;
        self.stats.sent_bytes += sent_bytes as u64;

        let report = UpdateReport {
            raw_bytes: frame.len(),
            sent_bytes,
            packets: 1,
            ready_timeouts: 0,
            encoding: Some(encoding),
        };
        debug!(
            seq,
            encoding = ?encoding,
            ratio = report.compression_ratio(),
            "full update broadcast"
        );
        Ok(report)
    }

    /// Broadcast a frame as sequential raw tile bands, waiting for
    /// the client readiness signal (bounded by the configured
    /// timeout) between bands.
    ///
    /// Bands are sent strictly in index order; a timeout on band `i`
    /// only logs a warning before band `i + 1` goes out.
    pub async fn send_tiled_update(&mut self, frame: &[u8]) -> Result<UpdateReport, CastError> {
        self.check_frame_len(frame)?;
        let geometry = self.config.geometry;
        if geometry.tile_count() > usize::from(u8::MAX) + 1 {
            return Err(CastError::InvalidGeometry(
                "more tile bands than the index byte can address",
            ));
        }
        if self.registry.is_empty() {
            warn!("no connected sinks; skipping tiled update");
            return Ok(UpdateReport::default());
        }

        let mut report = UpdateReport {
            encoding: Some(Encoding::Raw),
            ..UpdateReport::default()
        };

        for index in 0..geometry.tile_count() {
            let band = &frame[geometry.tile_range(index)];

            // Tiles are sent uncompressed: the client renders them
            // straight from the receive buffer.
            let seq = self.next_seq();
            let packet = Packet::tile(seq, index as u8, band)?;
            self.broadcast(packet).await;

            report.packets += 1;
            report.raw_bytes += band.len();
            report.sent_bytes += band.len();
            self.stats.raw_bytes += band.len() as u64;
            self.stats.sent_bytes += band.len() as u64;

            self.gate.clear();
            if self.gate.wait_timeout(self.config.ready_timeout).await {
                debug!(tile = index, seq, "tile rendered");
            } else {
                warn!(
                    tile = index,
                    seq,
                    timeout = ?self.config.ready_timeout,
                    "no readiness signal; advancing to next tile"
                );
                report.ready_timeouts += 1;
                self.stats.ready_timeouts += 1;
            }
        }

        debug!(
            tiles = report.packets,
            timeouts = report.ready_timeouts,
            "tiled update complete"
        );
        Ok(report)
    }

    /// Broadcast a display control command.
    pub async fn send_command(
        &mut self,
        command: DisplayCommand,
        param: u8,
    ) -> Result<UpdateReport, CastError> {
        if self.registry.is_empty() {
            warn!(%command, "no connected sinks; skipping command");
            return Ok(UpdateReport::default());
        }

        let seq = self.next_seq();
        self.broadcast(Packet::command(seq, command, param)).await;
        debug!(seq, %command, param, "command broadcast");
        Ok(UpdateReport {
            packets: 1,
            ..UpdateReport::default()
        })
    }

    // ── Internal ─────────────────────────────────────────────────

    fn check_frame_len(&self, frame: &[u8]) -> Result<(), CastError> {
        let expected = self.config.geometry.frame_len();
        if frame.len() != expected {
            return Err(CastError::FrameSize {
                expected,
                actual: frame.len(),
            });
        }
        Ok(())
    }

    /// Advance and return the shared sequence counter. Wraps at 2¹⁶.
    fn next_seq(&mut self) -> u16 {
        self.seq_id = self.seq_id.wrapping_add(1);
        self.seq_id
    }

    /// Send one packet to a snapshot of the registry. Individual sink
    /// failures are logged and counted, never propagated. Returns the
    /// number of sinks that accepted the packet.
    async fn broadcast(&mut self, packet: Packet) -> usize {
        let snapshot = self.registry.snapshot();
        let sends = snapshot.iter().map(|sink| {
            let packet = packet.clone();
            async move { (sink.id(), sink.send(packet).await) }
        });

        let mut delivered = 0;
        for (id, result) in future::join_all(sends).await {
            match result {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!(sink = id, error = %e, "send failed; continuing broadcast");
                    self.stats.send_failures += 1;
                }
            }
        }

        self.stats.packets_sent += 1;
        delivered
    }

    #[cfg(test)]
    fn set_seq(&mut self, seq: u16) {
        self.seq_id = seq;
    }
}

// ── Tests ────────────────────────────────────────────────────────
