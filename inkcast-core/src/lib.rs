//! # inkcast-core
//!
//! Compression, framing, and tile-synchronized streaming for networked
//! e-paper displays.
//!
//! This crate contains:
//! - **Codecs**: run-length, delta, and hybrid compressors for packed
//!   1-bit frames
//! - **Protocol**: the fixed binary packet format shared with the
//!   display firmware
//! - **Wire**: `WireCodec` for framed TCP I/O via `tokio_util`
//! - **Gate**: the collapse-to-one readiness signal that paces tiled
//!   transmission
//! - **Registry**: the set of connected display sinks, snapshotted
//!   per broadcast
//! - **Streamer**: `FrameStreamer`, which drives whole-frame and
//!   tiled updates with flow control and statistics
//! - **Error**: `CastError` — typed, `thiserror`-based error hierarchy

pub mod codec;
pub mod error;
pub mod gate;
pub mod geometry;
pub mod protocol;
pub mod registry;
pub mod streamer;
pub mod wire;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use codec::{ByteChange, CompressionResult, DeltaCodec, Encoding, FrameDiff, HybridCodec};
pub use error::CastError;
pub use gate::ReadyGate;
pub use geometry::{DisplayGeometry, TileRect};
pub use protocol::{
    DeltaRegion, DisplayCommand, HEADER_SIZE, MAGIC, MAX_PAYLOAD_SIZE, Packet, PacketBody,
    PacketHeader, PacketType, validate_header,
};
pub use registry::{PacketSink, SinkId, SinkRegistry};
pub use streamer::{FrameStreamer, StreamStats, StreamerConfig, UpdateReport};
pub use wire::{Inbound, MAX_FRAME_SIZE, READY_SIGNAL, WireCodec};
