//! Stream framing for the display connection.
//!
//! The client speaks two interleaved channels over one TCP stream:
//! binary protocol packets (always opening with the magic byte) and
//! short newline-terminated text lines used for out-of-band signals —
//! most importantly the readiness notification after a tile render.
//! [`WireCodec`] frames both into [`Inbound`] items and serializes
//! outbound [`Packet`]s.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::error::CastError;
use crate::protocol::{HEADER_SIZE, MAGIC, MAX_PAYLOAD_SIZE, Packet, PacketHeader};

/// The exact text line a client sends when it has finished rendering
/// the most recent tile and can accept the next one.
pub const READY_SIGNAL: &str = "READY";

/// Largest frame the decoder will buffer before giving up on the
/// stream. A corrupt length field fails fast instead of ballooning
/// the receive buffer.
pub const MAX_FRAME_SIZE: usize = HEADER_SIZE + MAX_PAYLOAD_SIZE;

// ── Inbound ──────────────────────────────────────────────────────

/// One framed item read from a client connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A complete binary packet (ACK/NAK in practice).
    Packet(Packet),
    /// A text line, stripped of its trailing newline.
    Text(String),
}

impl Inbound {
    /// Whether this is the tile readiness signal.
    pub fn is_ready_signal(&self) -> bool {
        matches!(self, Inbound::Text(line) if line.trim() == READY_SIGNAL)
    }
}

// ── WireCodec ────────────────────────────────────────────────────

/// Framing codec for `tokio_util::codec::Framed`.
#[derive(Debug, Default)]
pub struct WireCodec;

impl Decoder for WireCodec {
    type Item = Inbound;
    type Error = CastError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }

        if src[0] == MAGIC {
            return decode_packet(src);
        }
        decode_line(src)
    }
}

impl Encoder<Packet> for WireCodec {
    type Error = CastError;

    fn encode(&mut self, item: Packet, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.extend_from_slice(&item.to_bytes());
        Ok(())
    }
}

fn decode_packet(src: &mut BytesMut) -> Result<Option<Inbound>, CastError> {
    if src.len() < HEADER_SIZE {
        return Ok(None);
    }

    let header = PacketHeader::decode(&src[..HEADER_SIZE])?;
    let total = HEADER_SIZE + header.payload_len as usize;
    if total > MAX_FRAME_SIZE {
        return Err(CastError::FrameTooLarge {
            size: total,
            max: MAX_FRAME_SIZE,
        });
    }
    if src.len() < total {
        src.reserve(total - src.len());
        return Ok(None);
    }

    let frame = src.split_to(total);
    Ok(Some(Inbound::Packet(Packet::from_bytes(&frame)?)))
}

fn decode_line(src: &mut BytesMut) -> Result<Option<Inbound>, CastError> {
    let Some(newline) = src.iter().position(|&b| b == b'\n') else {
        // Refuse to buffer a "line" that is clearly not one.
        if src.len() > MAX_FRAME_SIZE {
            return Err(CastError::FrameTooLarge {
                size: src.len(),
                max: MAX_FRAME_SIZE,
            });
        }
        return Ok(None);
    };

    let line = src.split_to(newline + 1);
    let text = String::from_utf8_lossy(&line[..newline])
        .trim_end_matches('\r')
        .to_string();
    Ok(Some(Inbound::Text(text)))
}

// ── Tests ────────────────────────────────────────────────────────
