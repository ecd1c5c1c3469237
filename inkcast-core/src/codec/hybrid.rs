//! Per-update selection between full run-length and delta encoding.
//!
//! A delta list costs 5 bytes per changed position (4-byte index +
//! 1-byte value). When that total reaches the size of simply resending
//! the whole frame run-length encoded, the delta has stopped paying
//! off: the selector sends the full payload and drops the baseline so
//! the next update starts fresh rather than compounding.

use crate::codec::delta::{ByteChange, DeltaCodec};
use crate::codec::{CompressionResult, Encoding, rle};
use crate::error::CastError;

/// Wire cost of a single packed diff entry.
const DIFF_ENTRY_COST: usize = 5;

/// Byte length of the leading entry-count field in a packed diff list.
const DIFF_COUNT_LEN: usize = 4;

// ── HybridCodec ──────────────────────────────────────────────────

/// Chooses, per update, whichever of full-RLE or delta encoding yields
/// the smaller payload.
#[derive(Debug, Default)]
pub struct HybridCodec {
    delta: DeltaCodec,
}

impl HybridCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compress one frame update.
    ///
    /// First frames (and frames following a baseline drop) come back
    /// as [`Encoding::RunLength`] over the full data. Otherwise the
    /// diff list is compared against the full run-length payload and
    /// the smaller of the two wins; when the full payload wins, the
    /// delta baseline is reset so the next update is a first frame.
    pub fn compress_update(&mut self, data: &[u8]) -> CompressionResult {
        let diff = self.delta.compress(data);

        if diff.full_frame {
            return CompressionResult {
                encoding: Encoding::RunLength,
                payload: rle::compress(data),
            };
        }

        let full_payload = rle::compress(data);
        let diff_cost = diff.changes.len() * DIFF_ENTRY_COST;

        if diff_cost >= full_payload.len() {
            self.delta.reset();
            return CompressionResult {
                encoding: Encoding::RunLength,
                payload: full_payload,
            };
        }

        CompressionResult {
            encoding: Encoding::Delta,
            payload: pack_changes(&diff.changes),
        }
    }

    /// Drop the delta baseline; the next update is a first frame.
    pub fn reset(&mut self) {
        self.delta.reset();
    }
}

// ── Packed diff list ─────────────────────────────────────────────

/// Pack a diff list as `[count: u32 BE][(index: u32 BE, value: u8)]*`.
pub fn pack_changes(changes: &[ByteChange]) -> Vec<u8> {
    let mut out = Vec::with_capacity(DIFF_COUNT_LEN + changes.len() * DIFF_ENTRY_COST);
    out.extend_from_slice(&(changes.len() as u32).to_be_bytes());
    for change in changes {
        out.extend_from_slice(&change.index.to_be_bytes());
        out.push(change.value);
    }
    out
}

/// Parse a packed diff list back into changes.
///
/// The payload must consist of exactly `count` entries — trailing or
/// missing bytes are a [`CastError::MalformedPayload`].
pub fn unpack_changes(payload: &[u8]) -> Result<Vec<ByteChange>, CastError> {
    if payload.len() < DIFF_COUNT_LEN {
        return Err(CastError::MalformedPayload("diff list shorter than count field"));
    }
    let count = u32::from_be_bytes(payload[..DIFF_COUNT_LEN].try_into().unwrap()) as usize;
    let body = &payload[DIFF_COUNT_LEN..];
    if body.len() != count * DIFF_ENTRY_COST {
        return Err(CastError::MalformedPayload("diff list length disagrees with count"));
    }

    Ok(body
        .chunks_exact(DIFF_ENTRY_COST)
        .map(|entry| ByteChange {
            index: u32::from_be_bytes(entry[..4].try_into().unwrap()),
            value: entry[4],
        })
        .collect())
}

/// Apply a diff list to the previously displayed frame in place.
///
/// Out-of-range indices are a [`CastError::MalformedPayload`] — the
/// frame is left partially updated in that case, so callers should
/// discard it.
pub fn apply_changes(frame: &mut [u8], changes: &[ByteChange]) -> Result<(), CastError> {
    for change in changes {
        let slot = frame
            .get_mut(change.index as usize)
            .ok_or(CastError::MalformedPayload("diff index beyond frame length"))?;
        *slot = change.value;
    }
    Ok(())
}

// ── Tests ────────────────────────────────────────────────────────
