//! Byte-position delta detection between consecutive frames.
//!
//! Compares the current frame byte-for-byte against the previously
//! submitted one and reports only the positions that changed. For a
//! mostly-static display this reduces an update to a handful of bytes.

// ── ByteChange ───────────────────────────────────────────────────

/// A single byte position that differs from the previous frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteChange {
    /// Offset into the packed frame.
    pub index: u32,
    /// The new byte value at that offset.
    pub value: u8,
}

// ── FrameDiff ────────────────────────────────────────────────────

/// Result of one delta pass.
///
/// If `full_frame` is `true` the caller must transmit the entire frame
/// (first frame after construction or [`reset`](DeltaCodec::reset), or
/// a frame whose length changed).
#[derive(Debug, Clone)]
pub struct FrameDiff {
    /// Changed positions in ascending index order. Empty when
    /// `full_frame` is set.
    pub changes: Vec<ByteChange>,
    /// When `true`, no usable baseline existed for this frame.
    pub full_frame: bool,
}

impl FrameDiff {
    /// Fraction of the frame that changed, as a percentage.
    pub fn change_ratio(&self, frame_len: usize) -> f64 {
        if self.full_frame {
            return 100.0;
        }
        if frame_len == 0 {
            return 0.0;
        }
        self.changes.len() as f64 / frame_len as f64 * 100.0
    }
}

// ── DeltaCodec ───────────────────────────────────────────────────

/// Stateful differ that remembers the previously submitted frame.
///
/// The baseline is exclusively owned by this instance; comparison and
/// baseline update happen within a single [`compress`](Self::compress)
/// call, so callers never observe a half-updated state.
#[derive(Debug, Default)]
pub struct DeltaCodec {
    last_frame: Option<Vec<u8>>,
}

impl DeltaCodec {
    /// Create a codec with no baseline. The first `compress` call is
    /// treated as a full frame.
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare `current` against the stored baseline.
    ///
    /// Always stores `current` as the new baseline, regardless of the
    /// outcome. A frame whose length differs from the baseline is
    /// treated as a first frame rather than being compared up to the
    /// shorter length, so a resize can never silently drop changes in
    /// the extended tail.
    pub fn compress(&mut self, current: &[u8]) -> FrameDiff {
        let diff = match &self.last_frame {
            Some(last) if last.len() == current.len() => FrameDiff {
                changes: last
                    .iter()
                    .zip(current)
                    .enumerate()
                    .filter(|(_, (old, new))| old != new)
                    .map(|(i, (_, new))| ByteChange {
                        index: i as u32,
                        value: *new,
                    })
                    .collect(),
                full_frame: false,
            },
            _ => FrameDiff {
                changes: Vec::new(),
                full_frame: true,
            },
        };

        self.last_frame = Some(current.to_vec());
        diff
    }

    /// Clear the baseline, forcing the next `compress` to behave as a
    /// first frame.
    pub fn reset(&mut self) {
        self.last_frame = None;
    }

    /// Whether a baseline frame is currently stored.
    pub fn has_baseline(&self) -> bool {
        self.last_frame.is_some()
    }
}

// ── Tests ────────────────────────────────────────────────────────
