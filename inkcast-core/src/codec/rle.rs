//! Byte-pair run-length encoding.
//!
//! The wire format is a flat sequence of `(count, value)` pairs where
//! `count` is 1..=255. Packed 1-bit frames are dominated by long runs
//! of `0x00` / `0xFF`, which this encoding collapses to two bytes each.
//! Stateless — both directions are pure functions of their input.

use crate::error::CastError;

/// Compress `data` into `(count, value)` pairs.
///
/// A run longer than 255 identical bytes is split into multiple pairs.
/// Empty input produces empty output.
pub fn compress(data: &[u8]) -> Vec<u8> {
    if data.is_empty() {
        return Vec::new();
    }

    let mut out = Vec::with_capacity(data.len() / 2);
    let mut i = 0;

    while i < data.len() {
        let value = data[i];
        let mut count = 1usize;
        while i + count < data.len() && data[i + count] == value && count < 255 {
            count += 1;
        }
        out.push(count as u8);
        out.push(value);
        i += count;
    }

    out
}

/// Expand `(count, value)` pairs back into raw bytes.
///
/// If `expected_size` is given and the result length disagrees, fails
/// with [`CastError::SizeMismatch`]. An odd-length input is read by
/// truncating the final unpaired byte — the accepted policy for
/// malformed input on this path.
pub fn decompress(data: &[u8], expected_size: Option<usize>) -> Result<Vec<u8>, CastError> {
    let mut out = match expected_size {
        Some(n) => Vec::with_capacity(n),
        None => Vec::with_capacity(data.len() * 2),
    };

    for pair in data.chunks_exact(2) {
        let count = pair[0] as usize;
        let value = pair[1];
        out.resize(out.len() + count, value);
    }

    if let Some(expected) = expected_size {
        if out.len() != expected {
            return Err(CastError::SizeMismatch {
                expected,
                actual: out.len(),
            });
        }
    }

    Ok(out)
}

/// Compression ratio as a percentage: `(1 - compressed/original) * 100`.
///
/// Returns `0.0` when `original_size` is zero.
pub fn compression_ratio(original_size: usize, compressed_size: usize) -> f64 {
    if original_size == 0 {
        return 0.0;
    }
    (1.0 - compressed_size as f64 / original_size as f64) * 100.0
}

// ── Compressibility analysis ─────────────────────────────────────

/// Run statistics for a byte sequence, used to predict whether
/// run-length encoding will pay off without actually encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    /// Number of maximal runs of identical bytes.
    pub total_runs: usize,
    /// Length of the longest run.
    pub max_run: usize,
    /// Size the data would encode to, ignoring the 255 split.
    pub estimated_compressed_len: usize,
}

impl RunStats {
    /// Predicted compression ratio, as a percentage.
    pub fn estimated_ratio(&self, original_size: usize) -> f64 {
        compression_ratio(original_size, self.estimated_compressed_len)
    }
}

/// Count the runs in `data`. Empty input reports zero runs.
pub fn analyze(data: &[u8]) -> RunStats {
    let mut total_runs = 0;
    let mut max_run = 0;
    let mut current = 0;

    for (i, &byte) in data.iter().enumerate() {
        if i > 0 && byte == data[i - 1] {
            current += 1;
        } else {
            if current > 0 {
                total_runs += 1;
                max_run = max_run.max(current);
            }
            current = 1;
        }
    }
    if current > 0 {
        total_runs += 1;
        max_run = max_run.max(current);
    }

    RunStats {
        total_runs,
        max_run,
        estimated_compressed_len: total_runs * 2,
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_repetitive_data() {
        let data: Vec<u8> = [vec![0xFF; 100], vec![0x00; 100]].concat();
        let compressed = compress(&data);
        assert_eq!(compressed, vec![100, 0xFF, 100, 0x00]);

        let restored = decompress(&compressed, Some(data.len())).unwrap();
        assert_eq!(restored, data);
    }

    #[test]
    fn round_trip_mixed_data() {
        let data: Vec<u8> = (0..=255u8).chain([7, 7, 7, 7]).collect();
        let restored = decompress(&compress(&data), None).unwrap();
        assert_eq!(restored, data);
    }

    #[test]
    fn long_run_splits_at_255() {
        let data = vec![0xAB; 256];
        let compressed = compress(&data);
        assert_eq!(compressed, vec![255, 0xAB, 1, 0xAB]);
        assert_eq!(decompress(&compressed, Some(256)).unwrap(), data);
    }

    #[test]
    fn empty_input() {
        assert!(compress(&[]).is_empty());
        assert!(decompress(&[], None).unwrap().is_empty());
    }

    #[test]
    fn size_mismatch_detected() {
        let compressed = compress(&[1, 2, 3]);
        let err = decompress(&compressed, Some(4)).unwrap_err();
        assert!(matches!(
            err,
            CastError::SizeMismatch {
                expected: 4,
                actual: 3,
            }
        ));
    }

    #[test]
    fn odd_length_input_truncates_trailing_byte() {
        // (2, 0xEE) followed by an unpaired count byte.
        let restored = decompress(&[2, 0xEE, 9], None).unwrap();
        assert_eq!(restored, vec![0xEE, 0xEE]);
    }

    #[test]
    fn ratio_calculation() {
        assert_eq!(compression_ratio(100, 50), 50.0);
        assert_eq!(compression_ratio(0, 123), 0.0);
        assert!(compression_ratio(100, 150) < 0.0); // expansion is negative
    }

    #[test]
    fn analyze_counts_runs() {
        let data: Vec<u8> = [vec![0xFF; 100], vec![0x00; 100]].concat();
        let stats = analyze(&data);
        assert_eq!(stats.total_runs, 2);
        assert_eq!(stats.max_run, 100);
        assert_eq!(stats.estimated_compressed_len, 4);
        assert_eq!(stats.estimated_ratio(data.len()), 98.0);

        assert_eq!(analyze(&[]).total_runs, 0);
    }
}
