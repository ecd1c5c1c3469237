//! Built-in packed test patterns.
//!
//! Frames normally come from an external image pipeline; these
//! generators produce valid packed bitstreams without one, so the
//! whole transmit path can be exercised against real hardware.

use inkcast_core::DisplayGeometry;

/// Checkerboard of `cell × cell` pixel squares. `cell` must be a
/// multiple of 8 so cells land on byte boundaries.
pub fn checkerboard(geometry: DisplayGeometry, cell: u32) -> Vec<u8> {
    debug_assert!(cell > 0 && cell % 8 == 0);
    let bytes_per_row = geometry.bytes_per_row();
    let mut frame = Vec::with_capacity(geometry.frame_len());

    for row in 0..geometry.height() {
        for byte_col in 0..bytes_per_row as u32 {
            let col = byte_col * 8;
            let dark = ((row / cell) + (col / cell)) % 2 == 0;
            frame.push(if dark { 0x00 } else { 0xFF });
        }
    }
    frame
}

/// Alternating horizontal bands of `band` rows, starting light.
pub fn horizontal_bands(geometry: DisplayGeometry, band: u32) -> Vec<u8> {
    debug_assert!(band > 0);
    let bytes_per_row = geometry.bytes_per_row();
    let mut frame = Vec::with_capacity(geometry.frame_len());

    for row in 0..geometry.height() {
        let light = (row / band) % 2 == 0;
        let fill = if light { 0xFF } else { 0x00 };
        frame.resize(frame.len() + bytes_per_row, fill);
    }
    frame
}

// ── Tests ────────────────────────────────────────────────────────
