//! Domain-specific error types for the inkcast protocol.
//!
//! All fallible operations return `Result<T, CastError>`.
//! No panics on invalid input — every error is typed and recoverable.

use thiserror::Error;

/// The canonical error type for the inkcast protocol.
#[derive(Debug, Error)]
pub enum CastError {
    // ── Protocol Errors ──────────────────────────────────────────
    /// A buffer was too short to contain a complete packet header.
    #[error("short buffer: need {needed} bytes, got {got}")]
    ShortBuffer { needed: usize, got: usize },

    /// The first byte of a packet was not the protocol magic.
    #[error("magic mismatch: {0:#04x}")]
    MagicMismatch(u8),

    /// The header declared a negative payload length.
    #[error("negative payload length: {0}")]
    NegativeLength(i32),

    /// A numeric value did not map to any known enum variant.
    #[error("unknown {type_name} discriminant: {value:#04x}")]
    UnknownVariant { type_name: &'static str, value: u8 },

    /// A packet payload did not match the shape its type requires.
    #[error("malformed payload: {0}")]
    MalformedPayload(&'static str),

    // ── Codec Errors ─────────────────────────────────────────────
    /// Decompression produced a different size than the caller expected.
    #[error("size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    /// A frame does not match the display geometry it is being sent to.
    #[error("frame size mismatch: geometry requires {expected} bytes, got {actual}")]
    FrameSize { expected: usize, actual: usize },

    /// Display dimensions that cannot be packed or tiled exactly.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(&'static str),

    // ── Transport Errors ─────────────────────────────────────────
    /// An inbound frame exceeded the codec limit.
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// The TCP/IO layer reported an error.
    #[error("connection error: {0}")]
    Io(#[from] std::io::Error),

    /// A sink's send channel was closed (client disconnected).
    #[error("sink channel closed")]
    ChannelClosed,
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for CastError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        CastError::ChannelClosed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let e = CastError::ShortBuffer { needed: 8, got: 3 };
        assert!(e.to_string().contains('8'));
        assert!(e.to_string().contains('3'));

        let e = CastError::SizeMismatch {
            expected: 48000,
            actual: 47999,
        };
        assert!(e.to_string().contains("48000"));
    }

    #[test]
    fn from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe broke");
        let e: CastError = io_err.into();
        assert!(matches!(e, CastError::Io(_)));
    }
}
