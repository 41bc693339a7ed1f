//! Decode error model
//!
//! Two tiers, expressed in types rather than control flow:
//!
//! - [`ScanError`]: recoverable. These steer candidate selection inside the
//!   engine and surface only as diagnostic signals, never as failures.
//! - [`DecodeExhausted`]: fatal, and the only failure a caller ever sees. It
//!   is still a value inside the report, not a panic.

use serde::Serialize;

/// Recoverable scan fault.
///
/// Every variant names the exact spot that stopped a scan so the diagnostic
/// surface can point an operator at the offending bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScanError {
    /// Buffer too short to carry a 5-byte frame header.
    ShortBuffer { len: usize },
    /// Header flag byte outside {0, 1}.
    InvalidHeaderFlag { flag: u8 },
    /// Declared message length disagrees with the bytes actually present.
    LengthMismatch { declared: u32, available: usize },
    /// Tag low bits outside {0, 1, 2, 5}.
    InvalidWireType { bits: u8, offset: usize },
    /// Continuation bit still set past the varint byte cap.
    TruncatedVarint { offset: usize },
    /// Field body extends past the end of its buffer.
    FieldOverrun { offset: usize, need: usize, have: usize },
    /// Read attempted at or past the end of the buffer.
    OutOfBounds { offset: usize, len: usize },
}

impl ScanError {
    /// Stable machine-readable name, mirrors the serde tag.
    #[inline]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ShortBuffer { .. } => "short_buffer",
            Self::InvalidHeaderFlag { .. } => "invalid_header_flag",
            Self::LengthMismatch { .. } => "length_mismatch",
            Self::InvalidWireType { .. } => "invalid_wire_type",
            Self::TruncatedVarint { .. } => "truncated_varint",
            Self::FieldOverrun { .. } => "field_overrun",
            Self::OutOfBounds { .. } => "out_of_bounds",
        }
    }
}

impl core::fmt::Display for ScanError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match *self {
            Self::ShortBuffer { len } => {
                write!(f, "buffer of {len} bytes is shorter than a frame header")
            }
            Self::InvalidHeaderFlag { flag } => {
                write!(f, "unexpected frame flag 0x{flag:02x}")
            }
            Self::LengthMismatch { declared, available } => {
                write!(f, "declared length {declared} but only {available} payload bytes present")
            }
            Self::InvalidWireType { bits, offset } => {
                write!(f, "invalid wire type {bits} at offset {offset}")
            }
            Self::TruncatedVarint { offset } => {
                write!(f, "varint at offset {offset} has no terminator")
            }
            Self::FieldOverrun { offset, need, have } => {
                write!(f, "field at offset {offset} needs {need} bytes, {have} remain")
            }
            Self::OutOfBounds { offset, len } => {
                write!(f, "offset {offset} out of bounds for {len}-byte buffer")
            }
        }
    }
}

impl std::error::Error for ScanError {}

/// Every salvage strategy ran out without producing a single record.
///
/// Carries enough context for an operator to inspect the buffer by hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodeExhausted {
    /// Length of the input buffer.
    pub buffer_len: usize,
    /// Hex of the leading bytes, capped by `DecoderConfig::preview_len`.
    pub preview: String,
    /// Number of candidate payloads that were tried.
    pub attempts: u32,
    /// Last scan fault observed before giving up, if any.
    pub last_error: Option<ScanError>,
}

impl core::fmt::Display for DecodeExhausted {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "no records salvaged after {} attempts ({} bytes, preview {})",
            self.attempts, self.buffer_len, self.preview
        )?;
        if let Some(e) = self.last_error {
            write!(f, ", last error: {e}")?;
        }
        Ok(())
    }
}

impl std::error::Error for DecodeExhausted {}
