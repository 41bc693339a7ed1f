//! Bounds-checked wire-format primitives
//!
//! The smallest pieces of the protobuf grammar this crate understands: base-128
//! varints, single-byte field tags, and wire-type-directed field skipping. All
//! reads are offset-based over a shared immutable buffer; nothing here assigns
//! meaning to the values it returns.

use crate::error::ScanError;
use serde::Serialize;

/// Varint byte cap.
///
/// Five bytes carry 35 value bits, enough for every identifier this protocol
/// ships. The cap keeps a corrupt run of continuation bits from turning into
/// an unbounded scan.
pub const MAX_VARINT_BYTES: usize = 5;

/// Field encoding, the low 3 bits of a tag.
///
/// Values 3 and 4 (the deprecated group markers) and 6 and 7 are never legal
/// here; 6/7 in particular are how trailing corruption usually announces
/// itself, so the tag reader treats them as boundary markers rather than
/// fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum WireType {
    Varint = 0,
    Fixed64 = 1,
    LengthDelimited = 2,
    Fixed32 = 5,
}

impl WireType {
    /// Map the low 3 bits of a tag byte, rejecting everything outside
    /// {0, 1, 2, 5}.
    #[inline]
    pub const fn from_low_bits(bits: u8) -> Option<Self> {
        match bits & 0x07 {
            0 => Some(Self::Varint),
            1 => Some(Self::Fixed64),
            2 => Some(Self::LengthDelimited),
            5 => Some(Self::Fixed32),
            _ => None,
        }
    }
}

/// Decoded field tag: `(field << 3) | wire_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag {
    pub field: u32,
    pub wire_type: WireType,
}

/// Read one varint at `offset`.
///
/// Returns the value and the number of bytes consumed. Fails with
/// [`ScanError::OutOfBounds`] when `offset` is past the buffer and with
/// [`ScanError::TruncatedVarint`] when no terminator shows up within
/// [`MAX_VARINT_BYTES`] (either genuinely truncated data or a continuation-bit
/// run longer than anything this protocol produces).
pub fn read_varint(buf: &[u8], offset: usize) -> Result<(u64, usize), ScanError> {
    if offset >= buf.len() {
        return Err(ScanError::OutOfBounds { offset, len: buf.len() });
    }

    let mut value = 0u64;
    for (i, &byte) in buf[offset..].iter().take(MAX_VARINT_BYTES).enumerate() {
        value |= ((byte & 0x7F) as u64) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }
    Err(ScanError::TruncatedVarint { offset })
}

/// Read one single-byte field tag at `offset`.
///
/// Returns the tag and the bytes consumed (always 1; field numbers in scope
/// fit in one byte). This is the primary corruption detector: an invalid
/// wire type means either truncated data or the start of an unrelated
/// trailing frame, and the error drives boundary recovery upstream.
#[inline]
pub fn read_tag(buf: &[u8], offset: usize) -> Result<(Tag, usize), ScanError> {
    let Some(&byte) = buf.get(offset) else {
        return Err(ScanError::OutOfBounds { offset, len: buf.len() });
    };
    match WireType::from_low_bits(byte) {
        Some(wire_type) => Ok((Tag { field: (byte >> 3) as u32, wire_type }, 1)),
        None => Err(ScanError::InvalidWireType { bits: byte & 0x07, offset }),
    }
}

/// Whether a byte reads as a plausible field tag: valid wire type and field
/// number in `1..=max_field`.
#[inline]
pub const fn is_plausible_tag(byte: u8, max_field: u32) -> bool {
    let field = (byte >> 3) as u32;
    WireType::from_low_bits(byte).is_some() && field >= 1 && field <= max_field
}

/// Skip one field body of the given wire type starting at `offset`,
/// returning the offset just past it.
///
/// Length-delimited fields consume their own length varint first; fixed-width
/// fields are bounds-checked against the buffer end.
pub fn skip_field(buf: &[u8], offset: usize, wire_type: WireType) -> Result<usize, ScanError> {
    match wire_type {
        WireType::Varint => {
            let (_, n) = read_varint(buf, offset)?;
            Ok(offset + n)
        }
        WireType::Fixed64 => skip_fixed(buf, offset, 8),
        WireType::Fixed32 => skip_fixed(buf, offset, 4),
        WireType::LengthDelimited => read_len_slice(buf, offset).map(|(_, next)| next),
    }
}

/// Read a length-delimited field body at `offset`: its length varint, then
/// that many bytes. Returns the body slice and the offset just past it.
pub fn read_len_slice(buf: &[u8], offset: usize) -> Result<(&[u8], usize), ScanError> {
    let (len, n) = read_varint(buf, offset)?;
    let start = offset + n;
    let need = len as usize;
    match start.checked_add(need) {
        Some(end) if end <= buf.len() => Ok((&buf[start..end], end)),
        _ => Err(ScanError::FieldOverrun {
            offset,
            need,
            have: buf.len().saturating_sub(start),
        }),
    }
}

#[inline]
fn skip_fixed(buf: &[u8], offset: usize, width: usize) -> Result<usize, ScanError> {
    let end = offset + width;
    if end <= buf.len() {
        Ok(end)
    } else {
        Err(ScanError::FieldOverrun { offset, need: width, have: buf.len() - offset.min(buf.len()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn varint_single_byte() {
        assert_eq!(read_varint(&[0x00], 0).unwrap(), (0, 1));
        assert_eq!(read_varint(&[0x01], 0).unwrap(), (1, 1));
        assert_eq!(read_varint(&[0x7F], 0).unwrap(), (127, 1));
    }

    #[test]
    fn varint_multi_byte() {
        // 300 = 0b10_0101100 -> AC 02
        assert_eq!(read_varint(&[0xAC, 0x02], 0).unwrap(), (300, 2));
        // Max value the 5-byte cap can carry: 2^35 - 1
        let max = [0xFF, 0xFF, 0xFF, 0xFF, 0x7F];
        assert_eq!(read_varint(&max, 0).unwrap(), ((1u64 << 35) - 1, 5));
    }

    #[test]
    fn varint_at_offset() {
        assert_eq!(read_varint(&[0xFF, 0xAC, 0x02], 1).unwrap(), (300, 2));
    }

    #[test]
    fn varint_out_of_bounds() {
        assert_eq!(
            read_varint(&[], 0).unwrap_err(),
            ScanError::OutOfBounds { offset: 0, len: 0 }
        );
        assert_eq!(
            read_varint(&[0x01], 1).unwrap_err(),
            ScanError::OutOfBounds { offset: 1, len: 1 }
        );
    }

    #[test]
    fn varint_truncated() {
        // Continuation bit never drops within the cap.
        let run = [0x80, 0x80, 0x80, 0x80, 0x80, 0x00];
        assert_eq!(read_varint(&run, 0).unwrap_err(), ScanError::TruncatedVarint { offset: 0 });
        // Buffer ends mid-varint.
        assert_eq!(read_varint(&[0x80], 0).unwrap_err(), ScanError::TruncatedVarint { offset: 0 });
    }

    #[test]
    fn tag_valid_wire_types() {
        let (tag, n) = read_tag(&[0x08], 0).unwrap(); // field 1, varint
        assert_eq!((tag.field, tag.wire_type, n), (1, WireType::Varint, 1));
        let (tag, _) = read_tag(&[0x12], 0).unwrap(); // field 2, length-delimited
        assert_eq!((tag.field, tag.wire_type), (2, WireType::LengthDelimited));
        let (tag, _) = read_tag(&[0x19], 0).unwrap(); // field 3, fixed64
        assert_eq!((tag.field, tag.wire_type), (3, WireType::Fixed64));
        let (tag, _) = read_tag(&[0x25], 0).unwrap(); // field 4, fixed32
        assert_eq!((tag.field, tag.wire_type), (4, WireType::Fixed32));
    }

    #[test]
    fn tag_rejects_group_and_corruption_bits() {
        for bits in [3u8, 4, 6, 7] {
            let byte = (1 << 3) | bits;
            assert_eq!(
                read_tag(&[byte], 0).unwrap_err(),
                ScanError::InvalidWireType { bits, offset: 0 }
            );
        }
    }

    #[test]
    fn plausible_tag_window() {
        assert!(is_plausible_tag(0x0A, 15)); // field 1
        assert!(is_plausible_tag(0x78, 15)); // field 15
        assert!(!is_plausible_tag(0x02, 15)); // field 0
        assert!(!is_plausible_tag(0x0F, 15)); // wire type 7
        assert!(!is_plausible_tag(0x52, 8)); // field 10 above cap
    }

    #[test]
    fn skip_each_wire_type() {
        let buf = [0xAC, 0x02, 0xFF]; // varint then junk
        assert_eq!(skip_field(&buf, 0, WireType::Varint).unwrap(), 2);

        let buf = [0u8; 12];
        assert_eq!(skip_field(&buf, 0, WireType::Fixed64).unwrap(), 8);
        assert_eq!(skip_field(&buf, 0, WireType::Fixed32).unwrap(), 4);

        let buf = [0x03, b'a', b'b', b'c', 0xFF];
        assert_eq!(skip_field(&buf, 0, WireType::LengthDelimited).unwrap(), 4);
    }

    #[test]
    fn skip_overruns_are_errors() {
        let buf = [0u8; 6];
        assert!(matches!(
            skip_field(&buf, 0, WireType::Fixed64),
            Err(ScanError::FieldOverrun { need: 8, .. })
        ));
        let buf = [0x09, b'x']; // claims 9 bytes, has 1
        assert!(matches!(
            skip_field(&buf, 0, WireType::LengthDelimited),
            Err(ScanError::FieldOverrun { need: 9, have: 1, .. })
        ));
    }

    #[test]
    fn len_slice_returns_body() {
        let buf = [0x03, b'a', b'n', b'a', 0x08];
        let (body, next) = read_len_slice(&buf, 0).unwrap();
        assert_eq!(body, b"ana");
        assert_eq!(next, 4);
    }
}
