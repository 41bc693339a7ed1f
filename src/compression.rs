//! Gzip handling for flag-1 frames

use crate::MAX_DECOMPRESSED_SIZE_BYTES;
use flate2::read::GzDecoder;
use std::io::Read as _;

/// Compress data to gzip at a fixed level.
///
/// Exists for building flag-1 frames (and test fixtures); the decode path
/// only ever decompresses.
pub fn compress_gzip(data: &[u8]) -> Vec<u8> {
    use flate2::{Compression, write::GzEncoder};
    use std::io::Write as _;

    // Assume ~50% ratio plus the fixed gzip overhead.
    let estimated = data.len() / 2 + 18;
    let mut encoder = GzEncoder::new(Vec::with_capacity(estimated), Compression::new(6));

    // Writing to a Vec cannot fail.
    encoder.write_all(data).and_then(|()| encoder.finish()).unwrap_or_default()
}

/// Decompress gzip data, or `None` when the bytes are not a credible gzip
/// stream. Failure here is always recoverable: the caller scans the raw
/// bytes instead.
///
/// # Minimum gzip layout
///
/// ```text
/// +----------+-------------+----------+
/// | header   | DEFLATE     | footer   |
/// | 10 bytes | 2+ bytes    | 8 bytes  |
/// +----------+-------------+----------+
/// ```
///
/// The ISIZE footer field is checked against
/// [`MAX_DECOMPRESSED_SIZE_BYTES`] before any inflation happens, so a
/// decompression bomb is rejected without allocating.
pub fn decompress_gzip(data: &[u8]) -> Option<Vec<u8>> {
    // Smallest valid gzip stream: 10-byte header + 2 data bytes + 8-byte footer.
    if data.len() < 20 {
        return None;
    }

    // Magic number 0x1f 0x8b, compression method 0x08 (DEFLATE).
    if data[0] != 0x1f || data[1] != 0x8b || data[2] != 0x08 {
        return None;
    }

    // ISIZE: original length mod 2^32, little-endian, last 4 bytes.
    let tail: [u8; 4] = data[data.len() - 4..].try_into().ok()?;
    let capacity = u32::from_le_bytes(tail) as usize;
    if capacity > MAX_DECOMPRESSED_SIZE_BYTES {
        return None;
    }

    let mut decoder = GzDecoder::new(data);
    let mut decompressed = Vec::with_capacity(capacity);
    decoder.read_to_end(&mut decompressed).ok()?;

    Some(decompressed)
}
