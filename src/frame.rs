//! Frame and trailer extraction
//!
//! Locates the message payload and the status trailer inside a raw response
//! buffer whose header cannot be taken at face value.
//!
//! # Frame format
//!
//! ```text
//! +------+----------+----------------+---------------------------+
//! | flag | length   | payload        | trailer (optional)        |
//! | 1B   | 4B (BE)  | length bytes   | 0x80 + 4B (BE) + text     |
//! +------+----------+----------------+---------------------------+
//! ```
//!
//! - `flag`: 0 = plain, 1 = gzip; anything else is an anomaly
//! - `length`: declared payload length, which may disagree with reality
//! - trailer text: ASCII `key: value\r\n` pairs running to the buffer end
//!
//! Extraction never fails. It always returns a slice with
//! `start < end <= buffer_len` (or the empty slice for an empty buffer),
//! plus a confidence flag and the signals that lowered it.

use crate::config::DecoderConfig;
use crate::error::ScanError;
use serde::Serialize;

/// Frame header length: flag byte plus big-endian u32 payload length.
pub const HEADER_LEN: usize = 5;

/// Leading byte of a trailer frame.
pub const TRAILER_MARKER: u8 = 0x80;

/// Parsed 5-byte frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Header {
    pub flag: u8,
    pub declared_len: u32,
}

impl Header {
    /// Payload end position implied by the declared length alone.
    #[inline]
    pub const fn naive_end(&self) -> usize {
        HEADER_LEN + self.declared_len as usize
    }

    /// Whether the flag byte is one of the two values the protocol defines.
    #[inline]
    pub const fn flag_is_known(&self) -> bool {
        self.flag <= 1
    }

    /// Whether the flag marks a gzip payload.
    #[inline]
    pub const fn is_compressed(&self) -> bool {
        self.flag == 1
    }
}

/// Located trailer frame with its parsed metadata pairs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Trailer {
    /// Offset of the 0x80 marker byte.
    pub offset: usize,
    pub declared_len: u32,
    /// `key: value` pairs, e.g. `grpc-status` / `grpc-message`.
    pub entries: Vec<(String, String)>,
}

/// How much the extractor trusts its payload window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    /// Header and trailer agree; the declared length is believable.
    High,
    /// Something disagreed; boundary heuristics should weigh in.
    Low,
}

/// Result of locating the payload window inside a buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    /// `None` when the buffer is too short to carry a header.
    pub header: Option<Header>,
    pub trailer: Option<Trailer>,
    /// Payload window, `start < end <= buffer_len` unless the buffer is empty.
    pub start: usize,
    pub end: usize,
    pub confidence: Confidence,
    /// Everything that lowered confidence, in the order observed.
    pub signals: Vec<ScanError>,
}

/// Locate the payload window. Infallible by construction: malformed input
/// lowers confidence and adds signals but always yields a best-effort slice.
pub fn extract(buffer: &[u8], config: &DecoderConfig) -> Extraction {
    let len = buffer.len();

    if len < HEADER_LEN {
        // Too short for a header: the whole buffer is the payload candidate.
        return Extraction {
            header: None,
            trailer: None,
            start: 0,
            end: len,
            confidence: Confidence::Low,
            signals: vec![ScanError::ShortBuffer { len }],
        };
    }

    let header = Header {
        flag: buffer[0],
        declared_len: u32::from_be_bytes([buffer[1], buffer[2], buffer[3], buffer[4]]),
    };

    let mut signals = Vec::new();
    let mut confidence = Confidence::High;
    if !header.flag_is_known() {
        signals.push(ScanError::InvalidHeaderFlag { flag: header.flag });
        confidence = Confidence::Low;
    }

    let trailer = find_trailer(buffer, HEADER_LEN, config);
    let naive_end = header.naive_end();
    let declared_fits = naive_end <= len;

    let end = match (&trailer, declared_fits) {
        // Declared length is consistent: it fits, and the trailer (when
        // present) starts at or after where the payload ends.
        (Some(t), true) if naive_end <= t.offset => naive_end,
        (None, true) => {
            // Believable length but nothing to corroborate it.
            confidence = Confidence::Low;
            naive_end
        }
        // Trailer contradicts the declared length; the trailer position is
        // the more trustworthy of the two.
        (Some(t), _) => {
            signals.push(ScanError::LengthMismatch {
                declared: header.declared_len,
                available: t.offset - HEADER_LEN,
            });
            confidence = Confidence::Low;
            t.offset
        }
        // Declared length overruns the buffer and no trailer exists: use
        // the bytes that are actually present and let the record scan drop
        // whatever is truncated.
        (None, false) => {
            signals.push(ScanError::LengthMismatch {
                declared: header.declared_len,
                available: len - HEADER_LEN,
            });
            confidence = Confidence::Low;
            len
        }
    };

    let (start, end) = clamp_window(HEADER_LEN, end, len);

    Extraction { header: Some(header), trailer, start, end, confidence, signals }
}

/// Force `start < end <= len`, substituting a minimal non-empty slice when
/// reconciliation produced an empty or inverted range.
pub(crate) fn clamp_window(start: usize, end: usize, len: usize) -> (usize, usize) {
    debug_assert!(len > 0);
    let end = end.min(len).max(1);
    let start = start.min(end - 1);
    (start, end)
}

/// Scan forward from `from` for a credible trailer frame: the 0x80 marker, a
/// small big-endian length claim, and bytes that read as ASCII `key: value`
/// metadata. Returns `None` when nothing in the buffer qualifies.
pub fn find_trailer(buffer: &[u8], from: usize, config: &DecoderConfig) -> Option<Trailer> {
    let len = buffer.len();
    let mut i = from;
    while i + HEADER_LEN <= len {
        if buffer[i] == TRAILER_MARKER {
            let declared_len =
                u32::from_be_bytes([buffer[i + 1], buffer[i + 2], buffer[i + 3], buffer[i + 4]]);
            let body = &buffer[i + HEADER_LEN..];
            // A truncated trailer may claim more than remains; judge what is
            // actually there.
            let take = (declared_len as usize).min(body.len());
            let text = &body[..take];
            if declared_len < config.max_trailer_len && looks_like_metadata(text) {
                return Some(Trailer {
                    offset: i,
                    declared_len,
                    entries: parse_entries(text),
                });
            }
        }
        i += 1;
    }
    None
}

/// Printable-ASCII `key: value` shape check: at least one separator and no
/// bytes outside text range.
fn looks_like_metadata(bytes: &[u8]) -> bool {
    bytes.len() >= 3
        && bytes.contains(&b':')
        && bytes.iter().all(|&b| (0x20..0x7F).contains(&b) || b == b'\r' || b == b'\n' || b == b'\t')
}

fn parse_entries(bytes: &[u8]) -> Vec<(String, String)> {
    // Validated as ASCII by the caller, so lossy conversion is exact here.
    String::from_utf8_lossy(bytes)
        .lines()
        .filter_map(|line| {
            let (key, value) = line.split_once(':')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            Some((key.to_owned(), value.trim().to_owned()))
        })
        .collect()
}
