//! Operator troubleshooting views
//!
//! Renders a buffer three ways: a classic 16-byte-per-row hex dump, a plain
//! ASCII projection, and a list of structural findings (header, trailer,
//! payload window, corruption markers, record yield). Rendering never decodes
//! anything it cannot prove; it reuses the same extraction and record scan
//! the engine runs.

use crate::boundary;
use crate::config::DecoderConfig;
use crate::frame::{self, Confidence};
use crate::record;
use serde::Serialize;

const BYTES_PER_ROW: usize = 16;
const HEX_CHARS: &[u8; 16] = b"0123456789abcdef";

/// One structural observation about a buffer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Finding {
    /// Buffer cannot carry a frame header.
    ShortBuffer { len: usize },
    /// Parsed 5-byte header and whether its length claim fits the buffer.
    Header { flag: u8, declared_len: u32, naive_end: usize, fits: bool },
    /// Located trailer frame.
    Trailer { offset: usize, declared_len: u32, entries: Vec<(String, String)> },
    /// No credible trailer anywhere in the buffer.
    TrailerMissing,
    /// Payload window the extractor settled on.
    PayloadWindow { start: usize, end: usize, confidence: Confidence },
    /// First wire-type-6/7 byte inside the payload window.
    CorruptionMarker { offset: usize, bits: u8 },
    /// What a record scan of the payload window yields.
    RecordYield { count: usize, truncated_at: Option<usize> },
}

/// Rendered diagnostics for one buffer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticsReport {
    /// `offset  hex bytes  |ascii|` rows.
    pub hex_dump: String,
    /// The buffer as printable ASCII, non-printables as `.`.
    pub ascii_view: String,
    pub findings: Vec<Finding>,
}

/// Render all three views.
pub fn render(buffer: &[u8], config: &DecoderConfig) -> DiagnosticsReport {
    DiagnosticsReport {
        hex_dump: hex_dump(buffer),
        ascii_view: ascii_view(buffer),
        findings: findings(buffer, config),
    }
}

fn findings(buffer: &[u8], config: &DecoderConfig) -> Vec<Finding> {
    let extraction = frame::extract(buffer, config);
    let mut out = Vec::new();

    match extraction.header {
        None => out.push(Finding::ShortBuffer { len: buffer.len() }),
        Some(header) => out.push(Finding::Header {
            flag: header.flag,
            declared_len: header.declared_len,
            naive_end: header.naive_end(),
            fits: header.naive_end() <= buffer.len(),
        }),
    }

    match &extraction.trailer {
        Some(trailer) => out.push(Finding::Trailer {
            offset: trailer.offset,
            declared_len: trailer.declared_len,
            entries: trailer.entries.clone(),
        }),
        None if extraction.header.is_some() => out.push(Finding::TrailerMissing),
        None => {}
    }

    if extraction.start < extraction.end {
        out.push(Finding::PayloadWindow {
            start: extraction.start,
            end: extraction.end,
            confidence: extraction.confidence,
        });

        if let Some(offset) = boundary::scan_corruption(buffer, extraction.start, extraction.end) {
            out.push(Finding::CorruptionMarker { offset, bits: buffer[offset] & 0x07 });
        }

        let decoded = record::decode_records(&buffer[extraction.start..extraction.end], config);
        out.push(Finding::RecordYield {
            count: decoded.records.len(),
            truncated_at: decoded.truncated_at.map(|o| extraction.start + o),
        });
    }

    out
}

fn hex_dump(buffer: &[u8]) -> String {
    // Per row: 8 offset chars + 2 + 48 hex chars + 2 + ascii + newline.
    let rows = buffer.len().div_ceil(BYTES_PER_ROW).max(1);
    let mut out = String::with_capacity(rows * (8 + 2 + BYTES_PER_ROW * 3 + 3 + BYTES_PER_ROW));

    if buffer.is_empty() {
        out.push_str("00000000\n");
        return out;
    }

    for (row, chunk) in buffer.chunks(BYTES_PER_ROW).enumerate() {
        push_offset(&mut out, row * BYTES_PER_ROW);
        out.push_str("  ");
        for i in 0..BYTES_PER_ROW {
            match chunk.get(i) {
                Some(&b) => {
                    out.push(HEX_CHARS[(b >> 4) as usize] as char);
                    out.push(HEX_CHARS[(b & 0x0F) as usize] as char);
                }
                None => out.push_str("  "),
            }
            out.push(' ');
        }
        out.push('|');
        for &b in chunk {
            out.push(printable(b));
        }
        out.push('|');
        out.push('\n');
    }

    out
}

fn ascii_view(buffer: &[u8]) -> String {
    buffer.iter().map(|&b| printable(b)).collect()
}

#[inline]
fn printable(b: u8) -> char {
    if (0x20..0x7F).contains(&b) { b as char } else { '.' }
}

fn push_offset(out: &mut String, offset: usize) {
    let mut digits = [b'0'; 8];
    let mut rest = offset;
    for d in digits.iter_mut().rev() {
        *d = HEX_CHARS[rest & 0x0F];
        rest >>= 4;
    }
    // digits are ASCII hex by construction
    out.push_str(core::str::from_utf8(&digits).unwrap_or("00000000"));
}
