//! Best-effort record extraction from partially trustworthy gRPC-Web buffers
//!
//! Decodes typed records out of raw response buffers whose framing and schema
//! cannot be taken at face value: declared lengths may disagree with the bytes
//! actually present, trailers may be missing or mangled, and unrelated
//! corruption may follow the valid data. The engine never raises on malformed
//! input; every buffer yields records plus a diagnostic, or an exhaustion
//! report carrying enough context to debug the proxy that produced it.
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
//! - `flag`: `0` = plain, `1` = gzip compressed; anything else is treated as
//!   an anomaly and recovery kicks in
//! - `length`: declared payload length, trusted only when the trailer
//!   position corroborates it
//! - payload: repeated length-delimited sub-messages, one record each
//!
//! # Example
//!
//! ```
//! use grpc_salvage::SalvageDecoder;
//!
//! // flag 0, declared length 9, one {id: 1, name: "ana"} record
//! let mut buffer = vec![0x00, 0x00, 0x00, 0x00, 0x09];
//! buffer.extend_from_slice(&[0x0A, 0x07, 0x08, 0x01, 0x12, 0x03, b'a', b'n', b'a']);
//!
//! let report = SalvageDecoder::new().decode(&buffer);
//! assert_eq!(report.records.len(), 1);
//! assert_eq!(report.records[0].id, 1);
//! assert_eq!(report.records[0].name, "ana");
//! ```
//!
//! The engine is a pure function over its input buffer: no shared state, no
//! background work, safe to call concurrently on independent buffers.

pub mod boundary;
mod compression;
pub mod config;
pub mod diagnostics;
mod decoder;
pub mod error;
pub mod frame;
pub mod record;
pub mod wire;

pub use boundary::Origin;
pub use compression::{compress_gzip, decompress_gzip};
pub use config::DecoderConfig;
pub use decoder::{DecodeReport, Diagnostic, Phase, SalvageDecoder};
pub use diagnostics::{DiagnosticsReport, Finding};
pub use error::{DecodeExhausted, ScanError};
pub use frame::{Confidence, Header, Trailer, HEADER_LEN, TRAILER_MARKER};
pub use record::{Record, Timestamp};

/// Maximum decompressed message size (4 MiB).
///
/// Aligned with the gRPC default max message size; bounds what a hostile
/// flag-1 frame can make the decoder allocate.
pub const MAX_DECOMPRESSED_SIZE_BYTES: usize = 0x400000;
