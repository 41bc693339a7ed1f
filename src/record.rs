//! Record decoding against the fixed field schema
//!
//! Walks a payload window and decodes every occurrence of the repeated
//! top-level collection field into a typed [`Record`]. Unknown fields are
//! skipped, malformed text is substituted, and any wire-type or length
//! violation truncates the scan in place: records already decoded are always
//! returned, the fault is only reported.

use crate::config::DecoderConfig;
use crate::error::ScanError;
use crate::wire::{self, Tag, WireType};
use serde::Serialize;
use std::collections::BTreeMap;

/// Record schema, field numbers on the wire.
const FIELD_ID: u32 = 1;
const FIELD_NAME: u32 = 2;
const FIELD_CREATED_AT: u32 = 3;
const FIELD_DISPLAY_NAME: u32 = 4;

/// Nested timestamp field numbers.
const TS_SECONDS: u32 = 1;
const TS_NANOS: u32 = 2;

/// Creation timestamp, two nested varints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Timestamp {
    pub seconds: i64,
    pub nanos: i32,
}

/// One decoded sub-message of the top-level collection.
///
/// `id` keeps the full unsigned 64-bit range; narrowing it is exactly the
/// kind of lossy shortcut this decoder exists to avoid.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Record {
    pub id: u64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Optional text attributes at field numbers above the fixed schema,
    /// keyed by field number.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<u32, String>,
}

/// Outcome of one payload walk.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DecodedRecords {
    /// Records in wire order.
    pub records: Vec<Record>,
    /// Offset at which a violation stopped the scan, if any.
    pub truncated_at: Option<usize>,
    /// The violation itself. `None` means the scan consumed the window.
    pub last_error: Option<ScanError>,
}

/// Decode every collection-field sub-message in `payload`.
pub fn decode_records(payload: &[u8], config: &DecoderConfig) -> DecodedRecords {
    let mut out = DecodedRecords::default();
    let mut offset = 0;

    while offset < payload.len() {
        let (tag, tag_len) = match wire::read_tag(payload, offset) {
            Ok(x) => x,
            Err(e) => return out.truncate(offset, e),
        };

        if tag.field == config.collection_field && tag.wire_type == WireType::LengthDelimited {
            let (body, next) = match wire::read_len_slice(payload, offset + tag_len) {
                Ok(x) => x,
                Err(e) => return out.truncate(offset, e),
            };
            // A sub-message with none of the known fields is noise that
            // happened to look like a tag, not a record.
            if let Some(record) = decode_one(body) {
                out.records.push(record);
            }
            offset = next;
        } else {
            match wire::skip_field(payload, offset + tag_len, tag.wire_type) {
                Ok(next) => offset = next,
                Err(e) => return out.truncate(offset, e),
            }
        }
    }

    out
}

impl DecodedRecords {
    fn truncate(mut self, offset: usize, error: ScanError) -> Self {
        tracing::trace!(offset, %error, kept = self.records.len(), "record scan truncated");
        self.truncated_at = Some(offset);
        self.last_error = Some(error);
        self
    }
}

/// Decode one record body. Violations truncate this record's own scan;
/// whatever was decoded before the fault is kept.
fn decode_one(body: &[u8]) -> Option<Record> {
    let mut record = Record::default();
    let mut seen = 0usize;
    let mut offset = 0;

    while offset < body.len() {
        let Ok((tag, tag_len)) = wire::read_tag(body, offset) else { break };
        offset += tag_len;

        match (tag.field, tag.wire_type) {
            (FIELD_ID, WireType::Varint) => {
                let Ok((value, n)) = wire::read_varint(body, offset) else { break };
                record.id = value;
                offset += n;
                seen += 1;
            }
            (FIELD_NAME, WireType::LengthDelimited) => {
                let Ok((text, next)) = wire::read_len_slice(body, offset) else { break };
                record.name = lossy_text(text);
                offset = next;
                seen += 1;
            }
            (FIELD_CREATED_AT, WireType::LengthDelimited) => {
                let Ok((nested, next)) = wire::read_len_slice(body, offset) else { break };
                record.created_at = Some(decode_timestamp(nested));
                offset = next;
                seen += 1;
            }
            (FIELD_DISPLAY_NAME, WireType::LengthDelimited) => {
                let Ok((text, next)) = wire::read_len_slice(body, offset) else { break };
                record.display_name = Some(lossy_text(text));
                offset = next;
                seen += 1;
            }
            (field, WireType::LengthDelimited) if field > FIELD_DISPLAY_NAME => {
                let Ok((text, next)) = wire::read_len_slice(body, offset) else { break };
                record.attributes.insert(field, lossy_text(text));
                offset = next;
                seen += 1;
            }
            (_, wire_type) => {
                // Unknown field: consume by wire type and keep walking.
                let Ok(next) = wire::skip_field(body, offset, wire_type) else { break };
                offset = next;
            }
        }
    }

    (seen > 0).then_some(record)
}

fn decode_timestamp(body: &[u8]) -> Timestamp {
    let mut ts = Timestamp::default();
    let mut offset = 0;

    while offset < body.len() {
        let Ok((Tag { field, wire_type }, tag_len)) = wire::read_tag(body, offset) else { break };
        offset += tag_len;
        match (field, wire_type) {
            (TS_SECONDS, WireType::Varint) => {
                let Ok((value, n)) = wire::read_varint(body, offset) else { break };
                ts.seconds = value as i64;
                offset += n;
            }
            (TS_NANOS, WireType::Varint) => {
                let Ok((value, n)) = wire::read_varint(body, offset) else { break };
                ts.nanos = value as i32;
                offset += n;
            }
            (_, wire_type) => {
                let Ok(next) = wire::skip_field(body, offset, wire_type) else { break };
                offset = next;
            }
        }
    }

    ts
}

/// UTF-8 in substitution mode: one bad sequence maps to U+FFFD instead of
/// aborting the surrounding record.
#[inline]
fn lossy_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> DecoderConfig {
        DecoderConfig::default()
    }

    /// field 1 = id, field 2 = name, hand-assembled.
    fn record_bytes(id: u8, name: &str) -> Vec<u8> {
        let mut body = vec![0x08, id, 0x12, name.len() as u8];
        body.extend_from_slice(name.as_bytes());
        body
    }

    fn wrap(bodies: &[Vec<u8>]) -> Vec<u8> {
        let mut payload = Vec::new();
        for body in bodies {
            payload.push(0x0A); // field 1, length-delimited
            payload.push(body.len() as u8);
            payload.extend_from_slice(body);
        }
        payload
    }

    #[test]
    fn decodes_id_and_name() {
        let payload = wrap(&[record_bytes(1, "ana")]);
        let out = decode_records(&payload, &cfg());
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].id, 1);
        assert_eq!(out.records[0].name, "ana");
        assert_eq!(out.last_error, None);
    }

    #[test]
    fn decodes_full_schema() {
        // id 7, name "bo", created_at {seconds 1700000000, nanos 5},
        // display_name "Bo", attribute 6 = "admin"
        let mut body = vec![0x08, 0x07];
        body.extend_from_slice(&[0x12, 0x02, b'b', b'o']);
        let mut ts = vec![0x08];
        ts.extend_from_slice(&[0x80, 0xE2, 0xCF, 0xAA, 0x06]); // 1700000000
        ts.extend_from_slice(&[0x10, 0x05]);
        body.push(0x1A);
        body.push(ts.len() as u8);
        body.extend_from_slice(&ts);
        body.extend_from_slice(&[0x22, 0x02, b'B', b'o']);
        body.extend_from_slice(&[0x32, 0x05, b'a', b'd', b'm', b'i', b'n']);

        let payload = wrap(&[body]);
        let out = decode_records(&payload, &cfg());
        assert_eq!(out.records.len(), 1);
        let record = &out.records[0];
        assert_eq!(record.id, 7);
        assert_eq!(record.name, "bo");
        assert_eq!(record.created_at, Some(Timestamp { seconds: 1_700_000_000, nanos: 5 }));
        assert_eq!(record.display_name.as_deref(), Some("Bo"));
        assert_eq!(record.attributes.get(&6).map(String::as_str), Some("admin"));
    }

    #[test]
    fn order_preserved() {
        let payload = wrap(&[record_bytes(1, "a"), record_bytes(2, "b"), record_bytes(3, "c")]);
        let out = decode_records(&payload, &cfg());
        let ids: Vec<u64> = out.records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn unknown_fields_skipped_not_fatal() {
        // Record body with an unknown fixed32 (field 9) and fixed64 (field 10)
        // sandwiched between known fields.
        let mut body = vec![0x08, 0x02];
        body.extend_from_slice(&[0x4D, 0xDE, 0xAD, 0xBE, 0xEF]); // field 9, fixed32
        body.extend_from_slice(&[0x51, 0, 0, 0, 0, 0, 0, 0, 0]); // field 10, fixed64
        body.extend_from_slice(&[0x12, 0x02, b'z', b'u']);
        let payload = wrap(&[body]);

        let out = decode_records(&payload, &cfg());
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].id, 2);
        assert_eq!(out.records[0].name, "zu");
    }

    #[test]
    fn unknown_top_level_field_skipped() {
        let mut payload = vec![0x10, 0x2A]; // field 2 varint at top level
        payload.extend_from_slice(&wrap(&[record_bytes(4, "d")]));
        let out = decode_records(&payload, &cfg());
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].id, 4);
    }

    #[test]
    fn corruption_truncates_but_keeps_records() {
        let mut payload = wrap(&[record_bytes(1, "a"), record_bytes(2, "b")]);
        payload.push(0x0F); // wire type 7: boundary marker, not a field
        payload.extend_from_slice(b"garbage after the valid data");
        let truncation_offset = payload.len() - 29;

        let out = decode_records(&payload, &cfg());
        assert_eq!(out.records.len(), 2);
        assert_eq!(out.truncated_at, Some(truncation_offset));
        assert!(matches!(out.last_error, Some(ScanError::InvalidWireType { bits: 7, .. })));
    }

    #[test]
    fn partial_trailing_record_dropped() {
        let mut payload = wrap(&[record_bytes(1, "a")]);
        // A second record whose declared length overruns the buffer.
        payload.extend_from_slice(&[0x0A, 0x30, 0x08, 0x02]);
        let out = decode_records(&payload, &cfg());
        assert_eq!(out.records.len(), 1);
        assert!(matches!(out.last_error, Some(ScanError::FieldOverrun { .. })));
    }

    #[test]
    fn invalid_utf8_substituted() {
        let mut body = vec![0x08, 0x01];
        body.extend_from_slice(&[0x12, 0x04, b'a', 0xFF, 0xFE, b'z']);
        let payload = wrap(&[body]);
        let out = decode_records(&payload, &cfg());
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].name, "a\u{FFFD}\u{FFFD}z");
    }

    #[test]
    fn empty_submessage_not_counted() {
        let payload = vec![0x0A, 0x00];
        let out = decode_records(&payload, &cfg());
        assert!(out.records.is_empty());
        assert_eq!(out.last_error, None);
    }

    #[test]
    fn id_keeps_wide_values() {
        // id = 2^34, a value a 32-bit narrowing would destroy.
        let mut body = vec![0x08];
        body.extend_from_slice(&[0x80, 0x80, 0x80, 0x80, 0x40]);
        let payload = wrap(&[body]);
        let out = decode_records(&payload, &cfg());
        assert_eq!(out.records[0].id, 1u64 << 34);
    }
}
