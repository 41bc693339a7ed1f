//! Boundary heuristics: alternate payload windows for low-confidence frames
//!
//! When the primary extraction cannot be trusted (unexpected flag, missing
//! trailer, contradictory declared length), these generators produce
//! alternative payload windows in a fixed order. Each generator is pure; none
//! of them decides anything. The decoder validates every candidate the same
//! way: a window is only ever accepted after the record scan pulls at least
//! one record out of it.

use crate::config::DecoderConfig;
use crate::frame::{Extraction, HEADER_LEN};
use crate::wire::{self, WireType};
use serde::Serialize;

/// Where a candidate window came from. Recorded in the diagnostic so an
/// operator can see which strategy ended up matching a given proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// The window the frame extractor reconciled from header and trailer.
    Primary,
    /// Anchored at the first plausible field tag past the header.
    TagScan,
    /// Ends at the first wire-type-6/7 byte after the anchor.
    CorruptionScan,
    /// One of the conventional header-skip offsets.
    FixedOffset,
    /// Buffer end minus the trailer margin, tried when no trailer exists.
    MarginTrim,
    /// The whole buffer, no header skip.
    RawBuffer,
    /// One of the fallback header skips.
    HeaderSkip,
    /// Restart at an arbitrary offset that reads as a top-level tag.
    FullScan,
}

/// One payload window to hand to the record scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub start: usize,
    pub end: usize,
    pub origin: Origin,
}

impl Candidate {
    #[inline]
    fn new(start: usize, end: usize, origin: Origin) -> Option<Self> {
        (start < end).then_some(Self { start, end, origin })
    }

    #[inline]
    pub fn slice<'b>(&self, buffer: &'b [u8]) -> &'b [u8] {
        &buffer[self.start..self.end]
    }
}

/// First offset at or past `from` whose byte decodes as a plausible field
/// tag: valid wire type, field number in range.
pub fn scan_tag_start(buffer: &[u8], from: usize, config: &DecoderConfig) -> Option<usize> {
    (from..buffer.len()).find(|&i| wire::is_plausible_tag(buffer[i], config.max_field_number))
}

/// First offset in `anchor..end` whose low tag bits read as wire type 6
/// or 7. Those bit patterns are never legal fields, so the first one is a
/// reasonable guess at where the valid data stops.
pub fn scan_corruption(buffer: &[u8], anchor: usize, end: usize) -> Option<usize> {
    let end = end.min(buffer.len());
    (anchor..end).find(|&i| matches!(buffer[i] & 0x07, 6 | 7))
}

/// Ordered heuristic windows for a low-confidence extraction.
pub fn heuristic_candidates(
    buffer: &[u8],
    extraction: &Extraction,
    config: &DecoderConfig,
) -> Vec<Candidate> {
    let len = buffer.len();
    // When a trailer was found it bounds every window that does not pick
    // its own end.
    let default_end = extraction.trailer.as_ref().map_or(len, |t| t.offset);
    let mut out = Vec::new();

    // (a) Anchor the start at the first plausible tag past the header.
    let anchor = scan_tag_start(buffer, HEADER_LEN.min(len), config);
    if let Some(start) = anchor {
        out.extend(Candidate::new(start, default_end, Origin::TagScan));

        // (b) From the anchor, bound the end at the first corruption marker.
        if let Some(end) = scan_corruption(buffer, start, default_end) {
            out.extend(Candidate::new(start, end, Origin::CorruptionScan));
        }
    }

    // (c) Conventional header-skip offsets.
    for &skip in &config.header_skips {
        out.extend(Candidate::new(skip, default_end, Origin::FixedOffset));
    }

    // (d) Last resort when no trailer exists anywhere: trim a fixed margin
    // off the end in case an unrecognized trailer is hiding there.
    if extraction.trailer.is_none() {
        let start = anchor.unwrap_or(HEADER_LEN.min(len));
        out.extend(Candidate::new(start, len.saturating_sub(config.trailer_margin), Origin::MarginTrim));
    }

    out
}

/// Fallback windows, tried only after the primary path and the heuristics
/// all produced zero records.
pub fn fallback_candidates(
    buffer: &[u8],
    extraction: &Extraction,
    config: &DecoderConfig,
) -> Vec<Candidate> {
    let len = buffer.len();
    let default_end = extraction.trailer.as_ref().map_or(len, |t| t.offset);
    let mut out = Vec::new();

    // (1) The raw buffer, in case there was never a header at all.
    out.extend(Candidate::new(0, len, Origin::RawBuffer));

    // (2) Fixed header skips.
    for &skip in &config.fallback_skips {
        out.extend(Candidate::new(skip, default_end, Origin::HeaderSkip));
    }

    // (3) Every heuristic window, regardless of confidence.
    out.extend(heuristic_candidates(buffer, extraction, config));

    // (4) Full scan: restart wherever a byte reads as the top-level
    // collection tag itself.
    let top_tag = ((config.collection_field << 3) | WireType::LengthDelimited as u32) as u8;
    for offset in 0..len {
        if buffer[offset] == top_tag {
            out.extend(Candidate::new(offset, default_end.max(offset + 1), Origin::FullScan));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame;

    fn cfg() -> DecoderConfig {
        DecoderConfig::default()
    }

    fn extraction_for(buffer: &[u8]) -> Extraction {
        frame::extract(buffer, &cfg())
    }

    #[test]
    fn tag_scan_finds_first_plausible_byte() {
        // Offsets 5..7 are implausible (wire type 7, field 0), offset 7 is
        // a field-1 length-delimited tag.
        let buffer = [0u8, 0, 0, 0, 4, 0x0F, 0x02, 0x0A, 0x02, 0x08, 0x01];
        assert_eq!(scan_tag_start(&buffer, 5, &cfg()), Some(7));
    }

    #[test]
    fn corruption_scan_stops_at_marker() {
        let buffer = [0x0A, 0x02, 0x08, 0x01, 0x0F, 0xFF];
        assert_eq!(scan_corruption(&buffer, 0, buffer.len()), Some(4));
    }

    #[test]
    fn heuristics_are_ordered() {
        // Low-confidence buffer: bad flag, no trailer, corrupt tail.
        let mut buffer = vec![9u8, 0, 0, 0, 2, 0x0A, 0x02, 0x08, 0x01];
        buffer.extend_from_slice(&[0xFF; 30]);
        let ex = extraction_for(&buffer);
        let candidates = heuristic_candidates(&buffer, &ex, &cfg());

        assert_eq!(candidates[0].origin, Origin::TagScan);
        assert_eq!(candidates[0].start, 5);
        // The corrupt tail starts at offset 9.
        assert_eq!(candidates[1], Candidate { start: 5, end: 9, origin: Origin::CorruptionScan });
        assert!(candidates.iter().any(|c| c.origin == Origin::FixedOffset));
        // Margin trim last, because no trailer was found.
        assert_eq!(candidates.last().unwrap().origin, Origin::MarginTrim);
        // Every window is well-formed.
        assert!(candidates.iter().all(|c| c.start < c.end && c.end <= buffer.len()));
    }

    #[test]
    fn margin_trim_absent_when_trailer_found() {
        let mut buffer = vec![0u8, 0, 0, 0, 60, 0x0A, 0x02, 0x08, 0x01];
        buffer.push(frame::TRAILER_MARKER);
        buffer.extend_from_slice(&16u32.to_be_bytes());
        buffer.extend_from_slice(b"grpc-status: 0\r\n");
        let ex = extraction_for(&buffer);
        assert!(ex.trailer.is_some());

        let candidates = heuristic_candidates(&buffer, &ex, &cfg());
        assert!(candidates.iter().all(|c| c.origin != Origin::MarginTrim));
        // Trailer bounds the default end.
        assert!(candidates.iter().all(|c| c.origin == Origin::CorruptionScan || c.end == 9));
    }

    #[test]
    fn fallback_starts_with_raw_buffer() {
        let buffer = [0x0A, 0x02, 0x08, 0x01];
        let ex = extraction_for(&buffer);
        let candidates = fallback_candidates(&buffer, &ex, &cfg());
        assert_eq!(candidates[0], Candidate { start: 0, end: 4, origin: Origin::RawBuffer });
    }

    #[test]
    fn full_scan_targets_collection_tag_bytes() {
        // 0x0A appears at offsets 2 and 5.
        let buffer = [0xFF, 0xFF, 0x0A, 0x02, 0x08, 0x0A];
        let ex = extraction_for(&buffer);
        let scans: Vec<_> = fallback_candidates(&buffer, &ex, &cfg())
            .into_iter()
            .filter(|c| c.origin == Origin::FullScan)
            .collect();
        assert_eq!(scans.len(), 2);
        assert_eq!(scans[0].start, 2);
        assert_eq!(scans[1].start, 5);
    }

    #[test]
    fn degenerate_windows_never_emitted() {
        for buffer in [&[][..], &[0x0A][..], &[0u8, 0, 0, 0, 0][..]] {
            let ex = extraction_for(buffer);
            for c in heuristic_candidates(buffer, &ex, &cfg())
                .into_iter()
                .chain(fallback_candidates(buffer, &ex, &cfg()))
            {
                assert!(c.start < c.end && c.end <= buffer.len(), "bad window {c:?}");
            }
        }
    }
}
