//! Decoder tuning knobs
//!
//! The skip offsets and trailer margin below were measured against the output
//! of one observed gRPC-Web proxy. They are working defaults, not protocol
//! guarantees, which is why they live in a value the caller hands to the
//! decoder instead of in constants.

/// Configuration passed to [`SalvageDecoder`](crate::SalvageDecoder) at
/// construction. Plain data, cheap to clone, no hidden state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderConfig {
    /// Field number of the repeated, length-delimited top-level field that
    /// carries one record per occurrence.
    pub collection_field: u32,
    /// Upper bound for a plausible field number in single-byte tags. Scans
    /// treat anything above it as noise.
    pub max_field_number: u32,
    /// Header-skip offsets tried by the boundary heuristics, in order.
    pub header_skips: Vec<usize>,
    /// Header-skip offsets tried by the fallback pass before the heuristics
    /// are replayed.
    pub fallback_skips: Vec<usize>,
    /// Bytes dropped from the end of the buffer when no trailer was found at
    /// all (last-resort trim).
    pub trailer_margin: usize,
    /// A trailer length claim at or above this is treated as implausible.
    pub max_trailer_len: u32,
    /// Hex-preview cap for the exhaustion diagnostic, in bytes.
    pub preview_len: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            collection_field: 1,
            max_field_number: 15,
            header_skips: vec![0, 5, 8, 10, 12, 16],
            fallback_skips: vec![5, 8],
            trailer_margin: 16,
            max_trailer_len: 100,
            preview_len: 64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = DecoderConfig::default();
        assert_eq!(cfg.collection_field, 1);
        assert!(cfg.header_skips.contains(&5));
        assert!(cfg.fallback_skips.iter().all(|s| cfg.header_skips.contains(s)));
        assert!(cfg.max_trailer_len < 1024);
    }
}
