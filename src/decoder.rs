//! Salvage engine
//!
//! Drives a buffer through header parsing, payload identification, and record
//! decoding, falling through an ordered list of candidate windows until one of
//! them yields records or everything is exhausted. Pure over its input: the
//! decoder holds configuration only, so independent buffers can be decoded
//! concurrently and one failure cannot leak into the next call.

use crate::boundary::{self, Candidate, Origin};
use crate::compression::decompress_gzip;
use crate::config::DecoderConfig;
use crate::error::{DecodeExhausted, ScanError};
use crate::frame::{self, Confidence, Extraction};
use crate::record::{self, Record};
use serde::Serialize;
use tracing::{debug, trace};

/// Decode progress, reported in the diagnostic.
///
/// `NotStarted → HeaderParsed` always succeeds: malformed headers substitute
/// defaults rather than blocking. `Failed` is only reachable once every
/// fallback window has been tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    NotStarted,
    HeaderParsed,
    PayloadIdentified,
    Decoded,
    Failed,
}

/// Operator-facing context for one decode run. Always present, even on
/// success, so a recovered-but-odd buffer can still be investigated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub buffer_len: usize,
    pub phase: Phase,
    pub confidence: Confidence,
    /// Scan faults observed along the way, in order. None of these aborted
    /// anything; they only steered candidate selection.
    pub signals: Vec<ScanError>,
    /// Origin of the window that produced the records, when one did.
    pub strategy: Option<Origin>,
    /// Candidate windows that were scanned.
    pub attempts: u32,
    /// Set only when every strategy came up empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exhausted: Option<DecodeExhausted>,
}

/// Records plus the diagnostic for one buffer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodeReport {
    pub records: Vec<Record>,
    pub diagnostic: Diagnostic,
}

impl DecodeReport {
    /// Whether every strategy was exhausted without a single record.
    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.diagnostic.exhausted.is_some()
    }
}

/// The decoding engine. Construction is cheap; the value is `Send + Sync`
/// and reusable across buffers.
#[derive(Debug, Clone, Default)]
pub struct SalvageDecoder {
    config: DecoderConfig,
}

impl SalvageDecoder {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn with_config(config: DecoderConfig) -> Self {
        Self { config }
    }

    #[inline]
    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Decode one response buffer into records.
    ///
    /// Never panics and never returns early: malformed input degrades into
    /// fallback attempts, and total failure is reported as
    /// [`DecodeExhausted`] inside the diagnostic.
    pub fn decode(&self, buffer: &[u8]) -> DecodeReport {
        let mut run = DecodeRun::new(buffer, &self.config);

        let extraction = frame::extract(buffer, &self.config);
        run.phase = Phase::HeaderParsed;
        run.signals.clone_from(&extraction.signals);
        run.confidence = extraction.confidence;
        run.phase = Phase::PayloadIdentified;

        // Primary window first; on low confidence the heuristic windows
        // follow in their fixed order.
        let primary =
            Candidate { start: extraction.start, end: extraction.end, origin: Origin::Primary };
        if let Some(records) = run.try_candidate(primary, &extraction) {
            return run.decoded(records, primary.origin);
        }
        if extraction.confidence == Confidence::Low {
            for candidate in boundary::heuristic_candidates(buffer, &extraction, &self.config) {
                if let Some(records) = run.try_candidate(candidate, &extraction) {
                    return run.decoded(records, candidate.origin);
                }
            }
        }

        // Zero records so far: fall back through the full strategy list.
        for candidate in boundary::fallback_candidates(buffer, &extraction, &self.config) {
            if let Some(records) = run.try_candidate(candidate, &extraction) {
                return run.decoded(records, candidate.origin);
            }
        }

        run.exhausted()
    }

    /// Render the operator diagnostics view for a buffer without decoding
    /// it into records. See [`crate::diagnostics`].
    pub fn render_diagnostics(&self, buffer: &[u8]) -> crate::diagnostics::DiagnosticsReport {
        crate::diagnostics::render(buffer, &self.config)
    }
}

/// Working state for one decode call. Lives on the stack; nothing survives
/// the call.
struct DecodeRun<'b, 'c> {
    buffer: &'b [u8],
    config: &'c DecoderConfig,
    phase: Phase,
    confidence: Confidence,
    signals: Vec<ScanError>,
    attempts: u32,
    last_error: Option<ScanError>,
    tried: Vec<(usize, usize)>,
}

impl<'b, 'c> DecodeRun<'b, 'c> {
    fn new(buffer: &'b [u8], config: &'c DecoderConfig) -> Self {
        Self {
            buffer,
            config,
            phase: Phase::NotStarted,
            confidence: Confidence::Low,
            signals: Vec::new(),
            attempts: 0,
            last_error: None,
            tried: Vec::new(),
        }
    }

    /// Scan one candidate window. `Some` only when it yields at least one
    /// record; anything less moves on to the next strategy.
    fn try_candidate(
        &mut self,
        candidate: Candidate,
        extraction: &Extraction,
    ) -> Option<Vec<Record>> {
        if candidate.start >= candidate.end || candidate.end > self.buffer.len() {
            return None;
        }
        let window = (candidate.start, candidate.end);
        if self.tried.contains(&window) {
            return None;
        }
        self.tried.push(window);
        self.attempts += 1;

        let slice = candidate.slice(self.buffer);

        // Only the primary window honors the compression flag; heuristic
        // windows are guesses over raw bytes.
        let decoded = if candidate.origin == Origin::Primary
            && extraction.header.is_some_and(|h| h.is_compressed())
        {
            match decompress_gzip(slice) {
                Some(inflated) => record::decode_records(&inflated, self.config),
                // Flag lied or the stream is mangled; scan the raw bytes.
                None => record::decode_records(slice, self.config),
            }
        } else {
            record::decode_records(slice, self.config)
        };

        if let Some(error) = decoded.last_error {
            self.last_error = Some(error);
        }

        if decoded.records.is_empty() {
            trace!(
                origin = ?candidate.origin,
                start = candidate.start,
                end = candidate.end,
                "candidate window yielded no records"
            );
            None
        } else {
            Some(decoded.records)
        }
    }

    fn decoded(mut self, records: Vec<Record>, origin: Origin) -> DecodeReport {
        self.phase = Phase::Decoded;
        debug!(
            count = records.len(),
            ?origin,
            attempts = self.attempts,
            "salvaged records"
        );
        DecodeReport {
            records,
            diagnostic: Diagnostic {
                buffer_len: self.buffer.len(),
                phase: self.phase,
                confidence: self.confidence,
                signals: self.signals,
                strategy: Some(origin),
                attempts: self.attempts,
                exhausted: None,
            },
        }
    }

    fn exhausted(mut self) -> DecodeReport {
        self.phase = Phase::Failed;
        let preview_len = self.config.preview_len.min(self.buffer.len());
        let exhausted = DecodeExhausted {
            buffer_len: self.buffer.len(),
            preview: hex::encode(&self.buffer[..preview_len]),
            attempts: self.attempts,
            last_error: self.last_error,
        };
        debug!(attempts = self.attempts, last_error = ?self.last_error, "decode exhausted");
        DecodeReport {
            records: Vec::new(),
            diagnostic: Diagnostic {
                buffer_len: self.buffer.len(),
                phase: self.phase,
                confidence: self.confidence,
                signals: self.signals,
                strategy: None,
                attempts: self.attempts,
                exhausted: Some(exhausted),
            },
        }
    }
}
