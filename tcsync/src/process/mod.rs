use std::fmt::Display;

use crate::structs::detection::Detection;
use crate::structs::window::TimecodeWindow;
use crate::utils::errors::WindowError;

/// Tone rendering for bit segments and whole units.
pub mod synth;

/// Frame index to checksummed unit and back.
///
/// Provides the [`FrameCodec`](codec::FrameCodec) used by both the audio and the
/// visual decode paths.
pub mod codec;

/// Per-bit classification by spectral, zero-crossing and autocorrelation estimators
/// combined through a weighted vote.
pub mod analyze;

/// Phase classification and timecode window location.
pub mod window;

/// Audio stream decoding in strict or tolerant mode.
///
/// Provides the [`AudioDecoder`](decode::AudioDecoder).
pub mod decode;

/// Timecode pattern rendering and reading for video frames.
pub mod visual;

/// Video stream decoding, frame by frame.
///
/// Provides the [`VideoDecoder`](video::VideoDecoder).
pub mod video;

/// Cross-stream matching and offset statistics.
pub mod correlate;

/// Whole calibration cycles for audio and video.
pub mod cycle;

/// How aggressively a stream is searched for timecode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DecodeMode {
    /// Exact unit grid, spectral estimator only. For digitally generated sources.
    Strict,
    /// Exact grid with all estimators, then a budgeted sliding search.
    #[default]
    Tolerant,
}

impl Display for DecodeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeMode::Strict => write!(f, "strict"),
            DecodeMode::Tolerant => write!(f, "tolerant"),
        }
    }
}

/// Why a unit or frame produced no detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectReason {
    /// A bit had no winner in the vote.
    AmbiguousBit,
    /// The unit decoded but its confidence was below the minimum.
    LowConfidence,
    /// Received checksum did not match the frame field.
    Checksum,
    /// Frame id too large for the located window.
    Implausible,
    /// Visual strip could not be located or had no contrast.
    NoPattern,
}

/// Reject counters per reason.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RejectCounts {
    pub ambiguous_bit: usize,
    pub low_confidence: usize,
    pub checksum: usize,
    pub implausible: usize,
    pub no_pattern: usize,
}

impl RejectCounts {
    pub fn record(&mut self, reason: RejectReason) {
        match reason {
            RejectReason::AmbiguousBit => self.ambiguous_bit += 1,
            RejectReason::LowConfidence => self.low_confidence += 1,
            RejectReason::Checksum => self.checksum += 1,
            RejectReason::Implausible => self.implausible += 1,
            RejectReason::NoPattern => self.no_pattern += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.ambiguous_bit + self.low_confidence + self.checksum + self.implausible + self.no_pattern
    }
}

/// Why a tolerant sliding search ended before covering its span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStop {
    /// The exact-grid pass already used the whole time budget.
    ExactPassOverBudget,
    /// The sliding search hit its wall-clock limit.
    Deadline,
    Cancelled,
}

impl Display for SearchStop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchStop::ExactPassOverBudget => write!(f, "exact pass over budget"),
            SearchStop::Deadline => write!(f, "deadline reached"),
            SearchStop::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Counters describing one decode run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodeStats {
    /// Units or frames examined on the exact grid.
    pub scanned: usize,
    /// Detections before merging.
    pub accepted: usize,
    pub rejects: RejectCounts,
    /// Positions visited by the sliding search.
    pub sliding_positions: usize,
    /// Positions the sliding search wanted to visit but skipped.
    pub sliding_skipped: usize,
    pub sliding_stop: Option<SearchStop>,
}

/// Result of decoding one stream.
///
/// An empty detection list is a valid outcome.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodeOutcome {
    /// Detections ordered by position.
    pub detections: Vec<Detection>,
    pub window: Option<TimecodeWindow>,
    /// Set when no window was found and the whole stream was scanned instead.
    pub window_error: Option<WindowError>,
    pub stats: DecodeStats,
}

/// Keeps the first of every run of consecutive detections with the same id.
pub fn collapse_repeats(detections: Vec<Detection>) -> Vec<Detection> {
    let mut out: Vec<Detection> = Vec::with_capacity(detections.len());
    for d in detections {
        if out.last().is_none_or(|last| last.frame_id != d.frame_id) {
            out.push(d);
        }
    }
    out
}

#[test]
fn test_collapse_repeats() {
    let d = |p, id| Detection::new(p, id, 1.0);
    let out = collapse_repeats(vec![d(0, 5), d(1, 5), d(2, 6), d(3, 5), d(4, 5)]);
    let ids: Vec<_> = out.iter().map(|d| (d.position, d.frame_id)).collect();
    assert_eq!(ids, [(0, 5), (2, 6), (3, 5)]);
}
