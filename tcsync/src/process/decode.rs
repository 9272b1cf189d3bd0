use std::collections::BTreeMap;
use std::time::Instant;

use log::{debug, trace, warn};
use rayon::prelude::*;

use crate::process::analyze::BitAnalyzer;
use crate::process::codec::FrameCodec;
use crate::process::window::{AudioPhaseClassifier, AudioThresholds, WindowDetector};
use crate::process::{DecodeMode, DecodeOutcome, DecodeStats, RejectReason, SearchStop};
use crate::structs::detection::Detection;
use crate::structs::format::TimecodeFormat;
use crate::structs::frequency::FrequencyPlan;
use crate::structs::layout::CycleLayout;
use crate::structs::window::TimecodeWindow;
use crate::utils::budget::{CancelToken, SearchBudget};
use crate::utils::errors::RangeError;

/// Units below this mean bit confidence are dropped in tolerant mode.
pub const DEFAULT_MIN_UNIT_CONFIDENCE: f64 = 0.4;
/// Sliding search positions per unit.
pub const SLIDING_STEPS_PER_UNIT: usize = 8;
/// Sliding positions decoded between budget checks.
pub const SLIDING_CHUNK: usize = 256;

/// Settings for a decode run.
#[derive(Debug, Clone)]
pub struct DecoderConfig {
    pub mode: DecodeMode,
    pub min_unit_confidence: f64,
    pub budget: SearchBudget,
    pub thresholds: AudioThresholds,
    pub cancel: Option<CancelToken>,
}

impl DecoderConfig {
    pub fn new(mode: DecodeMode) -> Self {
        Self {
            mode,
            min_unit_confidence: DEFAULT_MIN_UNIT_CONFIDENCE,
            budget: SearchBudget::default(),
            thresholds: AudioThresholds::for_mode(mode),
            cancel: None,
        }
    }
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self::new(DecodeMode::default())
    }
}

/// Decodes timecode units from a mono sample stream.
#[derive(Debug, Clone)]
pub struct AudioDecoder {
    format: TimecodeFormat,
    layout: CycleLayout,
    config: DecoderConfig,
    analyzer: BitAnalyzer,
    classifier: AudioPhaseClassifier,
    codec: FrameCodec,
}

impl AudioDecoder {
    pub fn new(
        format: TimecodeFormat,
        plan: FrequencyPlan,
        layout: CycleLayout,
        config: DecoderConfig,
    ) -> Result<Self, RangeError> {
        plan.check_nyquist(format.sample_rate())?;
        layout.validate()?;

        Ok(Self {
            analyzer: BitAnalyzer::for_mode(&format, plan, config.mode),
            classifier: AudioPhaseClassifier::new(&format, plan, config.thresholds),
            format,
            layout,
            config,
            codec: FrameCodec,
        })
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Decodes one unit's worth of samples.
    ///
    /// Strict mode reports confidence 1.0 for every valid unit.
    pub fn decode_unit(&self, samples: &[f32], limit: Option<u32>) -> Result<(u32, f64), RejectReason> {
        let read = self.analyzer.read_unit(samples)?;

        let confidence = match self.config.mode {
            DecodeMode::Strict => 1.0,
            DecodeMode::Tolerant => {
                if read.confidence < self.config.min_unit_confidence {
                    return Err(RejectReason::LowConfidence);
                }
                read.confidence
            }
        };

        let id = self.codec.decode_checked(&read.bits, limit)?;
        Ok((id, confidence))
    }

    fn decode_at(
        &self,
        samples: &[f32],
        start: u64,
        len: usize,
        limit: u32,
    ) -> Result<Detection, RejectReason> {
        let start_idx = start as usize;
        let unit = &samples[start_idx..start_idx + len];
        self.decode_unit(unit, Some(limit))
            .map(|(id, confidence)| Detection::new(start as i64, id, confidence))
            .inspect_err(|reason| trace!("Unit at {start} rejected: {reason:?}"))
    }

    /// Decodes a whole stream.
    ///
    /// Never fails: malformed or short input yields fewer detections.
    pub fn decode(&self, samples: &[f32]) -> DecodeOutcome {
        let len = samples.len() as u64;
        let rate = self.format.sample_rate() as f64;
        let mut outcome = DecodeOutcome::default();

        let cls = self.classifier.classify(samples);
        let detector = WindowDetector::new(self.config.mode, self.layout.timecode_secs);

        let (region, limit) = match detector.locate(&cls) {
            Ok(window) => {
                outcome.window = Some(window);
                let limit = self.format.plausible_limit(window.duration_secs(rate));
                (window.widened(cls.chunk_len, len), limit)
            }
            Err(err) => {
                warn!("{err}, scanning the whole stream");
                outcome.window_error = Some(err);
                let (_, max_secs) = detector.accepted_secs();
                let limit = self.format.plausible_limit(max_secs);
                (TimecodeWindow { start: 0, end: len }, limit)
            }
        };

        let timer = Instant::now();
        let mut detections = self.exact_pass(samples, region, limit, &mut outcome.stats);
        let exact_elapsed = timer.elapsed();

        debug!(
            "Exact pass: {} units, {} accepted in {:.2?}",
            outcome.stats.scanned,
            detections.len(),
            exact_elapsed
        );

        if self.config.mode == DecodeMode::Tolerant {
            if exact_elapsed > self.config.budget.max_exact_pass {
                let skipped = self.sliding_positions(region).len();
                warn!(
                    "Exact pass took {exact_elapsed:.2?}, skipping sliding search over {skipped} positions"
                );
                outcome.stats.sliding_skipped = skipped;
                outcome.stats.sliding_stop = Some(SearchStop::ExactPassOverBudget);
            } else {
                detections.extend(self.sliding_pass(samples, region, limit, &mut outcome.stats));
            }
        }

        outcome.stats.accepted = detections.len();
        outcome.detections = match self.config.mode {
            DecodeMode::Strict => detections,
            DecodeMode::Tolerant => merge(detections, self.format.unit_samples()),
        };

        debug!(
            "Decoded {} detections ({} rejects)",
            outcome.detections.len(),
            outcome.stats.rejects.total()
        );
        outcome
    }

    fn exact_pass(
        &self,
        samples: &[f32],
        region: TimecodeWindow,
        limit: u32,
        stats: &mut DecodeStats,
    ) -> Vec<Detection> {
        let first = self.format.first_unit_at(region.start) as usize;
        let mut last = first;
        while self.format.unit_start(last as u64 + 1) <= region.end {
            last += 1;
        }

        let results: Vec<Result<Detection, RejectReason>> = (first..last)
            .into_par_iter()
            .map(|k| {
                let span = self.format.unit_span(k as u64);
                self.decode_at(samples, span.start, (span.end - span.start) as usize, limit)
            })
            .collect();

        stats.scanned += results.len();
        collect_results(results, stats)
    }

    /// Sliding search start positions, capped to the budgeted span.
    fn sliding_positions(&self, region: TimecodeWindow) -> Vec<u64> {
        let unit_len = self.format.nominal_unit_len() as u64;
        let step = self.format.unit_samples() / SLIDING_STEPS_PER_UNIT as f64;
        let span = (self.config.budget.max_sliding_span_secs * self.format.sample_rate() as f64)
            as u64;
        let end = region.end.min(region.start.saturating_add(span));

        (0..)
            .map(|j: u64| region.start + (j as f64 * step).round() as u64)
            .take_while(|&p| p + unit_len <= end)
            .collect()
    }

    fn sliding_pass(
        &self,
        samples: &[f32],
        region: TimecodeWindow,
        limit: u32,
        stats: &mut DecodeStats,
    ) -> Vec<Detection> {
        let positions = self.sliding_positions(region);
        let unit_len = self.format.nominal_unit_len();
        let timer = Instant::now();
        let deadline = self.config.budget.sliding_deadline(timer);
        let mut detections = Vec::new();

        for (i, chunk) in positions.chunks(SLIDING_CHUNK).enumerate() {
            let stop = if self.config.cancel.as_ref().is_some_and(|c| c.is_cancelled()) {
                Some(SearchStop::Cancelled)
            } else if deadline.is_some_and(|d| Instant::now() >= d) {
                Some(SearchStop::Deadline)
            } else {
                None
            };

            if let Some(stop) = stop {
                let skipped = positions.len() - i * SLIDING_CHUNK;
                warn!("Sliding search stopped ({stop}), {skipped} positions skipped");
                stats.sliding_skipped = skipped;
                stats.sliding_stop = Some(stop);
                break;
            }

            let results: Vec<Result<Detection, RejectReason>> = chunk
                .par_iter()
                .map(|&p| self.decode_at(samples, p, unit_len, limit))
                .collect();

            stats.sliding_positions += chunk.len();
            detections.extend(collect_results(results, stats));
        }

        debug!(
            "Sliding pass: {} positions, {} accepted in {:.2?}",
            stats.sliding_positions,
            detections.len(),
            timer.elapsed()
        );
        detections
    }
}

fn collect_results(
    results: Vec<Result<Detection, RejectReason>>,
    stats: &mut DecodeStats,
) -> Vec<Detection> {
    results
        .into_iter()
        .filter_map(|r| r.inspect_err(|&reason| stats.rejects.record(reason)).ok())
        .collect()
}

/// Collapses overlapping detections.
///
/// A group starts at the earliest remaining detection and takes every later detection
/// less than `unit_len` positions after it. Each group yields one detection: the frame
/// id with the highest mean confidence, at that id's most confident position, carrying
/// the mean.
pub fn merge(mut detections: Vec<Detection>, unit_len: f64) -> Vec<Detection> {
    detections.sort_by_key(|d| d.position);

    let mut merged = Vec::new();
    let mut i = 0;
    while i < detections.len() {
        let start = detections[i].position;
        let end = detections[i..]
            .iter()
            .position(|d| (d.position - start) as f64 >= unit_len)
            .map_or(detections.len(), |n| i + n);

        merged.push(best_of_group(&detections[i..end]));
        i = end;
    }
    merged
}

fn best_of_group(group: &[Detection]) -> Detection {
    // id -> (confidence sum, count, most confident detection)
    let mut by_id: BTreeMap<u32, (f64, usize, Detection)> = BTreeMap::new();
    for d in group {
        let entry = by_id.entry(d.frame_id).or_insert((0.0, 0, *d));
        entry.0 += d.confidence;
        entry.1 += 1;
        if d.confidence > entry.2.confidence {
            entry.2 = *d;
        }
    }

    let mut best: Option<(f64, usize, Detection)> = None;
    for (sum, count, d) in by_id.into_values() {
        let mean = sum / count as f64;
        let better = match &best {
            None => true,
            Some((m, c, _)) => mean > *m || (mean == *m && count > *c),
        };
        if better {
            best = Some((mean, count, d));
        }
    }

    match best {
        Some((mean, _, d)) => Detection::new(d.position, d.frame_id, mean),
        None => group[0],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::synth::ToneSynthesizer;
    use crate::structs::unit::EncodedUnit;

    fn decoder(mode: DecodeMode) -> AudioDecoder {
        AudioDecoder::new(
            TimecodeFormat::default(),
            FrequencyPlan::default(),
            CycleLayout::default(),
            DecoderConfig::new(mode),
        )
        .unwrap()
    }

    #[test]
    fn test_clean_unit_decodes_with_full_confidence() {
        let synth = ToneSynthesizer::new(TimecodeFormat::default(), FrequencyPlan::default()).unwrap();
        let unit = EncodedUnit::new(12345).unwrap();
        let audio = synth.render_unit(&unit, 1920).unwrap();

        assert_eq!(
            decoder(DecodeMode::Strict).decode_unit(&audio, None),
            Ok((12345, 1.0))
        );
        let (id, confidence) = decoder(DecodeMode::Tolerant)
            .decode_unit(&audio, None)
            .unwrap();
        assert_eq!(id, 12345);
        assert!(confidence > DEFAULT_MIN_UNIT_CONFIDENCE);
    }

    #[test]
    fn test_stream_shorter_than_unit() {
        for mode in [DecodeMode::Strict, DecodeMode::Tolerant] {
            let outcome = decoder(mode).decode(&[0.25; 1000]);
            assert!(outcome.detections.is_empty());
            assert!(outcome.window.is_none());
            assert!(outcome.window_error.is_some());

            assert!(decoder(mode).decode(&[]).detections.is_empty());
        }
    }

    #[test]
    fn test_noise_yields_nothing() {
        // deterministic LCG noise
        let mut state = 0x1234_5678u32;
        let noise: Vec<f32> = (0..48000)
            .map(|_| {
                state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                (state >> 8) as f32 / (1u32 << 24) as f32 - 0.5
            })
            .collect();
        let outcome = decoder(DecodeMode::Strict).decode(&noise);
        assert!(outcome.detections.len() <= 1);
        assert_eq!(outcome.stats.scanned, 25);
    }

    #[test]
    fn test_merge_groups() {
        let d = Detection::new;
        let merged = merge(
            vec![
                d(3840, 2, 0.9),
                d(0, 0, 0.8),
                d(240, 7, 0.95),
                d(480, 0, 0.6),
                d(1920, 1, 0.7),
            ],
            1920.0,
        );

        // group at 0: id 0 mean 0.7, id 7 mean 0.95
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0], Detection::new(240, 7, 0.95));
        assert_eq!(merged[1], Detection::new(1920, 1, 0.7));
        assert_eq!(merged[2], Detection::new(3840, 2, 0.9));
    }

    #[test]
    fn test_merge_keeps_best_position() {
        let d = Detection::new;
        let merged = merge(vec![d(0, 4, 0.5), d(240, 4, 0.9), d(480, 4, 0.7)], 1920.0);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].position, 240);
        assert!((merged[0].confidence - 0.7).abs() < 1e-12);
    }
}
