use image::RgbImage;
use log::{debug, info};
use rayon::prelude::*;

use crate::process::DecodeMode;
use crate::structs::format::TimecodeFormat;
use crate::structs::frequency::FrequencyPlan;
use crate::structs::window::{
    AudioPhase, PhaseLabel, TimecodeWindow, VideoPhase, WindowClassification,
};
use crate::utils::blob::{Rect, mean_luma};
use crate::utils::errors::WindowError;
use crate::utils::spectrum::Spectrum;

/// Audio analysis chunk length.
pub const AUDIO_CHUNK_SECS: f64 = 0.5;
/// Shortest timecode run accepted when none matches the expected duration.
pub const MIN_FALLBACK_SECS: f64 = 5.0;
/// Column blocks used for the top-band contrast measure.
pub const CONTRAST_BLOCKS: u32 = 64;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioThresholds {
    /// Chunks with RMS below this are silence.
    pub silence_rms: f64,
    /// Chunks with at least this fraction of energy in the guard ranges are timecode.
    pub band_fraction: f64,
}

impl AudioThresholds {
    pub fn for_mode(mode: DecodeMode) -> Self {
        match mode {
            DecodeMode::Strict => Self {
                silence_rms: 0.001,
                band_fraction: 0.7,
            },
            DecodeMode::Tolerant => Self {
                silence_rms: 0.02,
                band_fraction: 0.45,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoThresholds {
    /// Frames with mean luma above this show the calibration pattern.
    pub pattern_luma: f64,
    /// Frames whose top band contrast exceeds this carry timecode.
    pub contrast: f64,
}

impl VideoThresholds {
    pub fn for_mode(mode: DecodeMode) -> Self {
        match mode {
            DecodeMode::Strict => Self {
                pattern_luma: 40.0,
                contrast: 12.0,
            },
            DecodeMode::Tolerant => Self {
                pattern_luma: 50.0,
                contrast: 20.0,
            },
        }
    }
}

/// Labels half-second audio chunks as silence, tone or timecode.
#[derive(Debug, Clone)]
pub struct AudioPhaseClassifier {
    plan: FrequencyPlan,
    thresholds: AudioThresholds,
    chunk_len: usize,
    sample_rate: u32,
    spectrum: Spectrum,
}

impl AudioPhaseClassifier {
    pub fn new(format: &TimecodeFormat, plan: FrequencyPlan, thresholds: AudioThresholds) -> Self {
        let chunk_len = ((format.sample_rate() as f64 * AUDIO_CHUNK_SECS).round() as usize).max(1);
        Self {
            plan,
            thresholds,
            chunk_len,
            sample_rate: format.sample_rate(),
            spectrum: Spectrum::new(chunk_len, format.sample_rate()),
        }
    }

    pub fn chunk_len(&self) -> usize {
        self.chunk_len
    }

    pub fn classify_chunk(&self, chunk: &[f32]) -> AudioPhase {
        if chunk.is_empty() {
            return AudioPhase::Silence;
        }

        let rms = (chunk.iter().map(|&x| x as f64 * x as f64).sum::<f64>() / chunk.len() as f64)
            .sqrt();
        if rms < self.thresholds.silence_rms {
            return AudioPhase::Silence;
        }

        let power = self.spectrum.power(chunk);
        let total = Spectrum::total_energy(&power);
        if total <= 0.0 {
            return AudioPhase::Silence;
        }

        let band = self.spectrum.energy_in(&power, self.plan.guard_low())
            + self.spectrum.energy_in(&power, self.plan.guard_high());
        if band / total >= self.thresholds.band_fraction {
            AudioPhase::Timecode
        } else {
            AudioPhase::Tone
        }
    }

    pub fn classify(&self, samples: &[f32]) -> WindowClassification<AudioPhase> {
        let labels: Vec<AudioPhase> = samples
            .par_chunks(self.chunk_len)
            .map(|chunk| self.classify_chunk(chunk))
            .collect();

        let mut cls =
            WindowClassification::from_labels(labels, self.chunk_len as u64, self.sample_rate as f64);
        cls.len = samples.len() as u64;
        cls
    }
}

/// Labels video frames as black, calibration pattern or timecode.
#[derive(Debug, Clone, Copy)]
pub struct VideoPhaseClassifier {
    thresholds: VideoThresholds,
}

impl VideoPhaseClassifier {
    pub fn new(thresholds: VideoThresholds) -> Self {
        Self { thresholds }
    }

    pub fn classify_frame(&self, frame: &RgbImage) -> VideoPhase {
        let full = Rect::new(0, 0, frame.width(), frame.height());
        if mean_luma(frame, full) > self.thresholds.pattern_luma {
            VideoPhase::Pattern
        } else if top_band_contrast(frame) > self.thresholds.contrast {
            VideoPhase::Timecode
        } else {
            VideoPhase::Black
        }
    }
}

/// Standard deviation of the mean luma of column blocks across the top fifth.
pub fn top_band_contrast(frame: &RgbImage) -> f64 {
    let (w, h) = (frame.width(), frame.height() / 5);
    if w == 0 || h == 0 {
        return 0.0;
    }

    let means: Vec<f64> = (0..CONTRAST_BLOCKS)
        .map(|b| {
            let x0 = b * w / CONTRAST_BLOCKS;
            let x1 = (b + 1) * w / CONTRAST_BLOCKS;
            mean_luma(frame, Rect::new(x0, 0, x1 - x0, h))
        })
        .collect();

    let n = means.len() as f64;
    let mean = means.iter().sum::<f64>() / n;
    (means.iter().map(|m| (m - mean).powi(2)).sum::<f64>() / n).sqrt()
}

/// Finds the timecode phase in a classification.
#[derive(Debug, Clone, Copy)]
pub struct WindowDetector {
    mode: DecodeMode,
    expected_secs: f64,
}

impl WindowDetector {
    pub fn new(mode: DecodeMode, expected_secs: f64) -> Self {
        Self {
            mode,
            expected_secs,
        }
    }

    /// Accepted duration band around the expected timecode duration.
    pub fn accepted_secs(&self) -> (f64, f64) {
        (self.expected_secs * 2.0 / 3.0, self.expected_secs * 4.0 / 3.0)
    }

    /// Timecode runs as `(first chunk, chunk count)`.
    ///
    /// Tolerant mode joins runs separated by a single foreign chunk.
    fn timecode_runs<L: PhaseLabel>(&self, cls: &WindowClassification<L>) -> Vec<(usize, usize)> {
        let mut runs: Vec<(usize, usize)> = Vec::new();
        for run in cls.runs().into_iter().filter(|r| r.label.is_timecode()) {
            match runs.last_mut() {
                Some((first, chunks))
                    if self.mode == DecodeMode::Tolerant && *first + *chunks + 1 == run.first =>
                {
                    *chunks += run.chunks + 1;
                }
                _ => runs.push((run.first, run.chunks)),
            }
        }
        runs
    }

    pub fn locate<L: PhaseLabel>(
        &self,
        cls: &WindowClassification<L>,
    ) -> Result<TimecodeWindow, WindowError> {
        let transitions = cls.transitions();
        let runs = self.timecode_runs(cls);
        let windows: Vec<TimecodeWindow> = runs
            .iter()
            .map(|&(first, chunks)| cls.span(first, chunks))
            .collect();

        debug!(
            "{} chunks, {} transitions, {} timecode runs",
            cls.labels.len(),
            transitions,
            runs.len()
        );

        let (lo, hi) = self.accepted_secs();
        if let Some(window) = windows.iter().find(|w| {
            let secs = w.duration_secs(cls.rate);
            secs >= lo && secs <= hi
        }) {
            info!(
                "Timecode window {:.2}s - {:.2}s",
                window.start as f64 / cls.rate,
                window.end as f64 / cls.rate
            );
            return Ok(*window);
        }

        let longest = windows.iter().max_by_key(|w| w.len());
        let longest_run_secs = longest.map_or(0.0, |w| w.duration_secs(cls.rate));

        match longest {
            Some(window) if longest_run_secs >= MIN_FALLBACK_SECS => {
                info!(
                    "Timecode window {:.2}s - {:.2}s (longest run, {:.2}s outside {:.2}s - {:.2}s)",
                    window.start as f64 / cls.rate,
                    window.end as f64 / cls.rate,
                    longest_run_secs,
                    lo,
                    hi
                );
                Ok(*window)
            }
            _ => Err(WindowError::NotFound {
                transitions,
                timecode_runs: runs.len(),
                longest_run_secs,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::synth::ToneSynthesizer;
    use crate::structs::unit::EncodedUnit;

    fn repeat<L: Copy>(label: L, n: usize) -> impl Iterator<Item = L> {
        std::iter::repeat_n(label, n)
    }

    #[test]
    fn test_strict_cycle_window() {
        use VideoPhase::*;
        let labels = repeat(Pattern, 150)
            .chain(repeat(Black, 25))
            .chain(repeat(Timecode, 750))
            .chain(repeat(Black, 25));
        let cls = WindowClassification::from_labels(labels, 1, 25.0);

        let window = WindowDetector::new(DecodeMode::Strict, 30.0)
            .locate(&cls)
            .unwrap();
        assert_eq!(window, TimecodeWindow { start: 175, end: 925 });
        assert_eq!(window.start as f64 / 25.0, 7.0);
        assert_eq!(window.end as f64 / 25.0, 37.0);
    }

    #[test]
    fn test_tolerant_short_run_with_dropout() {
        use AudioPhase::*;
        // 28.5 s of timecode with one misclassified chunk in the middle
        let labels = repeat(Tone, 12)
            .chain(repeat(Silence, 2))
            .chain(repeat(Timecode, 30))
            .chain(repeat(Tone, 1))
            .chain(repeat(Timecode, 26))
            .chain(repeat(Silence, 2));
        let cls = WindowClassification::from_labels(labels, 24000, 48000.0);

        let window = WindowDetector::new(DecodeMode::Tolerant, 30.0)
            .locate(&cls)
            .unwrap();
        assert_eq!(window.start, 14 * 24000);
        assert_eq!(window.duration_secs(48000.0), 28.5);

        // Strict mode keeps the halves apart; neither fits the band, so the
        // longest run is taken
        let strict = WindowDetector::new(DecodeMode::Strict, 30.0);
        let window = strict.locate(&cls).unwrap();
        assert_eq!(window.start, 14 * 24000);
        assert_eq!(window.duration_secs(48000.0), 15.0);
        let (lo, _) = strict.accepted_secs();
        assert!(window.duration_secs(48000.0) < lo);
        assert!(window.duration_secs(48000.0) >= MIN_FALLBACK_SECS);
    }

    #[test]
    fn test_not_found() {
        use AudioPhase::*;
        let empty = WindowClassification::<AudioPhase>::from_labels([], 24000, 48000.0);
        assert_eq!(
            WindowDetector::new(DecodeMode::Strict, 30.0).locate(&empty),
            Err(WindowError::NotFound {
                transitions: 0,
                timecode_runs: 0,
                longest_run_secs: 0.0
            })
        );

        let labels = repeat(Tone, 4).chain(repeat(Timecode, 4)).chain(repeat(Silence, 4));
        let cls = WindowClassification::from_labels(labels, 24000, 48000.0);
        assert_eq!(
            WindowDetector::new(DecodeMode::Strict, 30.0).locate(&cls),
            Err(WindowError::NotFound {
                transitions: 2,
                timecode_runs: 1,
                longest_run_secs: 2.0
            })
        );
    }

    #[test]
    fn test_audio_chunk_labels() {
        let format = TimecodeFormat::default();
        let plan = FrequencyPlan::default();
        let synth = ToneSynthesizer::new(format, plan).unwrap();
        let classifier =
            AudioPhaseClassifier::new(&format, plan, AudioThresholds::for_mode(DecodeMode::Strict));

        let silence = vec![0.0f32; 24000];
        assert_eq!(classifier.classify_chunk(&silence), AudioPhase::Silence);

        let mut tone = vec![0.0f32; 24000];
        crate::process::synth::render_sine(&mut tone, 1000.0, 48000, 0.5);
        assert_eq!(classifier.classify_chunk(&tone), AudioPhase::Tone);

        let units: Vec<_> = (0..13).map(|i| EncodedUnit::new(i).unwrap()).collect();
        let timecode = synth.render_units(&units, 0).unwrap();
        assert_eq!(
            classifier.classify_chunk(&timecode[..24000]),
            AudioPhase::Timecode
        );
    }
}
