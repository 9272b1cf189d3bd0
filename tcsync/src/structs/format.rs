use std::fmt::Display;
use std::ops::Range;

use crate::utils::errors::RangeError;

/// Bits transmitted per unit.
pub const BITS_PER_UNIT: usize = 32;
/// Width of the frame index field.
pub const FRAME_BITS: u32 = 24;
/// Width of the checksum field.
pub const CHECKSUM_BITS: u32 = 8;
/// Largest encodable frame index.
pub const MAX_FRAME_INDEX: u32 = (1 << FRAME_BITS) - 1;

pub const DEFAULT_SAMPLE_RATE: u32 = 48000;
/// Fewest samples per bit a format may give.
pub const MIN_SAMPLES_PER_BIT: f64 = 16.0;
/// Headroom applied to the window duration when bounding decoded frame ids.
pub const PLAUSIBLE_ID_MARGIN: f64 = 1.25;

/// Video frame rate the timecode is locked to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FrameRate {
    /// 25 fps.
    #[default]
    Pal,
    /// 30000/1001 fps.
    Ntsc,
}

impl FrameRate {
    pub fn fps(self) -> f64 {
        match self {
            FrameRate::Pal => 25.0,
            FrameRate::Ntsc => 30000.0 / 1001.0,
        }
    }

    /// Matches `fps` against the supported rates with a small tolerance.
    pub fn from_fps(fps: f64) -> Option<Self> {
        [FrameRate::Pal, FrameRate::Ntsc]
            .into_iter()
            .find(|rate| (rate.fps() - fps).abs() < 0.01)
    }
}

impl Display for FrameRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameRate::Pal => write!(f, "PAL (25 fps)"),
            FrameRate::Ntsc => write!(f, "NTSC (29.97 fps)"),
        }
    }
}

/// Timing of the timecode signal.
///
/// One unit occupies exactly one video frame period. Unit `k` of a stream covers
/// samples `[round(k * unit_samples), round((k + 1) * unit_samples))`, so units never
/// overlap or leave gaps even when `unit_samples` is fractional.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimecodeFormat {
    frame_rate: FrameRate,
    sample_rate: u32,
}

impl Default for TimecodeFormat {
    fn default() -> Self {
        Self {
            frame_rate: FrameRate::Pal,
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }
}

impl TimecodeFormat {
    pub fn new(frame_rate: FrameRate, sample_rate: u32) -> Result<Self, RangeError> {
        if sample_rate == 0 {
            return Err(RangeError::ZeroSampleRate);
        }

        let samples_per_bit = sample_rate as f64 / frame_rate.fps() / BITS_PER_UNIT as f64;
        if samples_per_bit < MIN_SAMPLES_PER_BIT {
            return Err(RangeError::TooFewSamplesPerBit {
                sample_rate,
                samples_per_bit,
                min: MIN_SAMPLES_PER_BIT,
            });
        }

        Ok(Self {
            frame_rate,
            sample_rate,
        })
    }

    pub fn frame_rate(&self) -> FrameRate {
        self.frame_rate
    }

    pub fn fps(&self) -> f64 {
        self.frame_rate.fps()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn unit_samples(&self) -> f64 {
        self.sample_rate as f64 / self.fps()
    }

    pub fn samples_per_bit(&self) -> f64 {
        self.unit_samples() / BITS_PER_UNIT as f64
    }

    /// Length of a unit starting off the grid.
    pub fn nominal_unit_len(&self) -> usize {
        self.unit_samples().round() as usize
    }

    /// Longest bit segment any unit can contain.
    pub fn max_bit_len(&self) -> usize {
        (self.unit_samples().ceil() as usize).div_ceil(BITS_PER_UNIT)
    }

    /// First sample of grid unit `k`.
    pub fn unit_start(&self, k: u64) -> u64 {
        (k as f64 * self.unit_samples()).round() as u64
    }

    /// Sample span of grid unit `k`.
    pub fn unit_span(&self, k: u64) -> Range<u64> {
        self.unit_start(k)..self.unit_start(k + 1)
    }

    /// First grid unit starting at or after sample `pos`.
    pub fn first_unit_at(&self, pos: u64) -> u64 {
        let mut k = (pos as f64 / self.unit_samples()).floor() as u64;
        while self.unit_start(k) < pos {
            k += 1;
        }
        k
    }

    /// Exclusive upper bound for frame ids decoded from a window of `duration_secs`.
    pub fn plausible_limit(&self, duration_secs: f64) -> u32 {
        let limit = (duration_secs.max(0.0) * PLAUSIBLE_ID_MARGIN * self.fps()).ceil() + 1.0;
        limit.min(MAX_FRAME_INDEX as f64 + 1.0) as u32
    }
}

/// Split of a unit of `len` samples into its bit segments.
///
/// Bit `i` covers `[floor(i * len / 32), floor((i + 1) * len / 32))`.
pub fn bit_bounds(len: usize) -> impl Iterator<Item = Range<usize>> {
    (0..BITS_PER_UNIT).map(move |i| (i * len / BITS_PER_UNIT)..((i + 1) * len / BITS_PER_UNIT))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pal_grid() {
        let format = TimecodeFormat::default();
        assert_eq!(format.unit_samples(), 1920.0);
        assert_eq!(format.unit_span(3), 5760..7680);
        assert_eq!(format.max_bit_len(), 60);
        assert_eq!(format.first_unit_at(0), 0);
        assert_eq!(format.first_unit_at(1), 1);
        assert_eq!(format.first_unit_at(3840), 2);
    }

    #[test]
    fn test_ntsc_grid_has_no_gaps() {
        let format = TimecodeFormat::new(FrameRate::Ntsc, 48000).unwrap();
        let mut end = 0;
        for k in 0..3000 {
            let span = format.unit_span(k);
            assert_eq!(span.start, end);
            assert!(matches!(span.end - span.start, 1601 | 1602));
            end = span.end;
        }
    }

    #[test]
    fn test_bit_bounds_partition() {
        for len in [1601, 1602, 1920] {
            let bounds: Vec<_> = bit_bounds(len).collect();
            assert_eq!(bounds.len(), BITS_PER_UNIT);
            assert_eq!(bounds[0].start, 0);
            assert_eq!(bounds[31].end, len);
            assert!(bounds.windows(2).all(|w| w[0].end == w[1].start));
        }
    }

    #[test]
    fn test_rejects_low_sample_rate() {
        assert_eq!(
            TimecodeFormat::new(FrameRate::Pal, 0),
            Err(RangeError::ZeroSampleRate)
        );
        assert!(matches!(
            TimecodeFormat::new(FrameRate::Pal, 8000),
            Err(RangeError::TooFewSamplesPerBit { .. })
        ));
        assert!(TimecodeFormat::new(FrameRate::Ntsc, 44100).is_ok());
    }

    #[test]
    fn test_plausible_limit() {
        let format = TimecodeFormat::default();
        assert_eq!(format.plausible_limit(30.0), 939);
        assert_eq!(format.plausible_limit(0.0), 1);
        assert_eq!(FrameRate::from_fps(29.97), Some(FrameRate::Ntsc));
        assert_eq!(FrameRate::from_fps(24.0), None);
    }
}
