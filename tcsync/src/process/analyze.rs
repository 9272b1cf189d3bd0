use std::fmt::Display;

use crate::process::{DecodeMode, RejectReason};
use crate::structs::format::{BITS_PER_UNIT, TimecodeFormat, bit_bounds};
use crate::structs::frequency::FrequencyPlan;
use crate::utils::bitstream_io::UnitBits;
use crate::utils::spectrum::Spectrum;

/// Share of guard energy the winning symbol needs for a spectral vote.
pub const SPECTRAL_SHARE: f64 = 0.6;
/// Lowest zero-crossing confidence that still votes.
pub const MIN_ZERO_CROSSING_CONFIDENCE: f64 = 0.5;
/// Lowest normalised autocorrelation peak that still votes.
pub const MIN_AUTOCORRELATION_PEAK: f64 = 0.3;
/// Lag search radius around each symbol period.
pub const AUTOCORRELATION_LAG_TOLERANCE: usize = 3;

const SILENT_POWER: f64 = 1e-9;

/// Bit estimators, in decreasing weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Spectral,
    ZeroCrossing,
    Autocorrelation,
}

impl Method {
    pub const ALL: [Method; 3] = [
        Method::Spectral,
        Method::ZeroCrossing,
        Method::Autocorrelation,
    ];

    pub fn weight(self) -> f64 {
        match self {
            Method::Spectral => 2.0,
            Method::ZeroCrossing => 1.0,
            Method::Autocorrelation => 1.0,
        }
    }
}

impl Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Method::Spectral => write!(f, "spectral"),
            Method::ZeroCrossing => write!(f, "zero-crossing"),
            Method::Autocorrelation => write!(f, "autocorrelation"),
        }
    }
}

/// A bit value with its confidence in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BitVote {
    pub bit: bool,
    pub confidence: f64,
}

/// Classifies by the share of peak guard-range power held by the high symbol.
pub fn spectral(spectrum: &Spectrum, plan: &FrequencyPlan, segment: &[f32]) -> Option<BitVote> {
    let power = spectrum.power(segment);
    let low = spectrum.peak_in(&power, plan.guard_low());
    let high = spectrum.peak_in(&power, plan.guard_high());

    let total = low + high;
    if total <= SILENT_POWER {
        return None;
    }

    let share = high / total;
    if share > SPECTRAL_SHARE {
        Some(BitVote {
            bit: true,
            confidence: share,
        })
    } else if share < 1.0 - SPECTRAL_SHARE {
        Some(BitVote {
            bit: false,
            confidence: 1.0 - share,
        })
    } else {
        None
    }
}

/// Classifies by the frequency implied by the sign-change rate.
pub fn zero_crossing(plan: &FrequencyPlan, sample_rate: u32, segment: &[f32]) -> Option<BitVote> {
    if segment.len() < 2 {
        return None;
    }

    let crossings = segment
        .windows(2)
        .filter(|w| (w[0] >= 0.0) != (w[1] >= 0.0))
        .count();
    let freq = crossings as f64 * sample_rate as f64 / (2.0 * (segment.len() - 1) as f64);

    let (low, high) = (plan.freq_low(), plan.freq_high());
    let bit = (freq - high).abs() < (freq - low).abs();
    let closer = if bit { high } else { low };
    let confidence = 1.0 - (freq - closer).abs() / (high - low);

    (confidence >= MIN_ZERO_CROSSING_CONFIDENCE).then_some(BitVote { bit, confidence })
}

/// Biased autocorrelation at `lag`, not normalised.
fn autocorr(segment: &[f32], lag: usize) -> f64 {
    segment
        .iter()
        .zip(&segment[lag..])
        .map(|(&a, &b)| a as f64 * b as f64)
        .sum::<f64>()
        / segment.len() as f64
}

fn period_peak(segment: &[f32], period: usize, zero_lag: f64) -> Option<f64> {
    let first = period.saturating_sub(AUTOCORRELATION_LAG_TOLERANCE).max(1);
    let last = (period + AUTOCORRELATION_LAG_TOLERANCE).min(segment.len() - 1);

    (first..=last)
        .map(|lag| autocorr(segment, lag) / zero_lag)
        .reduce(f64::max)
}

/// Classifies by the normalised autocorrelation peak near each symbol period.
pub fn autocorrelation(plan: &FrequencyPlan, sample_rate: u32, segment: &[f32]) -> Option<BitVote> {
    if segment.len() < 2 {
        return None;
    }

    let zero_lag = autocorr(segment, 0);
    if zero_lag <= SILENT_POWER {
        return None;
    }

    let period = |freq: f64| (sample_rate as f64 / freq).round() as usize;
    let low = period_peak(segment, period(plan.freq_low()), zero_lag)?;
    let high = period_peak(segment, period(plan.freq_high()), zero_lag)?;

    let (bit, stronger, weaker) = if high > low {
        (true, high, low)
    } else {
        (false, low, high)
    };
    if stronger < MIN_AUTOCORRELATION_PEAK {
        return None;
    }

    Some(BitVote {
        bit,
        confidence: ((stronger - weaker.max(0.0)) / stronger).clamp(0.0, 1.0),
    })
}

/// Weighted vote over the estimators' outputs.
///
/// `enabled_weight` is the summed weight of every estimator that ran, abstaining
/// or not. A tie, including total abstention, gives no bit.
pub fn vote(
    votes: impl IntoIterator<Item = (Method, Option<BitVote>)>,
    enabled_weight: f64,
) -> Option<BitVote> {
    let (mut ones, mut zeros) = (0.0, 0.0);
    for (method, vote) in votes {
        match vote {
            Some(BitVote { bit: true, confidence }) => ones += method.weight() * confidence,
            Some(BitVote { bit: false, confidence }) => zeros += method.weight() * confidence,
            None => {}
        }
    }

    if ones == zeros || enabled_weight <= 0.0 {
        return None;
    }

    let bit = ones > zeros;
    Some(BitVote {
        bit,
        confidence: ((ones - zeros).abs() / enabled_weight).min(1.0),
    })
}

/// Bits of one unit with the mean bit confidence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitRead {
    pub bits: UnitBits,
    pub confidence: f64,
}

/// Runs the enabled estimators over every bit segment of a unit.
#[derive(Debug, Clone)]
pub struct BitAnalyzer {
    plan: FrequencyPlan,
    sample_rate: u32,
    methods: Vec<Method>,
    spectrum: Spectrum,
}

impl BitAnalyzer {
    pub fn new(format: &TimecodeFormat, plan: FrequencyPlan, methods: &[Method]) -> Self {
        Self {
            plan,
            sample_rate: format.sample_rate(),
            methods: methods.to_vec(),
            spectrum: Spectrum::new(format.max_bit_len(), format.sample_rate()),
        }
    }

    /// Spectral only for strict decoding, every estimator for tolerant decoding.
    pub fn for_mode(format: &TimecodeFormat, plan: FrequencyPlan, mode: DecodeMode) -> Self {
        match mode {
            DecodeMode::Strict => Self::new(format, plan, &[Method::Spectral]),
            DecodeMode::Tolerant => Self::new(format, plan, &Method::ALL),
        }
    }

    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    pub fn estimate(&self, method: Method, segment: &[f32]) -> Option<BitVote> {
        match method {
            Method::Spectral => spectral(&self.spectrum, &self.plan, segment),
            Method::ZeroCrossing => zero_crossing(&self.plan, self.sample_rate, segment),
            Method::Autocorrelation => autocorrelation(&self.plan, self.sample_rate, segment),
        }
    }

    pub fn classify_bit(&self, segment: &[f32]) -> Option<BitVote> {
        let enabled: f64 = self.methods.iter().map(|m| m.weight()).sum();
        vote(
            self.methods.iter().map(|&m| (m, self.estimate(m, segment))),
            enabled,
        )
    }

    /// Classifies the 32 bit segments of `samples`.
    ///
    /// Fails on the first bit without a winner.
    pub fn read_unit(&self, samples: &[f32]) -> Result<UnitRead, RejectReason> {
        if samples.len() < BITS_PER_UNIT {
            return Err(RejectReason::AmbiguousBit);
        }

        let mut bits = [false; BITS_PER_UNIT];
        let mut confidence = 0.0;
        for (slot, bounds) in bits.iter_mut().zip(bit_bounds(samples.len())) {
            let vote = self
                .classify_bit(&samples[bounds])
                .ok_or(RejectReason::AmbiguousBit)?;
            *slot = vote.bit;
            confidence += vote.confidence;
        }

        Ok(UnitRead {
            bits,
            confidence: confidence / BITS_PER_UNIT as f64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::codec::FrameCodec;
    use crate::process::synth::ToneSynthesizer;

    fn setup() -> (TimecodeFormat, FrequencyPlan, ToneSynthesizer) {
        let format = TimecodeFormat::default();
        let plan = FrequencyPlan::default();
        let synth = ToneSynthesizer::new(format, plan).unwrap();
        (format, plan, synth)
    }

    #[test]
    fn test_each_method_classifies_clean_tones() {
        let (format, plan, synth) = setup();
        let analyzer = BitAnalyzer::for_mode(&format, plan, DecodeMode::Tolerant);

        for bit in [false, true] {
            let segment = synth.render_bit(bit, 60).unwrap();
            for method in Method::ALL {
                let vote = analyzer.estimate(method, &segment);
                assert_eq!(vote.map(|v| v.bit), Some(bit), "{method} on bit {bit}");
            }
            let vote = analyzer.classify_bit(&segment).unwrap();
            assert_eq!(vote.bit, bit);
            assert!(vote.confidence > 0.5);
        }
    }

    #[test]
    fn test_silence_abstains() {
        let (format, plan, _) = setup();
        let analyzer = BitAnalyzer::for_mode(&format, plan, DecodeMode::Tolerant);
        let silence = [0.0f32; 60];
        for method in Method::ALL {
            assert_eq!(analyzer.estimate(method, &silence), None, "{method}");
        }
        assert_eq!(analyzer.classify_bit(&silence), None);
    }

    #[test]
    fn test_vote_ties_fail() {
        let one = Some(BitVote {
            bit: true,
            confidence: 1.0,
        });
        let zero = Some(BitVote {
            bit: false,
            confidence: 1.0,
        });
        assert_eq!(
            vote([(Method::ZeroCrossing, one), (Method::Autocorrelation, zero)], 4.0),
            None
        );
        assert_eq!(vote([(Method::Spectral, None)], 2.0), None);

        let v = vote(
            [
                (Method::Spectral, one),
                (Method::ZeroCrossing, zero),
                (Method::Autocorrelation, None),
            ],
            4.0,
        )
        .unwrap();
        assert!(v.bit);
        assert!((v.confidence - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_read_unit_clean() {
        let (format, plan, synth) = setup();
        let unit = FrameCodec.encode(12345).unwrap();
        let audio = synth.render_unit(&unit, 1920).unwrap();

        for mode in [DecodeMode::Strict, DecodeMode::Tolerant] {
            let analyzer = BitAnalyzer::for_mode(&format, plan, mode);
            let read = analyzer.read_unit(&audio).unwrap();
            assert_eq!(&read.bits, unit.bits());
            assert!(read.confidence > 0.4);
        }
    }

    #[test]
    fn test_short_unit_rejected() {
        let (format, plan, _) = setup();
        let analyzer = BitAnalyzer::for_mode(&format, plan, DecodeMode::Strict);
        assert_eq!(
            analyzer.read_unit(&[0.1; 16]),
            Err(RejectReason::AmbiguousBit)
        );
    }
}
