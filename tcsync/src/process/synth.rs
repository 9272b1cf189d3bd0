use std::f64::consts::PI;

use crate::structs::format::{TimecodeFormat, bit_bounds};
use crate::structs::frequency::FrequencyPlan;
use crate::structs::unit::EncodedUnit;
use crate::utils::errors::RangeError;

/// Peak amplitude of a bit tone relative to full scale.
pub const BIT_AMPLITUDE: f32 = 0.6;
/// Fade length relative to the segment length.
pub const FADE_FRACTION: f64 = 0.05;

/// Renders bits as FSK tone segments.
#[derive(Debug, Clone)]
pub struct ToneSynthesizer {
    format: TimecodeFormat,
    plan: FrequencyPlan,
}

impl ToneSynthesizer {
    pub fn new(format: TimecodeFormat, plan: FrequencyPlan) -> Result<Self, RangeError> {
        plan.check_nyquist(format.sample_rate())?;
        Ok(Self { format, plan })
    }

    pub fn format(&self) -> &TimecodeFormat {
        &self.format
    }

    pub fn plan(&self) -> &FrequencyPlan {
        &self.plan
    }

    /// One bit as a tone of `len` samples.
    pub fn render_bit(&self, bit: bool, len: usize) -> Result<Vec<f32>, RangeError> {
        if len == 0 {
            return Err(RangeError::EmptySegment);
        }
        let mut out = vec![0.0; len];
        self.fill_bit(bit, &mut out);
        Ok(out)
    }

    fn fill_bit(&self, bit: bool, out: &mut [f32]) {
        render_sine(
            out,
            self.plan.symbol(bit),
            self.format.sample_rate(),
            BIT_AMPLITUDE,
        );
        apply_fades(out);
    }

    /// One unit spread over `len` samples on the bit grid.
    pub fn render_unit(&self, unit: &EncodedUnit, len: usize) -> Result<Vec<f32>, RangeError> {
        let mut out = vec![0.0; len];
        self.render_unit_into(unit, &mut out)?;
        Ok(out)
    }

    pub fn render_unit_into(&self, unit: &EncodedUnit, out: &mut [f32]) -> Result<(), RangeError> {
        if out.len() < unit.bits().len() {
            return Err(RangeError::EmptySegment);
        }
        let len = out.len();
        for (bounds, &bit) in bit_bounds(len).zip(unit.bits()) {
            self.fill_bit(bit, &mut out[bounds]);
        }
        Ok(())
    }

    /// Consecutive units on the global unit grid, the first at grid unit `first_unit`.
    pub fn render_units(
        &self,
        units: &[EncodedUnit],
        first_unit: u64,
    ) -> Result<Vec<f32>, RangeError> {
        let start = self.format.unit_start(first_unit);
        let end = self.format.unit_start(first_unit + units.len() as u64);
        let mut out = vec![0.0; (end - start) as usize];

        for (k, unit) in units.iter().enumerate() {
            let span = self.format.unit_span(first_unit + k as u64);
            let a = (span.start - start) as usize;
            let b = (span.end - start) as usize;
            self.render_unit_into(unit, &mut out[a..b])?;
        }
        Ok(out)
    }
}

/// Fills `out` with `amplitude * sin(2 pi f t)`, phase zero at the first sample.
pub fn render_sine(out: &mut [f32], freq: f64, sample_rate: u32, amplitude: f32) {
    let step = 2.0 * PI * freq / sample_rate as f64;
    for (i, s) in out.iter_mut().enumerate() {
        *s = amplitude * (step * i as f64).sin() as f32;
    }
}

/// Linear fade in and out over `FADE_FRACTION` of the segment, at least one sample.
pub fn apply_fades(out: &mut [f32]) {
    let len = out.len();
    let fade = ((len as f64 * FADE_FRACTION).round() as usize).max(1).min(len);
    for i in 0..fade {
        let gain = i as f32 / fade as f32;
        out[i] *= gain;
        out[len - 1 - i] *= gain;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synth() -> ToneSynthesizer {
        ToneSynthesizer::new(TimecodeFormat::default(), FrequencyPlan::default()).unwrap()
    }

    #[test]
    fn test_render_bit_deterministic() {
        let s = synth();
        let a = s.render_bit(true, 60).unwrap();
        let b = s.render_bit(true, 60).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 60);
        assert_eq!(a[0], 0.0);
        assert_eq!(a[59], 0.0);
        assert!(a.iter().all(|x| x.abs() <= BIT_AMPLITUDE));
        assert!(a.iter().any(|x| x.abs() > 0.5));
    }

    #[test]
    fn test_empty_segment_rejected() {
        assert_eq!(synth().render_bit(false, 0), Err(RangeError::EmptySegment));
    }

    #[test]
    fn test_render_units_follows_grid() {
        let s = ToneSynthesizer::new(
            TimecodeFormat::new(crate::structs::format::FrameRate::Ntsc, 48000).unwrap(),
            FrequencyPlan::default(),
        )
        .unwrap();
        let units: Vec<_> = (0..5).map(|i| EncodedUnit::new(i).unwrap()).collect();
        let audio = s.render_units(&units, 7).unwrap();
        let format = s.format();
        assert_eq!(
            audio.len() as u64,
            format.unit_start(12) - format.unit_start(7)
        );
    }

    #[test]
    fn test_nyquist_checked() {
        let format = TimecodeFormat::new(crate::structs::format::FrameRate::Pal, 16000).unwrap();
        assert!(matches!(
            ToneSynthesizer::new(format, FrequencyPlan::default()),
            Err(RangeError::AboveNyquist { .. })
        ));
    }
}
