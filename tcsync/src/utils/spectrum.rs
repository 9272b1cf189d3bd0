//! Windowed power spectra for tone classification.

use std::f64::consts::PI;
use std::sync::Arc;

use rustfft::{Fft, FftPlanner, num_complex::Complex};

use crate::structs::frequency::GuardRange;

/// Smallest FFT length used for bit segments.
pub const MIN_FFT_LEN: usize = 256;

/// Hann-windowed, zero-padded power spectrum of fixed length.
///
/// The FFT plan is built once; [`Spectrum`] is shared read-only across rayon workers.
#[derive(Clone)]
pub struct Spectrum {
    fft: Arc<dyn Fft<f64>>,
    len: usize,
    sample_rate: f64,
}

impl std::fmt::Debug for Spectrum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Spectrum")
            .field("len", &self.len)
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}

impl Spectrum {
    /// Plans a forward FFT large enough for segments of up to `max_segment` samples.
    pub fn new(max_segment: usize, sample_rate: u32) -> Self {
        let len = max_segment.next_power_of_two().max(MIN_FFT_LEN);
        let fft = FftPlanner::new().plan_fft_forward(len);

        Self {
            fft,
            len,
            sample_rate: sample_rate as f64,
        }
    }

    pub fn fft_len(&self) -> usize {
        self.len
    }

    /// Width of one frequency bin in Hz.
    pub fn bin_hz(&self) -> f64 {
        self.sample_rate / self.len as f64
    }

    /// Squared magnitudes for bins `0..=len/2`.
    ///
    /// Segments longer than the FFT length are truncated.
    pub fn power(&self, samples: &[f32]) -> Vec<f64> {
        let n = samples.len().min(self.len);
        let mut buf = vec![Complex::new(0.0, 0.0); self.len];

        if n > 1 {
            let denom = (n - 1) as f64;
            for (i, (slot, &x)) in buf.iter_mut().zip(&samples[..n]).enumerate() {
                let w = 0.5 - 0.5 * (2.0 * PI * i as f64 / denom).cos();
                *slot = Complex::new(x as f64 * w, 0.0);
            }
        } else if n == 1 {
            buf[0] = Complex::new(samples[0] as f64, 0.0);
        }

        self.fft.process(&mut buf);

        buf[..=self.len / 2].iter().map(|c| c.norm_sqr()).collect()
    }

    fn bins(&self, range: &GuardRange) -> std::ops::RangeInclusive<usize> {
        let hz = self.bin_hz();
        let last = self.len / 2;
        let lo = ((range.low / hz).ceil() as usize).min(last);
        let hi = ((range.high / hz).floor() as usize).min(last);
        lo..=hi
    }

    /// Largest bin power inside `range`.
    pub fn peak_in(&self, power: &[f64], range: &GuardRange) -> f64 {
        let bins = self.bins(range);
        if bins.is_empty() {
            return 0.0;
        }
        power[bins].iter().copied().fold(0.0, f64::max)
    }

    /// Summed bin power inside `range`.
    pub fn energy_in(&self, power: &[f64], range: &GuardRange) -> f64 {
        let bins = self.bins(range);
        if bins.is_empty() {
            return 0.0;
        }
        power[bins].iter().sum()
    }

    /// Summed bin power, DC excluded.
    pub fn total_energy(power: &[f64]) -> f64 {
        power.iter().skip(1).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(freq: f64, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * PI * freq * i as f64 / 48000.0).sin() as f32)
            .collect()
    }

    #[test]
    fn test_fft_len() {
        assert_eq!(Spectrum::new(60, 48000).fft_len(), 256);
        assert_eq!(Spectrum::new(24000, 48000).fft_len(), 32768);
    }

    #[test]
    fn test_peak_lands_in_guard() {
        let spectrum = Spectrum::new(60, 48000);
        let low = GuardRange::new(3200.0, 4800.0);
        let high = GuardRange::new(6400.0, 9600.0);

        let power = spectrum.power(&tone(4000.0, 60));
        assert!(spectrum.peak_in(&power, &low) > 100.0 * spectrum.peak_in(&power, &high));

        let power = spectrum.power(&tone(8000.0, 60));
        assert!(spectrum.peak_in(&power, &high) > 100.0 * spectrum.peak_in(&power, &low));
    }

    #[test]
    fn test_silence() {
        let spectrum = Spectrum::new(60, 48000);
        let power = spectrum.power(&[0.0; 60]);
        assert_eq!(Spectrum::total_energy(&power), 0.0);
    }
}
