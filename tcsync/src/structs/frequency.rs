use crate::utils::errors::RangeError;

/// Minimum distance between the two guard ranges.
pub const MIN_GUARD_SEPARATION: f64 = 300.0;
/// Default guard half-width relative to the symbol frequency.
pub const DEFAULT_GUARD_FRACTION: f64 = 0.2;
pub const DEFAULT_FREQ_LOW: f64 = 4000.0;

/// Closed frequency interval in Hz.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GuardRange {
    pub low: f64,
    pub high: f64,
}

impl GuardRange {
    pub const fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    /// `freq` widened by `fraction` of itself on both sides.
    pub fn around(freq: f64, fraction: f64) -> Self {
        Self::new(freq * (1.0 - fraction), freq * (1.0 + fraction))
    }

    pub fn contains(&self, freq: f64) -> bool {
        freq >= self.low && freq <= self.high
    }
}

/// Symbol frequencies and the guard ranges the analyzer looks in.
///
/// Bit 0 is a tone at `freq_low`, bit 1 a tone at `freq_high = 2 * freq_low`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrequencyPlan {
    freq_low: f64,
    freq_high: f64,
    guard_low: GuardRange,
    guard_high: GuardRange,
}

impl Default for FrequencyPlan {
    fn default() -> Self {
        Self {
            freq_low: DEFAULT_FREQ_LOW,
            freq_high: 2.0 * DEFAULT_FREQ_LOW,
            guard_low: GuardRange::around(DEFAULT_FREQ_LOW, DEFAULT_GUARD_FRACTION),
            guard_high: GuardRange::around(2.0 * DEFAULT_FREQ_LOW, DEFAULT_GUARD_FRACTION),
        }
    }
}

impl FrequencyPlan {
    /// Plan with default guard ranges around `freq_low` and `2 * freq_low`.
    pub fn with_low(freq_low: f64) -> Result<Self, RangeError> {
        let freq_high = 2.0 * freq_low;
        Self::new(
            freq_low,
            freq_high,
            GuardRange::around(freq_low, DEFAULT_GUARD_FRACTION),
            GuardRange::around(freq_high, DEFAULT_GUARD_FRACTION),
        )
    }

    pub fn new(
        freq_low: f64,
        freq_high: f64,
        guard_low: GuardRange,
        guard_high: GuardRange,
    ) -> Result<Self, RangeError> {
        for freq in [freq_low, freq_high] {
            if !freq.is_finite() || freq <= 0.0 {
                return Err(RangeError::InvalidFrequency(freq));
            }
        }

        if (freq_high - 2.0 * freq_low).abs() > 1e-9 * freq_high {
            return Err(RangeError::FrequencyRatio {
                low: freq_low,
                high: freq_high,
            });
        }

        for (guard, freq) in [(guard_low, freq_low), (guard_high, freq_high)] {
            if !guard.low.is_finite() || !guard.high.is_finite() || guard.low >= guard.high {
                return Err(RangeError::InvalidGuardRange {
                    low: guard.low,
                    high: guard.high,
                });
            }
            if !guard.contains(freq) {
                return Err(RangeError::GuardMissesSymbol {
                    low: guard.low,
                    high: guard.high,
                    freq,
                });
            }
        }

        let separation = guard_high.low - guard_low.high;
        if separation < MIN_GUARD_SEPARATION {
            return Err(RangeError::GuardSeparation {
                separation,
                min: MIN_GUARD_SEPARATION,
            });
        }

        Ok(Self {
            freq_low,
            freq_high,
            guard_low,
            guard_high,
        })
    }

    /// Checks that the high guard range is representable at `sample_rate`.
    pub fn check_nyquist(&self, sample_rate: u32) -> Result<(), RangeError> {
        let nyquist = sample_rate as f64 / 2.0;
        if self.guard_high.high >= nyquist {
            return Err(RangeError::AboveNyquist {
                upper: self.guard_high.high,
                nyquist,
            });
        }
        Ok(())
    }

    pub fn freq_low(&self) -> f64 {
        self.freq_low
    }

    pub fn freq_high(&self) -> f64 {
        self.freq_high
    }

    pub fn guard_low(&self) -> &GuardRange {
        &self.guard_low
    }

    pub fn guard_high(&self) -> &GuardRange {
        &self.guard_high
    }

    /// Symbol frequency for a bit value.
    pub fn symbol(&self, bit: bool) -> f64 {
        if bit { self.freq_high } else { self.freq_low }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_plan_invariants() {
        let plan = FrequencyPlan::default();
        assert_eq!(plan.freq_high(), 2.0 * plan.freq_low());
        assert!(plan.guard_low().contains(plan.freq_low()));
        assert!(plan.guard_high().contains(plan.freq_high()));
        assert!(plan.guard_high().low - plan.guard_low().high >= MIN_GUARD_SEPARATION);
        assert!(plan.check_nyquist(48000).is_ok());
        assert_eq!(FrequencyPlan::with_low(DEFAULT_FREQ_LOW), Ok(plan));
    }

    #[test]
    fn test_invariants_hold_across_low_frequencies() {
        for low in (1000..=8000).step_by(250) {
            let plan = FrequencyPlan::with_low(low as f64).unwrap();
            assert!(plan.guard_low().high < plan.guard_high().low);
            assert!(plan.guard_low().contains(plan.freq_low()));
            assert!(plan.guard_high().contains(plan.freq_high()));
        }
    }

    #[test]
    fn test_rejects_bad_ratio() {
        let err = FrequencyPlan::new(
            4000.0,
            7000.0,
            GuardRange::new(3200.0, 4800.0),
            GuardRange::new(6000.0, 8000.0),
        );
        assert!(matches!(err, Err(RangeError::FrequencyRatio { .. })));
    }

    #[test]
    fn test_rejects_overlapping_guards() {
        let err = FrequencyPlan::new(
            4000.0,
            8000.0,
            GuardRange::new(3000.0, 6500.0),
            GuardRange::new(6400.0, 9600.0),
        );
        assert!(matches!(err, Err(RangeError::GuardSeparation { .. })));

        let err = FrequencyPlan::new(
            4000.0,
            8000.0,
            GuardRange::new(3200.0, 6200.0),
            GuardRange::new(6400.0, 9600.0),
        );
        assert!(matches!(err, Err(RangeError::GuardSeparation { .. })));
    }

    #[test]
    fn test_rejects_guard_without_symbol() {
        let err = FrequencyPlan::new(
            4000.0,
            8000.0,
            GuardRange::new(4100.0, 4800.0),
            GuardRange::new(6400.0, 9600.0),
        );
        assert!(matches!(err, Err(RangeError::GuardMissesSymbol { .. })));
    }

    #[test]
    fn test_nyquist() {
        let plan = FrequencyPlan::default();
        assert!(matches!(
            plan.check_nyquist(16000),
            Err(RangeError::AboveNyquist { .. })
        ));
        assert!(matches!(
            FrequencyPlan::with_low(0.0),
            Err(RangeError::InvalidFrequency(_))
        ));
    }
}
