use crate::structs::format::TimecodeFormat;
use crate::utils::errors::RangeError;

/// Durations of the four-phase calibration cycle.
///
/// A cycle is: calibration pattern with a reference tone, blank, timecode, blank.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleLayout {
    pub pattern_secs: f64,
    pub blank_secs: f64,
    pub timecode_secs: f64,
    pub tone_hz: f64,
    pub tone_amplitude: f32,
}

impl Default for CycleLayout {
    fn default() -> Self {
        Self {
            pattern_secs: 6.0,
            blank_secs: 1.0,
            timecode_secs: 30.0,
            tone_hz: 1000.0,
            tone_amplitude: 0.5,
        }
    }
}

/// Cycle phase boundaries in whole units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleUnits {
    pub pattern: u64,
    pub blank: u64,
    pub timecode: u64,
}

impl CycleUnits {
    pub fn timecode_start(&self) -> u64 {
        self.pattern + self.blank
    }

    pub fn timecode_end(&self) -> u64 {
        self.timecode_start() + self.timecode
    }

    pub fn total(&self) -> u64 {
        self.timecode_end() + self.blank
    }
}

impl CycleLayout {
    pub fn validate(&self) -> Result<(), RangeError> {
        for secs in [self.pattern_secs, self.blank_secs, self.timecode_secs] {
            if !secs.is_finite() || secs < 0.0 {
                return Err(RangeError::InvalidPhaseDuration(secs));
            }
        }
        if self.timecode_secs <= 0.0 {
            return Err(RangeError::InvalidPhaseDuration(self.timecode_secs));
        }
        if !self.tone_hz.is_finite() || self.tone_hz <= 0.0 {
            return Err(RangeError::InvalidFrequency(self.tone_hz));
        }
        Ok(())
    }

    pub fn cycle_secs(&self) -> f64 {
        self.pattern_secs + 2.0 * self.blank_secs + self.timecode_secs
    }

    /// Phase lengths rounded to whole units of `format`.
    pub fn units(&self, format: &TimecodeFormat) -> CycleUnits {
        let to_units = |secs: f64| (secs * format.fps()).round() as u64;
        CycleUnits {
            pattern: to_units(self.pattern_secs),
            blank: to_units(self.blank_secs),
            timecode: to_units(self.timecode_secs).max(1),
        }
    }
}

#[test]
fn test_default_cycle_units() {
    let layout = CycleLayout::default();
    assert!(layout.validate().is_ok());
    assert_eq!(layout.cycle_secs(), 38.0);

    let units = layout.units(&TimecodeFormat::default());
    assert_eq!(units.timecode_start(), 175);
    assert_eq!(units.timecode_end(), 925);
    assert_eq!(units.total(), 950);

    let bad = CycleLayout {
        timecode_secs: 0.0,
        ..CycleLayout::default()
    };
    assert_eq!(bad.validate(), Err(RangeError::InvalidPhaseDuration(0.0)));
}
