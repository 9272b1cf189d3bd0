use image::{Rgb, RgbImage};

use crate::process::codec::FrameCodec;
use crate::process::synth::{ToneSynthesizer, render_sine};
use crate::process::visual::PatternRenderer;
use crate::structs::format::TimecodeFormat;
use crate::structs::frequency::FrequencyPlan;
use crate::structs::layout::{CycleLayout, CycleUnits};
use crate::utils::errors::RangeError;

/// 75 % colour bars, left to right.
pub const COLOUR_BARS: [Rgb<u8>; 7] = [
    Rgb([191, 191, 191]),
    Rgb([191, 191, 0]),
    Rgb([0, 191, 191]),
    Rgb([0, 191, 0]),
    Rgb([191, 0, 191]),
    Rgb([191, 0, 0]),
    Rgb([0, 0, 191]),
];

/// What a video frame of the cycle shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleFrame {
    ColourBars,
    Blank,
    /// Timecode pattern for the given frame id.
    Timecode(u32),
}

/// Renders calibration cycles.
///
/// Phase boundaries fall on whole units, so the timecode phase of every cycle starts
/// on the unit grid. Frame ids restart at zero in each cycle.
#[derive(Debug, Clone)]
pub struct CycleGenerator {
    format: TimecodeFormat,
    layout: CycleLayout,
    units: CycleUnits,
    synth: ToneSynthesizer,
    codec: FrameCodec,
}

impl CycleGenerator {
    pub fn new(
        format: TimecodeFormat,
        plan: FrequencyPlan,
        layout: CycleLayout,
    ) -> Result<Self, RangeError> {
        layout.validate()?;
        Ok(Self {
            units: layout.units(&format),
            synth: ToneSynthesizer::new(format, plan)?,
            format,
            layout,
            codec: FrameCodec,
        })
    }

    pub fn units(&self) -> &CycleUnits {
        &self.units
    }

    /// Video frames (units) in `cycles` cycles.
    pub fn frame_count(&self, cycles: u32) -> u64 {
        self.units.total() * cycles as u64
    }

    pub fn render_audio(&self, cycles: u32) -> Result<Vec<f32>, RangeError> {
        let total = self.units.total();
        let mut out = vec![0.0; self.format.unit_start(total * cycles as u64) as usize];

        for c in 0..cycles as u64 {
            let base = c * total;

            let a = self.format.unit_start(base) as usize;
            let b = self.format.unit_start(base + self.units.pattern) as usize;
            render_sine(
                &mut out[a..b],
                self.layout.tone_hz,
                self.format.sample_rate(),
                self.layout.tone_amplitude,
            );

            let first_unit = base + self.units.timecode_start();
            let timecode =
                self.codec
                    .encode_audio(&self.synth, 0, self.units.timecode, first_unit)?;
            let a = self.format.unit_start(first_unit) as usize;
            out[a..a + timecode.len()].copy_from_slice(&timecode);
        }

        Ok(out)
    }

    pub fn frame_kind(&self, frame: u64) -> CycleFrame {
        let within = frame % self.units.total();
        if within < self.units.pattern {
            CycleFrame::ColourBars
        } else if within >= self.units.timecode_start() && within < self.units.timecode_end() {
            CycleFrame::Timecode((within - self.units.timecode_start()) as u32)
        } else {
            CycleFrame::Blank
        }
    }

    pub fn render_frame(&self, frame: u64, renderer: &PatternRenderer) -> Result<RgbImage, RangeError> {
        let layout = renderer.layout();
        match self.frame_kind(frame) {
            CycleFrame::ColourBars => Ok(colour_bars(layout.width, layout.height)),
            CycleFrame::Blank => Ok(RgbImage::new(layout.width, layout.height)),
            CycleFrame::Timecode(id) => renderer.render(id as u64),
        }
    }
}

pub fn colour_bars(width: u32, height: u32) -> RgbImage {
    let bars = COLOUR_BARS.len() as u32;
    RgbImage::from_fn(width, height, |x, _| {
        COLOUR_BARS[((x * bars / width.max(1)) as usize).min(COLOUR_BARS.len() - 1)]
    })
}
