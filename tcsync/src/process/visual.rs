use image::{Rgb, RgbImage};

use crate::process::codec::FrameCodec;
use crate::process::{DecodeMode, RejectReason};
use crate::structs::format::BITS_PER_UNIT;
use crate::utils::bitstream_io::UnitBits;
use crate::utils::blob::{ColorRange, Rect, find_blob, mean_luma};
use crate::utils::errors::{FrameError, RangeError};

pub const MIN_FRAME_WIDTH: u32 = 160;
pub const MIN_FRAME_HEIGHT: u32 = 90;
/// Fraction of each cell, centred, that is sampled.
pub const CELL_INNER_FRACTION: f64 = 0.6;
/// Strips whose cell means vary less than this carry no readable pattern.
pub const MIN_STRIP_STD: f64 = 8.0;
/// Cells of a uniformly lit strip below this luma read as 0.
pub const DARK_CELL_LUMA: f64 = 128.0;

pub const MARKER_TOP_LEFT: Rgb<u8> = Rgb([255, 0, 0]);
pub const MARKER_BOTTOM_RIGHT: Rgb<u8> = Rgb([0, 255, 0]);
pub const CELL_ON: Rgb<u8> = Rgb([255, 255, 255]);
pub const BACKGROUND: Rgb<u8> = Rgb([0, 0, 0]);

/// Design geometry of the timecode pattern for one frame size.
///
/// Markers are squares of side `max(H / 10, 4)` inset by `(W / 20, H / 20)` from the
/// top-left and bottom-right corners. The 32-cell strip runs along the top-left
/// marker's rows, half a marker side clear of both markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternLayout {
    pub width: u32,
    pub height: u32,
    pub inset_x: u32,
    pub inset_y: u32,
    pub marker: u32,
    pub gap: u32,
}

impl PatternLayout {
    pub fn new(width: u32, height: u32) -> Result<Self, FrameError> {
        if width < MIN_FRAME_WIDTH || height < MIN_FRAME_HEIGHT {
            return Err(FrameError::TooSmall {
                width,
                height,
                min_width: MIN_FRAME_WIDTH,
                min_height: MIN_FRAME_HEIGHT,
            });
        }

        let marker = (height / 10).max(4);
        let layout = Self {
            width,
            height,
            inset_x: width / 20,
            inset_y: height / 20,
            marker,
            gap: marker / 2,
        };

        // markers and gaps on both sides plus one pixel per cell
        let needed = 2 * (layout.inset_x + layout.marker + layout.gap) + BITS_PER_UNIT as u32;
        if needed > width {
            return Err(FrameError::TooNarrow {
                width,
                height,
                needed,
            });
        }

        Ok(layout)
    }

    pub fn top_left_marker(&self) -> Rect {
        Rect::new(self.inset_x, self.inset_y, self.marker, self.marker)
    }

    pub fn bottom_right_marker(&self) -> Rect {
        Rect::new(
            self.width - self.inset_x - self.marker,
            self.height - self.inset_y - self.marker,
            self.marker,
            self.marker,
        )
    }

    pub fn strip(&self) -> Rect {
        let x0 = self.inset_x + self.marker + self.gap;
        let x1 = self.width - self.inset_x - self.marker - self.gap;
        Rect::new(x0, self.inset_y, x1 - x0, self.marker)
    }
}

/// Pixel columns of cell `i` of a strip spanning `[x0, x1)`.
fn cell_bounds(x0: f64, x1: f64, i: usize) -> (f64, f64) {
    let w = (x1 - x0) / BITS_PER_UNIT as f64;
    (x0 + i as f64 * w, x0 + (i + 1) as f64 * w)
}

/// Renders frame ids as timecode patterns.
#[derive(Debug, Clone, Copy)]
pub struct PatternRenderer {
    layout: PatternLayout,
    codec: FrameCodec,
}

impl PatternRenderer {
    pub fn new(layout: PatternLayout) -> Self {
        Self {
            layout,
            codec: FrameCodec,
        }
    }

    pub fn layout(&self) -> &PatternLayout {
        &self.layout
    }

    pub fn render(&self, frame_id: u64) -> Result<RgbImage, RangeError> {
        let unit = self.codec.encode(frame_id)?;
        let layout = &self.layout;
        let mut img = RgbImage::from_pixel(layout.width, layout.height, BACKGROUND);

        fill(&mut img, layout.top_left_marker(), MARKER_TOP_LEFT);
        fill(&mut img, layout.bottom_right_marker(), MARKER_BOTTOM_RIGHT);

        let strip = layout.strip();
        let (x0, x1) = (strip.x as f64, (strip.x + strip.width) as f64);
        for (i, &bit) in unit.bits().iter().enumerate() {
            if !bit {
                continue;
            }
            let (a, b) = cell_bounds(x0, x1, i);
            let (a, b) = (a.floor() as u32, b.floor() as u32);
            fill(&mut img, Rect::new(a, strip.y, b - a, strip.height), CELL_ON);
        }

        Ok(img)
    }
}

fn fill(img: &mut RgbImage, rect: Rect, color: Rgb<u8>) {
    let rect = rect.clamp_to(img.width(), img.height());
    for y in rect.y..rect.y + rect.height {
        for x in rect.x..rect.x + rect.width {
            img.put_pixel(x, y, color);
        }
    }
}

/// Visual read strategies, most trusted first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadMethod {
    /// Strip geometry derived from the detected corner markers.
    CornerAligned,
    /// Strip at the fixed design geometry.
    Plain,
}

impl ReadMethod {
    pub fn confidence(self) -> f64 {
        match self {
            ReadMethod::CornerAligned => 0.95,
            ReadMethod::Plain => 0.85,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisualRead {
    pub frame_id: u32,
    pub confidence: f64,
    pub method: ReadMethod,
}

/// Samples the 32 cells of a strip spanning `[x0, x1)` by `[y0, y0 + height)`.
///
/// Each cell is thresholded against the mean of all cells. A strip with no contrast
/// is rejected unless `anchored` (both corner markers seen) and dark, which reads as
/// all zeros.
pub fn sample_strip(
    frame: &RgbImage,
    x0: f64,
    x1: f64,
    y0: f64,
    height: f64,
    anchored: bool,
) -> Result<UnitBits, RejectReason> {
    if x1 - x0 < BITS_PER_UNIT as f64 || height < 1.0 || x0 < 0.0 || y0 < 0.0 {
        return Err(RejectReason::NoPattern);
    }

    let margin = (1.0 - CELL_INNER_FRACTION) / 2.0;
    let ya = (y0 + margin * height).round() as u32;
    let yb = ((y0 + (1.0 - margin) * height).round() as u32).max(ya + 1);

    let mut means = [0.0f64; BITS_PER_UNIT];
    for (i, mean) in means.iter_mut().enumerate() {
        let (a, b) = cell_bounds(x0, x1, i);
        let w = b - a;
        let xa = (a + margin * w).round() as u32;
        let xb = ((b - margin * w).round() as u32).max(xa + 1);
        *mean = mean_luma(frame, Rect::new(xa, ya, xb - xa, yb - ya));
    }

    let n = BITS_PER_UNIT as f64;
    let threshold = means.iter().sum::<f64>() / n;
    let std = (means.iter().map(|m| (m - threshold).powi(2)).sum::<f64>() / n).sqrt();
    if std < MIN_STRIP_STD {
        if anchored && threshold < DARK_CELL_LUMA {
            return Ok([false; BITS_PER_UNIT]);
        }
        return Err(RejectReason::NoPattern);
    }

    let mut bits = [false; BITS_PER_UNIT];
    for (bit, &mean) in bits.iter_mut().zip(&means) {
        *bit = mean > threshold;
    }
    Ok(bits)
}

/// Reads frame ids from timecode patterns.
#[derive(Debug, Clone)]
pub struct VisualFrameReader {
    layout: PatternLayout,
    methods: Vec<ReadMethod>,
    codec: FrameCodec,
}

impl VisualFrameReader {
    pub fn new(layout: PatternLayout, methods: &[ReadMethod]) -> Self {
        Self {
            layout,
            methods: methods.to_vec(),
            codec: FrameCodec,
        }
    }

    /// Plain strip only for strict decoding, corner-aligned then plain for tolerant.
    pub fn for_mode(layout: PatternLayout, mode: DecodeMode) -> Self {
        match mode {
            DecodeMode::Strict => Self::new(layout, &[ReadMethod::Plain]),
            DecodeMode::Tolerant => {
                Self::new(layout, &[ReadMethod::CornerAligned, ReadMethod::Plain])
            }
        }
    }

    pub fn layout(&self) -> &PatternLayout {
        &self.layout
    }

    fn strip_bits(&self, frame: &RgbImage, method: ReadMethod) -> Result<UnitBits, RejectReason> {
        match method {
            ReadMethod::Plain => {
                let strip = self.layout.strip();
                sample_strip(
                    frame,
                    strip.x as f64,
                    (strip.x + strip.width) as f64,
                    strip.y as f64,
                    strip.height as f64,
                    self.markers_in_place(frame),
                )
            }
            ReadMethod::CornerAligned => {
                let (w, h) = (frame.width(), frame.height());
                let top_left = Rect::new(0, 0, w / 3, h / 3);
                let bottom_right = Rect::new(w - w / 3, h - h / 3, w / 3, h / 3);

                let red = find_blob(frame, top_left, &ColorRange::RED)
                    .ok_or(RejectReason::NoPattern)?;
                let green = find_blob(frame, bottom_right, &ColorRange::GREEN)
                    .ok_or(RejectReason::NoPattern)?;

                let x0 = red.right() + red.side() / 2.0;
                let x1 = green.left() - green.side() / 2.0;
                sample_strip(frame, x0, x1, red.top(), red.side(), true)
            }
        }
    }

    /// Both markers fill at least half their design squares.
    fn markers_in_place(&self, frame: &RgbImage) -> bool {
        let min_area = (self.layout.marker * self.layout.marker / 2) as usize;
        let present = |rect: Rect, range: &ColorRange| {
            find_blob(frame, rect, range).is_some_and(|blob| blob.area >= min_area)
        };
        present(self.layout.top_left_marker(), &ColorRange::RED)
            && present(self.layout.bottom_right_marker(), &ColorRange::GREEN)
    }

    pub fn read_with(&self, frame: &RgbImage, method: ReadMethod) -> Result<VisualRead, RejectReason> {
        let bits = self.strip_bits(frame, method)?;
        let frame_id = self.codec.decode_checked(&bits, None)?;
        Ok(VisualRead {
            frame_id,
            confidence: method.confidence(),
            method,
        })
    }

    /// Tries each method in order.
    pub fn read(&self, frame: &RgbImage) -> Result<VisualRead, RejectReason> {
        let mut reason = RejectReason::NoPattern;
        for &method in &self.methods {
            match self.read_with(frame, method) {
                Ok(read) => return Ok(read),
                Err(RejectReason::NoPattern) => {}
                Err(other) => reason = other,
            }
        }
        Err(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_geometry() {
        let layout = PatternLayout::new(720, 576).unwrap();
        assert_eq!(layout.top_left_marker(), Rect::new(36, 28, 57, 57));
        assert_eq!(layout.bottom_right_marker(), Rect::new(627, 491, 57, 57));
        assert_eq!(layout.strip(), Rect::new(121, 28, 478, 57));

        assert!(matches!(
            PatternLayout::new(120, 576),
            Err(FrameError::TooSmall { .. })
        ));
    }

    #[test]
    fn test_layout_rejects_tall_narrow_frames() {
        assert!(matches!(
            PatternLayout::new(200, 900),
            Err(FrameError::TooNarrow { needed: 322, .. })
        ));
        assert!(matches!(
            PatternLayout::new(160, 400),
            Err(FrameError::TooNarrow { .. })
        ));

        // narrowest width that still fits every cell
        let layout = PatternLayout::new(202, 500).unwrap();
        assert_eq!(layout.strip().width, 32);
        let img = PatternRenderer::new(layout).render(0xABCDEF).unwrap();
        let read = VisualFrameReader::for_mode(layout, DecodeMode::Strict).read(&img).unwrap();
        assert_eq!(read.frame_id, 0xABCDEF);
    }

    #[test]
    fn test_render_and_read() {
        for (w, h) in [(720, 576), (640, 480), (160, 90)] {
            let layout = PatternLayout::new(w, h).unwrap();
            let renderer = PatternRenderer::new(layout);
            for mode in [DecodeMode::Strict, DecodeMode::Tolerant] {
                let reader = VisualFrameReader::for_mode(layout, mode);
                for id in [1u64, 2, 749, 12345, 0xFFFFFF] {
                    let img = renderer.render(id).unwrap();
                    let read = reader.read(&img).unwrap();
                    assert_eq!(read.frame_id as u64, id, "{w}x{h} {mode}");
                    let expected = match mode {
                        DecodeMode::Strict => ReadMethod::Plain,
                        DecodeMode::Tolerant => ReadMethod::CornerAligned,
                    };
                    assert_eq!(read.method, expected);
                    assert_eq!(read.confidence, expected.confidence());
                }
            }
        }
    }

    #[test]
    fn test_corner_method_follows_shift() {
        let layout = PatternLayout::new(720, 576).unwrap();
        let img = PatternRenderer::new(layout).render(4321).unwrap();

        // shift the whole pattern 9 px right and 6 px down
        let mut shifted = RgbImage::from_pixel(720, 576, BACKGROUND);
        for (x, y, px) in img.enumerate_pixels() {
            if x + 9 < 720 && y + 6 < 576 {
                shifted.put_pixel(x + 9, y + 6, *px);
            }
        }

        let reader = VisualFrameReader::for_mode(layout, DecodeMode::Tolerant);
        let read = reader.read_with(&shifted, ReadMethod::CornerAligned).unwrap();
        assert_eq!(read.frame_id, 4321);
    }

    #[test]
    fn test_flat_strips() {
        let layout = PatternLayout::new(320, 180).unwrap();
        let reader = VisualFrameReader::for_mode(layout, DecodeMode::Tolerant);
        let black = RgbImage::from_pixel(320, 180, BACKGROUND);
        assert_eq!(reader.read(&black), Err(RejectReason::NoPattern));

        // all-dark strip between both markers
        let zero = PatternRenderer::new(layout).render(0).unwrap();
        for mode in [DecodeMode::Strict, DecodeMode::Tolerant] {
            let read = VisualFrameReader::for_mode(layout, mode).read(&zero).unwrap();
            assert_eq!(read.frame_id, 0);
        }

        // a uniformly lit strip is not a codeword
        let mut lit = zero.clone();
        fill(&mut lit, layout.strip(), CELL_ON);
        assert_eq!(reader.read(&lit), Err(RejectReason::NoPattern));

        // dark strip without markers
        let mut bare = zero;
        fill(&mut bare, layout.top_left_marker(), BACKGROUND);
        assert_eq!(reader.read(&bare), Err(RejectReason::NoPattern));
    }
}
