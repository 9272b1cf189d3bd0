use image::RgbImage;
use log::{debug, trace, warn};
use rayon::prelude::*;

use crate::process::visual::{PatternLayout, VisualFrameReader, VisualRead};
use crate::process::window::{VideoPhaseClassifier, VideoThresholds, WindowDetector};
use crate::process::{DecodeMode, DecodeOutcome, RejectReason, collapse_repeats};
use crate::structs::detection::Detection;
use crate::structs::format::TimecodeFormat;
use crate::structs::layout::CycleLayout;
use crate::structs::window::{TimecodeWindow, VideoPhase, WindowClassification};
use crate::utils::errors::FrameError;

#[derive(Debug, Clone, Copy, PartialEq)]
struct FrameRecord {
    label: VideoPhase,
    read: Result<VisualRead, RejectReason>,
}

/// Decodes timecode from a sequence of video frames.
///
/// Frames are analysed as they are pushed; only per-frame results are kept.
/// [`finish`](VideoDecoder::finish) locates the timecode window and assembles detections.
#[derive(Debug, Clone)]
pub struct VideoDecoder {
    format: TimecodeFormat,
    layout: CycleLayout,
    mode: DecodeMode,
    reader: VisualFrameReader,
    classifier: VideoPhaseClassifier,
    records: Vec<FrameRecord>,
}

impl VideoDecoder {
    pub fn new(
        width: u32,
        height: u32,
        format: TimecodeFormat,
        layout: CycleLayout,
        mode: DecodeMode,
    ) -> Result<Self, FrameError> {
        let pattern = PatternLayout::new(width, height)?;
        Ok(Self {
            format,
            layout,
            mode,
            reader: VisualFrameReader::for_mode(pattern, mode),
            classifier: VideoPhaseClassifier::new(VideoThresholds::for_mode(mode)),
            records: Vec::new(),
        })
    }

    /// Bytes in one rgb24 frame.
    pub fn frame_bytes(&self) -> usize {
        let pattern = self.reader.layout();
        pattern.width as usize * pattern.height as usize * 3
    }

    pub fn frames(&self) -> usize {
        self.records.len()
    }

    fn check(&self, frame: &RgbImage) -> Result<(), FrameError> {
        let pattern = self.reader.layout();
        if frame.width() != pattern.width || frame.height() != pattern.height {
            return Err(FrameError::BufferSize {
                expected: self.frame_bytes(),
                actual: frame.width() as usize * frame.height() as usize * 3,
            });
        }
        Ok(())
    }

    fn analyze(&self, frame: &RgbImage) -> FrameRecord {
        FrameRecord {
            label: self.classifier.classify_frame(frame),
            read: self.reader.read(frame),
        }
    }

    pub fn push_frame(&mut self, frame: &RgbImage) -> Result<(), FrameError> {
        self.check(frame)?;
        let record = self.analyze(frame);
        self.records.push(record);
        Ok(())
    }

    /// Analyses a batch of frames in parallel, keeping their order.
    pub fn push_frames(&mut self, frames: &[RgbImage]) -> Result<(), FrameError> {
        frames.iter().try_for_each(|f| self.check(f))?;
        let records: Vec<FrameRecord> = frames.par_iter().map(|f| self.analyze(f)).collect();
        self.records.extend(records);
        Ok(())
    }

    /// Pushes one packed rgb24 frame.
    pub fn push_raw(&mut self, data: Vec<u8>) -> Result<(), FrameError> {
        let pattern = *self.reader.layout();
        let actual = data.len();
        let frame = RgbImage::from_raw(pattern.width, pattern.height, data).ok_or(
            FrameError::BufferSize {
                expected: self.frame_bytes(),
                actual,
            },
        )?;
        self.push_frame(&frame)
    }

    pub fn finish(self) -> DecodeOutcome {
        let fps = self.format.fps();
        let len = self.records.len() as u64;
        let mut outcome = DecodeOutcome::default();

        let cls = WindowClassification::from_labels(self.records.iter().map(|r| r.label), 1, fps);
        let detector = WindowDetector::new(self.mode, self.layout.timecode_secs);

        let (region, limit) = match detector.locate(&cls) {
            Ok(window) => {
                outcome.window = Some(window);
                let limit = self.format.plausible_limit(window.duration_secs(fps));
                (window.widened(1, len), limit)
            }
            Err(err) => {
                warn!("{err}, reading every frame");
                outcome.window_error = Some(err);
                let (_, max_secs) = detector.accepted_secs();
                (
                    TimecodeWindow { start: 0, end: len },
                    self.format.plausible_limit(max_secs),
                )
            }
        };

        let mut detections = Vec::new();
        for position in region.start..region.end {
            outcome.stats.scanned += 1;
            let read = self.records[position as usize]
                .read
                .and_then(|read| {
                    if read.frame_id < limit {
                        Ok(read)
                    } else {
                        Err(RejectReason::Implausible)
                    }
                });

            match read {
                Ok(read) => {
                    detections.push(Detection::new(position as i64, read.frame_id, read.confidence))
                }
                Err(reason) => {
                    trace!("Frame {position} rejected: {reason:?}");
                    outcome.stats.rejects.record(reason);
                }
            }
        }

        outcome.stats.accepted = detections.len();
        outcome.detections = collapse_repeats(detections);

        debug!(
            "Read {} of {} frames, {} detections after collapsing repeats",
            outcome.stats.accepted,
            outcome.stats.scanned,
            outcome.detections.len()
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::visual::PatternRenderer;
    use image::Rgb;

    fn short_layout() -> CycleLayout {
        CycleLayout {
            pattern_secs: 2.0,
            blank_secs: 1.0,
            timecode_secs: 8.0,
            ..CycleLayout::default()
        }
    }

    fn cycle_frames(w: u32, h: u32) -> Vec<RgbImage> {
        let renderer = PatternRenderer::new(PatternLayout::new(w, h).unwrap());
        let grey = RgbImage::from_pixel(w, h, Rgb([180, 180, 180]));
        let black = RgbImage::new(w, h);

        let mut frames = vec![grey; 50];
        frames.extend(std::iter::repeat_n(black.clone(), 25));
        frames.extend((0..200).map(|id| renderer.render(id).unwrap()));
        frames.extend(std::iter::repeat_n(black, 25));
        frames
    }

    #[test]
    fn test_strict_cycle() {
        let mut decoder = VideoDecoder::new(
            320,
            180,
            TimecodeFormat::default(),
            short_layout(),
            DecodeMode::Strict,
        )
        .unwrap();
        decoder.push_frames(&cycle_frames(320, 180)).unwrap();
        assert_eq!(decoder.frames(), 300);

        let outcome = decoder.finish();
        let window = outcome.window.unwrap();
        assert!(window.start == 75 || window.start == 76);
        assert_eq!(window.end, 275);

        let ids: Vec<u32> = outcome.detections.iter().map(|d| d.frame_id).collect();
        assert_eq!(ids, (0..200).collect::<Vec<_>>());
        assert!(outcome.detections.iter().all(|d| d.position == 75 + d.frame_id as i64));
        assert!(outcome.detections.iter().all(|d| d.confidence == 0.85));
    }

    #[test]
    fn test_tolerant_collapses_repeats() {
        let frames = cycle_frames(320, 180);
        // every timecode frame shown twice, as after a frame-rate doubling
        let mut doubled = frames[..75].to_vec();
        for f in &frames[75..275] {
            doubled.push(f.clone());
            doubled.push(f.clone());
        }
        doubled.extend_from_slice(&frames[275..]);

        let layout = CycleLayout {
            timecode_secs: 16.0,
            ..short_layout()
        };
        let mut decoder =
            VideoDecoder::new(320, 180, TimecodeFormat::default(), layout, DecodeMode::Tolerant)
                .unwrap();
        for f in &doubled {
            decoder.push_frame(f).unwrap();
        }

        let outcome = decoder.finish();
        assert!(outcome.window.is_some());
        assert!(outcome.detections.len() >= 190);
        assert!(outcome.detections.windows(2).all(|w| w[0].frame_id < w[1].frame_id));
        assert!(outcome.detections.iter().all(|d| d.confidence == 0.95));
        assert!(outcome.stats.accepted >= 2 * outcome.detections.len() - 1);
    }

    #[test]
    fn test_frame_size_checked() {
        let mut decoder = VideoDecoder::new(
            320,
            180,
            TimecodeFormat::default(),
            CycleLayout::default(),
            DecodeMode::Strict,
        )
        .unwrap();
        assert_eq!(
            decoder.push_frame(&RgbImage::new(160, 90)),
            Err(FrameError::BufferSize {
                expected: 320 * 180 * 3,
                actual: 160 * 90 * 3
            })
        );
        assert!(matches!(
            decoder.push_raw(vec![0; 10]),
            Err(FrameError::BufferSize { actual: 10, .. })
        ));
        assert!(decoder.push_raw(vec![0; 320 * 180 * 3]).is_ok());

        let outcome = decoder.finish();
        assert!(outcome.detections.is_empty());
        assert!(outcome.window_error.is_some());
    }
}
