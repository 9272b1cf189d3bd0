use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use tcsync::process::correlate::Correlation;
use tcsync::process::{DecodeMode, DecodeOutcome};
use tcsync::structs::detection::{Detection, DetectionTrack, StreamKind};
use tcsync::structs::format::{FrameRate, TimecodeFormat};
use tcsync::structs::frequency::{FrequencyPlan, GuardRange};
use tcsync::structs::layout::CycleLayout;

pub const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn load_yaml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_yaml_ng::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

pub fn save_yaml<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let text = serde_yaml_ng::to_string(value)?;
    fs::write(path, text).with_context(|| format!("writing {}", path.display()))
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct Range {
    pub low: f64,
    pub high: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Frequencies {
    pub low: f64,
    pub high: f64,
    pub guard_low: Range,
    pub guard_high: Range,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cycle {
    pub pattern_secs: f64,
    pub blank_secs: f64,
    pub timecode_secs: f64,
    pub tone_hz: f64,
    pub tone_amplitude: f32,
    #[serde(default = "one")]
    pub cycles: u32,
}

fn one() -> u32 {
    1
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct VideoSize {
    pub width: u32,
    pub height: u32,
}

/// Session sidecar written next to an encoded calibration recording.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub version: String,
    pub fps: f64,
    pub sample_rate: u32,
    pub frequencies: Frequencies,
    pub cycle: Cycle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<VideoSize>,
}

/// Validated session parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub format: TimecodeFormat,
    pub plan: FrequencyPlan,
    pub layout: CycleLayout,
    pub cycles: u32,
    pub video: Option<VideoSize>,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            format: TimecodeFormat::default(),
            plan: FrequencyPlan::default(),
            layout: CycleLayout::default(),
            cycles: 1,
            video: None,
        }
    }
}

impl Session {
    pub fn load(path: &Path) -> Result<Self> {
        let metadata: Metadata = load_yaml(path)?;
        Session::try_from(&metadata).with_context(|| format!("invalid metadata in {}", path.display()))
    }

    pub fn to_metadata(&self) -> Metadata {
        let range = |g: &GuardRange| Range {
            low: g.low,
            high: g.high,
        };
        Metadata {
            version: TOOL_VERSION.to_string(),
            fps: self.format.fps(),
            sample_rate: self.format.sample_rate(),
            frequencies: Frequencies {
                low: self.plan.freq_low(),
                high: self.plan.freq_high(),
                guard_low: range(self.plan.guard_low()),
                guard_high: range(self.plan.guard_high()),
            },
            cycle: Cycle {
                pattern_secs: self.layout.pattern_secs,
                blank_secs: self.layout.blank_secs,
                timecode_secs: self.layout.timecode_secs,
                tone_hz: self.layout.tone_hz,
                tone_amplitude: self.layout.tone_amplitude,
                cycles: self.cycles,
            },
            video: self.video,
        }
    }
}

impl TryFrom<&Metadata> for Session {
    type Error = anyhow::Error;

    fn try_from(m: &Metadata) -> Result<Self> {
        let frame_rate =
            FrameRate::from_fps(m.fps).ok_or_else(|| anyhow!("unsupported frame rate {}", m.fps))?;
        let format = TimecodeFormat::new(frame_rate, m.sample_rate)?;

        let f = &m.frequencies;
        let plan = FrequencyPlan::new(
            f.low,
            f.high,
            GuardRange::new(f.guard_low.low, f.guard_low.high),
            GuardRange::new(f.guard_high.low, f.guard_high.high),
        )?;
        plan.check_nyquist(format.sample_rate())?;

        let layout = CycleLayout {
            pattern_secs: m.cycle.pattern_secs,
            blank_secs: m.cycle.blank_secs,
            timecode_secs: m.cycle.timecode_secs,
            tone_hz: m.cycle.tone_hz,
            tone_amplitude: m.cycle.tone_amplitude,
        };
        layout.validate()?;

        Ok(Session {
            format,
            plan,
            layout,
            cycles: m.cycle.cycles,
            video: m.video,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stream {
    Audio,
    Video,
}

impl From<StreamKind> for Stream {
    fn from(kind: StreamKind) -> Self {
        match kind {
            StreamKind::Audio => Stream::Audio,
            StreamKind::Video => Stream::Video,
        }
    }
}

impl From<Stream> for StreamKind {
    fn from(stream: Stream) -> Self {
        match stream {
            Stream::Audio => StreamKind::Audio,
            Stream::Video => StreamKind::Video,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Strict,
    Tolerant,
}

impl From<DecodeMode> for Mode {
    fn from(mode: DecodeMode) -> Self {
        match mode {
            DecodeMode::Strict => Mode::Strict,
            DecodeMode::Tolerant => Mode::Tolerant,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionEntry {
    pub position: i64,
    pub frame_id: u32,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Rejects {
    pub ambiguous_bit: usize,
    pub low_confidence: usize,
    pub checksum: usize,
    pub implausible: usize,
    pub no_pattern: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub scanned: usize,
    pub accepted: usize,
    pub rejected: Rejects,
    #[serde(default)]
    pub sliding_positions: usize,
    #[serde(default)]
    pub sliding_skipped: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sliding_stop: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct Window {
    pub start: u64,
    pub end: u64,
}

/// Decoded detections of one stream. Positions are samples for audio, frames for video.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionsFile {
    pub version: String,
    pub stream: Stream,
    pub rate: f64,
    pub mode: Mode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<Window>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_error: Option<String>,
    #[serde(default)]
    pub stats: Stats,
    pub detections: Vec<DetectionEntry>,
}

impl DetectionsFile {
    pub fn new(kind: StreamKind, rate: f64, mode: DecodeMode, outcome: &DecodeOutcome) -> Self {
        let stats = &outcome.stats;
        Self {
            version: TOOL_VERSION.to_string(),
            stream: kind.into(),
            rate,
            mode: mode.into(),
            window: outcome.window.map(|w| Window {
                start: w.start,
                end: w.end,
            }),
            window_error: outcome.window_error.as_ref().map(|e| e.to_string()),
            stats: Stats {
                scanned: stats.scanned,
                accepted: stats.accepted,
                rejected: Rejects {
                    ambiguous_bit: stats.rejects.ambiguous_bit,
                    low_confidence: stats.rejects.low_confidence,
                    checksum: stats.rejects.checksum,
                    implausible: stats.rejects.implausible,
                    no_pattern: stats.rejects.no_pattern,
                },
                sliding_positions: stats.sliding_positions,
                sliding_skipped: stats.sliding_skipped,
                sliding_stop: stats.sliding_stop.map(|s| s.to_string()),
            },
            detections: outcome
                .detections
                .iter()
                .map(|d| DetectionEntry {
                    position: d.position,
                    frame_id: d.frame_id,
                    confidence: d.confidence,
                })
                .collect(),
        }
    }

    pub fn to_track(&self) -> DetectionTrack {
        DetectionTrack::new(
            self.stream.into(),
            self.rate,
            self.detections
                .iter()
                .map(|d| Detection::new(d.position, d.frame_id, d.confidence))
                .collect(),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchEntry {
    pub frame_id: u32,
    pub video_time: f64,
    pub audio_time: f64,
    pub offset: f64,
    pub confidence: f64,
}

/// Correlation report. Offsets are seconds, positive when audio lags video.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub version: String,
    pub mean_offset: f64,
    pub std_dev: f64,
    pub min_offset: f64,
    pub max_offset: f64,
    pub mean_confidence: f64,
    pub match_count: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    pub matches: Vec<MatchEntry>,
}

impl From<&Correlation> for Report {
    fn from(c: &Correlation) -> Self {
        let r = &c.result;
        Self {
            version: TOOL_VERSION.to_string(),
            mean_offset: r.mean_offset,
            std_dev: r.std_dev,
            min_offset: r.min_offset,
            max_offset: r.max_offset,
            mean_confidence: r.mean_confidence,
            match_count: r.match_count,
            warnings: c.warnings.iter().map(|w| w.to_string()).collect(),
            matches: c
                .matches
                .iter()
                .map(|m| MatchEntry {
                    frame_id: m.frame_id,
                    video_time: m.video_time,
                    audio_time: m.audio_time,
                    offset: m.offset,
                    confidence: m.confidence,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tcsync::process::correlate::{CorrelatorConfig, correlate};

    #[test]
    fn test_metadata_roundtrip() -> Result<()> {
        let session = Session {
            cycles: 2,
            video: Some(VideoSize {
                width: 720,
                height: 576,
            }),
            ..Session::default()
        };

        let yaml = serde_yaml_ng::to_string(&session.to_metadata())?;
        assert!(yaml.contains("sampleRate: 48000"));
        assert!(yaml.contains("guardLow:"));
        assert!(yaml.contains("timecodeSecs: 30"));

        let parsed: Metadata = serde_yaml_ng::from_str(&yaml)?;
        assert_eq!(Session::try_from(&parsed)?, session);
        Ok(())
    }

    #[test]
    fn test_metadata_defaults_and_validation() -> Result<()> {
        let yaml = "\
version: 0.3.0
fps: 29.97
sampleRate: 44100
frequencies:
  low: 3000
  high: 6000
  guardLow: { low: 2400, high: 3600 }
  guardHigh: { low: 4800, high: 7200 }
cycle:
  patternSecs: 6
  blankSecs: 1
  timecodeSecs: 30
  toneHz: 1000
  toneAmplitude: 0.5
";
        let parsed: Metadata = serde_yaml_ng::from_str(yaml)?;
        assert_eq!(parsed.cycle.cycles, 1);
        assert_eq!(parsed.video, None);
        let session = Session::try_from(&parsed)?;
        assert_eq!(session.format.frame_rate(), FrameRate::Ntsc);
        assert_eq!(session.plan.freq_low(), 3000.0);

        let bad = Metadata {
            fps: 24.0,
            ..parsed.clone()
        };
        assert!(Session::try_from(&bad).is_err());

        let mut bad = parsed;
        bad.frequencies.high = 7000.0;
        assert!(Session::try_from(&bad).is_err());
        Ok(())
    }

    #[test]
    fn test_detections_file() -> Result<()> {
        let outcome = DecodeOutcome {
            detections: vec![Detection::new(1920, 5, 0.9), Detection::new(0, 4, 1.0)],
            ..DecodeOutcome::default()
        };
        let file = DetectionsFile::new(StreamKind::Audio, 48000.0, DecodeMode::Tolerant, &outcome);

        let yaml = serde_yaml_ng::to_string(&file)?;
        assert!(yaml.contains("stream: audio"));
        assert!(yaml.contains("mode: tolerant"));
        assert!(yaml.contains("frameId: 5"));
        assert!(!yaml.contains("windowError"));

        let parsed: DetectionsFile = serde_yaml_ng::from_str(&yaml)?;
        assert_eq!(parsed, file);

        let track = parsed.to_track();
        assert_eq!(track.kind, StreamKind::Audio);
        assert_eq!(track.detections[0].frame_id, 4);
        assert_eq!(track.time_of(&track.detections[1]), 0.04);
        Ok(())
    }

    #[test]
    fn test_report_from_correlation() -> Result<()> {
        let video = DetectionTrack::new(
            StreamKind::Video,
            25.0,
            (1..4).map(|i| Detection::new(i, i as u32, 0.95)).collect(),
        );
        let audio = DetectionTrack::new(
            StreamKind::Audio,
            48000.0,
            (1..4)
                .map(|i| Detection::new(i * 1920 + 480, i as u32, 1.0))
                .collect(),
        );
        let correlation = correlate(&video, &audio, &CorrelatorConfig::default())?;
        let report = Report::from(&correlation);

        assert_eq!(report.match_count, 3);
        assert!((report.mean_offset - 0.01).abs() < 1e-9);
        assert_eq!(report.warnings.len(), 1);

        let yaml = serde_yaml_ng::to_string(&report)?;
        assert!(yaml.contains("meanOffset:"));
        assert!(yaml.contains("warnings:"));
        Ok(())
    }
}
