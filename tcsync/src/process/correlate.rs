use std::collections::BTreeMap;
use std::fmt::Display;

use log::{debug, warn};

use crate::structs::detection::{Detection, DetectionTrack};
use crate::utils::errors::CorrelateError;

pub const DEFAULT_MIN_MATCHES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorrelatorConfig {
    /// Match counts below this produce a [`CorrelationWarning::LowMatchCount`].
    pub min_matches: usize,
}

impl Default for CorrelatorConfig {
    fn default() -> Self {
        Self {
            min_matches: DEFAULT_MIN_MATCHES,
        }
    }
}

/// One frame id seen in both streams.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Match {
    pub frame_id: u32,
    pub video_time: f64,
    pub audio_time: f64,
    /// `audio_time - video_time` in seconds.
    pub offset: f64,
    pub confidence: f64,
}

/// Offset statistics over all matches, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorrelationResult {
    /// Confidence-weighted mean offset.
    pub mean_offset: f64,
    /// Confidence-weighted standard deviation about the mean.
    pub std_dev: f64,
    pub min_offset: f64,
    pub max_offset: f64,
    pub mean_confidence: f64,
    pub match_count: usize,
}

/// Non-fatal problems with a correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrelationWarning {
    LowMatchCount { count: usize, min: usize },
}

impl Display for CorrelationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CorrelationWarning::LowMatchCount { count, min } => {
                write!(f, "Only {count} matches, expected at least {min}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Correlation {
    pub result: CorrelationResult,
    /// Matches in frame id order.
    pub matches: Vec<Match>,
    pub warnings: Vec<CorrelationWarning>,
}

/// Earliest detection of every frame id.
fn first_occurrences(track: &DetectionTrack) -> BTreeMap<u32, &Detection> {
    let mut map = BTreeMap::new();
    for d in &track.detections {
        map.entry(d.frame_id)
            .and_modify(|prev: &mut &Detection| {
                if d.position < prev.position {
                    *prev = d;
                }
            })
            .or_insert(d);
    }
    map
}

fn check_rate(track: &DetectionTrack) -> Result<(), CorrelateError> {
    if !track.rate.is_finite() || track.rate <= 0.0 {
        return Err(CorrelateError::InvalidRate(track.rate));
    }
    Ok(())
}

/// Matches the first occurrence of every frame id in both tracks and aggregates offsets.
///
/// Frame ids repeating later in a track (for instance in a second calibration cycle)
/// are ignored.
pub fn correlate(
    video: &DetectionTrack,
    audio: &DetectionTrack,
    config: &CorrelatorConfig,
) -> Result<Correlation, CorrelateError> {
    check_rate(video)?;
    check_rate(audio)?;

    let video_ids = first_occurrences(video);
    let audio_ids = first_occurrences(audio);

    let matches: Vec<Match> = video_ids
        .iter()
        .filter_map(|(&frame_id, v)| {
            let a = audio_ids.get(&frame_id)?;
            let (video_time, audio_time) = (video.time_of(v), audio.time_of(a));
            Some(Match {
                frame_id,
                video_time,
                audio_time,
                offset: audio_time - video_time,
                confidence: v.confidence.min(a.confidence),
            })
        })
        .collect();

    if matches.is_empty() {
        return Err(CorrelateError::InsufficientMatches {
            video_ids: video_ids.len(),
            audio_ids: audio_ids.len(),
        });
    }

    let result = aggregate(&matches);
    debug!(
        "{} matches, mean offset {:.6}s, std-dev {:.6}s",
        result.match_count, result.mean_offset, result.std_dev
    );

    let mut warnings = Vec::new();
    if matches.len() < config.min_matches {
        let warning = CorrelationWarning::LowMatchCount {
            count: matches.len(),
            min: config.min_matches,
        };
        warn!("{warning}");
        warnings.push(warning);
    }

    Ok(Correlation {
        result,
        matches,
        warnings,
    })
}

fn aggregate(matches: &[Match]) -> CorrelationResult {
    let n = matches.len() as f64;
    let total_weight: f64 = matches.iter().map(|m| m.confidence).sum();

    let weight = |m: &Match| {
        if total_weight > 0.0 {
            m.confidence / total_weight
        } else {
            1.0 / n
        }
    };

    let mean_offset: f64 = matches.iter().map(|m| weight(m) * m.offset).sum();
    let variance: f64 = matches
        .iter()
        .map(|m| weight(m) * (m.offset - mean_offset).powi(2))
        .sum();

    let (min_offset, max_offset) = matches
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), m| {
            (lo.min(m.offset), hi.max(m.offset))
        });

    CorrelationResult {
        mean_offset,
        std_dev: variance.max(0.0).sqrt(),
        min_offset,
        max_offset,
        mean_confidence: total_weight / n,
        match_count: matches.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structs::detection::StreamKind;

    fn tracks(delta: f64, n: u32) -> (DetectionTrack, DetectionTrack) {
        let video = DetectionTrack::new(
            StreamKind::Video,
            25.0,
            (0..n)
                .map(|i| Detection::new(i as i64 * 25, i, 0.95))
                .collect(),
        );
        let audio = DetectionTrack::new(
            StreamKind::Audio,
            48000.0,
            (0..n)
                .map(|i| Detection::new(((i as f64 + delta) * 48000.0).round() as i64, i, 0.8))
                .collect(),
        );
        (video, audio)
    }

    #[test]
    fn test_offsets() {
        for delta in [-0.5, 0.0, 0.237, 1.0] {
            let (video, audio) = tracks(delta, 20);
            let c = correlate(&video, &audio, &CorrelatorConfig::default()).unwrap();
            assert!((c.result.mean_offset - delta).abs() < 1e-9, "delta {delta}");
            assert!(c.result.std_dev < 1e-9);
            assert!((c.result.min_offset - delta).abs() < 1e-9);
            assert!((c.result.max_offset - delta).abs() < 1e-9);
            assert!((c.result.mean_confidence - 0.8).abs() < 1e-12);
            assert_eq!(c.result.match_count, 20);
            assert!(c.warnings.is_empty());
        }
    }

    #[test]
    fn test_first_occurrence_only() {
        let (video, mut audio) = tracks(0.1, 12);
        // a second cycle repeating the same ids much later
        let repeats: Vec<_> = (0..12)
            .map(|i| Detection::new(48000 * 100 + i as i64 * 48000, i, 1.0))
            .collect();
        audio.detections.extend(repeats);

        let c = correlate(&video, &audio, &CorrelatorConfig::default()).unwrap();
        assert!((c.result.mean_offset - 0.1).abs() < 1e-9);
        assert_eq!(c.matches.len(), 12);
    }

    #[test]
    fn test_weighted_mean() {
        let video = DetectionTrack::new(
            StreamKind::Video,
            1.0,
            vec![Detection::new(0, 1, 1.0), Detection::new(10, 2, 1.0)],
        );
        let audio = DetectionTrack::new(
            StreamKind::Audio,
            1.0,
            vec![Detection::new(1, 1, 0.75), Detection::new(13, 2, 0.25)],
        );
        let c = correlate(&video, &audio, &CorrelatorConfig { min_matches: 2 }).unwrap();
        // offsets 1 and 3 weighted 3:1
        assert!((c.result.mean_offset - 1.5).abs() < 1e-12);
        assert!((c.result.std_dev - 0.75f64.sqrt()).abs() < 1e-12);
        assert_eq!(c.result.min_offset, 1.0);
        assert_eq!(c.result.max_offset, 3.0);
        assert!(c.warnings.is_empty());
    }

    #[test]
    fn test_zero_confidence_falls_back_to_plain_mean() {
        let video = DetectionTrack::new(StreamKind::Video, 1.0, vec![Detection::new(0, 1, 0.0)]);
        let audio = DetectionTrack::new(
            StreamKind::Audio,
            1.0,
            vec![Detection::new(2, 1, 0.0)],
        );
        let c = correlate(&video, &audio, &CorrelatorConfig::default()).unwrap();
        assert_eq!(c.result.mean_offset, 2.0);
        assert_eq!(
            c.warnings,
            [CorrelationWarning::LowMatchCount { count: 1, min: 10 }]
        );
    }

    #[test]
    fn test_failures() {
        let (video, _) = tracks(0.0, 5);
        let audio = DetectionTrack::new(
            StreamKind::Audio,
            48000.0,
            vec![Detection::new(0, 999, 1.0)],
        );
        assert_eq!(
            correlate(&video, &audio, &CorrelatorConfig::default()),
            Err(CorrelateError::InsufficientMatches {
                video_ids: 5,
                audio_ids: 1
            })
        );

        let bad = DetectionTrack::new(StreamKind::Audio, 0.0, vec![]);
        assert_eq!(
            correlate(&video, &bad, &CorrelatorConfig::default()),
            Err(CorrelateError::InvalidRate(0.0))
        );
    }
}
