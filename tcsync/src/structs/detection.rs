use std::fmt::Display;

/// Which capture a detection track came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Audio,
    Video,
}

impl Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamKind::Audio => write!(f, "audio"),
            StreamKind::Video => write!(f, "video"),
        }
    }
}

/// One decoded frame id at a stream position.
///
/// Positions are sample offsets for audio and frame offsets for video. They are
/// signed so tracks can be shifted in time without clamping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub position: i64,
    pub frame_id: u32,
    pub confidence: f64,
}

impl Detection {
    pub fn new(position: i64, frame_id: u32, confidence: f64) -> Self {
        Self {
            position,
            frame_id,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

/// Detections of one stream with the rate that turns positions into seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionTrack {
    pub kind: StreamKind,
    /// Positions per second.
    pub rate: f64,
    pub detections: Vec<Detection>,
}

impl DetectionTrack {
    /// Builds a track, ordering detections by position.
    pub fn new(kind: StreamKind, rate: f64, mut detections: Vec<Detection>) -> Self {
        detections.sort_by_key(|d| d.position);
        Self {
            kind,
            rate,
            detections,
        }
    }

    pub fn time_of(&self, detection: &Detection) -> f64 {
        detection.position as f64 / self.rate
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }
}

#[test]
fn test_track_orders_by_position() {
    let track = DetectionTrack::new(
        StreamKind::Audio,
        48000.0,
        vec![
            Detection::new(96000, 2, 0.9),
            Detection::new(-24000, 0, 1.5),
        ],
    );
    assert_eq!(track.detections[0].frame_id, 0);
    assert_eq!(track.detections[0].confidence, 1.0);
    assert_eq!(track.time_of(&track.detections[0]), -0.5);
    assert_eq!(track.time_of(&track.detections[1]), 2.0);
}
