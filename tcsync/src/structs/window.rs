use std::fmt::{Debug, Display};

/// Label assigned to one analysis chunk of a stream.
pub trait PhaseLabel: Copy + Eq + Debug + Display + Send + Sync {
    /// Whether the label marks the timecode phase.
    fn is_timecode(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioPhase {
    Silence,
    Tone,
    Timecode,
}

impl PhaseLabel for AudioPhase {
    fn is_timecode(&self) -> bool {
        *self == AudioPhase::Timecode
    }
}

impl Display for AudioPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AudioPhase::Silence => write!(f, "silence"),
            AudioPhase::Tone => write!(f, "tone"),
            AudioPhase::Timecode => write!(f, "timecode"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VideoPhase {
    Black,
    Pattern,
    Timecode,
}

impl PhaseLabel for VideoPhase {
    fn is_timecode(&self) -> bool {
        *self == VideoPhase::Timecode
    }
}

impl Display for VideoPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VideoPhase::Black => write!(f, "black"),
            VideoPhase::Pattern => write!(f, "pattern"),
            VideoPhase::Timecode => write!(f, "timecode"),
        }
    }
}

/// A maximal run of equally labelled chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelRun<L> {
    pub label: L,
    /// Index of the first chunk.
    pub first: usize,
    /// Number of chunks.
    pub chunks: usize,
}

/// Per-chunk labels along a stream's time axis.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowClassification<L> {
    /// `(chunk start position, label)` in stream order.
    pub labels: Vec<(u64, L)>,
    /// Positions per chunk.
    pub chunk_len: u64,
    /// Positions per second.
    pub rate: f64,
    /// Stream length in positions.
    pub len: u64,
}

impl<L: PhaseLabel> WindowClassification<L> {
    /// Lays `labels` out on consecutive chunks of `chunk_len` positions.
    pub fn from_labels(labels: impl IntoIterator<Item = L>, chunk_len: u64, rate: f64) -> Self {
        let labels: Vec<(u64, L)> = labels
            .into_iter()
            .enumerate()
            .map(|(i, label)| (i as u64 * chunk_len, label))
            .collect();
        let len = labels.len() as u64 * chunk_len;

        Self {
            labels,
            chunk_len,
            rate,
            len,
        }
    }

    pub fn chunk_secs(&self) -> f64 {
        self.chunk_len as f64 / self.rate
    }

    /// Number of label changes between neighbouring chunks.
    pub fn transitions(&self) -> usize {
        self.labels.windows(2).filter(|w| w[0].1 != w[1].1).count()
    }

    /// Maximal runs of equal labels.
    pub fn runs(&self) -> Vec<LabelRun<L>> {
        let mut runs: Vec<LabelRun<L>> = Vec::new();
        for (i, &(_, label)) in self.labels.iter().enumerate() {
            match runs.last_mut() {
                Some(run) if run.label == label => run.chunks += 1,
                _ => runs.push(LabelRun {
                    label,
                    first: i,
                    chunks: 1,
                }),
            }
        }
        runs
    }

    /// Position range covered by `chunks` chunks starting at chunk `first`.
    pub fn span(&self, first: usize, chunks: usize) -> TimecodeWindow {
        let start = first as u64 * self.chunk_len;
        let end = ((first + chunks) as u64 * self.chunk_len).min(self.len.max(start + 1));
        TimecodeWindow { start, end }
    }
}

/// Located timecode phase, as a half-open position range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimecodeWindow {
    pub start: u64,
    pub end: u64,
}

impl TimecodeWindow {
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn duration_secs(&self, rate: f64) -> f64 {
        self.len() as f64 / rate
    }

    /// Widened by `margin` positions on both sides, clamped to `[0, limit)`.
    pub fn widened(&self, margin: u64, limit: u64) -> TimecodeWindow {
        TimecodeWindow {
            start: self.start.saturating_sub(margin),
            end: (self.end + margin).min(limit),
        }
    }

    pub fn contains(&self, position: u64) -> bool {
        position >= self.start && position < self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runs_and_transitions() {
        use AudioPhase::*;
        let cls = WindowClassification::from_labels(
            [Tone, Tone, Silence, Timecode, Timecode, Timecode, Silence],
            24000,
            48000.0,
        );
        assert_eq!(cls.transitions(), 3);
        assert_eq!(cls.len, 7 * 24000);

        let runs = cls.runs();
        assert_eq!(runs.len(), 4);
        assert_eq!(
            runs[2],
            LabelRun {
                label: Timecode,
                first: 3,
                chunks: 3
            }
        );
        assert_eq!(
            cls.span(3, 3),
            TimecodeWindow {
                start: 72000,
                end: 144000
            }
        );
    }

    #[test]
    fn test_widened_clamps() {
        let window = TimecodeWindow { start: 10, end: 90 };
        assert_eq!(window.widened(20, 100), TimecodeWindow { start: 0, end: 100 });
        assert_eq!(window.duration_secs(10.0), 8.0);
        assert!(window.contains(10));
        assert!(!window.contains(90));
    }
}
