/// Invalid parameters rejected at encode or configuration time.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum RangeError {
    #[error("Frame index {index} is outside the 24-bit range (max {max})")]
    FrameIndexOutOfRange { index: u64, max: u32 },

    #[error("Tone segment length must be non-zero")]
    EmptySegment,

    #[error("Sample rate must be non-zero")]
    ZeroSampleRate,

    #[error("Sample rate {sample_rate} Hz gives {samples_per_bit:.1} samples per bit, need at least {min}")]
    TooFewSamplesPerBit {
        sample_rate: u32,
        samples_per_bit: f64,
        min: f64,
    },

    #[error("Symbol frequency must be positive and finite. Got {0} Hz")]
    InvalidFrequency(f64),

    #[error("freq_high must equal 2 x freq_low ({low} Hz -> {high} Hz)")]
    FrequencyRatio { low: f64, high: f64 },

    #[error("Guard range [{low}, {high}] Hz is empty or inverted")]
    InvalidGuardRange { low: f64, high: f64 },

    #[error("Guard range [{low}, {high}] Hz does not contain its symbol frequency {freq} Hz")]
    GuardMissesSymbol { low: f64, high: f64, freq: f64 },

    #[error("Guard ranges overlap or are closer than {min} Hz (separation {separation} Hz)")]
    GuardSeparation { separation: f64, min: f64 },

    #[error("High guard range ends at {upper} Hz, above Nyquist ({nyquist} Hz)")]
    AboveNyquist { upper: f64, nyquist: f64 },

    #[error("Phase duration must be positive and finite. Got {0} s")]
    InvalidPhaseDuration(f64),
}

/// The phase locator could not identify a timecode region.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum WindowError {
    #[error(
        "No timecode window found ({transitions} label transitions, {timecode_runs} timecode runs, longest {longest_run_secs:.2}s)"
    )]
    NotFound {
        transitions: usize,
        timecode_runs: usize,
        longest_run_secs: f64,
    },
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CorrelateError {
    #[error("No common frame ids between streams ({video_ids} video ids, {audio_ids} audio ids)")]
    InsufficientMatches { video_ids: usize, audio_ids: usize },

    #[error("Detection track rate must be positive and finite. Got {0}")]
    InvalidRate(f64),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum FrameError {
    #[error("Frame {width}x{height} is too small for the timecode pattern (min {min_width}x{min_height})")]
    TooSmall {
        width: u32,
        height: u32,
        min_width: u32,
        min_height: u32,
    },

    #[error("Frame {width}x{height} is too narrow for the timecode strip (needs width {needed})")]
    TooNarrow { width: u32, height: u32, needed: u32 },

    #[error("Raw frame buffer holds {actual} bytes, expected {expected}")]
    BufferSize { expected: usize, actual: usize },
}
