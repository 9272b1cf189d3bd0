use std::path::PathBuf;

use clap::{Args, Parser as ClapParser, Subcommand, ValueEnum};
use tcsync::process::DecodeMode;
use tcsync::structs::format::FrameRate;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "\ntcsync ",
    env!("TCSYNC_VERSION"),
    "\nbuilt ",
    env!("BUILD_TIMESTAMP"),
);

#[derive(Debug, ClapParser)]
#[command(
    name         = env!("CARGO_PKG_NAME"),
    version      = env!("CARGO_PKG_VERSION"),
    long_version = LONG_VERSION,
    author       = env!("CARGO_PKG_AUTHORS"),
    about        = "Tools for embedding and measuring A/V timecode in capture calibration runs",
    long_about   = None,
)]
pub struct Cli {
    /// Set the log level
    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Info)]
    pub loglevel: LogLevel,

    /// Treat warnings (missing timecode window, low match count) as fatal errors.
    #[arg(long, global = true)]
    pub deny_warnings: bool,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Plain)]
    pub log_format: LogFormat,

    /// Show progress bars during operations.
    #[arg(long, global = true)]
    pub progress: bool,

    /// Choose an operation to perform.
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Render calibration cycles as a WAV file, metadata and optional raw video.
    Encode(EncodeArgs),

    /// Render the visual timecode pattern of one frame id to PNG.
    Pattern(PatternArgs),

    /// Decode timecode from captured audio or video.
    Decode(DecodeArgs),

    /// Estimate the A/V offset from two detection files.
    Correlate(CorrelateArgs),

    /// Decode captured audio and video concurrently and correlate them.
    Analyze(AnalyzeArgs),
}

/// Session parameters. Values given here override the metadata file.
#[derive(Debug, Default, Args)]
pub struct SessionArgs {
    /// Session metadata (YAML).
    #[arg(long, value_name = "PATH")]
    pub metadata: Option<PathBuf>,

    /// Video frame rate.
    #[arg(long, value_enum)]
    pub frame_rate: Option<FrameRateArg>,

    /// Audio sample rate in Hz.
    #[arg(long, value_name = "HZ")]
    pub sample_rate: Option<u32>,

    /// Frequency of a 0 bit in Hz; 1 bits use twice this.
    #[arg(long, value_name = "HZ")]
    pub freq_low: Option<f64>,

    /// Duration of the colour bar phase.
    #[arg(long, value_name = "SECS")]
    pub pattern_secs: Option<f64>,

    /// Duration of each blank phase.
    #[arg(long, value_name = "SECS")]
    pub blank_secs: Option<f64>,

    /// Duration of the timecode phase.
    #[arg(long, value_name = "SECS")]
    pub timecode_secs: Option<f64>,
}

#[derive(Debug, Args)]
pub struct EncodeArgs {
    /// Output WAV file.
    #[arg(value_name = "OUTPUT")]
    pub output: PathBuf,

    /// Number of calibration cycles.
    #[arg(long, default_value_t = 1)]
    pub cycles: u32,

    /// Also write the matching raw rgb24 video.
    #[arg(long, value_name = "PATH")]
    pub video: Option<PathBuf>,

    /// Video width in pixels.
    #[arg(long, default_value_t = 720)]
    pub width: u32,

    /// Video height in pixels.
    #[arg(long, default_value_t = 576)]
    pub height: u32,

    /// Where to write the session metadata [default: OUTPUT with .yaml extension].
    #[arg(long, value_name = "PATH")]
    pub metadata_out: Option<PathBuf>,

    #[command(flatten)]
    pub session: SessionArgs,
}

#[derive(Debug, Args)]
pub struct PatternArgs {
    /// Frame id to render.
    #[arg(value_name = "FRAME_ID")]
    pub frame_id: u64,

    /// Output PNG file.
    #[arg(value_name = "OUTPUT")]
    pub output: PathBuf,

    /// Image width in pixels.
    #[arg(long, default_value_t = 720)]
    pub width: u32,

    /// Image height in pixels.
    #[arg(long, default_value_t = 576)]
    pub height: u32,
}

/// Options shared by the decoding commands.
#[derive(Debug, Args)]
pub struct DecodeOptions {
    /// Decoding mode.
    #[arg(long, value_enum, default_value_t = ModeArg::Tolerant)]
    pub mode: ModeArg,

    /// Audio input encoding.
    #[arg(long, value_enum, default_value_t = AudioInput::Wav)]
    pub audio_format: AudioInput,

    /// Video width in pixels [default: from metadata].
    #[arg(long)]
    pub width: Option<u32>,

    /// Video height in pixels [default: from metadata].
    #[arg(long)]
    pub height: Option<u32>,

    /// Lift the time limits on the tolerant audio search.
    #[arg(long)]
    pub no_budget: bool,
}

#[derive(Debug, Args)]
pub struct DecodeArgs {
    /// Captured audio or raw rgb24 video (use "-" for stdin).
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Which stream INPUT holds.
    #[arg(long, value_enum, default_value_t = StreamArg::Audio)]
    pub stream: StreamArg,

    /// Write detections to this YAML file.
    #[arg(long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub options: DecodeOptions,

    #[command(flatten)]
    pub session: SessionArgs,
}

#[derive(Debug, Args)]
pub struct CorrelateArgs {
    /// Video detections (YAML).
    #[arg(value_name = "VIDEO")]
    pub video: PathBuf,

    /// Audio detections (YAML).
    #[arg(value_name = "AUDIO")]
    pub audio: PathBuf,

    /// Warn when fewer frame ids match.
    #[arg(long, default_value_t = tcsync::process::correlate::DEFAULT_MIN_MATCHES)]
    pub min_matches: usize,

    /// Write the correlation report to this YAML file.
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct AnalyzeArgs {
    /// Captured audio.
    #[arg(long, value_name = "PATH")]
    pub audio: PathBuf,

    /// Captured raw rgb24 video.
    #[arg(long, value_name = "PATH")]
    pub video: PathBuf,

    /// Warn when fewer frame ids match.
    #[arg(long, default_value_t = tcsync::process::correlate::DEFAULT_MIN_MATCHES)]
    pub min_matches: usize,

    /// Write the correlation report to this YAML file.
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,

    #[command(flatten)]
    pub options: DecodeOptions,

    #[command(flatten)]
    pub session: SessionArgs,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogLevel {
    /// Disable logging output.
    Off,
    /// No output except errors.
    Error,
    /// Show warnings and errors.
    Warn,
    /// Show info, warnings and errors (default).
    Info,
    /// Show debug, info, warnings and errors.
    Debug,
    /// Show all log messages including trace.
    Trace,
}

impl LogLevel {
    /// Convert LogLevel to log::LevelFilter
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogFormat {
    /// Colorized human-readable text.
    Plain,
    /// Structured JSON per log record.
    Json,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq)]
pub enum FrameRateArg {
    /// 25 fps.
    Pal,
    /// 29.97 fps.
    Ntsc,
}

impl From<FrameRateArg> for FrameRate {
    fn from(arg: FrameRateArg) -> Self {
        match arg {
            FrameRateArg::Pal => FrameRate::Pal,
            FrameRateArg::Ntsc => FrameRate::Ntsc,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq)]
pub enum ModeArg {
    /// Exact unit grid only, for digitally generated sources.
    Strict,
    /// Adds fallback estimators and a sliding search, for analogue captures.
    Tolerant,
}

impl From<ModeArg> for DecodeMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Strict => DecodeMode::Strict,
            ModeArg::Tolerant => DecodeMode::Tolerant,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq)]
pub enum StreamArg {
    Audio,
    /// Raw rgb24 frames.
    Video,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq)]
pub enum AudioInput {
    /// RIFF WAVE (integer PCM up to 32 bits or 32-bit float).
    Wav,
    /// Raw mono 32-bit float little-endian.
    F32le,
    /// Raw mono 16-bit signed little-endian.
    S16le,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_decode() {
        let cli = Cli::try_parse_from([
            "tcsyncd",
            "decode",
            "capture.raw",
            "--stream",
            "video",
            "--width",
            "720",
            "--height",
            "576",
            "--mode",
            "strict",
            "--frame-rate",
            "ntsc",
            "--deny-warnings",
        ])
        .unwrap();

        assert!(cli.deny_warnings);
        let Commands::Decode(args) = cli.command else {
            panic!("expected decode");
        };
        assert_eq!(args.stream, StreamArg::Video);
        assert_eq!(args.options.mode, ModeArg::Strict);
        assert_eq!(args.options.width, Some(720));
        assert_eq!(args.session.frame_rate, Some(FrameRateArg::Ntsc));
        assert_eq!(args.session.metadata, None);
    }
}
