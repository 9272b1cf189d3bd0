use std::thread;

use anyhow::{Result, anyhow};
use indicatif::MultiProgress;
use log::info;

use tcsync::process::correlate::{CorrelatorConfig, correlate};
use tcsync::process::DecodeMode;
use tcsync::structs::detection::{DetectionTrack, StreamKind};

use super::command::{AnalyzeArgs, Cli};
use super::correlate::finish_correlation;
use super::decode::{check_outcome, decode_audio, decode_video};
use super::resolve_session;

pub fn cmd_analyze(args: &AnalyzeArgs, cli: &Cli, multi: Option<&MultiProgress>) -> Result<()> {
    let session = resolve_session(&args.session)?;
    info!(
        "Analyzing {} and {} in {} mode",
        args.audio.display(),
        args.video.display(),
        DecodeMode::from(args.options.mode)
    );

    let (audio, video) = thread::scope(|s| -> Result<_> {
        let audio = thread::Builder::new()
            .name("audio-decoder".to_string())
            .spawn_scoped(s, || decode_audio(&args.audio, &args.options, &session, multi))?;
        let video = thread::Builder::new()
            .name("video-decoder".to_string())
            .spawn_scoped(s, || decode_video(&args.video, &args.options, &session, multi))?;

        let audio = audio
            .join()
            .map_err(|_| anyhow!("audio decoder thread panicked"))??;
        let video = video
            .join()
            .map_err(|_| anyhow!("video decoder thread panicked"))??;
        Ok((audio, video))
    })?;

    let sample_rate = session.format.sample_rate() as f64;
    let fps = session.format.fps();
    check_outcome(StreamKind::Audio, sample_rate, &audio, cli.deny_warnings)?;
    check_outcome(StreamKind::Video, fps, &video, cli.deny_warnings)?;

    let correlation = correlate(
        &DetectionTrack::new(StreamKind::Video, fps, video.detections),
        &DetectionTrack::new(StreamKind::Audio, sample_rate, audio.detections),
        &CorrelatorConfig {
            min_matches: args.min_matches,
        },
    )?;

    finish_correlation(&correlation, args.report.as_deref(), cli.deny_warnings)
}
