use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use image::RgbImage;
use indicatif::MultiProgress;
use log::{info, warn};

use tcsync::process::decode::{AudioDecoder, DecoderConfig};
use tcsync::process::video::VideoDecoder;
use tcsync::process::{DecodeMode, DecodeOutcome};
use tcsync::structs::detection::StreamKind;
use tcsync::utils::budget::SearchBudget;

use super::command::{AudioInput, Cli, DecodeArgs, DecodeOptions, StreamArg};
use super::progress::{create_progress_bar, create_spinner};
use super::resolve_session;
use crate::input::InputReader;
use crate::metadata::{DetectionsFile, Session, save_yaml};
use crate::timestamp::time_str;
use crate::wav::{RawEncoding, read_wav};

/// Frames handed to the decoder per parallel batch.
const FRAME_BATCH: usize = 64;

pub fn cmd_decode(args: &DecodeArgs, cli: &Cli, multi: Option<&MultiProgress>) -> Result<()> {
    let session = resolve_session(&args.session)?;
    let mode = DecodeMode::from(args.options.mode);

    let (kind, rate, outcome) = match args.stream {
        StreamArg::Audio => (
            StreamKind::Audio,
            session.format.sample_rate() as f64,
            decode_audio(&args.input, &args.options, &session, multi)?,
        ),
        StreamArg::Video => (
            StreamKind::Video,
            session.format.fps(),
            decode_video(&args.input, &args.options, &session, multi)?,
        ),
    };

    // written before any warning is escalated so the detections can be inspected
    if let Some(output) = &args.output {
        save_yaml(output, &DetectionsFile::new(kind, rate, mode, &outcome))?;
        info!("Wrote {} detections to {}", outcome.detections.len(), output.display());
    }

    check_outcome(kind, rate, &outcome, cli.deny_warnings)
}

/// Logs a decode summary and escalates warnings under `--deny-warnings`.
pub fn check_outcome(
    kind: StreamKind,
    rate: f64,
    outcome: &DecodeOutcome,
    deny_warnings: bool,
) -> Result<()> {
    let stats = &outcome.stats;
    if let Some(window) = outcome.window {
        info!(
            "{kind}: timecode window {} - {}",
            time_str(window.start as f64 / rate),
            time_str(window.end as f64 / rate)
        );
    }

    info!(
        "{kind}: {} detections, {} of {} positions accepted, {} rejected",
        outcome.detections.len(),
        stats.accepted,
        stats.scanned,
        stats.rejects.total()
    );
    log::debug!("{kind}: rejects {:?}", stats.rejects);

    if let Some(stop) = stats.sliding_stop {
        warn!(
            "{kind}: sliding search stopped early ({stop}), {} positions not searched",
            stats.sliding_skipped
        );
    }

    if let (Some(err), true) = (&outcome.window_error, deny_warnings) {
        bail!("{kind}: {err}");
    }
    if outcome.detections.is_empty() {
        warn!("{kind}: no timecode detected");
        if deny_warnings {
            bail!("{kind}: no timecode detected");
        }
    }
    Ok(())
}

pub fn read_audio(path: &Path, encoding: AudioInput, sample_rate: u32) -> Result<Vec<f32>> {
    let mut input = InputReader::new(path)?;
    match encoding {
        AudioInput::Wav => {
            let wav = read_wav(input.into_reader())
                .with_context(|| format!("reading WAV from {}", path.display()))?;
            if wav.spec.sample_rate != sample_rate {
                bail!(
                    "{} is sampled at {} Hz, the session uses {} Hz",
                    path.display(),
                    wav.spec.sample_rate,
                    sample_rate
                );
            }
            if wav.spec.channels > 1 {
                info!("Mixing {} channels down to mono", wav.spec.channels);
            }
            Ok(wav.samples)
        }
        AudioInput::F32le => Ok(RawEncoding::F32le.decode(&input.read_all()?)),
        AudioInput::S16le => Ok(RawEncoding::S16le.decode(&input.read_all()?)),
    }
}

pub fn decode_audio(
    path: &Path,
    options: &DecodeOptions,
    session: &Session,
    multi: Option<&MultiProgress>,
) -> Result<DecodeOutcome> {
    let sample_rate = session.format.sample_rate();
    let samples = read_audio(path, options.audio_format, sample_rate)?;
    let mode = DecodeMode::from(options.mode);
    info!(
        "Decoding {} of audio from {} in {mode} mode",
        time_str(samples.len() as f64 / sample_rate as f64),
        path.display()
    );

    let mut config = DecoderConfig::new(mode);
    if options.no_budget {
        config.budget = SearchBudget::unlimited();
    }
    let decoder = AudioDecoder::new(session.format, session.plan, session.layout, config)?;

    let pb = multi
        .map(|m| create_spinner(m, "decoding audio"))
        .transpose()?;
    let outcome = decoder.decode(&samples);
    if let Some(pb) = pb {
        pb.finish_with_message(format!("audio: {} detections", outcome.detections.len()));
    }

    Ok(outcome)
}

fn video_size(options: &DecodeOptions, session: &Session) -> Result<(u32, u32)> {
    let width = options.width.or(session.video.map(|v| v.width));
    let height = options.height.or(session.video.map(|v| v.height));
    match (width, height) {
        (Some(width), Some(height)) => Ok((width, height)),
        _ => bail!("Video size unknown; pass --width and --height or a metadata file with a video size"),
    }
}

pub fn decode_video(
    path: &Path,
    options: &DecodeOptions,
    session: &Session,
    multi: Option<&MultiProgress>,
) -> Result<DecodeOutcome> {
    let (width, height) = video_size(options, session)?;
    let mode = DecodeMode::from(options.mode);
    let mut decoder = VideoDecoder::new(width, height, session.format, session.layout, mode)?;

    let mut input = InputReader::new(path)?;
    let frame_bytes = decoder.frame_bytes();
    let total = if input.is_pipe() {
        None
    } else {
        input.size().map(|size| size / frame_bytes as u64)
    };
    info!(
        "Decoding {width}x{height} video from {} in {mode} mode",
        path.display()
    );

    let pb = multi
        .map(|m| create_progress_bar(m, total, "frames"))
        .transpose()?;

    let mut batch = Vec::with_capacity(FRAME_BATCH);
    let mut buffer = vec![0u8; frame_bytes];
    loop {
        let more = input.read_record(&mut buffer)?;
        if more {
            let data = std::mem::replace(&mut buffer, vec![0u8; frame_bytes]);
            let frame = RgbImage::from_raw(width, height, data)
                .ok_or_else(|| anyhow!("frame buffer does not match {width}x{height}"))?;
            batch.push(frame);
        }

        if batch.len() == FRAME_BATCH || (!more && !batch.is_empty()) {
            decoder.push_frames(&batch)?;
            if let Some(pb) = &pb {
                pb.inc(batch.len() as u64);
            }
            batch.clear();
        }

        if !more {
            break;
        }
    }

    let frames = decoder.frames();
    let outcome = decoder.finish();
    if let Some(pb) = pb {
        pb.finish_with_message(format!(
            "video: {} detections in {frames} frames",
            outcome.detections.len()
        ));
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tcsync::process::RejectReason;
    use tcsync::structs::detection::Detection;
    use tcsync::utils::errors::WindowError;

    fn outcome(detections: Vec<Detection>, window_error: Option<WindowError>) -> DecodeOutcome {
        let mut outcome = DecodeOutcome {
            detections,
            window_error,
            ..DecodeOutcome::default()
        };
        outcome.stats.rejects.record(RejectReason::Checksum);
        outcome
    }

    #[test]
    fn test_check_outcome() {
        let found = outcome(vec![Detection::new(0, 1, 1.0)], None);
        assert!(check_outcome(StreamKind::Audio, 48000.0, &found, true).is_ok());

        let missing_window = outcome(
            vec![Detection::new(0, 1, 1.0)],
            Some(WindowError::NotFound {
                transitions: 0,
                timecode_runs: 0,
                longest_run_secs: 0.0,
            }),
        );
        assert!(check_outcome(StreamKind::Video, 25.0, &missing_window, false).is_ok());
        assert!(check_outcome(StreamKind::Video, 25.0, &missing_window, true).is_err());

        let empty = outcome(Vec::new(), None);
        assert!(check_outcome(StreamKind::Audio, 48000.0, &empty, false).is_ok());
        assert!(check_outcome(StreamKind::Audio, 48000.0, &empty, true).is_err());
    }

    #[test]
    fn test_video_size() {
        let options = DecodeOptions {
            mode: crate::cli::command::ModeArg::Strict,
            audio_format: AudioInput::Wav,
            width: Some(320),
            height: None,
            no_budget: false,
        };
        assert!(video_size(&options, &Session::default()).is_err());

        let session = Session {
            video: Some(crate::metadata::VideoSize {
                width: 720,
                height: 576,
            }),
            ..Session::default()
        };
        assert_eq!(video_size(&options, &session).unwrap(), (320, 576));
    }
}
