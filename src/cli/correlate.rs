use std::path::Path;

use anyhow::{Result, bail};
use log::info;

use tcsync::process::correlate::{Correlation, CorrelatorConfig, correlate};

use super::command::{Cli, CorrelateArgs};
use crate::metadata::{DetectionsFile, Report, Stream, load_yaml, save_yaml};
use crate::timestamp::offset_str;

fn load_detections(path: &Path, expected: Stream) -> Result<DetectionsFile> {
    let file: DetectionsFile = load_yaml(path)?;
    if file.stream != expected {
        bail!(
            "{} holds {:?} detections, expected {:?}",
            path.display(),
            file.stream,
            expected
        );
    }
    Ok(file)
}

pub fn cmd_correlate(args: &CorrelateArgs, cli: &Cli) -> Result<()> {
    let video = load_detections(&args.video, Stream::Video)?;
    let audio = load_detections(&args.audio, Stream::Audio)?;
    info!(
        "Correlating {} video and {} audio detections",
        video.detections.len(),
        audio.detections.len()
    );

    let correlation = correlate(
        &video.to_track(),
        &audio.to_track(),
        &CorrelatorConfig {
            min_matches: args.min_matches,
        },
    )?;

    finish_correlation(&correlation, args.report.as_deref(), cli.deny_warnings)
}

/// Prints the result, writes the report and escalates warnings under `--deny-warnings`.
pub fn finish_correlation(
    correlation: &Correlation,
    report: Option<&Path>,
    deny_warnings: bool,
) -> Result<()> {
    print_result(correlation);

    if let Some(path) = report {
        save_yaml(path, &Report::from(correlation))?;
        info!("Wrote correlation report to {}", path.display());
    }

    if deny_warnings {
        if let Some(warning) = correlation.warnings.first() {
            bail!("{warning}");
        }
    }
    Ok(())
}

fn print_result(correlation: &Correlation) {
    let r = &correlation.result;
    let direction = if r.mean_offset > 0.0 {
        "audio after video"
    } else if r.mean_offset < 0.0 {
        "audio before video"
    } else {
        "in sync"
    };

    println!("Matches:         {}", r.match_count);
    println!("Mean offset:     {} ({direction})", offset_str(r.mean_offset));
    println!("Std deviation:   {:.3} ms", r.std_dev * 1000.0);
    println!(
        "Offset range:    {} .. {}",
        offset_str(r.min_offset),
        offset_str(r.max_offset)
    );
    println!("Mean confidence: {:.3}", r.mean_confidence);
}
