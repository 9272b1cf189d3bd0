use std::fs::File;
use std::io::{BufWriter, Write};

use anyhow::{Result, bail};
use indicatif::MultiProgress;
use log::info;

use tcsync::process::cycle::CycleGenerator;
use tcsync::process::visual::{PatternLayout, PatternRenderer};

use super::command::EncodeArgs;
use super::progress::create_progress_bar;
use super::resolve_session;
use crate::metadata::{VideoSize, save_yaml};
use crate::timestamp::time_str;
use crate::wav::WavWriter;

pub fn cmd_encode(args: &EncodeArgs, multi: Option<&MultiProgress>) -> Result<()> {
    if args.cycles == 0 {
        bail!("--cycles must be at least 1");
    }

    let mut session = resolve_session(&args.session)?;
    session.cycles = args.cycles;

    let generator = CycleGenerator::new(session.format, session.plan, session.layout)?;
    let units = generator.units();
    info!(
        "Cycle of {} units: {} colour bars, 2x{} blank, {} timecode at {} fps",
        units.total(),
        units.pattern,
        units.blank,
        units.timecode,
        session.format.fps()
    );

    let audio = generator.render_audio(args.cycles)?;
    let mut writer = WavWriter::new(File::create(&args.output)?, session.format.sample_rate());
    writer.write_header()?;
    writer.write_samples(&audio)?;
    writer.finish()?;

    let stats = writer.stats();
    info!(
        "Wrote {} of audio ({} samples at {} Hz, {} bytes) to {}",
        time_str(stats.samples as f64 / stats.sample_rate as f64),
        stats.samples,
        stats.sample_rate,
        stats.data_written,
        args.output.display()
    );

    if let Some(path) = &args.video {
        let renderer = PatternRenderer::new(PatternLayout::new(args.width, args.height)?);
        session.video = Some(VideoSize {
            width: args.width,
            height: args.height,
        });

        let total = generator.frame_count(args.cycles);
        let pb = multi
            .map(|m| create_progress_bar(m, Some(total), "frames"))
            .transpose()?;

        let mut out = BufWriter::new(File::create(path)?);
        for frame in 0..total {
            let image = generator.render_frame(frame, &renderer)?;
            out.write_all(image.as_raw())?;
            if let Some(pb) = &pb {
                pb.inc(1);
            }
        }
        out.flush()?;

        if let Some(pb) = pb {
            pb.finish_with_message("video written");
        }
        info!(
            "Wrote {total} rgb24 frames ({}x{}) to {}",
            args.width,
            args.height,
            path.display()
        );
    }

    let metadata_path = args
        .metadata_out
        .clone()
        .unwrap_or_else(|| args.output.with_extension("yaml"));
    save_yaml(&metadata_path, &session.to_metadata())?;
    info!("Wrote session metadata to {}", metadata_path.display());

    Ok(())
}
