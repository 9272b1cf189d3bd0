use anyhow::Result;
use image::ImageFormat;
use log::info;

use tcsync::process::visual::{PatternLayout, PatternRenderer};

use super::command::PatternArgs;

pub fn cmd_pattern(args: &PatternArgs) -> Result<()> {
    let renderer = PatternRenderer::new(PatternLayout::new(args.width, args.height)?);
    let image = renderer.render(args.frame_id)?;

    image.save_with_format(&args.output, ImageFormat::Png)?;
    info!(
        "Wrote {}x{} pattern for frame {} to {}",
        args.width,
        args.height,
        args.frame_id,
        args.output.display()
    );
    Ok(())
}
