pub mod analyze;
pub mod command;
pub mod correlate;
pub mod decode;
pub mod encode;
pub mod pattern;
pub mod progress;

use anyhow::Result;
use tcsync::structs::format::{FrameRate, TimecodeFormat};
use tcsync::structs::frequency::FrequencyPlan;

use crate::metadata::Session;
use command::SessionArgs;

/// Loads `--metadata` (or the defaults) and applies the explicit overrides.
pub fn resolve_session(args: &SessionArgs) -> Result<Session> {
    let mut session = match &args.metadata {
        Some(path) => {
            log::debug!("Loading session metadata from {}", path.display());
            Session::load(path)?
        }
        None => Session::default(),
    };

    if args.frame_rate.is_some() || args.sample_rate.is_some() {
        let frame_rate = args
            .frame_rate
            .map(FrameRate::from)
            .unwrap_or(session.format.frame_rate());
        let sample_rate = args.sample_rate.unwrap_or(session.format.sample_rate());
        session.format = TimecodeFormat::new(frame_rate, sample_rate)?;
    }

    if let Some(freq_low) = args.freq_low {
        session.plan = FrequencyPlan::with_low(freq_low)?;
    }
    session.plan.check_nyquist(session.format.sample_rate())?;

    let layout = &mut session.layout;
    if let Some(secs) = args.pattern_secs {
        layout.pattern_secs = secs;
    }
    if let Some(secs) = args.blank_secs {
        layout.blank_secs = secs;
    }
    if let Some(secs) = args.timecode_secs {
        layout.timecode_secs = secs;
    }
    layout.validate()?;

    Ok(session)
}
