use anyhow::Result;
use clap::Parser as ClapParser;
use indicatif::MultiProgress;
use indicatif_log_bridge::LogWrapper;

use cli::analyze::cmd_analyze;
use cli::command::{Cli, Commands, LogFormat};
use cli::correlate::cmd_correlate;
use cli::decode::cmd_decode;
use cli::encode::cmd_encode;
use cli::pattern::cmd_pattern;

mod byteorder;
mod cli;
mod input;
mod metadata;
pub(crate) mod timestamp;
mod wav;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let base_level = cli.loglevel.to_level_filter();

    let multi = MultiProgress::new();

    let mut env_builder = env_logger::Builder::from_default_env();
    env_builder.filter_level(base_level);
    match cli.log_format {
        LogFormat::Plain => {
            env_builder.format_timestamp_secs();
        }
        LogFormat::Json => {
            env_builder.format(|buf, record| {
                use std::io::Write;
                writeln!(
                    buf,
                    "{{\"ts\":\"{}\",\"lvl\":\"{}\",\"target\":\"{}\",\"msg\":{:?}}}",
                    buf.timestamp(),
                    record.level(),
                    record.target(),
                    record.args().to_string()
                )
            });
        }
    }

    let pb = if cli.progress {
        let logger = env_builder.build();
        LogWrapper::new(multi.clone(), logger).try_init()?;
        Some(&multi)
    } else {
        env_builder.try_init()?;
        None
    };

    match cli.command {
        Commands::Encode(ref args) => cmd_encode(args, pb)?,
        Commands::Pattern(ref args) => cmd_pattern(args)?,
        Commands::Decode(ref args) => cmd_decode(args, &cli, pb)?,
        Commands::Correlate(ref args) => cmd_correlate(args, &cli)?,
        Commands::Analyze(ref args) => cmd_analyze(args, &cli, pb)?,
    }

    Ok(())
}
