//! sramprobe - serial SRAM power-up state sampler
//!
//! Drives 23A1024 SRAM chips wired to Linux spidev chip selects and records
//! their contents as CSV files.
//!
//! # Architecture
//!
//! The transfer logic lives in `sramprobe-core`: a `Session` owns at most one
//! open channel, and the segmented transfer engine maps (segment, offset)
//! pairs onto 24-bit READ/WRITE frames. This binary adds backend selection,
//! run configuration, the optional trigger line, and the commands built on
//! top of a session (sample, dump, fill, write-image, info, compare), plus
//! the offline analysis of recorded samples (recover, segment).

mod backends;
mod cli;
mod commands;
mod config;
mod csv;
mod error;
mod trigger;
mod voting;

use clap::Parser;
use cli::{Cli, Commands, DeviceArgs};
use commands::sample::SampleOptions;
use config::RunConfig;
use sramprobe_core::channel::DynConnector;
use sramprobe_core::session::Session;
use std::io;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let env_filter = std::env::var("RUST_LOG").ok();
    logger(cli.verbose, env_filter.as_deref()).init();

    if let Err(e) = run(cli.command) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Logger at info by default, debug with `-v`, trace with `-vv`
///
/// A `RUST_LOG` filter, when present, overrides the verbosity flags.
fn logger(verbose: u8, env_filter: Option<&str>) -> env_logger::Builder {
    let level = match verbose {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    let mut builder = env_logger::Builder::new();
    builder.filter_level(level);
    if let Some(filter) = env_filter {
        builder.parse_filters(filter);
    }
    builder
}

fn run(command: Commands) -> error::Result<()> {
    match command {
        Commands::Sample {
            device,
            samples,
            label,
            output_dir,
            trigger: trigger_spec,
        } => {
            let mut config = RunConfig::load(&device)?;
            if let Some(samples) = samples {
                config.samples = samples;
            }
            if let Some(dir) = output_dir {
                config.output_dir = dir;
            }
            if let Some(spec) = trigger_spec {
                config.trigger = spec;
            }
            if let Some(label) = label {
                config.label = Some(label);
            }
            config.validate().map_err(error::CommandError::Config)?;

            let label = match config.label.take() {
                Some(label) => label,
                None => {
                    commands::sample::prompt_label(&mut io::stdin().lock(), &mut io::stdout())?
                }
            };

            let mut trigger = trigger::open_trigger(&config.trigger)?;
            let mut session = open_session(&config)?;
            let opts = SampleOptions {
                samples: config.samples,
                label,
                output_dir: config.output_dir,
                timing: config.timing,
            };
            let summary = commands::sample::run_sample(
                &mut session,
                &config.chips,
                trigger.as_mut(),
                &opts,
            )?;
            if summary.zero_segments > 0 {
                log::warn!("{} all-zero segment(s) recorded", summary.zero_segments);
            }
            if !summary.abandoned.is_empty() {
                log::warn!(
                    "{} pass(es) abandoned, sample(s) {:?} not written",
                    summary.abandoned.len(),
                    summary.abandoned
                );
            }
            Ok(())
        }
        Commands::Dump { device, output } => {
            let (config, mut session) = load_device(&device)?;
            commands::dump::run_dump(&mut session, &config.chips, &output)
        }
        Commands::Fill { device, value } => {
            let (config, mut session) = load_device(&device)?;
            commands::fill::run_fill(&mut session, &config.chips, value)
        }
        Commands::WriteImage { device, input } => {
            let segment = commands::write_image::load_image(&input)?;
            let (config, mut session) = load_device(&device)?;
            commands::write_image::run_write_image(&mut session, &config.chips, &segment)
        }
        Commands::Info { device } => {
            let (config, mut session) = load_device(&device)?;
            commands::info::run_info(&mut session, &config.chips)
        }
        Commands::Compare {
            dump,
            reference,
            chip,
        } => commands::compare::run_compare(&dump, &reference, chip).map(|_| ()),
        Commands::Recover {
            new_dir,
            aged_dir,
            chip,
            segments,
            reference,
        } => {
            let opts = commands::recover::RecoverOptions {
                new_dir: &new_dir,
                aged_dir: &aged_dir,
                chip,
                segments: &segments.0,
                reference: &reference,
            };
            let report = commands::recover::run_recover(&opts)?;
            log::debug!(
                "Scored {} segment(s), combined rate {:.4}",
                report.segments.len(),
                report.combined
            );
            Ok(())
        }
        Commands::Segment { input, output } => {
            let output = output.unwrap_or_else(|| commands::segment::default_output(&input));
            commands::segment::run_segment(&input, &output).map(|_| ())
        }
        Commands::ListBackends => {
            commands::list_backends();
            Ok(())
        }
    }
}

/// Resolve the run configuration and open its backend
fn load_device(args: &DeviceArgs) -> error::Result<(RunConfig, Session<DynConnector>)> {
    let config = RunConfig::load(args)?;
    let session = open_session(&config)?;
    Ok((config, session))
}

fn open_session(config: &RunConfig) -> error::Result<Session<DynConnector>> {
    let backend = backends::open_backend(&config.backend)?;
    log::debug!("Backend {} ready for {} chip(s)", backend.name, config.chips.len());
    Ok(Session::new(backend.connector, backend.config))
}
