//! Dump command implementation

use super::{read_image, save_dump, sweep_progress_bar, with_chip};
use crate::config::ChipConfig;
use crate::error::Result;
use sramprobe_core::channel::Connector;
use sramprobe_core::session::Session;
use std::path::Path;
use std::time::Duration;

/// Read every chip once into `output`
///
/// All chips are read before the file is created, so a device error never
/// leaves a partial dump behind.
pub fn run_dump<C: Connector>(
    session: &mut Session<C>,
    chips: &[ChipConfig],
    output: &Path,
) -> Result<()> {
    let pb = sweep_progress_bar(chips.len(), "Reading");

    let mut images = Vec::with_capacity(chips.len());
    for chip in chips {
        let image = with_chip(session, chip, |s| read_image(s, Duration::ZERO, &pb))?;
        images.push((chip.id, image));
    }
    pb.finish_with_message("Read complete");

    let rows = save_dump(output, &images)?;

    println!("Wrote {} rows to {:?}", rows, output);
    Ok(())
}
