//! Write-image command implementation

use super::{sweep_progress_bar, with_chip};
use crate::config::ChipConfig;
use crate::csv::parse_image;
use crate::error::{CommandError, Result};
use sramprobe_core::channel::Connector;
use sramprobe_core::engine;
use sramprobe_core::session::Session;
use sramprobe_core::{MAX_SEGMENTS, SEGMENT_SIZE};
use std::fs;
use std::path::Path;

/// Load one segment worth of image data, zero-padded
pub fn load_image(path: &Path) -> Result<Vec<u8>> {
    let image_err = |message: String| CommandError::Image {
        path: path.to_path_buf(),
        message,
    };

    let text = fs::read_to_string(path).map_err(|e| image_err(e.to_string()))?;
    let mut data = parse_image(&text).map_err(image_err)?;

    if data.is_empty() {
        return Err(image_err("no data rows".to_string()));
    }
    if data.len() < SEGMENT_SIZE as usize {
        log::warn!(
            "{:?} holds {} bytes, padding to {} with zeros",
            path,
            data.len(),
            SEGMENT_SIZE
        );
        data.resize(SEGMENT_SIZE as usize, 0);
    }

    println!("Read {} bytes from {:?}", data.len(), path);
    Ok(data)
}

/// Write `segment` into every segment of every chip
pub fn run_write_image<C: Connector>(
    session: &mut Session<C>,
    chips: &[ChipConfig],
    segment: &[u8],
) -> Result<()> {
    let pb = sweep_progress_bar(chips.len(), "Writing");

    for chip in chips {
        with_chip(session, chip, |session| {
            for seg in 0..MAX_SEGMENTS {
                engine::write_segment(session, seg, segment)?;
                pb.inc(SEGMENT_SIZE as u64);
                log::debug!("Chip {} segment {} written", chip.id, seg);
            }
            Ok(())
        })?;
        println!("Chip {}: {} segments written", chip.id, MAX_SEGMENTS);
    }

    pb.finish_with_message("Write complete");
    Ok(())
}
