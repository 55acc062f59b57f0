//! Segment command implementation
//!
//! Splits each dump of a sample folder into one `Address,Word` file per chip
//! and segment, named `<sample>_Chip<id>_Segment<n>.csv` with `n` counted
//! from 1. The files are valid images for `compare` and `write-image`.

use super::{load_dump, sample_files};
use crate::csv::write_segment_csv;
use crate::error::{CommandError, Result};
use sramprobe_core::{MAX_SEGMENTS, SEGMENT_SIZE};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// Default output folder: `<input>_SEGMENTS` next to the input
pub fn default_output(input: &Path) -> PathBuf {
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "samples".to_string());
    input.with_file_name(format!("{}_SEGMENTS", name))
}

/// Write the per-segment files of every dump in `input`; returns how many
pub fn run_segment(input: &Path, output: &Path) -> Result<usize> {
    let files = sample_files(input)?;
    fs::create_dir_all(output).map_err(|e| CommandError::persistence(output, e))?;
    println!("Found {} sample file(s) in {}", files.len(), input.display());

    let mut written = 0;
    for file in &files {
        let stem = file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        for (chip, image) in load_dump(file)? {
            for (segment, data) in image
                .chunks(SEGMENT_SIZE as usize)
                .take(MAX_SEGMENTS as usize)
                .enumerate()
            {
                let name = format!("{}_Chip{}_Segment{}.csv", stem, chip, segment + 1);
                let path = output.join(name);
                File::create(&path)
                    .and_then(|f| write_segment_csv(BufWriter::new(f), data))
                    .map_err(|e| CommandError::persistence(&path, e))?;
                written += 1;
            }
        }
        log::debug!("Split {}", file.display());
    }

    println!("Wrote {} segment file(s) to {}", written, output.display());
    Ok(written)
}
