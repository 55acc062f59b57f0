//! CLI command implementations
//!
//! Every device command drives a single `Session` through the chips of the
//! run configuration one at a time: select, open, sweep, close. Commands are
//! generic over the connector so tests can run them against the in-memory
//! backend.

pub mod compare;
pub mod dump;
pub mod fill;
pub mod info;
mod list;
pub mod recover;
pub mod sample;
pub mod segment;
pub mod write_image;

pub use list::list_backends;

use crate::config::ChipConfig;
use crate::csv::{parse_dump, DumpWriter};
use crate::error::{CommandError, Result};
use indicatif::{ProgressBar, ProgressStyle};
use sramprobe_core::channel::Connector;
use sramprobe_core::engine;
use sramprobe_core::session::Session;
use sramprobe_core::{SEGMENT_SIZE, TOTAL_SIZE};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Chip images of one sweep, in configuration order
pub type ChipImages = Vec<(u8, Vec<u8>)>;

/// Open `chip`, run `op`, and close again whatever `op` returned
///
/// Core errors are annotated with the chip's device path.
pub fn with_chip<C, T, F>(session: &mut Session<C>, chip: &ChipConfig, op: F) -> Result<T>
where
    C: Connector,
    F: FnOnce(&mut Session<C>) -> sramprobe_core::Result<T>,
{
    session.select(chip.path.as_str());
    session
        .open()
        .map_err(|e| CommandError::device(&chip.path, e))?;

    let result = op(session);
    session.close();
    result.map_err(|e| CommandError::device(&chip.path, e))
}

/// Read the whole device behind an open session, indexed by physical address
///
/// Sleeps `segment_delay` before the first byte of every segment.
pub fn read_image<C: Connector>(
    session: &mut Session<C>,
    segment_delay: Duration,
    pb: &ProgressBar,
) -> sramprobe_core::Result<Vec<u8>> {
    let mut image = vec![0u8; TOTAL_SIZE as usize];

    engine::iterate_segments(session, |session, addr| {
        if addr.is_segment_start() && !segment_delay.is_zero() {
            std::thread::sleep(segment_delay);
        }
        image[addr.physical() as usize] = engine::read_at(session, addr)?;
        if addr.offset() == SEGMENT_SIZE - 1 {
            pb.inc(SEGMENT_SIZE as u64);
        }
        Ok(())
    })?;

    Ok(image)
}

/// Write `images` as one dump to `out`; returns the writer and the row count
pub fn write_images<W: Write>(out: W, images: &[(u8, Vec<u8>)]) -> io::Result<(W, usize)> {
    let mut writer = DumpWriter::new(out)?;
    for (id, image) in images {
        writer.write_chip(*id, image)?;
    }
    let rows = writer.rows();
    Ok((writer.finish()?, rows))
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("dump"));
    name.push(".tmp");
    path.with_file_name(name)
}

/// Save a dump file, replacing `path` only once every row is on disk
///
/// Rows go to `<path>.tmp` first, which is renamed over `path` on success
/// and removed on failure. Returns the number of data rows.
pub fn save_dump(path: &Path, images: &[(u8, Vec<u8>)]) -> Result<usize> {
    let staging = staging_path(path);
    let result = File::create(&staging)
        .and_then(|file| write_images(BufWriter::new(file), images))
        .and_then(|(out, rows)| {
            out.into_inner().map_err(|e| e.into_error())?.sync_all()?;
            Ok(rows)
        })
        .and_then(|rows| fs::rename(&staging, path).map(|_| rows));

    result.map_err(|e| {
        let _ = fs::remove_file(&staging);
        CommandError::persistence(path, e)
    })
}

fn input_error(path: &Path, message: impl ToString) -> CommandError {
    CommandError::Image {
        path: path.to_path_buf(),
        message: message.to_string(),
    }
}

/// Parse the dump file at `path` into one image per chip
pub fn load_dump(path: &Path) -> Result<BTreeMap<u8, Vec<u8>>> {
    let text = fs::read_to_string(path).map_err(|e| input_error(path, e))?;
    parse_dump(&text).map_err(|message| input_error(path, message))
}

/// Dump files of a sample folder, sorted by name
///
/// Only `*.csv` files are listed, so staging files are skipped.
pub fn sample_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| input_error(dir, e))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| input_error(dir, e))?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "csv") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Image of `chip` from every dump in `dir`
pub fn load_chip_samples(dir: &Path, chip: u8) -> Result<Vec<Vec<u8>>> {
    let files = sample_files(dir)?;
    if files.is_empty() {
        return Err(input_error(dir, "no CSV samples found"));
    }

    let mut samples = Vec::with_capacity(files.len());
    for path in &files {
        let image = load_dump(path)?
            .remove(&chip)
            .ok_or_else(|| input_error(path, format!("no rows for chip {}", chip)))?;
        samples.push(image);
    }
    log::debug!("Loaded {} sample(s) of chip {} from {}", samples.len(), chip, dir.display());
    Ok(samples)
}

/// Byte progress bar for a sweep over `chips` devices
pub fn sweep_progress_bar(chips: usize, phase: &str) -> ProgressBar {
    let pb = ProgressBar::new(chips as u64 * TOTAL_SIZE as u64);
    let style = ProgressStyle::default_bar()
        .template(&format!(
            "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{bytes}}/{{total_bytes}} ({{bytes_per_sec}}, {{eta}}) {}",
            phase
        ))
        .map(|style| style.progress_chars("#>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb
}
