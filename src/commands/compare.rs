//! Compare command implementation
//!
//! Scores how closely each segment of a dumped chip matches the reference
//! pattern that was written into every segment, as the fraction of equal
//! bits.

use crate::csv::{parse_dump, parse_image};
use crate::error::{CommandError, Result};
use sramprobe_core::{MAX_SEGMENTS, SEGMENT_SIZE};
use std::fs;
use std::path::Path;

/// Fraction of equal bits between each segment of `image` and `reference`
///
/// `reference` is compared against every segment; missing reference bytes
/// count as zero.
pub fn segment_similarity(image: &[u8], reference: &[u8]) -> Vec<f64> {
    let bits = (SEGMENT_SIZE * 8) as f64;

    image
        .chunks(SEGMENT_SIZE as usize)
        .take(MAX_SEGMENTS as usize)
        .map(|segment| {
            let differing: u32 = segment
                .iter()
                .enumerate()
                .map(|(i, &byte)| (byte ^ reference.get(i).copied().unwrap_or(0)).count_ones())
                .sum();
            (bits - differing as f64) / bits
        })
        .collect()
}

fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| CommandError::Image {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Print per-segment similarity of `chip` in `dump` against `reference`
pub fn run_compare(dump: &Path, reference: &Path, chip: u8) -> Result<Vec<f64>> {
    let images = parse_dump(&read_text(dump)?).map_err(|message| CommandError::Image {
        path: dump.to_path_buf(),
        message,
    })?;
    let reference_data =
        parse_image(&read_text(reference)?).map_err(|message| CommandError::Image {
            path: reference.to_path_buf(),
            message,
        })?;

    let image = images.get(&chip).ok_or_else(|| CommandError::Image {
        path: dump.to_path_buf(),
        message: format!("no rows for chip {}", chip),
    })?;

    let scores = segment_similarity(image, &reference_data);

    println!("Segment-wise similarity (read vs written) for chip {}:", chip);
    for (i, score) in scores.iter().enumerate() {
        println!("  Segment {:02}: {:.4}", i + 1, score);
    }

    Ok(scores)
}
