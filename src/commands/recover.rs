//! Recover command implementation
//!
//! A pattern held in SRAM for a long time skews the power-up state of its
//! cells. Voting the bit weights of an aged sample folder against a folder
//! taken before aging recovers that pattern. Every selected segment is
//! scored on its own, then the segments are combined by bitwise majority.

use super::load_chip_samples;
use crate::csv::parse_image;
use crate::error::{CommandError, Result};
use crate::voting::{bit_weights, majority, recovery_rate, sign_vote, Vote};
use sramprobe_core::SEGMENT_SIZE;
use std::fs;
use std::path::Path;

const SEGMENT_BITS: usize = SEGMENT_SIZE as usize * 8;

/// Inputs of a recovery run
#[derive(Debug, Clone)]
pub struct RecoverOptions<'a> {
    pub new_dir: &'a Path,
    pub aged_dir: &'a Path,
    pub chip: u8,
    /// 1-based segment numbers
    pub segments: &'a [u32],
    pub reference: &'a Path,
}

/// Recovery rates of one run
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryReport {
    /// `(segment number, rate)` in selection order
    pub segments: Vec<(u32, f64)>,
    /// Rate of the cross-segment majority vote
    pub combined: f64,
}

fn load_reference(path: &Path) -> Result<Vec<u8>> {
    let image_error = |message: String| CommandError::Image {
        path: path.to_path_buf(),
        message,
    };
    let text = fs::read_to_string(path).map_err(|e| image_error(e.to_string()))?;
    let reference = parse_image(&text).map_err(image_error)?;
    if reference.len() != SEGMENT_SIZE as usize {
        return Err(image_error(format!(
            "reference holds {} bytes, expected {}",
            reference.len(),
            SEGMENT_SIZE
        )));
    }
    Ok(reference)
}

/// Per-segment votes for `segments` of a NEW and an AGED sample set
///
/// A segment number outside the images yields an empty vote list.
pub fn segment_votes(new: &[Vec<u8>], aged: &[Vec<u8>], segments: &[u32]) -> Vec<Vec<Vote>> {
    let votes = sign_vote(&bit_weights(new), &bit_weights(aged));

    segments
        .iter()
        .map(|&n| {
            n.checked_sub(1)
                .map(|i| i as usize * SEGMENT_BITS)
                .and_then(|start| votes.get(start..start + SEGMENT_BITS))
                .map(<[Vote]>::to_vec)
                .unwrap_or_default()
        })
        .collect()
}

/// Vote, score and print the recovery of `opts.chip`
pub fn run_recover(opts: &RecoverOptions<'_>) -> Result<RecoveryReport> {
    let reference = load_reference(opts.reference)?;
    let new = load_chip_samples(opts.new_dir, opts.chip)?;
    let aged = load_chip_samples(opts.aged_dir, opts.chip)?;

    if new.len() != aged.len() {
        return Err(CommandError::Image {
            path: opts.aged_dir.to_path_buf(),
            message: format!(
                "{} aged sample(s) against {} new sample(s)",
                aged.len(),
                new.len()
            ),
        });
    }
    log::info!(
        "Voting {} sample pair(s) of chip {} over {} segment(s)",
        new.len(),
        opts.chip,
        opts.segments.len()
    );

    let votes = segment_votes(&new, &aged, opts.segments);
    let segments: Vec<(u32, f64)> = opts
        .segments
        .iter()
        .zip(&votes)
        .map(|(&n, v)| (n, recovery_rate(v, &reference)))
        .collect();
    let combined = recovery_rate(&majority(&votes), &reference);

    println!("Segment-wise recovery rates for chip {}:", opts.chip);
    for (n, rate) in &segments {
        println!("  Segment {:02}: {:.4}", n, rate);
    }
    println!(
        "Combined recovery over {} segment(s): {:.4}",
        segments.len(),
        combined
    );

    Ok(RecoveryReport { segments, combined })
}
