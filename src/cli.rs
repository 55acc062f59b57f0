//! CLI argument parsing

use clap::{Parser, Subcommand};
use sramprobe_core::MAX_SEGMENTS;
use std::path::PathBuf;

/// Parse a string as a hex or decimal byte value
pub fn parse_hex_u8(s: &str) -> Result<u8, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u8::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u8>().map_err(|e| format!("Invalid number: {}", e))
    }
}

/// Segments picked for recovery, 1-based and in the order given
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentSelection(pub Vec<u32>);

/// Parse `all` or a comma separated list of 1-based segment numbers
pub fn parse_segment_selection(s: &str) -> Result<SegmentSelection, String> {
    if s.trim().eq_ignore_ascii_case("all") {
        return Ok(SegmentSelection((1..=MAX_SEGMENTS).collect()));
    }

    let mut selected = Vec::new();
    for field in s.split(',') {
        let n: u32 = field
            .trim()
            .parse()
            .map_err(|_| format!("Invalid segment number: '{}'", field.trim()))?;
        if !(1..=MAX_SEGMENTS).contains(&n) {
            return Err(format!("Segment {} out of range 1-{}", n, MAX_SEGMENTS));
        }
        if !selected.contains(&n) {
            selected.push(n);
        }
    }
    Ok(SegmentSelection(selected))
}

const BACKEND_HELP: &str = "Backend to use, optionally with options \
     (e.g. linux_spi:spispeed=5000,mode=0 or dummy:seed=7) [default: linux_spi]";

#[derive(Parser)]
#[command(name = "sramprobe")]
#[command(author, version, about = "Serial SRAM power-up state sampler", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Device selection shared across commands
#[derive(clap::Args, Debug, Clone, Default)]
pub struct DeviceArgs {
    /// Run configuration file (TOML format)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[arg(short, long, help = BACKEND_HELP)]
    pub backend: Option<String>,

    /// Device path of a chip, repeat once per chip in chip order
    /// [default: /dev/spidev0.0 /dev/spidev0.1]
    #[arg(short, long = "device")]
    pub devices: Vec<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Record power-up states of every chip over repeated passes
    Sample {
        #[command(flatten)]
        device: DeviceArgs,

        /// Number of passes
        #[arg(short = 'n', long)]
        samples: Option<u32>,

        /// Run label (prompted as MM_DD_YY when neither given nor configured)
        #[arg(short, long)]
        label: Option<String>,

        /// Directory that receives the <label>/ folder
        #[arg(short = 'O', long)]
        output_dir: Option<PathBuf>,

        /// Trigger fired before each pass (none, or gpio:dev=...,line=...,pulse_us=...)
        #[arg(short, long)]
        trigger: Option<String>,
    },

    /// Read every chip once into a CSV file
    Dump {
        #[command(flatten)]
        device: DeviceArgs,

        /// Output CSV path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Write one value to every byte of every chip
    Fill {
        #[command(flatten)]
        device: DeviceArgs,

        /// Byte value (hex or decimal)
        #[arg(long, default_value = "0xFF", value_parser = parse_hex_u8)]
        value: u8,
    },

    /// Replicate the first segment of an image CSV into every segment
    WriteImage {
        #[command(flatten)]
        device: DeviceArgs,

        /// Image CSV with an Address,Byte header and hex values
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Show geometry and the mode register of each chip
    Info {
        #[command(flatten)]
        device: DeviceArgs,
    },

    /// Per-segment bit similarity between a dump and a reference image
    Compare {
        /// Dump CSV produced by `sample` or `dump`
        #[arg(short, long)]
        dump: PathBuf,

        /// Reference image CSV (Address,Byte or Address,Word)
        #[arg(short, long)]
        reference: PathBuf,

        /// Chip number to evaluate
        #[arg(long, default_value = "1")]
        chip: u8,
    },

    /// Recover a stored image by voting NEW against AGED power-up states
    Recover {
        /// Folder of dumps sampled before aging
        #[arg(long = "new")]
        new_dir: PathBuf,

        /// Folder of dumps sampled after aging
        #[arg(long = "aged")]
        aged_dir: PathBuf,

        /// Chip number to evaluate
        #[arg(long, default_value = "1")]
        chip: u8,

        /// Segments to vote on (e.g. 2,4,7 or all)
        #[arg(short, long, default_value = "all", value_parser = parse_segment_selection)]
        segments: SegmentSelection,

        /// Reference image CSV the chip was aged with
        #[arg(short, long)]
        reference: PathBuf,
    },

    /// Split every dump of a folder into per-segment Address,Word files
    Segment {
        /// Folder of dumps
        #[arg(short, long)]
        input: PathBuf,

        /// Output folder [default: <input>_SEGMENTS]
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List compiled-in backends
    ListBackends,
}
