//! CSV dump and image files
//!
//! Dumps have a `Chip,Segment,Address,Byte` header followed by one row per
//! byte, segment-major and offset-minor for each chip in turn. The segment
//! is decimal, the physical address six lowercase hex digits and the byte
//! two lowercase hex digits:
//!
//! ```text
//! Chip,Segment,Address,Byte
//! 1,0,000000,3f
//! 1,0,000001,00
//! ```
//!
//! Images have a two-column `Address,Byte` or `Address,Word` header and hex
//! values in both columns. Only the row order matters; the address column is
//! checked for syntax. Per-segment exports use the `Address,Word` form with
//! the offset in four uppercase hex digits.

use sramprobe_core::geometry::{addresses, Address};
use sramprobe_core::{SEGMENT_SIZE, TOTAL_SIZE};
use std::collections::BTreeMap;
use std::io::{self, Write};

/// Header line of a dump file
pub const DUMP_HEADER: &str = "Chip,Segment,Address,Byte";

/// Header line of a per-segment export
pub const SEGMENT_HEADER: &str = "Address,Word";

/// Streams dump rows to a writer
pub struct DumpWriter<W: Write> {
    inner: W,
    rows: usize,
}

impl<W: Write> DumpWriter<W> {
    /// Write the header and return the writer
    pub fn new(mut inner: W) -> io::Result<Self> {
        writeln!(inner, "{}", DUMP_HEADER)?;
        Ok(Self { inner, rows: 0 })
    }

    /// Append the rows of one chip
    ///
    /// `image` is indexed by physical address; bytes past [`TOTAL_SIZE`]
    /// are ignored.
    pub fn write_chip(&mut self, chip: u8, image: &[u8]) -> io::Result<()> {
        for (addr, &byte) in addresses().zip(image) {
            writeln!(
                self.inner,
                "{},{},{:06x},{:02x}",
                chip,
                addr.segment(),
                addr.physical(),
                byte
            )?;
            self.rows += 1;
        }
        Ok(())
    }

    /// Number of data rows written so far
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Flush and return the inner writer
    pub fn finish(mut self) -> io::Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}

/// Write one segment as `Address,Word` rows; returns the writer
pub fn write_segment_csv<W: Write>(mut out: W, segment: &[u8]) -> io::Result<W> {
    writeln!(out, "{}", SEGMENT_HEADER)?;
    for (offset, byte) in segment.iter().enumerate() {
        writeln!(out, "{:04X},{:02X}", offset, byte)?;
    }
    out.flush()?;
    Ok(out)
}

fn is_image_header(header: &str) -> bool {
    let mut fields = header.split(',').map(str::trim);
    match (fields.next(), fields.next(), fields.next()) {
        (Some(address), Some(value), None) => {
            address.eq_ignore_ascii_case("Address")
                && (value.eq_ignore_ascii_case("Byte") || value.eq_ignore_ascii_case("Word"))
        }
        _ => false,
    }
}

fn parse_hex(field: &str) -> Option<u32> {
    let field = field.trim();
    let digits = field
        .strip_prefix("0x")
        .or_else(|| field.strip_prefix("0X"))
        .unwrap_or(field);
    u32::from_str_radix(digits, 16).ok()
}

fn parse_byte(field: &str) -> Option<u8> {
    parse_hex(field).and_then(|v| u8::try_from(v).ok())
}

/// Data rows: header skipped, blank lines ignored, 1-based line numbers
fn data_lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines()
        .enumerate()
        .skip(1)
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty())
}

/// Read the first [`SEGMENT_SIZE`] bytes of an image
///
/// Shorter images are returned as they are; the caller decides how to pad.
pub fn parse_image(text: &str) -> Result<Vec<u8>, String> {
    match text.lines().next() {
        Some(header) if is_image_header(header) => {}
        Some(header) => return Err(format!("unexpected header '{}'", header.trim())),
        None => return Err("empty file".to_string()),
    }

    let mut data = Vec::with_capacity(SEGMENT_SIZE as usize);
    for (line_no, line) in data_lines(text) {
        if data.len() == SEGMENT_SIZE as usize {
            break;
        }
        let (addr, byte) = line
            .split_once(',')
            .ok_or_else(|| format!("line {}: expected two fields", line_no))?;
        parse_hex(addr).ok_or_else(|| format!("line {}: bad address '{}'", line_no, addr))?;
        let byte =
            parse_byte(byte).ok_or_else(|| format!("line {}: bad byte '{}'", line_no, byte))?;
        data.push(byte);
    }

    Ok(data)
}

/// Parse a dump into one [`TOTAL_SIZE`] image per chip
///
/// Bytes missing from the file read as zero.
pub fn parse_dump(text: &str) -> Result<BTreeMap<u8, Vec<u8>>, String> {
    match text.lines().next() {
        Some(header) if header.trim().eq_ignore_ascii_case(DUMP_HEADER) => {}
        Some(header) => return Err(format!("unexpected header '{}'", header.trim())),
        None => return Err("empty file".to_string()),
    }

    let mut chips: BTreeMap<u8, Vec<u8>> = BTreeMap::new();
    for (line_no, line) in data_lines(text) {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        let [chip, segment, address, byte] = fields[..] else {
            return Err(format!("line {}: expected 4 fields", line_no));
        };

        let chip: u8 = chip
            .parse()
            .map_err(|_| format!("line {}: bad chip '{}'", line_no, chip))?;
        let segment: u32 = segment
            .parse()
            .map_err(|_| format!("line {}: bad segment '{}'", line_no, segment))?;
        let addr = parse_hex(address)
            .and_then(|a| Address::from_physical(a).ok())
            .ok_or_else(|| format!("line {}: bad address '{}'", line_no, address))?;
        if addr.segment() != segment {
            return Err(format!(
                "line {}: address {:06x} is not in segment {}",
                line_no,
                addr.physical(),
                segment
            ));
        }
        let byte =
            parse_byte(byte).ok_or_else(|| format!("line {}: bad byte '{}'", line_no, byte))?;

        chips
            .entry(chip)
            .or_insert_with(|| vec![0; TOTAL_SIZE as usize])[addr.physical() as usize] = byte;
    }

    Ok(chips)
}
