//! Info command implementation

use super::with_chip;
use crate::config::ChipConfig;
use crate::error::Result;
use sramprobe_core::channel::Connector;
use sramprobe_core::session::Session;
use sramprobe_core::spi::OperatingMode;
use sramprobe_core::{ADDRESS_BYTES, MAX_SEGMENTS, SEGMENT_SIZE, TOTAL_SIZE};

/// Mode register of each chip, in chip order
pub fn chip_modes<C: Connector>(
    session: &mut Session<C>,
    chips: &[ChipConfig],
) -> Result<Vec<(u8, Option<OperatingMode>)>> {
    let mut modes = Vec::with_capacity(chips.len());
    for chip in chips {
        let mode = with_chip(session, chip, |s| s.read_operating_mode())?;
        modes.push((chip.id, mode));
    }
    Ok(modes)
}

/// Print geometry and the decoded mode register of every chip
pub fn run_info<C: Connector>(session: &mut Session<C>, chips: &[ChipConfig]) -> Result<()> {
    println!("SRAM Geometry");
    println!("=============");
    println!();
    println!(
        "Device size:     {} bytes ({} KiB)",
        TOTAL_SIZE,
        TOTAL_SIZE / 1024
    );
    println!(
        "Segments:        {} x {} bytes ({} Kbit)",
        MAX_SEGMENTS,
        SEGMENT_SIZE,
        SEGMENT_SIZE * 8 / 1024
    );
    println!("Address bytes:   {}", ADDRESS_BYTES);
    println!(
        "SPI clock:       {} kHz, mode {}",
        session.config().speed_hz / 1000,
        session.config().mode.mode_number()
    );
    println!();

    for (id, mode) in chip_modes(session, chips)? {
        let path = chips
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.path.as_str())
            .unwrap_or("?");
        match mode {
            Some(mode) => println!(
                "Chip {} ({}): mode register 0x{:02X} ({})",
                id,
                path,
                mode.register_value(),
                mode
            ),
            None => println!("Chip {} ({}): mode register invalid", id, path),
        }
    }

    Ok(())
}
