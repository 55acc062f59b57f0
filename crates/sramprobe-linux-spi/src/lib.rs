//! sramprobe-linux-spi - Linux spidev backend
//!
//! This crate provides access to serial SRAM through the Linux
//! `/dev/spidevX.Y` character devices.
//!
//! # Overview
//!
//! The Linux SPI driver exposes SPI controllers through character devices
//! at `/dev/spidevX.Y` where X is the bus number and Y is the chip select.
//! On a Raspberry Pi, two SRAM chips wired to CE0 and CE1 appear as
//! `/dev/spidev0.0` and `/dev/spidev0.1`.
//!
//! # Example
//!
//! ```no_run
//! use sramprobe_core::channel::ChannelConfig;
//! use sramprobe_core::engine;
//! use sramprobe_core::session::Session;
//! use sramprobe_linux_spi::LinuxSpiConnector;
//!
//! let mut session = Session::new(LinuxSpiConnector, ChannelConfig::default());
//! session.select("/dev/spidev0.1");
//! session.open()?;
//! let value = engine::read_byte(&mut session, 0, 0)?;
//! println!("chip 2, byte 0: {:02x}", value);
//! session.close();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Usage with the sramprobe CLI
//!
//! ```bash
//! # Default settings (5 MHz, mode 0)
//! sramprobe dump -b linux_spi -o test.csv
//!
//! # Specify SPI speed in kHz
//! sramprobe dump -b linux_spi:spispeed=10000 -o test.csv
//! ```
//!
//! # System Requirements
//!
//! - Linux kernel with spidev support enabled (`CONFIG_SPI_SPIDEV`)
//! - Read/write access to `/dev/spidevX.Y` device
//! - May require adding user to `spi` group or using udev rules

pub mod device;
pub mod error;

// Re-exports
pub use device::{parse_options, LinuxSpi, LinuxSpiConfig, LinuxSpiConnector};
pub use error::{LinuxSpiError, Result};
