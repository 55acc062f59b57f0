//! Linux SPI device implementation
//!
//! This module provides the `LinuxSpi` struct that implements the
//! `DuplexChannel` trait using Linux's spidev interface, and the
//! `LinuxSpiConnector` that opens one per device-select path.

use crate::error::{LinuxSpiError, Result};

use sramprobe_core::channel::{ChannelConfig, Connector, DuplexChannel, ModeFlags};
use sramprobe_core::error::{Error as CoreError, Result as CoreResult};

use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;

/// Linux spidev ioctl constants
mod ioctl {
    use nix::ioctl_read;
    use nix::ioctl_write_ptr;

    // SPI ioctl magic number
    const SPI_IOC_MAGIC: u8 = b'k';

    // SPI ioctl type numbers
    const SPI_IOC_TYPE_MODE: u8 = 1;
    const SPI_IOC_TYPE_BITS_PER_WORD: u8 = 3;
    const SPI_IOC_TYPE_MAX_SPEED_HZ: u8 = 4;

    // Generate ioctl functions
    ioctl_read!(spi_ioc_rd_mode, SPI_IOC_MAGIC, SPI_IOC_TYPE_MODE, u8);
    ioctl_write_ptr!(spi_ioc_wr_mode, SPI_IOC_MAGIC, SPI_IOC_TYPE_MODE, u8);
    ioctl_write_ptr!(
        spi_ioc_wr_bits_per_word,
        SPI_IOC_MAGIC,
        SPI_IOC_TYPE_BITS_PER_WORD,
        u8
    );
    ioctl_read!(
        spi_ioc_rd_max_speed_hz,
        SPI_IOC_MAGIC,
        SPI_IOC_TYPE_MAX_SPEED_HZ,
        u32
    );
    ioctl_write_ptr!(
        spi_ioc_wr_max_speed_hz,
        SPI_IOC_MAGIC,
        SPI_IOC_TYPE_MAX_SPEED_HZ,
        u32
    );

    // SPI_IOC_MESSAGE(n) = _IOW(SPI_IOC_MAGIC, 0, char[SPI_MSGSIZE(n)])
    // where SPI_MSGSIZE(n) = (n) * sizeof(struct spi_ioc_transfer)

    /// Size of struct spi_ioc_transfer
    pub const SPI_IOC_TRANSFER_SIZE: usize = 32;

    /// Calculate ioctl number for SPI_IOC_MESSAGE(n)
    pub fn spi_ioc_message(n: u8) -> libc::c_ulong {
        let size = (n as usize) * SPI_IOC_TRANSFER_SIZE;
        // _IOC(dir, type, nr, size) = ((dir)<<30)|((size)<<16)|((type)<<8)|(nr)
        // with dir = _IOC_WRITE = 1
        ((1u32 << 30) | ((size as u32) << 16) | ((SPI_IOC_MAGIC as u32) << 8)) as libc::c_ulong
    }
}

/// SPI transfer structure for ioctl
/// This must match the kernel's struct spi_ioc_transfer layout
#[repr(C)]
#[derive(Debug, Default, Clone)]
struct SpiIocTransfer {
    tx_buf: u64,          // __u64 tx_buf
    rx_buf: u64,          // __u64 rx_buf
    len: u32,             // __u32 len
    speed_hz: u32,        // __u32 speed_hz
    delay_usecs: u16,     // __u16 delay_usecs
    bits_per_word: u8,    // __u8 bits_per_word
    cs_change: u8,        // __u8 cs_change
    tx_nbits: u8,         // __u8 tx_nbits
    rx_nbits: u8,         // __u8 rx_nbits
    word_delay_usecs: u8, // __u8 word_delay_usecs
    _pad: u8,             // padding
}

const _: () = assert!(std::mem::size_of::<SpiIocTransfer>() == ioctl::SPI_IOC_TRANSFER_SIZE);

/// Configuration for opening a Linux SPI device
#[derive(Debug, Clone)]
pub struct LinuxSpiConfig {
    /// Device path (e.g., "/dev/spidev0.0")
    pub device: String,
    /// Clock rate, mode flags and word width
    pub channel: ChannelConfig,
}

impl LinuxSpiConfig {
    /// Create a new configuration with the given device path
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            channel: ChannelConfig::default(),
        }
    }

    /// Set the SPI clock speed in Hz
    pub fn with_speed(mut self, speed_hz: u32) -> Self {
        self.channel.speed_hz = speed_hz;
        self
    }

    /// Set the SPI mode flags
    pub fn with_mode(mut self, mode: ModeFlags) -> Self {
        self.channel.mode = mode;
        self
    }
}

/// Linux SPI channel using the spidev interface
///
/// The file handle is closed when the value is dropped.
pub struct LinuxSpi {
    /// File handle for spidev device
    file: File,
    /// Device path, for diagnostics
    device: String,
    /// Current speed in Hz
    speed_hz: u32,
    /// Bits per word
    bits_per_word: u8,
}

impl LinuxSpi {
    /// Open a Linux SPI device with the given configuration
    pub fn open(config: &LinuxSpiConfig) -> Result<Self> {
        if config.device.is_empty() {
            return Err(LinuxSpiError::NoDevice);
        }

        log::debug!("linux_spi: Opening device {}", config.device);

        // Open the device
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&config.device)
            .map_err(|e| LinuxSpiError::OpenFailed {
                path: config.device.clone(),
                source: e,
            })?;

        let fd = file.as_raw_fd();

        // Set SPI mode and read back what the controller accepted
        let mode = config.channel.mode.bits();
        let mut actual_mode: u8 = 0;
        unsafe {
            ioctl::spi_ioc_wr_mode(fd, &mode)
                .and_then(|_| ioctl::spi_ioc_rd_mode(fd, &mut actual_mode))
                .map_err(|e| LinuxSpiError::SetModeFailed {
                    path: config.device.clone(),
                    mode,
                    source: std::io::Error::from_raw_os_error(e as i32),
                })?;
        }
        if actual_mode != mode {
            log::warn!(
                "linux_spi: {} reports mode 0x{:02X}, requested 0x{:02X}",
                config.device,
                actual_mode,
                mode
            );
        }

        // Set clock speed
        let speed = config.channel.speed_hz;
        let mut actual_speed: u32 = 0;
        unsafe {
            ioctl::spi_ioc_wr_max_speed_hz(fd, &speed)
                .and_then(|_| ioctl::spi_ioc_rd_max_speed_hz(fd, &mut actual_speed))
                .map_err(|e| LinuxSpiError::SetSpeedFailed {
                    path: config.device.clone(),
                    speed,
                    source: std::io::Error::from_raw_os_error(e as i32),
                })?;
        }
        if actual_speed != speed {
            log::debug!(
                "linux_spi: Controller limits speed to {} Hz (requested {} Hz)",
                actual_speed,
                speed
            );
        }

        // Set bits per word
        let bits = config.channel.bits_per_word;
        unsafe {
            ioctl::spi_ioc_wr_bits_per_word(fd, &bits).map_err(|e| {
                LinuxSpiError::SetBitsPerWordFailed {
                    path: config.device.clone(),
                    bits,
                    source: std::io::Error::from_raw_os_error(e as i32),
                }
            })?;
        }

        log::debug!(
            "linux_spi: Opened {} (mode={}, speed={} kHz)",
            config.device,
            config.channel.mode.mode_number(),
            speed / 1000
        );

        Ok(Self {
            file,
            device: config.device.clone(),
            speed_hz: speed,
            bits_per_word: bits,
        })
    }

    /// Open a device with default settings
    pub fn open_device(device: &str) -> Result<Self> {
        Self::open(&LinuxSpiConfig::new(device))
    }

    /// Device path this channel was opened on
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Perform one full-duplex SPI transfer
    ///
    /// A single `spi_ioc_transfer` with both buffers set keeps chip select
    /// asserted for the whole frame; every transmitted byte clocks one
    /// received byte into `read_buf`.
    fn spi_transfer(&mut self, write_data: &[u8], read_buf: &mut [u8]) -> Result<()> {
        if write_data.is_empty() || write_data.len() != read_buf.len() {
            return Err(LinuxSpiError::FrameMismatch {
                tx: write_data.len(),
                rx: read_buf.len(),
            });
        }

        let transfer = SpiIocTransfer {
            tx_buf: write_data.as_ptr() as u64,
            rx_buf: read_buf.as_mut_ptr() as u64,
            len: write_data.len() as u32,
            speed_hz: self.speed_hz,
            bits_per_word: self.bits_per_word,
            ..Default::default()
        };

        let fd = self.file.as_raw_fd();
        let ret = unsafe {
            libc::ioctl(
                fd,
                ioctl::spi_ioc_message(1),
                &transfer as *const SpiIocTransfer,
            )
        };

        if ret < 0 {
            return Err(LinuxSpiError::TransferFailed {
                len: write_data.len(),
                source: std::io::Error::last_os_error(),
            });
        }

        Ok(())
    }
}

impl DuplexChannel for LinuxSpi {
    fn transfer(&mut self, tx: &[u8], rx: &mut [u8]) -> CoreResult<()> {
        self.spi_transfer(tx, rx).map_err(|e| {
            log::error!("linux_spi: {}: {}", self.device, e);
            CoreError::TransferFailed {
                opcode: tx.first().copied().unwrap_or(0),
                address: None,
            }
        })
    }

    fn speed_hz(&self) -> u32 {
        self.speed_hz
    }
}

impl Drop for LinuxSpi {
    fn drop(&mut self) {
        log::debug!("linux_spi: Closing {}", self.device);
    }
}

/// Opens spidev channels by path
#[derive(Debug, Default, Clone)]
pub struct LinuxSpiConnector;

impl Connector for LinuxSpiConnector {
    type Channel = LinuxSpi;

    fn connect(&mut self, path: &str, config: &ChannelConfig) -> CoreResult<LinuxSpi> {
        let config = LinuxSpiConfig {
            device: path.to_string(),
            channel: *config,
        };
        LinuxSpi::open(&config).map_err(|e| {
            log::error!("linux_spi: {}", e);
            CoreError::HandleAcquisitionFailed
        })
    }
}

/// Parse backend options from a list of key-value pairs
///
/// The device path is not part of the options; sessions select it.
pub fn parse_options(options: &[(&str, &str)]) -> std::result::Result<ChannelConfig, String> {
    let mut config = ChannelConfig::default();

    for (key, value) in options {
        match *key {
            "spispeed" => {
                // Parse speed in kHz
                let speed_khz: u32 = value
                    .parse()
                    .map_err(|_| format!("Invalid spispeed value: {}", value))?;
                config.speed_hz = speed_khz
                    .checked_mul(1000)
                    .ok_or_else(|| format!("Invalid spispeed value: {}", value))?;
            }
            "mode" => {
                let mode: u8 = value
                    .parse()
                    .map_err(|_| format!("Invalid mode value: {}", value))?;
                let flags = ModeFlags::from_mode(mode)
                    .ok_or_else(|| format!("Invalid SPI mode: {} (must be 0-3)", mode))?;
                config.mode = flags;
            }
            "cs_high" => {
                if matches!(*value, "1" | "true" | "yes") {
                    config.mode |= ModeFlags::CS_HIGH;
                }
            }
            _ => {
                log::warn!("linux_spi: Unknown option: {}={}", key, value);
            }
        }
    }

    config
        .validate()
        .map_err(|_| format!("Invalid SPI configuration: {} Hz", config.speed_hz))?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ioctl_message_number() {
        // SPI_IOC_MESSAGE(1) on Linux is 0x40206b00
        assert_eq!(ioctl::spi_ioc_message(1), 0x4020_6b00);
    }

    #[test]
    fn test_parse_options() {
        let config = parse_options(&[("spispeed", "10000"), ("mode", "3")]).unwrap();
        assert_eq!(config.speed_hz, 10_000_000);
        assert_eq!(config.mode, ModeFlags::MODE_3);

        let config = parse_options(&[]).unwrap();
        assert_eq!(config, ChannelConfig::default());
    }

    #[test]
    fn test_parse_options_rejects_bad_values() {
        assert!(parse_options(&[("mode", "4")]).is_err());
        assert!(parse_options(&[("spispeed", "fast")]).is_err());
        // Above the 20 MHz rating of the part
        assert!(parse_options(&[("spispeed", "40000")]).is_err());
    }

    #[test]
    fn test_open_missing_device() {
        let err = LinuxSpi::open_device("/nonexistent/spidev9.9")
            .err()
            .expect("open must fail");
        assert!(matches!(err, LinuxSpiError::OpenFailed { .. }));

        let mut connector = LinuxSpiConnector;
        assert_eq!(
            connector
                .connect("/nonexistent/spidev9.9", &ChannelConfig::default())
                .err(),
            Some(CoreError::HandleAcquisitionFailed)
        );
    }
}
