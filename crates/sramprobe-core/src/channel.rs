//! Channel trait definitions
//!
//! A [`DuplexChannel`] performs one synchronous full-duplex exchange; a
//! [`Connector`] acquires channels for a device-select path. Backends
//! (spidev, the in-memory emulator) implement both, the session owns the
//! resulting channel.

use crate::error::{Error, Result};
use bitflags::bitflags;

/// Default SPI clock rate in Hz (5 MHz)
pub const DEFAULT_SPEED_HZ: u32 = 5_000_000;

/// Highest clock rate the 23A1024 is rated for (20 MHz)
pub const MAX_SPEED_HZ: u32 = 20_000_000;

/// Word width used on the bus
pub const BITS_PER_WORD: u8 = 8;

bitflags! {
    /// SPI mode flags
    ///
    /// Bit positions match the Linux spidev `SPI_*` mode constants so the
    /// value can be handed to `SPI_IOC_WR_MODE` unchanged.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ModeFlags: u8 {
        /// Clock phase
        const CPHA      = 1 << 0;
        /// Clock polarity
        const CPOL      = 1 << 1;
        /// Chip select active high
        const CS_HIGH   = 1 << 2;
        /// Least significant bit first
        const LSB_FIRST = 1 << 3;
        /// Shared SI/SO signal
        const THREE_WIRE = 1 << 4;
        /// Loopback mode
        const LOOP      = 1 << 5;

        /// SPI mode 0 (CPOL=0, CPHA=0)
        const MODE_0 = 0;
        /// SPI mode 1 (CPOL=0, CPHA=1)
        const MODE_1 = Self::CPHA.bits();
        /// SPI mode 2 (CPOL=1, CPHA=0)
        const MODE_2 = Self::CPOL.bits();
        /// SPI mode 3 (CPOL=1, CPHA=1)
        const MODE_3 = Self::CPOL.bits() | Self::CPHA.bits();
    }
}

impl Default for ModeFlags {
    fn default() -> Self {
        ModeFlags::MODE_0
    }
}

impl ModeFlags {
    /// Build flags from a numeric SPI mode (0-3)
    pub fn from_mode(mode: u8) -> Option<Self> {
        match mode {
            0 => Some(Self::MODE_0),
            1 => Some(Self::MODE_1),
            2 => Some(Self::MODE_2),
            3 => Some(Self::MODE_3),
            _ => None,
        }
    }

    /// Numeric SPI mode (0-3) encoded by the CPOL/CPHA bits
    pub fn mode_number(&self) -> u8 {
        (*self & Self::MODE_3).bits()
    }
}

/// Channel configuration applied when a handle is acquired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelConfig {
    /// SPI clock rate in Hz
    pub speed_hz: u32,
    /// SPI mode flags
    pub mode: ModeFlags,
    /// Bits per word
    pub bits_per_word: u8,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            speed_hz: DEFAULT_SPEED_HZ,
            mode: ModeFlags::MODE_0,
            bits_per_word: BITS_PER_WORD,
        }
    }
}

impl ChannelConfig {
    /// Set the SPI clock rate in Hz
    pub fn with_speed(mut self, speed_hz: u32) -> Self {
        self.speed_hz = speed_hz;
        self
    }

    /// Set the SPI mode flags
    pub fn with_mode(mut self, mode: ModeFlags) -> Self {
        self.mode = mode;
        self
    }

    /// Check the configuration against what the device supports
    pub fn validate(&self) -> Result<()> {
        if self.speed_hz == 0 || self.speed_hz > MAX_SPEED_HZ {
            log::error!(
                "SPI speed {} Hz outside 1..={} Hz",
                self.speed_hz,
                MAX_SPEED_HZ
            );
            return Err(Error::InvalidConfig);
        }
        if self.bits_per_word != BITS_PER_WORD {
            log::error!("Unsupported word width {}", self.bits_per_word);
            return Err(Error::InvalidConfig);
        }
        Ok(())
    }
}

/// Full-duplex byte channel
///
/// This trait represents an open, configured handle to one device. The
/// handle is released when the value is dropped.
pub trait DuplexChannel {
    /// Exchange `tx` for `rx` in one transfer with chip select held
    ///
    /// `tx` and `rx` have the same length. Implementations fill `rx`
    /// completely or return an error.
    fn transfer(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<()>;

    /// Clock rate actually in effect, in Hz
    fn speed_hz(&self) -> u32;
}

/// Acquires channels for device-select paths
pub trait Connector {
    /// Channel type produced by this connector
    type Channel: DuplexChannel;

    /// Open and configure a channel for `path`
    fn connect(&mut self, path: &str, config: &ChannelConfig) -> Result<Self::Channel>;
}

#[cfg(feature = "alloc")]
impl<T: DuplexChannel + ?Sized> DuplexChannel for alloc::boxed::Box<T> {
    fn transfer(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<()> {
        (**self).transfer(tx, rx)
    }

    fn speed_hz(&self) -> u32 {
        (**self).speed_hz()
    }
}

#[cfg(feature = "alloc")]
impl<T: Connector + ?Sized> Connector for alloc::boxed::Box<T> {
    type Channel = T::Channel;

    fn connect(&mut self, path: &str, config: &ChannelConfig) -> Result<Self::Channel> {
        (**self).connect(path, config)
    }
}

/// Boxed channel trait object, as produced by [`BoxedConnector`]
#[cfg(feature = "alloc")]
pub type DynChannel = alloc::boxed::Box<dyn DuplexChannel + Send>;

/// Boxed connector trait object for runtime backend selection
#[cfg(feature = "alloc")]
pub type DynConnector = alloc::boxed::Box<dyn Connector<Channel = DynChannel> + Send>;

/// Adapter erasing the channel type of a connector
///
/// Lets the CLI pick a backend at runtime and still hand a single concrete
/// type to `Session`.
#[cfg(feature = "alloc")]
pub struct BoxedConnector<C>(pub C);

#[cfg(feature = "alloc")]
impl<C> Connector for BoxedConnector<C>
where
    C: Connector,
    C::Channel: Send + 'static,
{
    type Channel = DynChannel;

    fn connect(&mut self, path: &str, config: &ChannelConfig) -> Result<DynChannel> {
        let channel = self.0.connect(path, config)?;
        Ok(alloc::boxed::Box::new(channel))
    }
}

#[cfg(feature = "alloc")]
impl<C> BoxedConnector<C>
where
    C: Connector + Send + 'static,
    C::Channel: Send + 'static,
{
    /// Box a connector into a [`DynConnector`]
    pub fn into_dyn(connector: C) -> DynConnector {
        alloc::boxed::Box::new(BoxedConnector(connector))
    }
}
