//! Error types for sramprobe-core
//!
//! This module provides a no_std compatible error type that can be used
//! throughout the crate.

use core::fmt;

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    // Addressing errors
    /// Segment or offset is outside the segmented address space
    AddressOutOfRange {
        /// Requested segment
        segment: u32,
        /// Requested offset within the segment
        offset: u32,
    },
    /// Provided buffer is too small for the operation
    BufferTooSmall,

    // Channel errors
    /// Device path could not be opened or configured
    HandleAcquisitionFailed,
    /// A duplex exchange was rejected by the channel
    TransferFailed {
        /// Opcode of the frame being exchanged
        opcode: u8,
        /// Physical address carried by the frame, if any
        address: Option<u32>,
    },
    /// Channel configuration is not acceptable (speed, word width)
    InvalidConfig,

    // Session lifecycle errors
    /// Operation issued before `open()` or after `close()`
    SessionNotOpen,
    /// `open()` called on a session that already holds a handle
    SessionAlreadyOpen,
}

impl Error {
    /// Returns true for errors that abort a whole sampling run
    ///
    /// Everything except configuration mistakes detected before any I/O is
    /// a protocol-level failure with no resynchronization primitive.
    pub const fn is_fatal(&self) -> bool {
        !matches!(self, Self::InvalidConfig | Self::BufferTooSmall)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AddressOutOfRange { segment, offset } => write!(
                f,
                "address out of range: segment {} offset 0x{:04X}",
                segment, offset
            ),
            Self::BufferTooSmall => write!(f, "buffer too small"),
            Self::HandleAcquisitionFailed => {
                write!(f, "failed to open or configure SPI device")
            }
            Self::TransferFailed {
                opcode,
                address: Some(addr),
            } => write!(
                f,
                "SPI transfer failed (opcode 0x{:02X}, address 0x{:06X})",
                opcode, addr
            ),
            Self::TransferFailed {
                opcode,
                address: None,
            } => write!(f, "SPI transfer failed (opcode 0x{:02X})", opcode),
            Self::InvalidConfig => write!(f, "invalid channel configuration"),
            Self::SessionNotOpen => write!(f, "session is not open"),
            Self::SessionAlreadyOpen => write!(f, "session is already open"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
