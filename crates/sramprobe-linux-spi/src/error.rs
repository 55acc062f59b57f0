//! Error types for the spidev backend

use thiserror::Error;

/// spidev errors
///
/// Every configuration step names the value that was rejected, since the
/// kernel only answers with an errno.
#[derive(Debug, Error)]
pub enum LinuxSpiError {
    /// The character device could not be opened
    #[error("cannot open spidev {path}: {source}")]
    OpenFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// `SPI_IOC_WR_MODE` / `SPI_IOC_RD_MODE` failed
    #[error("{path}: SPI mode 0x{mode:02X} rejected: {source}")]
    SetModeFailed {
        path: String,
        mode: u8,
        #[source]
        source: std::io::Error,
    },

    /// `SPI_IOC_WR_BITS_PER_WORD` failed
    #[error("{path}: {bits} bits per word rejected: {source}")]
    SetBitsPerWordFailed {
        path: String,
        bits: u8,
        #[source]
        source: std::io::Error,
    },

    /// `SPI_IOC_WR_MAX_SPEED_HZ` / `SPI_IOC_RD_MAX_SPEED_HZ` failed
    #[error("{path}: clock of {speed} Hz rejected: {source}")]
    SetSpeedFailed {
        path: String,
        speed: u32,
        #[source]
        source: std::io::Error,
    },

    /// `SPI_IOC_MESSAGE(1)` failed
    #[error("full-duplex transfer of {len} bytes failed: {source}")]
    TransferFailed {
        len: usize,
        #[source]
        source: std::io::Error,
    },

    /// Transmit and receive buffers differ in length, or are empty
    #[error("frame buffers must be non-empty and equal (tx {tx} bytes, rx {rx} bytes)")]
    FrameMismatch { tx: usize, rx: usize },

    /// Empty device path
    #[error("no spidev path selected")]
    NoDevice,
}

/// Result type for spidev operations
pub type Result<T> = std::result::Result<T, LinuxSpiError>;
