//! Serial SRAM instruction set
//!
//! Only the instructions used in byte/sequential operation over a single
//! data line are listed. SDI/SQI mode switching is not used.

/// Read data from memory starting at the given address
pub const READ: u8 = 0x03;
/// Write data to memory starting at the given address
pub const WRITE: u8 = 0x02;
/// Read Mode Register
pub const RDMR: u8 = 0x05;
/// Write Mode Register
pub const WRMR: u8 = 0x01;
