//! SPI framing for the 23A1024 command set
//!
//! This module provides the opcodes, the mode register encoding, the 24-bit
//! address encoding and the [`Frame`] type that combines them into the exact
//! byte sequence clocked out in one duplex transfer.

mod address;
mod frame;
mod mode;
pub mod opcodes;

pub use address::{decode_address, encode_address};
pub use frame::{Frame, DUMMY_BYTE, MAX_FRAME_LEN};
pub use mode::OperatingMode;
