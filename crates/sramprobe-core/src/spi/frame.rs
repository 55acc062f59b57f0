//! Command frame structure

use super::{encode_address, opcodes, OperatingMode};
use crate::geometry::{Address, ADDRESS_BYTES};

/// Byte clocked out while the device shifts its response in
pub const DUMMY_BYTE: u8 = 0xFF;

/// Longest frame used by the driver: opcode + address + one data byte
pub const MAX_FRAME_LEN: usize = 1 + ADDRESS_BYTES + 1;

/// The bytes exchanged in one duplex transfer
///
/// Designed to avoid allocation - the frame lives on the stack and is
/// rebuilt for every operation. The receive buffer of the transfer must have
/// the same length as [`Frame::as_bytes`]; the response, if the command has
/// one, is the last received byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Frame {
    bytes: [u8; MAX_FRAME_LEN],
    len: usize,
    address: Option<u32>,
    has_response: bool,
}

impl Frame {
    fn with_address(opcode: u8, address: Address, last: u8, has_response: bool) -> Self {
        let physical = address.physical();
        let mut bytes = [0u8; MAX_FRAME_LEN];
        bytes[0] = opcode;
        bytes[1..1 + ADDRESS_BYTES].copy_from_slice(&encode_address(physical));
        bytes[1 + ADDRESS_BYTES] = last;
        Self {
            bytes,
            len: MAX_FRAME_LEN,
            address: Some(physical),
            has_response,
        }
    }

    fn register(opcode: u8, value: u8, has_response: bool) -> Self {
        let mut bytes = [0u8; MAX_FRAME_LEN];
        bytes[0] = opcode;
        bytes[1] = value;
        Self {
            bytes,
            len: 2,
            address: None,
            has_response,
        }
    }

    /// Byte read: READ + address + dummy
    pub fn read(address: Address) -> Self {
        Self::with_address(opcodes::READ, address, DUMMY_BYTE, true)
    }

    /// Byte write: WRITE + address + payload
    pub fn write(address: Address, value: u8) -> Self {
        Self::with_address(opcodes::WRITE, address, value, false)
    }

    /// Mode register write: WRMR + mode
    pub fn write_mode(mode: OperatingMode) -> Self {
        Self::register(opcodes::WRMR, mode.register_value(), false)
    }

    /// Mode register read: RDMR + dummy
    pub fn read_mode() -> Self {
        Self::register(opcodes::RDMR, DUMMY_BYTE, true)
    }

    /// The opcode byte
    pub fn opcode(&self) -> u8 {
        self.bytes[0]
    }

    /// Physical address carried by the frame
    pub fn address(&self) -> Option<u32> {
        self.address
    }

    /// Returns true if the last received byte carries data
    pub fn has_response(&self) -> bool {
        self.has_response
    }

    /// Frame length in bytes
    pub fn len(&self) -> usize {
        self.len
    }

    /// Frames are never empty; provided for API symmetry with `len`
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bytes to transmit
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    /// Extract the response byte from a receive buffer
    ///
    /// The echoed command positions are discarded; only the final position
    /// holds data. Returns `None` for frames without a response or a receive
    /// buffer of the wrong length.
    pub fn response(&self, rx: &[u8]) -> Option<u8> {
        if !self.has_response || rx.len() != self.len {
            return None;
        }
        rx.last().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_frame_layout() {
        let addr = Address::from_physical(0x01ABCD).unwrap();
        let frame = Frame::read(addr);
        assert_eq!(frame.as_bytes(), &[opcodes::READ, 0x01, 0xAB, 0xCD, DUMMY_BYTE]);
        assert_eq!(frame.address(), Some(0x01ABCD));
        assert!(frame.has_response());
    }

    #[test]
    fn test_write_frame_layout() {
        let addr = Address::new(1, 0).unwrap();
        let frame = Frame::write(addr, 0x5A);
        assert_eq!(frame.as_bytes(), &[opcodes::WRITE, 0x00, 0x20, 0x00, 0x5A]);
        assert!(!frame.has_response());
    }

    #[test]
    fn test_mode_frames() {
        let frame = Frame::write_mode(OperatingMode::Sequential);
        assert_eq!(frame.as_bytes(), &[opcodes::WRMR, 0x40]);
        assert_eq!(frame.address(), None);

        let frame = Frame::read_mode();
        assert_eq!(frame.as_bytes(), &[opcodes::RDMR, DUMMY_BYTE]);
        assert_eq!(frame.response(&[0x00, 0x40]), Some(0x40));
    }

    #[test]
    fn test_response_is_last_byte() {
        let frame = Frame::read(Address::new(0, 0).unwrap());
        assert_eq!(frame.response(&[0x11, 0x22, 0x33, 0x44, 0x99]), Some(0x99));
        // Wrong length is rejected rather than guessed
        assert_eq!(frame.response(&[0x11, 0x99]), None);
        // Writes carry no response
        let frame = Frame::write(Address::new(0, 0).unwrap(), 0);
        assert_eq!(frame.response(&[0; MAX_FRAME_LEN]), None);
    }
}
