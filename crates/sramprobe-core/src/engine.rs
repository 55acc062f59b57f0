//! Segmented transfer engine
//!
//! Every operation validates its `(segment, offset)` pair through
//! [`compute_physical_address`] before a frame is built, so an
//! out-of-range request never reaches the bus.
//!
//! Each call issues exactly one duplex transfer per byte; the engine keeps no
//! state between calls.

use crate::channel::Connector;
use crate::error::{Error, Result};
use crate::geometry::{self, Address, SEGMENT_SIZE};
use crate::session::Session;
use crate::spi::Frame;

pub use crate::geometry::compute_physical_address;

/// Read one byte
pub fn read_byte<C: Connector>(session: &mut Session<C>, segment: u32, offset: u32) -> Result<u8> {
    read_at(session, locate(segment, offset)?)
}

/// Write one byte
pub fn write_byte<C: Connector>(
    session: &mut Session<C>,
    segment: u32,
    offset: u32,
    value: u8,
) -> Result<()> {
    write_at(session, locate(segment, offset)?, value)
}

fn locate(segment: u32, offset: u32) -> Result<Address> {
    Address::from_physical(compute_physical_address(segment, offset)?)
}

/// Read one byte at a validated address
pub fn read_at<C: Connector>(session: &mut Session<C>, addr: Address) -> Result<u8> {
    let value = session.exchange(&Frame::read(addr))?;
    log::trace!("read  0x{:06X} -> 0x{:02X}", addr.physical(), value);
    Ok(value)
}

/// Write one byte at a validated address
pub fn write_at<C: Connector>(session: &mut Session<C>, addr: Address, value: u8) -> Result<()> {
    session.exchange(&Frame::write(addr, value))?;
    log::trace!("write 0x{:06X} <- 0x{:02X}", addr.physical(), value);
    Ok(())
}

/// Visit every address of the device in segment-major, offset-minor order
///
/// `per_byte` receives the session and the current address; the first error
/// it returns stops the sweep and is propagated unchanged.
pub fn iterate_segments<C, F>(session: &mut Session<C>, mut per_byte: F) -> Result<()>
where
    C: Connector,
    F: FnMut(&mut Session<C>, Address) -> Result<()>,
{
    if !session.is_open() {
        return Err(Error::SessionNotOpen);
    }

    for addr in geometry::addresses() {
        per_byte(session, addr)?;
    }
    Ok(())
}

/// Read a whole segment into `buf`
///
/// `buf` must hold at least [`SEGMENT_SIZE`] bytes; only that many are
/// written.
pub fn read_segment<C: Connector>(
    session: &mut Session<C>,
    segment: u32,
    buf: &mut [u8],
) -> Result<()> {
    let range = geometry::segment_range(segment)?;
    if buf.len() < SEGMENT_SIZE as usize {
        return Err(Error::BufferTooSmall);
    }

    for (offset, byte) in buf.iter_mut().take(range.len()).enumerate() {
        *byte = read_byte(session, segment, offset as u32)?;
    }
    Ok(())
}

/// Write `data` into a segment, starting at offset 0
///
/// `data` longer than [`SEGMENT_SIZE`] is rejected as out of range at the
/// first excess byte, before any transfer.
pub fn write_segment<C: Connector>(
    session: &mut Session<C>,
    segment: u32,
    data: &[u8],
) -> Result<()> {
    geometry::segment_range(segment)?;
    if data.len() > SEGMENT_SIZE as usize {
        return Err(Error::AddressOutOfRange {
            segment,
            offset: SEGMENT_SIZE,
        });
    }

    for (offset, &value) in data.iter().enumerate() {
        write_byte(session, segment, offset as u32, value)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelConfig;
    use crate::geometry::{MAX_SEGMENTS, TOTAL_SIZE};
    use crate::session::tests::MockConnector;
    use crate::spi::{opcodes, DUMMY_BYTE};
    use alloc::vec::Vec;

    fn open_session() -> (
        Session<MockConnector>,
        alloc::rc::Rc<core::cell::RefCell<crate::session::tests::Log>>,
    ) {
        let (connector, log) = MockConnector::new();
        let mut session = Session::new(connector, ChannelConfig::default());
        session.open().unwrap();
        log.borrow_mut().frames.clear();
        (session, log)
    }

    #[test]
    fn test_compute_physical_address() {
        assert_eq!(compute_physical_address(0, 0), Ok(0));
        assert_eq!(compute_physical_address(1, 0), Ok(0x2000));
        assert_eq!(compute_physical_address(15, 0x1FFF), Ok(0x1FFFF));
        assert_eq!(
            compute_physical_address(16, 0),
            Err(Error::AddressOutOfRange {
                segment: 16,
                offset: 0
            })
        );
        assert!(compute_physical_address(0, SEGMENT_SIZE).is_err());
        assert!(compute_physical_address(u32::MAX, u32::MAX).is_err());
    }

    #[test]
    fn test_mapping_is_injective() {
        let mut seen = alloc::vec![false; TOTAL_SIZE as usize];
        for segment in 0..MAX_SEGMENTS {
            for offset in 0..SEGMENT_SIZE {
                let addr = compute_physical_address(segment, offset).unwrap();
                assert_eq!(addr, segment * SEGMENT_SIZE + offset);
                assert!(!seen[addr as usize]);
                seen[addr as usize] = true;
            }
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn test_read_frame_on_the_wire() {
        let (mut session, log) = open_session();
        log.borrow_mut().memory[0x01ABCD] = 0xA5;

        let value = read_byte(&mut session, 0xD, 0x0BCD).unwrap();
        assert_eq!(value, 0xA5);

        let log = log.borrow();
        assert_eq!(
            log.frames[0].1,
            [opcodes::READ, 0x01, 0xAB, 0xCD, DUMMY_BYTE]
        );
    }

    #[test]
    fn test_write_then_read() {
        let (mut session, _log) = open_session();
        write_byte(&mut session, 3, 0x123, 0x42).unwrap();
        assert_eq!(read_byte(&mut session, 3, 0x123), Ok(0x42));
    }

    #[test]
    fn test_out_of_range_never_transfers() {
        let (mut session, log) = open_session();
        assert!(read_byte(&mut session, MAX_SEGMENTS, 0).is_err());
        assert!(write_byte(&mut session, 0, SEGMENT_SIZE, 0).is_err());
        assert!(log.borrow().frames.is_empty());
    }

    #[test]
    fn test_transfer_failure_names_address() {
        let (mut session, log) = open_session();
        log.borrow_mut().fail_opcode = Some(opcodes::READ);
        assert_eq!(
            read_byte(&mut session, 1, 0),
            Err(Error::TransferFailed {
                opcode: opcodes::READ,
                address: Some(0x2000)
            })
        );
    }

    #[test]
    fn test_requires_open_session() {
        let (connector, _log) = MockConnector::new();
        let mut session = Session::new(connector, ChannelConfig::default());
        assert_eq!(read_byte(&mut session, 0, 0), Err(Error::SessionNotOpen));
        assert_eq!(
            iterate_segments(&mut session, |_, _| Ok(())),
            Err(Error::SessionNotOpen)
        );
    }

    #[test]
    fn test_iterate_segments_order() {
        let (mut session, _log) = open_session();
        let mut visited: Vec<Address> = Vec::new();
        iterate_segments(&mut session, |_, addr| {
            visited.push(addr);
            Ok(())
        })
        .unwrap();

        assert_eq!(visited.len(), (MAX_SEGMENTS * SEGMENT_SIZE) as usize);
        for (i, addr) in visited.iter().enumerate() {
            assert_eq!(addr.physical(), i as u32);
        }
        assert_eq!(visited[SEGMENT_SIZE as usize], Address::new(1, 0).unwrap());
    }

    #[test]
    fn test_iterate_segments_stops_on_error() {
        let (mut session, _log) = open_session();
        let mut count = 0;
        let result = iterate_segments(&mut session, |_, addr| {
            count += 1;
            if addr.physical() == 10 {
                return Err(Error::TransferFailed {
                    opcode: opcodes::READ,
                    address: Some(10),
                });
            }
            Ok(())
        });
        assert!(result.is_err());
        assert_eq!(count, 11);
    }

    #[test]
    fn test_segment_helpers() {
        let (mut session, _log) = open_session();
        let data: Vec<u8> = (0..SEGMENT_SIZE).map(|i| i as u8).collect();
        write_segment(&mut session, 2, &data).unwrap();

        let mut buf = alloc::vec![0u8; SEGMENT_SIZE as usize];
        read_segment(&mut session, 2, &mut buf).unwrap();
        assert_eq!(buf, data);

        let mut small = [0u8; 16];
        assert_eq!(
            read_segment(&mut session, 2, &mut small),
            Err(Error::BufferTooSmall)
        );
        let too_long = alloc::vec![0u8; SEGMENT_SIZE as usize + 1];
        assert!(write_segment(&mut session, 0, &too_long).is_err());
    }
}
