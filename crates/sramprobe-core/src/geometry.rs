//! Device geometry and the segmented logical address space
//!
//! The 23A1024 exposes a flat 128 KiB array behind a 24-bit address. The
//! driver layers a segmentation discipline on top of it: the array is split
//! into [`MAX_SEGMENTS`] equal segments of [`SEGMENT_SIZE`] bytes. Segments
//! are an iteration and bounds-checking convenience only; the wire protocol
//! always carries the flat physical address.

use crate::error::{Error, Result};

/// Total device capacity in bytes (128 KiB)
pub const TOTAL_SIZE: u32 = 0x2_0000;

/// Size of one logical segment in bytes (8 KiB)
pub const SEGMENT_SIZE: u32 = 0x2000;

/// Number of logical segments
pub const MAX_SEGMENTS: u32 = TOTAL_SIZE / SEGMENT_SIZE;

/// Number of address bytes in a command frame
pub const ADDRESS_BYTES: usize = 3;

/// First address that no longer fits in [`ADDRESS_BYTES`]
pub const ADDRESS_LIMIT: u32 = 1 << (8 * ADDRESS_BYTES as u32);

const _: () = assert!(TOTAL_SIZE <= ADDRESS_LIMIT);
const _: () = assert!(TOTAL_SIZE % SEGMENT_SIZE == 0);

/// Map a logical `(segment, offset)` pair to the physical address
///
/// This is the only place the segment arithmetic lives; [`Address`] and the
/// transfer engine both go through it. Returns [`Error::AddressOutOfRange`]
/// when either bound is violated.
pub const fn compute_physical_address(segment: u32, offset: u32) -> Result<u32> {
    if segment >= MAX_SEGMENTS || offset >= SEGMENT_SIZE {
        return Err(Error::AddressOutOfRange { segment, offset });
    }
    Ok(segment * SEGMENT_SIZE + offset)
}

/// A validated logical address
///
/// Holding an `Address` guarantees the physical address came out of
/// [`compute_physical_address`], so `segment < MAX_SEGMENTS` and
/// `offset < SEGMENT_SIZE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address {
    physical: u32,
}

impl Address {
    /// Validate a `(segment, offset)` pair
    pub const fn new(segment: u32, offset: u32) -> Result<Self> {
        match compute_physical_address(segment, offset) {
            Ok(physical) => Ok(Self { physical }),
            Err(e) => Err(e),
        }
    }

    /// Split a physical address back into segment and offset
    pub const fn from_physical(address: u32) -> Result<Self> {
        Self::new(address / SEGMENT_SIZE, address % SEGMENT_SIZE)
    }

    /// Segment index
    pub const fn segment(&self) -> u32 {
        self.physical / SEGMENT_SIZE
    }

    /// Offset within the segment
    pub const fn offset(&self) -> u32 {
        self.physical % SEGMENT_SIZE
    }

    /// Flat physical address sent on the wire
    pub const fn physical(&self) -> u32 {
        self.physical
    }

    /// Returns true for the first byte of a segment
    pub const fn is_segment_start(&self) -> bool {
        self.offset() == 0
    }
}

/// Iterator over every address in segment-major, offset-minor order
#[derive(Debug, Clone)]
pub struct Addresses {
    next: u32,
}

impl Iterator for Addresses {
    type Item = Address;

    fn next(&mut self) -> Option<Address> {
        let addr = Address::from_physical(self.next).ok()?;
        self.next += 1;
        Some(addr)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = TOTAL_SIZE.saturating_sub(self.next) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Addresses {}

/// All addresses of the device, segment 0 offset 0 first
pub const fn addresses() -> Addresses {
    Addresses { next: 0 }
}

/// Physical byte range `[start, end)` covered by a segment
pub const fn segment_range(segment: u32) -> Result<core::ops::Range<u32>> {
    match compute_physical_address(segment, 0) {
        Ok(start) => Ok(start..start + SEGMENT_SIZE),
        Err(e) => Err(e),
    }
}
