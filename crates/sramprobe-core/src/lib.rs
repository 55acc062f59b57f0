//! sramprobe-core - Segmented access driver for serial SRAM
//!
//! This crate implements the protocol side of talking to a 23A1024-style
//! serial SRAM: command framing, 24-bit big-endian address encoding, the
//! device session lifecycle and the segmented logical address space layered
//! on top of the chip's flat address range.
//!
//! It is `no_std` compatible. The [`session`] and [`engine`] modules need
//! the `alloc` feature because a session remembers its device path.
//!
//! # Features
//!
//! - `std` - Enable standard library support (includes `alloc`)
//! - `alloc` - Enable the session and transfer engine
//!
//! # Example
//!
//! ```ignore
//! use sramprobe_core::channel::{ChannelConfig, Connector};
//! use sramprobe_core::{engine, session::Session};
//!
//! fn first_byte<C: Connector>(connector: C) -> sramprobe_core::Result<u8> {
//!     let mut session = Session::new(connector, ChannelConfig::default());
//!     session.select("/dev/spidev0.0");
//!     session.open()?;
//!     let value = engine::read_byte(&mut session, 0, 0)?;
//!     session.close();
//!     Ok(value)
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod channel;
#[cfg(feature = "alloc")]
pub mod engine;
pub mod error;
pub mod geometry;
#[cfg(feature = "alloc")]
pub mod session;
pub mod spi;

pub use error::{Error, Result};
pub use geometry::{Address, ADDRESS_BYTES, MAX_SEGMENTS, SEGMENT_SIZE, TOTAL_SIZE};
