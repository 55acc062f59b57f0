//! sramprobe-dummy - In-memory serial SRAM emulator for testing
//!
//! This crate provides a dummy backend that emulates a 23A1024 in memory.
//! It decodes frames the way the chip does (READ, WRITE, RDMR, WRMR in
//! byte, page and sequential mode) so the driver can be exercised without
//! real hardware.
//!
//! A [`DummyConnector`] keeps one emulated chip per device path. Chips
//! outlive the channels opened on them, so data written through one session
//! can be read back through the next, and the connector counts open
//! handles so tests can check that none leak.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use sramprobe_core::channel::{ChannelConfig, Connector, DuplexChannel};
use sramprobe_core::error::{Error, Result};
use sramprobe_core::geometry::{ADDRESS_BYTES, TOTAL_SIZE};
use sramprobe_core::spi::{decode_address, opcodes, OperatingMode};

/// Initial contents of an emulated chip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerUpState {
    /// Every byte holds the same value
    Fill(u8),
    /// Pseudo-random contents derived from a seed, stable per seed
    Noise(u32),
}

impl Default for PowerUpState {
    fn default() -> Self {
        PowerUpState::Fill(0x00)
    }
}

/// Configuration for the dummy SRAM
#[derive(Debug, Clone, Default)]
pub struct DummyConfig {
    /// Contents when a chip is first created
    pub power_up: PowerUpState,
    /// Refuse paths not registered with `add_chip` instead of creating them
    pub strict_paths: bool,
}

/// Emulated 23A1024
pub struct DummySram {
    data: Vec<u8>,
    mode_register: u8,
    transfers: usize,
    fail_after: Option<usize>,
    reject_mode_write: bool,
}

impl DummySram {
    /// Create a chip with the given contents
    pub fn new(power_up: PowerUpState) -> Self {
        let data = match power_up {
            PowerUpState::Fill(value) => vec![value; TOTAL_SIZE as usize],
            PowerUpState::Noise(seed) => noise(seed, TOTAL_SIZE as usize),
        };
        Self {
            data,
            mode_register: OperatingMode::Sequential.register_value(),
            transfers: 0,
            fail_after: None,
            reject_mode_write: false,
        }
    }

    /// Get a reference to the memory contents
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Get a mutable reference to the memory contents
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Raw mode register value
    pub fn mode_register(&self) -> u8 {
        self.mode_register
    }

    /// Number of transfers seen so far
    pub fn transfers(&self) -> usize {
        self.transfers
    }

    /// Fail every transfer after `count` more successful ones
    pub fn fail_after(&mut self, count: usize) {
        self.fail_after = Some(self.transfers + count);
    }

    /// Reject WRMR frames, as a chip with a broken SI line would appear
    pub fn reject_mode_write(&mut self, reject: bool) {
        self.reject_mode_write = reject;
    }

    fn mode(&self) -> OperatingMode {
        OperatingMode::from_register(self.mode_register).unwrap_or(OperatingMode::Byte)
    }

    /// Address of the n-th data byte after the instruction
    fn data_address(&self, start: u32, n: usize) -> usize {
        let n = n as u32;
        let addr = match self.mode() {
            OperatingMode::Byte => start,
            OperatingMode::Page => {
                let page = OperatingMode::PAGE_SIZE;
                (start & !(page - 1)) | ((start + n) & (page - 1))
            }
            OperatingMode::Sequential => start.wrapping_add(n),
        };
        (addr % TOTAL_SIZE) as usize
    }

    fn handle_data(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<()> {
        let header = 1 + ADDRESS_BYTES;
        if tx.len() <= header {
            log::warn!("dummy: short frame for opcode 0x{:02X}", tx[0]);
            return Err(Error::TransferFailed {
                opcode: tx[0],
                address: None,
            });
        }
        let start = decode_address([tx[1], tx[2], tx[3]]);

        for (n, i) in (header..tx.len()).enumerate() {
            // Byte mode only transfers one data byte per instruction
            if self.mode() == OperatingMode::Byte && n > 0 {
                rx[i] = 0xFF;
                continue;
            }
            let addr = self.data_address(start, n);
            if tx[0] == opcodes::READ {
                rx[i] = self.data[addr];
            } else {
                self.data[addr] = tx[i];
            }
        }
        Ok(())
    }

    /// Clock one frame through the chip
    pub fn transfer(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<()> {
        if tx.is_empty() || tx.len() != rx.len() {
            return Err(Error::BufferTooSmall);
        }

        if let Some(limit) = self.fail_after {
            if self.transfers >= limit {
                return Err(Error::TransferFailed {
                    opcode: tx[0],
                    address: None,
                });
            }
        }
        self.transfers += 1;

        // SO is high impedance while the instruction is shifted in
        rx.fill(0x00);

        match tx[0] {
            opcodes::READ | opcodes::WRITE => self.handle_data(tx, rx),
            opcodes::WRMR => {
                if self.reject_mode_write || tx.len() < 2 {
                    return Err(Error::TransferFailed {
                        opcode: tx[0],
                        address: None,
                    });
                }
                self.mode_register = tx[1];
                log::debug!("dummy: mode register set to 0x{:02X}", tx[1]);
                Ok(())
            }
            opcodes::RDMR => {
                for byte in rx.iter_mut().skip(1) {
                    *byte = self.mode_register;
                }
                Ok(())
            }
            opcode => {
                log::warn!("dummy: unsupported opcode 0x{:02X}", opcode);
                Err(Error::TransferFailed {
                    opcode,
                    address: None,
                })
            }
        }
    }
}

/// xorshift32 fill, so a given seed always yields the same power-up image
fn noise(seed: u32, len: usize) -> Vec<u8> {
    let mut state = if seed == 0 { 0x9E37_79B9 } else { seed };
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            state as u8
        })
        .collect()
}

/// Shared handle to an emulated chip
#[derive(Clone)]
pub struct DummyChip(Arc<Mutex<DummySram>>);

impl DummyChip {
    /// Lock the chip for inspection or fault injection
    pub fn lock(&self) -> MutexGuard<'_, DummySram> {
        // A poisoned lock only means a test panicked while holding it
        self.0.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Open channel to an emulated chip
pub struct DummyChannel {
    path: String,
    chip: DummyChip,
    speed_hz: u32,
    open_handles: Arc<AtomicUsize>,
}

impl DuplexChannel for DummyChannel {
    fn transfer(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<()> {
        self.chip.lock().transfer(tx, rx)
    }

    fn speed_hz(&self) -> u32 {
        self.speed_hz
    }
}

impl Drop for DummyChannel {
    fn drop(&mut self) {
        self.open_handles.fetch_sub(1, Ordering::SeqCst);
        log::debug!("dummy: released {}", self.path);
    }
}

/// Dummy connector
///
/// Emulates one chip per device path in memory for testing purposes.
pub struct DummyConnector {
    config: DummyConfig,
    chips: HashMap<String, DummyChip>,
    open_handles: Arc<AtomicUsize>,
}

impl DummyConnector {
    /// Create a new connector with the given configuration
    pub fn new(config: DummyConfig) -> Self {
        Self {
            config,
            chips: HashMap::new(),
            open_handles: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Create a new connector with default configuration (zero-filled chips)
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    /// Register a chip for `path` and return a handle to it
    pub fn add_chip(&mut self, path: &str) -> DummyChip {
        let power_up = self.config.power_up;
        self.chips
            .entry(path.to_string())
            .or_insert_with(|| DummyChip(Arc::new(Mutex::new(DummySram::new(power_up)))))
            .clone()
    }

    /// Handle to the chip registered for `path`
    pub fn chip(&self, path: &str) -> Option<DummyChip> {
        self.chips.get(path).cloned()
    }

    /// Number of channels currently open
    pub fn open_handles(&self) -> usize {
        self.open_handles.load(Ordering::SeqCst)
    }
}

impl Connector for DummyConnector {
    type Channel = DummyChannel;

    fn connect(&mut self, path: &str, config: &ChannelConfig) -> Result<DummyChannel> {
        let chip = match self.chips.get(path) {
            Some(chip) => chip.clone(),
            None if self.config.strict_paths => {
                log::error!("dummy: no chip at {}", path);
                return Err(Error::HandleAcquisitionFailed);
            }
            None => self.add_chip(path),
        };

        self.open_handles.fetch_add(1, Ordering::SeqCst);
        log::debug!("dummy: opened {}", path);

        Ok(DummyChannel {
            path: path.to_string(),
            chip,
            speed_hz: config.speed_hz,
            open_handles: self.open_handles.clone(),
        })
    }
}

/// Parse programmer options from a list of key-value pairs
///
/// - `seed=N` - fill new chips with pseudo-random data
/// - `fill=0xNN` - fill new chips with a constant
/// - `strict=1` - refuse paths that were not registered
pub fn parse_options(options: &[(&str, &str)]) -> std::result::Result<DummyConfig, String> {
    let mut config = DummyConfig::default();

    for (key, value) in options {
        match *key {
            "seed" => {
                let seed: u32 = value
                    .parse()
                    .map_err(|_| format!("Invalid seed value: {}", value))?;
                config.power_up = PowerUpState::Noise(seed);
            }
            "fill" => {
                let fill = parse_u8(value).ok_or_else(|| format!("Invalid fill value: {}", value))?;
                config.power_up = PowerUpState::Fill(fill);
            }
            "strict" => {
                config.strict_paths = matches!(*value, "1" | "true" | "yes");
            }
            _ => {
                log::warn!("dummy: Unknown option: {}={}", key, value);
            }
        }
    }

    Ok(config)
}

fn parse_u8(s: &str) -> Option<u8> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sramprobe_core::channel::ChannelConfig;
    use sramprobe_core::engine;
    use sramprobe_core::geometry::{Address, MAX_SEGMENTS, SEGMENT_SIZE};
    use sramprobe_core::session::Session;
    use sramprobe_core::spi::{Frame, DUMMY_BYTE};

    fn session_for(connector: DummyConnector, path: &str) -> Session<DummyConnector> {
        let mut session = Session::new(connector, ChannelConfig::default());
        session.select(path);
        session.open().unwrap();
        session
    }

    #[test]
    fn test_read_write() {
        let mut session = session_for(DummyConnector::new_default(), "/dev/spidev0.0");

        engine::write_byte(&mut session, 0, 0x10, 0x12).unwrap();
        engine::write_byte(&mut session, 15, 0x1FFF, 0x34).unwrap();

        assert_eq!(engine::read_byte(&mut session, 0, 0x10), Ok(0x12));
        assert_eq!(engine::read_byte(&mut session, 15, 0x1FFF), Ok(0x34));
        assert_eq!(engine::read_byte(&mut session, 1, 0x10), Ok(0x00));
    }

    #[test]
    fn test_chips_are_independent() {
        let mut connector = DummyConnector::new_default();
        let chip1 = connector.add_chip("/dev/spidev0.0");
        let chip2 = connector.add_chip("/dev/spidev0.1");

        let mut session = session_for(connector, "/dev/spidev0.0");
        engine::write_byte(&mut session, 2, 5, 0xAA).unwrap();
        session.close();

        session.select("/dev/spidev0.1");
        session.open().unwrap();
        assert_eq!(engine::read_byte(&mut session, 2, 5), Ok(0x00));
        engine::write_byte(&mut session, 2, 5, 0x55).unwrap();
        session.close();

        let phys = Address::new(2, 5).unwrap().physical() as usize;
        assert_eq!(chip1.lock().data()[phys], 0xAA);
        assert_eq!(chip2.lock().data()[phys], 0x55);
    }

    #[test]
    fn test_data_survives_reopen() {
        let mut session = session_for(DummyConnector::new_default(), "/dev/spidev0.0");
        engine::write_byte(&mut session, 7, 7, 0x77).unwrap();
        session.close();
        session.open().unwrap();
        assert_eq!(engine::read_byte(&mut session, 7, 7), Ok(0x77));
    }

    #[test]
    fn test_open_sets_sequential_mode() {
        let mut connector = DummyConnector::new_default();
        let chip = connector.add_chip("/dev/spidev0.0");
        chip.lock().transfer(&[opcodes::WRMR, 0x00], &mut [0; 2]).unwrap();

        let mut session = session_for(connector, "/dev/spidev0.0");
        assert_eq!(chip.lock().mode_register(), 0x40);
        assert_eq!(
            session.read_operating_mode(),
            Ok(Some(OperatingMode::Sequential))
        );
    }

    #[test]
    fn test_handles_not_leaked() {
        let mut connector = DummyConnector::new_default();
        let chip = connector.add_chip("/dev/spidev0.0");
        let mut session = Session::new(connector, ChannelConfig::default());

        session.open().unwrap();
        assert_eq!(session.connector().open_handles(), 1);
        assert_eq!(session.open(), Err(Error::SessionAlreadyOpen));
        assert_eq!(session.connector().open_handles(), 1);
        session.close();
        session.close();
        assert_eq!(session.connector().open_handles(), 0);

        chip.lock().reject_mode_write(true);
        assert_eq!(session.open(), Err(Error::HandleAcquisitionFailed));
        assert_eq!(session.connector().open_handles(), 0);
    }

    #[test]
    fn test_strict_paths() {
        let config = DummyConfig {
            strict_paths: true,
            ..Default::default()
        };
        let mut session = Session::new(DummyConnector::new(config), ChannelConfig::default());
        session.select("/dev/spidev9.9");
        assert_eq!(session.open(), Err(Error::HandleAcquisitionFailed));
    }

    #[test]
    fn test_transfer_failure_mid_sweep() {
        let mut connector = DummyConnector::new_default();
        let chip = connector.add_chip("/dev/spidev0.0");
        let mut session = session_for(connector, "/dev/spidev0.0");
        chip.lock().fail_after(100);

        let mut read = 0usize;
        let result = engine::iterate_segments(&mut session, |s, addr| {
            engine::read_at(s, addr)?;
            read += 1;
            Ok(())
        });
        assert_eq!(read, 100);
        assert_eq!(
            result,
            Err(Error::TransferFailed {
                opcode: opcodes::READ,
                address: Some(100)
            })
        );
    }

    #[test]
    fn test_full_sweep_round_trip() {
        let mut session = session_for(DummyConnector::new_default(), "/dev/spidev0.0");
        engine::iterate_segments(&mut session, |s, addr| {
            engine::write_at(s, addr, (addr.physical() % 251) as u8)
        })
        .unwrap();

        let mut mismatches = 0;
        engine::iterate_segments(&mut session, |s, addr| {
            if engine::read_at(s, addr)? != (addr.physical() % 251) as u8 {
                mismatches += 1;
            }
            Ok(())
        })
        .unwrap();
        assert_eq!(mismatches, 0);
    }

    #[test]
    fn test_segment_zero_detection_input() {
        let mut connector = DummyConnector::new_default();
        let chip = connector.add_chip("/dev/spidev0.0");
        chip.lock().data_mut()[(3 * SEGMENT_SIZE + 1) as usize] = 1;

        let mut session = session_for(connector, "/dev/spidev0.0");
        let mut non_zero = [false; MAX_SEGMENTS as usize];
        let mut buf = vec![0u8; SEGMENT_SIZE as usize];
        for segment in 0..MAX_SEGMENTS {
            engine::read_segment(&mut session, segment, &mut buf).unwrap();
            non_zero[segment as usize] = buf.iter().any(|&b| b != 0);
        }
        assert_eq!(non_zero.iter().filter(|&&nz| nz).count(), 1);
        assert!(non_zero[3]);
    }

    #[test]
    fn test_sequential_and_page_modes() {
        let mut sram = DummySram::new(PowerUpState::Fill(0));
        // Sequential write of three bytes crossing a page boundary
        let mut rx = [0u8; 7];
        sram.transfer(&[opcodes::WRITE, 0x00, 0x00, 0x1F, 1, 2, 3], &mut rx)
            .unwrap();
        assert_eq!(&sram.data()[0x1F..0x22], &[1, 2, 3]);

        // Page mode wraps within the 32-byte page
        sram.transfer(&[opcodes::WRMR, 0x80], &mut [0; 2]).unwrap();
        sram.transfer(&[opcodes::WRITE, 0x00, 0x00, 0x5F, 9, 8], &mut [0; 6])
            .unwrap();
        assert_eq!(sram.data()[0x5F], 9);
        assert_eq!(sram.data()[0x40], 8);
    }

    #[test]
    fn test_read_frame_response_position() {
        let mut sram = DummySram::new(PowerUpState::Fill(0));
        sram.data_mut()[0x01ABCD] = 0xC3;
        let frame = Frame::read(Address::from_physical(0x01ABCD).unwrap());
        assert_eq!(frame.as_bytes()[4], DUMMY_BYTE);

        let mut rx = [0u8; 5];
        sram.transfer(frame.as_bytes(), &mut rx).unwrap();
        assert_eq!(rx, [0, 0, 0, 0, 0xC3]);
        assert_eq!(frame.response(&rx), Some(0xC3));
    }

    #[test]
    fn test_noise_is_deterministic() {
        let a = DummySram::new(PowerUpState::Noise(7));
        let b = DummySram::new(PowerUpState::Noise(7));
        let c = DummySram::new(PowerUpState::Noise(8));
        assert_eq!(a.data(), b.data());
        assert_ne!(a.data(), c.data());
        assert!(a.data().iter().any(|&x| x != 0));
    }

    #[test]
    fn test_parse_options() {
        let config = parse_options(&[("seed", "42"), ("strict", "1")]).unwrap();
        assert_eq!(config.power_up, PowerUpState::Noise(42));
        assert!(config.strict_paths);

        let config = parse_options(&[("fill", "0xFF")]).unwrap();
        assert_eq!(config.power_up, PowerUpState::Fill(0xFF));

        assert!(parse_options(&[("fill", "0x1FF")]).is_err());
    }
}
