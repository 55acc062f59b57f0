//! Device session lifecycle
//!
//! A [`Session`] owns at most one open channel. The lifecycle is
//! unconfigured → `open()` → ready → `close()` → closed, and a closed
//! session may be opened again. The handle is released on `close()`, when
//! `open()` fails half way, and when the session is dropped.

use alloc::string::String;

use crate::channel::{ChannelConfig, Connector, DuplexChannel};
use crate::error::{Error, Result};
use crate::spi::{Frame, OperatingMode, MAX_FRAME_LEN};

/// Device-select path used until `select()` is called
pub const DEFAULT_DEVICE: &str = "/dev/spidev0.0";

struct OpenChannel<Ch> {
    path: String,
    channel: Ch,
}

/// An owned handle to one physical device-select path
pub struct Session<C: Connector> {
    connector: C,
    selected: String,
    config: ChannelConfig,
    mode: OperatingMode,
    open: Option<OpenChannel<C::Channel>>,
}

impl<C: Connector> Session<C> {
    /// Create an unconfigured session targeting [`DEFAULT_DEVICE`]
    pub fn new(connector: C, config: ChannelConfig) -> Self {
        Self {
            connector,
            selected: String::from(DEFAULT_DEVICE),
            config,
            mode: OperatingMode::Sequential,
            open: None,
        }
    }

    /// Set the operating mode written to the device on `open()`
    pub fn with_operating_mode(mut self, mode: OperatingMode) -> Self {
        self.mode = mode;
        self
    }

    /// Record the path the next `open()` will target
    ///
    /// Does not affect a handle that is already open.
    pub fn select(&mut self, path: impl Into<String>) {
        self.selected = path.into();
        log::trace!("session: selected {}", self.selected);
    }

    /// Currently selected path
    pub fn selected(&self) -> &str {
        &self.selected
    }

    /// Path of the open handle, if any
    pub fn open_path(&self) -> Option<&str> {
        self.open.as_ref().map(|o| o.path.as_str())
    }

    /// Returns true while a handle is held
    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    /// Channel configuration applied on `open()`
    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Operating mode written on `open()`
    pub fn operating_mode(&self) -> OperatingMode {
        self.mode
    }

    /// Access the connector (for backends that expose extra state)
    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Acquire and configure a handle for the selected path
    ///
    /// The mode register is written before any data transfer. On any failure
    /// the handle acquired so far is dropped before returning
    /// [`Error::HandleAcquisitionFailed`]. A session that is already open is
    /// left untouched and [`Error::SessionAlreadyOpen`] is returned.
    pub fn open(&mut self) -> Result<()> {
        if let Some(open) = &self.open {
            log::error!(
                "session: open() while {} is still open (selected {})",
                open.path,
                self.selected
            );
            return Err(Error::SessionAlreadyOpen);
        }

        self.config.validate()?;

        log::debug!(
            "session: opening {} ({} kHz, mode {})",
            self.selected,
            self.config.speed_hz / 1000,
            self.config.mode.mode_number()
        );

        let mut channel = self
            .connector
            .connect(&self.selected, &self.config)
            .map_err(|e| {
                log::error!("session: cannot open {}: {}", self.selected, e);
                Error::HandleAcquisitionFailed
            })?;

        // Dropping `channel` on the error path releases the handle
        let frame = Frame::write_mode(self.mode);
        exchange(&mut channel, &frame).map_err(|e| {
            log::error!(
                "session: cannot set {} mode on {}: {}",
                self.mode,
                self.selected,
                e
            );
            Error::HandleAcquisitionFailed
        })?;

        log::info!(
            "session: opened {} ({} mode, {} kHz)",
            self.selected,
            self.mode,
            channel.speed_hz() / 1000
        );

        self.open = Some(OpenChannel {
            path: self.selected.clone(),
            channel,
        });
        Ok(())
    }

    /// Release the handle; a no-op when already closed
    pub fn close(&mut self) {
        if let Some(open) = self.open.take() {
            log::debug!("session: closed {}", open.path);
        }
    }

    /// Read the device mode register
    pub fn read_operating_mode(&mut self) -> Result<Option<OperatingMode>> {
        let value = self.exchange(&Frame::read_mode())?;
        Ok(OperatingMode::from_register(value))
    }

    /// Run one frame through the open channel
    ///
    /// Returns the response byte for frames that carry one and `0` otherwise.
    pub(crate) fn exchange(&mut self, frame: &Frame) -> Result<u8> {
        let open = self.open.as_mut().ok_or(Error::SessionNotOpen)?;
        exchange(&mut open.channel, frame)
    }
}

impl<C: Connector> Drop for Session<C> {
    fn drop(&mut self) {
        self.close();
    }
}

fn exchange<Ch: DuplexChannel + ?Sized>(channel: &mut Ch, frame: &Frame) -> Result<u8> {
    let mut rx = [0u8; MAX_FRAME_LEN];
    let rx = &mut rx[..frame.len()];

    channel.transfer(frame.as_bytes(), rx).map_err(|e| {
        log::debug!("transfer of opcode 0x{:02X} failed: {}", frame.opcode(), e);
        Error::TransferFailed {
            opcode: frame.opcode(),
            address: frame.address(),
        }
    })?;

    Ok(frame.response(rx).unwrap_or(0))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::spi::opcodes;
    use alloc::rc::Rc;
    use alloc::vec::Vec;
    use core::cell::RefCell;

    /// Everything the mock saw, shared with the test body
    #[derive(Default)]
    pub(crate) struct Log {
        pub frames: Vec<(String, Vec<u8>)>,
        pub open_handles: usize,
        pub fail_connect: bool,
        pub fail_opcode: Option<u8>,
        pub memory: Vec<u8>,
    }

    pub(crate) struct MockChannel {
        path: String,
        log: Rc<RefCell<Log>>,
    }

    impl DuplexChannel for MockChannel {
        fn transfer(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<()> {
            let mut log = self.log.borrow_mut();
            log.frames.push((self.path.clone(), tx.to_vec()));
            if log.fail_opcode == Some(tx[0]) {
                return Err(Error::TransferFailed {
                    opcode: tx[0],
                    address: None,
                });
            }
            rx.fill(0);
            if tx.len() == MAX_FRAME_LEN {
                let addr = crate::spi::decode_address([tx[1], tx[2], tx[3]]) as usize;
                match tx[0] {
                    opcodes::READ => rx[4] = log.memory[addr],
                    opcodes::WRITE => log.memory[addr] = tx[4],
                    _ => {}
                }
            } else if tx[0] == opcodes::RDMR {
                rx[1] = 0x40;
            }
            Ok(())
        }

        fn speed_hz(&self) -> u32 {
            1_000_000
        }
    }

    impl Drop for MockChannel {
        fn drop(&mut self) {
            self.log.borrow_mut().open_handles -= 1;
        }
    }

    pub(crate) struct MockConnector(pub Rc<RefCell<Log>>);

    impl MockConnector {
        pub(crate) fn new() -> (Self, Rc<RefCell<Log>>) {
            let log = Rc::new(RefCell::new(Log {
                memory: alloc::vec![0; crate::geometry::TOTAL_SIZE as usize],
                ..Default::default()
            }));
            (Self(log.clone()), log)
        }
    }

    impl Connector for MockConnector {
        type Channel = MockChannel;

        fn connect(&mut self, path: &str, _config: &ChannelConfig) -> Result<MockChannel> {
            let mut log = self.0.borrow_mut();
            if log.fail_connect {
                return Err(Error::HandleAcquisitionFailed);
            }
            log.open_handles += 1;
            Ok(MockChannel {
                path: String::from(path),
                log: self.0.clone(),
            })
        }
    }

    #[test]
    fn test_open_writes_mode_first() {
        let (connector, log) = MockConnector::new();
        let mut session = Session::new(connector, ChannelConfig::default());
        session.select("/dev/spidev0.1");
        session.open().unwrap();

        let log = log.borrow();
        assert_eq!(log.open_handles, 1);
        assert_eq!(log.frames.len(), 1);
        assert_eq!(log.frames[0].0, "/dev/spidev0.1");
        assert_eq!(log.frames[0].1, [opcodes::WRMR, 0x40]);
    }

    #[test]
    fn test_double_open_rejected() {
        let (connector, log) = MockConnector::new();
        let mut session = Session::new(connector, ChannelConfig::default());
        session.open().unwrap();
        assert_eq!(session.open(), Err(Error::SessionAlreadyOpen));
        assert!(session.is_open());
        assert_eq!(log.borrow().open_handles, 1);
    }

    #[test]
    fn test_close_idempotent_and_reopen() {
        let (connector, log) = MockConnector::new();
        let mut session = Session::new(connector, ChannelConfig::default());
        session.close();
        session.open().unwrap();
        session.close();
        session.close();
        assert!(!session.is_open());
        assert_eq!(log.borrow().open_handles, 0);

        session.open().unwrap();
        assert_eq!(log.borrow().open_handles, 1);
        drop(session);
        assert_eq!(log.borrow().open_handles, 0);
    }

    #[test]
    fn test_select_does_not_retarget_open_handle() {
        let (connector, _log) = MockConnector::new();
        let mut session = Session::new(connector, ChannelConfig::default());
        session.select("/dev/spidev0.0");
        session.open().unwrap();
        session.select("/dev/spidev0.1");
        assert_eq!(session.open_path(), Some("/dev/spidev0.0"));
        assert_eq!(session.selected(), "/dev/spidev0.1");
    }

    #[test]
    fn test_connect_failure() {
        let (connector, log) = MockConnector::new();
        log.borrow_mut().fail_connect = true;
        let mut session = Session::new(connector, ChannelConfig::default());
        assert_eq!(session.open(), Err(Error::HandleAcquisitionFailed));
        assert!(!session.is_open());
    }

    #[test]
    fn test_mode_write_failure_releases_handle() {
        let (connector, log) = MockConnector::new();
        log.borrow_mut().fail_opcode = Some(opcodes::WRMR);
        let mut session = Session::new(connector, ChannelConfig::default());
        assert_eq!(session.open(), Err(Error::HandleAcquisitionFailed));
        assert!(!session.is_open());
        assert_eq!(log.borrow().open_handles, 0);
    }

    #[test]
    fn test_invalid_config_rejected_before_io() {
        let (connector, log) = MockConnector::new();
        let mut session = Session::new(connector, ChannelConfig::default().with_speed(0));
        assert_eq!(session.open(), Err(Error::InvalidConfig));
        assert!(log.borrow().frames.is_empty());
    }

    #[test]
    fn test_read_operating_mode() {
        let (connector, _log) = MockConnector::new();
        let mut session = Session::new(connector, ChannelConfig::default());
        assert_eq!(session.read_operating_mode(), Err(Error::SessionNotOpen));
        session.open().unwrap();
        assert_eq!(
            session.read_operating_mode(),
            Ok(Some(OperatingMode::Sequential))
        );
    }
}
