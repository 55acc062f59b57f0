//! Fill command implementation

use super::{sweep_progress_bar, with_chip};
use crate::config::ChipConfig;
use crate::error::Result;
use sramprobe_core::channel::Connector;
use sramprobe_core::engine;
use sramprobe_core::session::Session;
use sramprobe_core::SEGMENT_SIZE;

/// Write `value` to every byte of every chip
pub fn run_fill<C: Connector>(
    session: &mut Session<C>,
    chips: &[ChipConfig],
    value: u8,
) -> Result<()> {
    let pb = sweep_progress_bar(chips.len(), &format!("Filling 0x{:02X}", value));

    for chip in chips {
        with_chip(session, chip, |session| {
            engine::iterate_segments(session, |session, addr| {
                engine::write_at(session, addr, value)?;
                if addr.offset() == SEGMENT_SIZE - 1 {
                    pb.inc(SEGMENT_SIZE as u64);
                }
                Ok(())
            })
        })?;
        println!("Chip {} filled with 0x{:02X}", chip.id, value);
    }

    pb.finish_with_message("Fill complete");
    Ok(())
}

#[cfg(all(test, feature = "dummy"))]
mod tests {
    use super::super::test_util::two_chip_session;
    use super::*;

    #[test]
    fn test_fill_all_chips() {
        let (mut session, chips) = two_chip_session();
        run_fill(&mut session, &chips, 0xFF).unwrap();

        for chip in &chips {
            let chip = session.connector().chip(&chip.path).unwrap();
            assert!(chip.lock().data().iter().all(|&b| b == 0xFF));
        }
        assert_eq!(session.connector().open_handles(), 0);
    }

    #[test]
    fn test_fill_stops_on_device_error() {
        let (mut session, chips) = two_chip_session();
        session
            .connector()
            .chip(&chips[1].path)
            .unwrap()
            .lock()
            .reject_mode_write(true);

        assert!(run_fill(&mut session, &chips, 0xA5).is_err());
        let first = session.connector().chip(&chips[0].path).unwrap();
        assert!(first.lock().data().iter().all(|&b| b == 0xA5));
        let second = session.connector().chip(&chips[1].path).unwrap();
        assert!(second.lock().data().iter().all(|&b| b == 0x00));
    }
}
