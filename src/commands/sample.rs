//! Sample command implementation
//!
//! Each pass fires the trigger, sweeps every chip in turn and only then
//! stores the pass in `<output_dir>/<label>/<label>_<n>.csv`. A pass whose
//! file cannot be written is skipped and the loop moves on to the next
//! one; device errors end the run without writing the pass.

use super::{read_image, save_dump, sweep_progress_bar, with_chip, ChipImages};
use crate::config::{validate_label, ChipConfig, Timing};
use crate::error::{CommandError, Result};
use crate::trigger::Trigger;
use indicatif::ProgressBar;
use sramprobe_core::channel::Connector;
use sramprobe_core::session::Session;
use sramprobe_core::{MAX_SEGMENTS, SEGMENT_SIZE};
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::thread::sleep;

/// Parameters of a sampling run
#[derive(Debug, Clone)]
pub struct SampleOptions {
    /// Number of passes to run
    pub samples: u32,
    /// Run label
    pub label: String,
    /// Parent of the `<label>/` directory
    pub output_dir: PathBuf,
    /// Delays
    pub timing: Timing,
}

impl SampleOptions {
    /// Directory receiving the pass files
    pub fn run_dir(&self) -> PathBuf {
        self.output_dir.join(&self.label)
    }

    /// File of pass `n`
    pub fn sample_path(&self, n: u32) -> PathBuf {
        self.run_dir().join(format!("{}_{}.csv", self.label, n))
    }
}

/// Outcome of a sampling run
#[derive(Debug, Default)]
pub struct SampleSummary {
    /// Files written, in sample order
    pub written: Vec<PathBuf>,
    /// Sample numbers abandoned because of persistence errors
    pub abandoned: Vec<u32>,
    /// All-zero segments seen across all passes
    pub zero_segments: u32,
}

/// Segments of `image` whose bytes are all zero
pub fn zero_segments(image: &[u8]) -> Vec<u32> {
    image
        .chunks(SEGMENT_SIZE as usize)
        .take(MAX_SEGMENTS as usize)
        .enumerate()
        .filter(|(_, seg)| seg.iter().all(|&b| b == 0))
        .map(|(i, _)| i as u32)
        .collect()
}

/// Ask for a run label on `output`, reading the answer from `input`
pub fn prompt_label<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> Result<String> {
    let io_err = |e: io::Error| CommandError::Config(format!("cannot read label: {}", e));

    write!(output, "Enter date (MM_DD_YY): ").map_err(io_err)?;
    output.flush().map_err(io_err)?;

    let mut line = String::new();
    input.read_line(&mut line).map_err(io_err)?;
    let label = line.trim().to_string();
    validate_label(&label).map_err(CommandError::Config)?;
    Ok(label)
}

/// Run the sample command, writing pass files to disk
pub fn run_sample<C: Connector>(
    session: &mut Session<C>,
    chips: &[ChipConfig],
    trigger: &mut dyn Trigger,
    opts: &SampleOptions,
) -> Result<SampleSummary> {
    let run_dir = opts.run_dir();
    fs::create_dir_all(&run_dir).map_err(|e| CommandError::persistence(&run_dir, e))?;
    log::info!(
        "Recording {} samples of {} chip(s) into {}",
        opts.samples,
        chips.len(),
        run_dir.display()
    );

    let summary = run_passes(session, chips, trigger, opts, |path, images| {
        save_dump(path, images).map(|_| ())
    })?;

    println!(
        "Done: {} of {} sample(s) written to {}",
        summary.written.len(),
        opts.samples,
        run_dir.display()
    );
    Ok(summary)
}

/// Sampling loop over an arbitrary pass store
///
/// Runs exactly `opts.samples` passes. A pass that `store` rejects is
/// skipped and counted; any other error ends the run.
pub(crate) fn run_passes<C, F>(
    session: &mut Session<C>,
    chips: &[ChipConfig],
    trigger: &mut dyn Trigger,
    opts: &SampleOptions,
    mut store: F,
) -> Result<SampleSummary>
where
    C: Connector,
    F: FnMut(&Path, &[(u8, Vec<u8>)]) -> Result<()>,
{
    let mut summary = SampleSummary::default();

    for sample in 1..=opts.samples {
        sleep(opts.timing.pre_trigger());
        trigger.fire()?;

        println!("Starting sample {}...", sample);
        let (images, zeros) = run_pass(session, chips, opts, sample)?;
        summary.zero_segments += zeros;

        let path = opts.sample_path(sample);
        match store(&path, &images) {
            Ok(()) => {
                log::info!("Sample {} saved to {}", sample, path.display());
                summary.written.push(path);
            }
            Err(err @ CommandError::Persistence { .. }) => {
                log::error!("Sample {} abandoned: {}", sample, err);
                summary.abandoned.push(sample);
            }
            Err(err) => return Err(err),
        }

        sleep(opts.timing.between_samples());
    }

    Ok(summary)
}

/// Sweep every chip once; returns the images and the all-zero segment count
fn run_pass<C: Connector>(
    session: &mut Session<C>,
    chips: &[ChipConfig],
    opts: &SampleOptions,
    sample: u32,
) -> Result<(ChipImages, u32)> {
    let pb = sweep_progress_bar(chips.len(), &format!("sample {}", sample));
    let mut images = Vec::with_capacity(chips.len());
    let mut zeros = 0;

    for chip in chips {
        sleep(opts.timing.settle());
        let image = read_chip(session, chip, opts, &pb)?;

        for segment in zero_segments(&image) {
            log::warn!(
                "All-zero segment: sample {}, chip {}, segment {}",
                sample,
                chip.id,
                segment
            );
            zeros += 1;
        }
        images.push((chip.id, image));
    }

    pb.finish_and_clear();
    Ok((images, zeros))
}

fn read_chip<C: Connector>(
    session: &mut Session<C>,
    chip: &ChipConfig,
    opts: &SampleOptions,
    pb: &ProgressBar,
) -> Result<Vec<u8>> {
    let segment_delay = opts.timing.segment();
    with_chip(session, chip, |session| read_image(session, segment_delay, pb))
}

#[cfg(all(test, feature = "dummy"))]
mod tests {
    use super::super::test_util::{scratch_dir, two_chip_session};
    use super::super::write_images;
    use super::*;
    use crate::csv::parse_dump;
    use crate::trigger::NoTrigger;
    use std::io::Cursor;

    struct CountingTrigger(u32);

    impl Trigger for CountingTrigger {
        fn fire(&mut self) -> Result<()> {
            self.0 += 1;
            Ok(())
        }

        fn describe(&self) -> String {
            "counting".to_string()
        }
    }

    fn disk_full(path: &Path) -> CommandError {
        CommandError::persistence(path, io::Error::new(io::ErrorKind::Other, "disk full"))
    }

    fn options(samples: u32, output_dir: PathBuf) -> SampleOptions {
        SampleOptions {
            samples,
            label: "06_20_25".to_string(),
            output_dir,
            timing: Timing::none(),
        }
    }

    #[test]
    fn test_sample_paths() {
        let opts = options(1, PathBuf::from("/data"));
        assert_eq!(opts.run_dir(), PathBuf::from("/data/06_20_25"));
        assert_eq!(
            opts.sample_path(7),
            PathBuf::from("/data/06_20_25/06_20_25_7.csv")
        );
    }

    #[test]
    fn test_zero_segments() {
        let mut image = vec![0u8; (SEGMENT_SIZE * MAX_SEGMENTS) as usize];
        for seg in [0usize, 5, 15] {
            image[seg * SEGMENT_SIZE as usize + 100] = 1;
        }
        let zeros = zero_segments(&image);
        assert_eq!(zeros.len(), 13);
        assert!(!zeros.contains(&5));
        assert!(zeros.contains(&4));
    }

    #[test]
    fn test_prompt_label() {
        let mut input = Cursor::new(b"06_20_25\n".to_vec());
        let mut output = Vec::new();
        assert_eq!(prompt_label(&mut input, &mut output).unwrap(), "06_20_25");
        assert_eq!(output, b"Enter date (MM_DD_YY): ");

        let mut input = Cursor::new(b"\n".to_vec());
        assert!(prompt_label(&mut input, &mut Vec::new()).is_err());
    }

    #[test]
    fn test_run_sample_writes_files() {
        let (mut session, chips) = two_chip_session();
        session.connector().chip(&chips[1].path).unwrap().lock().data_mut()[0x01ABCD] = 0xA5;

        let dir = scratch_dir("sample");
        let opts = options(2, dir.clone());
        let mut trigger = CountingTrigger(0);

        let summary = run_sample(&mut session, &chips, &mut trigger, &opts).unwrap();
        assert_eq!(trigger.0, 2);
        assert!(summary.abandoned.is_empty());
        assert_eq!(
            summary.written,
            vec![opts.sample_path(1), opts.sample_path(2)]
        );
        // chip 1 is blank and chip 2 has one non-zero segment
        assert_eq!(summary.zero_segments, 2 * (16 + 15));

        let text = fs::read_to_string(opts.sample_path(2)).unwrap();
        assert!(text.contains("\n2,13,01abcd,a5\n"));
        let images = parse_dump(&text).unwrap();
        assert_eq!(images[&2][0x01ABCD], 0xA5);
        assert!(images[&1].iter().all(|&b| b == 0));

        assert!(!session.is_open());
        assert_eq!(session.connector().open_handles(), 0);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_persistence_failure_skips_pass() {
        let (mut session, chips) = two_chip_session();
        let opts = options(3, PathBuf::from("/unused"));
        let mut trigger = CountingTrigger(0);
        let mut calls = Vec::new();
        let mut stored = Vec::new();

        let summary = run_passes(&mut session, &chips, &mut trigger, &opts, |path, images| {
            calls.push(path.to_path_buf());
            if calls.len() == 2 {
                return Err(disk_full(path));
            }
            let (out, _) = write_images(Vec::new(), images).unwrap();
            stored = out;
            Ok(())
        })
        .unwrap();

        assert_eq!(trigger.0, 3);
        assert_eq!(summary.abandoned, vec![2]);
        assert_eq!(
            summary.written,
            vec![opts.sample_path(1), opts.sample_path(3)]
        );
        assert_eq!(
            calls,
            vec![
                opts.sample_path(1),
                opts.sample_path(2),
                opts.sample_path(3)
            ]
        );
        assert!(stored.starts_with(b"Chip,Segment,Address,Byte\n"));
    }

    #[test]
    fn test_persistence_failure_never_aborts_run() {
        let (mut session, chips) = two_chip_session();
        let opts = options(4, PathBuf::from("/unused"));

        let summary = run_passes(&mut session, &chips, &mut NoTrigger, &opts, |path, _| {
            Err(disk_full(path))
        })
        .unwrap();
        assert!(summary.written.is_empty());
        assert_eq!(summary.abandoned, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_device_error_leaves_no_pass_file() {
        let (mut session, chips) = two_chip_session();
        session
            .connector()
            .chip(&chips[1].path)
            .unwrap()
            .lock()
            .reject_mode_write(true);

        let dir = scratch_dir("sample-partial");
        let opts = SampleOptions {
            label: "L".to_string(),
            ..options(1, dir.clone())
        };

        let result = run_sample(&mut session, &chips, &mut NoTrigger, &opts);
        match result {
            Err(CommandError::Device { path, .. }) => assert_eq!(path, "/dev/spidev0.1"),
            other => panic!("unexpected {:?}", other.map(|s| s.written)),
        }
        assert!(!opts.sample_path(1).exists());
        assert_eq!(fs::read_dir(opts.run_dir()).unwrap().count(), 0);
        assert_eq!(session.connector().open_handles(), 0);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_device_error_ends_run() {
        let (mut session, chips) = two_chip_session();
        // Chip 1 stops answering after the mode write and 100 reads
        session
            .connector()
            .chip(&chips[0].path)
            .unwrap()
            .lock()
            .fail_after(101);
        let opts = options(3, PathBuf::from("/unused"));

        let mut stores = 0;
        let result = run_passes(&mut session, &chips, &mut NoTrigger, &opts, |_, _| {
            stores += 1;
            Ok(())
        });
        match result {
            Err(CommandError::Device { path, .. }) => assert_eq!(path, "/dev/spidev0.0"),
            other => panic!("unexpected {:?}", other.map(|s| s.written)),
        }
        assert_eq!(stores, 0);
        assert!(!session.is_open());
        assert_eq!(session.connector().open_handles(), 0);
    }
}
