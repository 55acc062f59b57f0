//! GPIO trigger line
//!
//! Requests one line as an output (initially inactive) and toggles it to
//! produce a fixed-width pulse. The line is released when the
//! `GpioTrigger` is dropped.

use crate::error::{LinuxGpioError, Result};

use gpiocdev::line::{Offset, Value};
use gpiocdev::request::{Config, Request};

use std::time::Duration;

/// Default GPIO chip
pub const DEFAULT_CHIP: &str = "/dev/gpiochip0";

/// Default trigger line (BCM 27 on a Raspberry Pi header)
pub const DEFAULT_LINE: Offset = 27;

/// Default pulse width in microseconds
pub const DEFAULT_PULSE_US: u64 = 100;

/// Consumer label shown by `gpioinfo`
const CONSUMER: &str = "sramprobe";

/// Configuration for the trigger line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpioTriggerConfig {
    /// Device path (e.g., "/dev/gpiochip0")
    pub device: String,
    /// Line offset on the chip
    pub line: Offset,
    /// High time of the pulse
    pub pulse: Duration,
}

impl Default for GpioTriggerConfig {
    fn default() -> Self {
        Self {
            device: DEFAULT_CHIP.to_string(),
            line: DEFAULT_LINE,
            pulse: Duration::from_micros(DEFAULT_PULSE_US),
        }
    }
}

impl GpioTriggerConfig {
    /// Create a new configuration for the given chip and line
    pub fn new(device: impl Into<String>, line: Offset) -> Self {
        Self {
            device: device.into(),
            line,
            ..Default::default()
        }
    }

    /// Set the pulse width
    pub fn with_pulse(mut self, pulse: Duration) -> Self {
        self.pulse = pulse;
        self
    }
}

/// Output line used to trigger an external instrument
pub struct GpioTrigger {
    /// GPIO line request handle
    request: Request,
    /// Line offset
    line: Offset,
    /// High time of the pulse
    pulse: Duration,
}

impl GpioTrigger {
    /// Request the trigger line as an output driven low
    pub fn open(config: &GpioTriggerConfig) -> Result<Self> {
        if config.device.is_empty() {
            return Err(LinuxGpioError::NoDevice);
        }

        log::debug!(
            "gpio_trigger: Requesting line {} on {}",
            config.line,
            config.device
        );

        let mut req_config = Config::default();
        req_config.with_line(config.line).as_output(Value::Inactive);

        let request = Request::from_config(req_config)
            .on_chip(&config.device)
            .with_consumer(CONSUMER)
            .request()
            .map_err(|e| LinuxGpioError::LineRequestFailed {
                path: config.device.clone(),
                line: config.line,
                source: e,
            })?;

        log::info!(
            "gpio_trigger: Opened {} line {} ({} µs pulse)",
            config.device,
            config.line,
            config.pulse.as_micros()
        );

        Ok(Self {
            request,
            line: config.line,
            pulse: config.pulse,
        })
    }

    fn set(&self, value: Value) -> Result<()> {
        self.request
            .set_value(self.line, value)
            .map(|_| ())
            .map_err(|e| LinuxGpioError::SetValueFailed {
                line: self.line,
                source: e,
            })
    }

    /// Drive the line high for the configured pulse width, then low
    pub fn pulse(&mut self) -> Result<()> {
        self.set(Value::Active)?;
        std::thread::sleep(self.pulse);
        let result = self.set(Value::Inactive);
        log::trace!("gpio_trigger: Pulsed line {}", self.line);
        result
    }

    /// Pulse width
    pub fn pulse_width(&self) -> Duration {
        self.pulse
    }
}

impl Drop for GpioTrigger {
    fn drop(&mut self) {
        // Leave the instrument input low when the line is released
        if let Err(e) = self.set(Value::Inactive) {
            log::warn!("gpio_trigger: {}", e);
        }
    }
}

/// Parse trigger options from a list of key-value pairs
///
/// # Supported Options
///
/// - `dev=/dev/gpiochipN` - GPIO chip device path (default /dev/gpiochip0)
/// - `gpiochip=N` - GPIO chip number (alternative to dev)
/// - `line=N` - line offset (default 27)
/// - `pulse_us=N` - pulse width in microseconds (default 100)
pub fn parse_options(options: &[(&str, &str)]) -> std::result::Result<GpioTriggerConfig, String> {
    let mut config = GpioTriggerConfig::default();
    let mut have_dev = false;
    let mut gpiochip: Option<u32> = None;

    for (key, value) in options {
        match *key {
            "dev" => {
                config.device = value.to_string();
                have_dev = true;
            }
            "gpiochip" => {
                gpiochip = Some(
                    value
                        .parse()
                        .map_err(|_| format!("Invalid gpiochip value: {}", value))?,
                );
            }
            "line" => {
                config.line = value
                    .parse()
                    .map_err(|_| format!("Invalid line value: {}", value))?;
            }
            "pulse_us" => {
                let us: u64 = value
                    .parse()
                    .map_err(|_| format!("Invalid pulse_us value: {}", value))?;
                if us == 0 {
                    return Err("pulse_us must be at least 1".to_string());
                }
                config.pulse = Duration::from_micros(us);
            }
            _ => {
                log::warn!("gpio_trigger: Unknown option: {}={}", key, value);
            }
        }
    }

    if let Some(n) = gpiochip {
        if have_dev {
            return Err("Only one of 'dev' or 'gpiochip' can be specified".to_string());
        }
        config.device = format!("/dev/gpiochip{}", n);
    }

    Ok(config)
}
