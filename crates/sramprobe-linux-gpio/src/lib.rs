//! sramprobe-linux-gpio - Trigger pulses through a Linux GPIO line
//!
//! Sampling runs start each pass by pulsing a GPIO line wired to the trigger
//! input of a function generator, which power-cycles the SRAM chips. This
//! crate drives that line through the GPIO character device interface using
//! the gpiocdev crate.
//!
//! # Example
//!
//! ```no_run
//! use sramprobe_linux_gpio::{GpioTrigger, GpioTriggerConfig};
//!
//! // BCM 27 on a Raspberry Pi, 100 µs high pulse
//! let config = GpioTriggerConfig::new("/dev/gpiochip0", 27);
//! let mut trigger = GpioTrigger::open(&config)?;
//! trigger.pulse()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Usage with the sramprobe CLI
//!
//! ```bash
//! sramprobe sample -t gpio:dev=/dev/gpiochip0,line=27,pulse_us=100
//! ```
//!
//! # System Requirements
//!
//! - Linux kernel 4.8+ with GPIO character device support (kernel 5.5+ for v2 API)
//! - Access to `/dev/gpiochipN` devices (may require root or udev rules)

pub mod error;
pub mod trigger;

// Re-exports
pub use error::{LinuxGpioError, Result};
pub use trigger::{parse_options, GpioTrigger, GpioTriggerConfig};
