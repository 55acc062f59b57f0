//! Pre-sample trigger strategies

use crate::backends::parse_params;
use crate::error::{CommandError, Result};

/// Something fired once before every sampling pass
pub trait Trigger {
    /// Fire the trigger; returns once the pulse is complete
    fn fire(&mut self) -> Result<()>;

    /// Short description for logs
    fn describe(&self) -> String;
}

/// Trigger that does nothing
pub struct NoTrigger;

impl Trigger for NoTrigger {
    fn fire(&mut self) -> Result<()> {
        Ok(())
    }

    fn describe(&self) -> String {
        "none".to_string()
    }
}

#[cfg(feature = "linux-gpio")]
impl Trigger for sramprobe_linux_gpio::GpioTrigger {
    fn fire(&mut self) -> Result<()> {
        self.pulse()
            .map_err(|e| CommandError::Trigger(e.to_string()))
    }

    fn describe(&self) -> String {
        format!("gpio ({} µs pulse)", self.pulse_width().as_micros())
    }
}

/// Parsed trigger string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerSpec {
    /// No trigger
    None,
    /// Pulse on a GPIO line
    #[cfg(feature = "linux-gpio")]
    Gpio(sramprobe_linux_gpio::GpioTriggerConfig),
}

/// Parse `none` or `gpio[:dev=...,gpiochip=N,line=N,pulse_us=N]`
pub fn parse_trigger(spec: &str) -> Result<TriggerSpec> {
    let params = parse_params(spec)?;

    match params.name.as_str() {
        "none" => {
            if !params.params.is_empty() {
                return Err(CommandError::Config(
                    "trigger 'none' takes no options".to_string(),
                ));
            }
            Ok(TriggerSpec::None)
        }

        #[cfg(feature = "linux-gpio")]
        "gpio" => sramprobe_linux_gpio::parse_options(&params.options())
            .map(TriggerSpec::Gpio)
            .map_err(|e| CommandError::Config(format!("gpio trigger: {}", e))),

        other => Err(CommandError::Config(format!("Unknown trigger: {}", other))),
    }
}

/// Parse a trigger string and acquire whatever it needs
pub fn open_trigger(spec: &str) -> Result<Box<dyn Trigger>> {
    let trigger: Box<dyn Trigger> = match parse_trigger(spec)? {
        TriggerSpec::None => Box::new(NoTrigger),

        #[cfg(feature = "linux-gpio")]
        TriggerSpec::Gpio(config) => Box::new(
            sramprobe_linux_gpio::GpioTrigger::open(&config)
                .map_err(|e| CommandError::Trigger(e.to_string()))?,
        ),
    };

    log::info!("Trigger: {}", trigger.describe());
    Ok(trigger)
}
