//! Error types for the GPIO trigger line
//!
//! Both line errors carry the `gpiocdev` error that caused them.

use thiserror::Error;

/// Trigger line errors
#[derive(Debug, Error)]
pub enum LinuxGpioError {
    /// The line could not be requested as an output
    #[error("cannot claim trigger line {line} on {path}: {source}")]
    LineRequestFailed {
        path: String,
        line: u32,
        #[source]
        source: gpiocdev::Error,
    },

    /// The line value could not be changed
    #[error("cannot drive trigger line {line}: {source}")]
    SetValueFailed {
        line: u32,
        #[source]
        source: gpiocdev::Error,
    },

    /// Empty chip path
    #[error("no GPIO chip given for the trigger (dev=/dev/gpiochipN or gpiochip=N)")]
    NoDevice,
}

/// Result type for Linux GPIO operations
pub type Result<T> = std::result::Result<T, LinuxGpioError>;
