//! Command-level errors

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the CLI commands
#[derive(Debug, Error)]
pub enum CommandError {
    /// Protocol or session failure on one device
    #[error("{path}: {source}")]
    Device {
        path: String,
        #[source]
        source: sramprobe_core::Error,
    },

    /// An output file could not be created or written
    #[error("cannot write '{}': {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid backend, trigger or run configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// An input CSV could not be read or parsed
    #[error("'{}': {message}", path.display())]
    Image { path: PathBuf, message: String },

    /// The trigger line could not be driven
    #[error("trigger failed: {0}")]
    Trigger(String),
}

impl CommandError {
    /// Annotate a core error with the device path it occurred on
    pub fn device(path: &str, source: sramprobe_core::Error) -> Self {
        Self::Device {
            path: path.to_string(),
            source,
        }
    }

    /// Annotate an I/O error with the output path
    pub fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Persistence {
            path: path.into(),
            source,
        }
    }
}

/// Result type for CLI commands
pub type Result<T> = std::result::Result<T, CommandError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_context() {
        let err = CommandError::device(
            "/dev/spidev0.1",
            sramprobe_core::Error::TransferFailed {
                opcode: 0x03,
                address: Some(0x01ABCD),
            },
        );
        let msg = err.to_string();
        assert!(msg.starts_with("/dev/spidev0.1: "));
        assert!(msg.contains("0x01ABCD"), "{}", msg);

        let err = CommandError::persistence(
            "/ro/06_20_25_1.csv",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().contains("/ro/06_20_25_1.csv"));
    }
}
