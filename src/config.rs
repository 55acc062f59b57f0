//! Run configuration
//!
//! A run is described by an optional TOML file, overridden field by field
//! from the command line:
//!
//! ```toml
//! samples = 100
//! label = "06_20_25"
//! output_dir = "."
//! backend = "linux_spi:spispeed=5000"
//! trigger = "gpio:dev=/dev/gpiochip0,line=27"
//!
//! [[chip]]
//! id = 1
//! path = "/dev/spidev0.0"
//!
//! [[chip]]
//! id = 2
//! path = "/dev/spidev0.1"
//!
//! [timing]
//! pre_trigger_ms = 100
//! settle_ms = 200
//! segment_ms = 10
//! between_samples_ms = 100
//! ```

use crate::cli::DeviceArgs;
use crate::error::{CommandError, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// One SRAM chip and the device path that selects it
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChipConfig {
    /// Chip number written in the first CSV column
    pub id: u8,
    /// spidev path (chip select)
    pub path: String,
}

impl ChipConfig {
    /// Create a chip entry
    pub fn new(id: u8, path: impl Into<String>) -> Self {
        Self {
            id,
            path: path.into(),
        }
    }
}

/// Delays around each sampling pass
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Timing {
    /// Wait before firing the trigger
    pub pre_trigger_ms: u64,
    /// Wait before opening each chip
    pub settle_ms: u64,
    /// Wait before sweeping each segment
    pub segment_ms: u64,
    /// Wait after a pass
    pub between_samples_ms: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            pre_trigger_ms: 100,
            settle_ms: 200,
            segment_ms: 10,
            between_samples_ms: 100,
        }
    }
}

impl Timing {
    /// No delays at all
    #[cfg(test)]
    pub fn none() -> Self {
        Self {
            pre_trigger_ms: 0,
            settle_ms: 0,
            segment_ms: 0,
            between_samples_ms: 0,
        }
    }

    pub fn pre_trigger(&self) -> Duration {
        Duration::from_millis(self.pre_trigger_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn segment(&self) -> Duration {
        Duration::from_millis(self.segment_ms)
    }

    pub fn between_samples(&self) -> Duration {
        Duration::from_millis(self.between_samples_ms)
    }
}

/// Complete description of a run
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Number of sampling passes
    pub samples: u32,
    /// Run label, used for the output folder and file names
    pub label: Option<String>,
    /// Parent directory of the `<label>/` folder
    pub output_dir: PathBuf,
    /// Backend string
    pub backend: String,
    /// Trigger string
    pub trigger: String,
    /// Chips in sweep order
    #[serde(rename = "chip")]
    pub chips: Vec<ChipConfig>,
    /// Delays
    pub timing: Timing,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            samples: 100,
            label: None,
            output_dir: PathBuf::from("."),
            backend: "linux_spi".to_string(),
            trigger: "none".to_string(),
            chips: vec![
                ChipConfig::new(1, "/dev/spidev0.0"),
                ChipConfig::new(2, "/dev/spidev0.1"),
            ],
            timing: Timing::default(),
        }
    }
}

impl RunConfig {
    /// Load a run configuration from a TOML file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            CommandError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
            .map_err(|e| CommandError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Parse a run configuration from a TOML string
    pub fn from_toml_str(content: &str) -> std::result::Result<Self, String> {
        let config: RunConfig = toml::from_str(content).map_err(|e| e.to_string())?;
        config.validate()?;
        Ok(config)
    }

    /// Build the configuration for a command: file (or defaults), then CLI
    /// overrides
    pub fn load(args: &DeviceArgs) -> Result<Self> {
        let mut config = match &args.config {
            Some(path) => {
                let config = Self::from_toml_file(path)?;
                log::info!("Loaded run configuration from {}", path.display());
                config
            }
            None => Self::default(),
        };

        if let Some(backend) = &args.backend {
            config.backend = backend.clone();
        }
        if !args.devices.is_empty() {
            config.chips = args
                .devices
                .iter()
                .enumerate()
                .map(|(i, path)| ChipConfig::new(i as u8 + 1, path.clone()))
                .collect();
        }

        config.validate().map_err(CommandError::Config)?;
        Ok(config)
    }

    /// Check invariants the commands rely on
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.samples == 0 {
            return Err("samples must be at least 1".to_string());
        }
        if self.chips.is_empty() {
            return Err("at least one chip is required".to_string());
        }
        if self.chips.len() > u8::MAX as usize {
            return Err(format!("too many chips ({})", self.chips.len()));
        }
        for (i, chip) in self.chips.iter().enumerate() {
            if chip.id == 0 {
                return Err(format!("chip id must be at least 1 ({})", chip.path));
            }
            if chip.path.is_empty() {
                return Err(format!("chip {} has an empty path", chip.id));
            }
            if self.chips[..i].iter().any(|c| c.id == chip.id) {
                return Err(format!("duplicate chip id {}", chip.id));
            }
        }
        if let Some(label) = &self.label {
            validate_label(label)?;
        }
        Ok(())
    }
}

/// Labels become a directory and a file name prefix
pub fn validate_label(label: &str) -> std::result::Result<(), String> {
    if label.is_empty() {
        return Err("label must not be empty".to_string());
    }
    if label.contains(['/', '\\']) || label == "." || label == ".." {
        return Err(format!("label '{}' is not a valid file name", label));
    }
    Ok(())
}
