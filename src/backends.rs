//! Backend registration and dispatch
//!
//! Backends are selected at runtime with a string of the form
//! `name[:key=value,...]`. Each backend is feature-gated and produces a
//! boxed connector, so commands can drive any of them through one
//! `Session<DynConnector>`.

use crate::error::{CommandError, Result};
use sramprobe_core::channel::{ChannelConfig, DynConnector};
use std::collections::HashMap;

/// Information about a backend
pub struct BackendInfo {
    /// Primary name (used for matching)
    pub name: &'static str,
    /// Alternative names/aliases
    pub aliases: &'static [&'static str],
    /// Short description
    pub description: &'static str,
}

/// Get information about all available backends (enabled at compile time)
#[allow(unused_mut, clippy::vec_init_then_push)]
pub fn available_backends() -> Vec<BackendInfo> {
    let mut backends = Vec::new();

    #[cfg(feature = "linux-spi")]
    backends.push(BackendInfo {
        name: "linux_spi",
        aliases: &["linux-spi", "spidev"],
        description: "Linux spidev interface (spispeed=<kHz>,mode=<0-3>,cs_high=<0|1>)",
    });

    #[cfg(feature = "dummy")]
    backends.push(BackendInfo {
        name: "dummy",
        aliases: &[],
        description: "In-memory 23A1024 emulator for testing (seed=<n>,fill=<byte>,strict=<0|1>)",
    });

    backends
}

/// Parsed `name:key=value,...` string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Params {
    /// Name before the first ':'
    pub name: String,
    /// Key-value parameters
    pub params: HashMap<String, String>,
}

impl Params {
    /// Borrow the parameters in the form the backend `parse_options` take
    pub fn options(&self) -> Vec<(&str, &str)> {
        self.params
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }
}

/// Parse a backend or trigger string into name and parameters
///
/// Format: "name" or "name:key1=value1,key2=value2"
pub fn parse_params(s: &str) -> Result<Params> {
    let (name, opts_str) = s.split_once(':').unwrap_or((s, ""));
    let name = name.trim();
    if name.is_empty() {
        return Err(CommandError::Config(format!("missing name in '{}'", s)));
    }

    let mut params = HashMap::new();
    if !opts_str.is_empty() {
        for opt in opts_str.split(',') {
            if let Some((key, value)) = opt.split_once('=') {
                params.insert(key.trim().to_string(), value.trim().to_string());
            } else {
                return Err(CommandError::Config(format!(
                    "Invalid parameter format: '{}' (expected key=value)",
                    opt
                )));
            }
        }
    }

    Ok(Params {
        name: name.to_string(),
        params,
    })
}

/// A connector ready to be handed to a `Session`
pub struct Backend {
    /// Canonical backend name
    pub name: &'static str,
    /// Boxed connector
    pub connector: DynConnector,
    /// Channel settings applied on every open
    pub config: ChannelConfig,
}

/// Open a backend by its string
pub fn open_backend(spec: &str) -> Result<Backend> {
    let params = parse_params(spec)?;

    match params.name.as_str() {
        #[cfg(feature = "linux-spi")]
        "linux_spi" | "linux-spi" | "spidev" => open_linux_spi(&params),

        #[cfg(feature = "dummy")]
        "dummy" => open_dummy(&params),

        _ => Err(CommandError::Config(format!(
            "Unknown backend: {} (available: {})",
            params.name,
            backend_names_short()
        ))),
    }
}

/// Short list of backend names for diagnostics
pub fn backend_names_short() -> String {
    let names: Vec<&str> = available_backends().iter().map(|b| b.name).collect();
    if names.is_empty() {
        "none".to_string()
    } else {
        names.join(", ")
    }
}

#[cfg(feature = "linux-spi")]
fn open_linux_spi(params: &Params) -> Result<Backend> {
    use sramprobe_core::channel::BoxedConnector;
    use sramprobe_linux_spi::{parse_options, LinuxSpiConnector};

    let config = parse_options(&params.options())
        .map_err(|e| CommandError::Config(format!("linux_spi: {}", e)))?;

    log::debug!(
        "Using linux_spi backend at {} kHz, mode {}",
        config.speed_hz / 1000,
        config.mode.mode_number()
    );

    Ok(Backend {
        name: "linux_spi",
        connector: BoxedConnector::into_dyn(LinuxSpiConnector),
        config,
    })
}

#[cfg(feature = "dummy")]
fn open_dummy(params: &Params) -> Result<Backend> {
    use sramprobe_core::channel::BoxedConnector;
    use sramprobe_dummy::{parse_options, DummyConnector};

    let config = parse_options(&params.options())
        .map_err(|e| CommandError::Config(format!("dummy: {}", e)))?;

    log::info!("Using dummy backend; contents are not persisted");

    Ok(Backend {
        name: "dummy",
        connector: BoxedConnector::into_dyn(DummyConnector::new(config)),
        config: ChannelConfig::default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_params() {
        let params = parse_params("linux_spi:spispeed=10000,mode=3").unwrap();
        assert_eq!(params.name, "linux_spi");
        assert_eq!(params.params.len(), 2);
        assert_eq!(params.params["spispeed"], "10000");
        assert_eq!(params.params["mode"], "3");

        let params = parse_params("dummy").unwrap();
        assert_eq!(params.name, "dummy");
        assert!(params.params.is_empty());
    }

    #[test]
    fn test_parse_params_invalid() {
        assert!(parse_params("linux_spi:spispeed").is_err());
        assert!(parse_params(":mode=0").is_err());
    }

    #[test]
    fn test_unknown_backend() {
        assert!(matches!(
            open_backend("ch341a"),
            Err(CommandError::Config(_))
        ));
    }

    #[cfg(feature = "dummy")]
    #[test]
    fn test_open_dummy() {
        let backend = open_backend("dummy:seed=7").unwrap();
        assert_eq!(backend.name, "dummy");
        assert_eq!(backend.config, ChannelConfig::default());
        assert!(open_backend("dummy:seed=x").is_err());
    }

    #[cfg(feature = "linux-spi")]
    #[test]
    fn test_linux_spi_options() {
        let backend = open_backend("spidev:spispeed=10000").unwrap();
        assert_eq!(backend.name, "linux_spi");
        assert_eq!(backend.config.speed_hz, 10_000_000);
    }
}
