//! Configuration loading and merging
//!
//! Settings come from an optional TOML file and the command line; command-line
//! values win.

use anyhow::{bail, Context, Result};
use can_relay_core::{InterfaceSpec, RelayConfig, RelayRequest};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Application configuration (loaded from a TOML file)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    pub source: Option<String>,
    pub target: Option<String>,
    /// Seconds; 0 or absent runs until Ctrl+C
    pub duration: Option<f64>,
    #[serde(default)]
    pub engine: RelayConfig,
}

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub source: Option<String>,
    pub target: Option<String>,
    pub duration: Option<f64>,
    pub poll_timeout_ms: Option<u64>,
    pub send_timeout_ms: Option<u64>,
    pub max_send_failures: Option<u32>,
}

/// Everything needed to start the relay
#[derive(Debug, Clone)]
pub struct Settings {
    pub request: RelayRequest,
    pub engine: RelayConfig,
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    Ok(config)
}

/// Compare identifiers after parsing, so `can0`, `socketcan:can0` and
/// `socketcanfd:can0` all name one bus. Unparseable names fall back to a plain
/// comparison and fail later on open.
fn same_interface(source: &str, target: &str) -> bool {
    match (source.parse::<InterfaceSpec>(), target.parse::<InterfaceSpec>()) {
        (Ok(InterfaceSpec::Virtual(a)), Ok(InterfaceSpec::Virtual(b))) => a == b,
        (
            Ok(InterfaceSpec::SocketCan { iface: a, .. }),
            Ok(InterfaceSpec::SocketCan { iface: b, .. }),
        ) => a == b,
        (Ok(_), Ok(_)) => false,
        _ => source.trim() == target.trim(),
    }
}

impl AppConfig {
    /// Apply command-line overrides and validate the result
    pub fn resolve(self, overrides: Overrides) -> Result<Settings> {
        let Some(source) = overrides.source.or(self.source) else {
            bail!("No source interface given (use --source or `source` in the config file)");
        };
        let Some(target) = overrides.target.or(self.target) else {
            bail!("No target interface given (use --target or `target` in the config file)");
        };
        if same_interface(&source, &target) {
            bail!("Source and target are the same interface: {}", source);
        }

        let mut engine = self.engine;
        if let Some(ms) = overrides.poll_timeout_ms {
            engine = engine.with_poll_timeout(Duration::from_millis(ms));
        }
        if let Some(ms) = overrides.send_timeout_ms {
            engine = engine.with_send_timeout(Duration::from_millis(ms));
        }
        if let Some(threshold) = overrides.max_send_failures {
            engine = engine.with_max_consecutive_send_failures(threshold);
        }
        engine.validate().context("Invalid engine settings")?;

        let duration = overrides.duration.or(self.duration).unwrap_or(0.0);
        let request = RelayRequest::new(source, target)
            .with_duration_secs(duration)
            .context("Invalid --duration")?;

        Ok(Settings { request, engine })
    }
}
