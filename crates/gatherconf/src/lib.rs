//! Configuration loading for the gather collector.
//!
//! Everything here is read once at startup; nothing is reloaded while a
//! collection window is running.
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins, key by key):
//! 1. `/etc/gather/config.toml` (system)
//! 2. `~/.config/gather/config.toml` (user)
//! 3. `./gather.toml` (local override, replaced by `--config` when given)
//! 4. Environment variables (`GATHER_*`, `RUST_LOG`, `OTEL_EXPORTER_OTLP_ENDPOINT`)
//!
//! # Example Config
//!
//! ```toml
//! [bind]
//! host = "0.0.0.0"
//! http_port = 8380
//!
//! [window]
//! duration_ms = 4000
//!
//! [telemetry]
//! log_level = "info"
//! otlp_endpoint = "127.0.0.1:4317"
//! ```

pub mod infra;
pub mod loader;

pub use infra::{BindConfig, TelemetryConfig, WindowConfig};
pub use loader::{discover_config_files_with_override, ConfigSources};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {message}")]
    Invalid { key: String, message: String },

    #[error("Failed to render config: {0}")]
    Render(String),
}

/// Complete collector configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct GatherConfig {
    #[serde(default)]
    pub bind: BindConfig,

    #[serde(default)]
    pub window: WindowConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl GatherConfig {
    /// Load configuration from all sources.
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load configuration with an optional explicit file in place of `./gather.toml`.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration from optional path and return information about sources.
    pub fn load_with_sources_from(
        config_path: Option<&Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut config = GatherConfig::default();

        for path in loader::discover_config_files_with_override(config_path) {
            loader::load_into(&mut config, &path)?;
            sources.files.push(path);
        }

        loader::apply_env_overrides(&mut config, &mut sources);
        config.validate()?;

        Ok((config, sources))
    }

    /// Reject values the collector cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window.duration_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "window.duration_ms".to_string(),
                message: "collection window must be longer than zero".to_string(),
            });
        }
        Ok(())
    }

    pub fn window_duration(&self) -> Duration {
        self.window.duration()
    }

    pub fn bind_addr(&self) -> String {
        self.bind.addr()
    }

    /// Serialize config to TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        let body = toml::to_string(self).map_err(|e| ConfigError::Render(e.to_string()))?;
        Ok(format!("# gather configuration\n\n{}", body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = GatherConfig::default();
        assert_eq!(config.bind.http_port, 8380);
        assert_eq!(config.window_duration(), Duration::from_secs(4));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_to_toml_round_trips_through_loader() {
        let mut config = GatherConfig::default();
        config.window.duration_ms = 123;
        config.telemetry.otlp_endpoint = Some("otel:4317".to_string());

        let mut reloaded = GatherConfig::default();
        loader::apply_toml(&mut reloaded, &config.to_toml().unwrap(), Path::new("rendered.toml"))
            .unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_to_toml_escapes_filter_directives() {
        let mut config = GatherConfig::default();
        config.telemetry.log_level = r#"[span{name="x"}]=debug"#.to_string();
        config.bind.host = "host\\with\\backslashes".to_string();

        let rendered = config.to_toml().unwrap();
        let mut reloaded = GatherConfig::default();
        loader::apply_toml(&mut reloaded, &rendered, Path::new("rendered.toml")).unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_to_toml_omits_unset_endpoint() {
        let rendered = GatherConfig::default().to_toml().unwrap();
        assert!(rendered.contains("[window]"));
        assert!(!rendered.contains("otlp_endpoint"));
    }

    #[test]
    fn test_zero_window_is_invalid() {
        let mut config = GatherConfig::default();
        config.window.duration_ms = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_load_from_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[window]\nduration_ms = 750").unwrap();

        let (config, sources) = GatherConfig::load_with_sources_from(Some(file.path())).unwrap();
        assert!(sources.files.iter().any(|p| p == file.path()));
        // GATHER_WINDOW_MS in the environment would legitimately win here
        if !sources.env_overrides.iter().any(|k| k == "GATHER_WINDOW_MS") {
            assert_eq!(config.window.duration_ms, 750);
        }
    }

    #[test]
    fn test_load_reports_unreadable_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = loader::load_into(&mut GatherConfig::default(), &dir.path().join("missing.toml"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::FileRead { .. }));
    }
}
