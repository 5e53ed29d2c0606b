//! Config file discovery, loading, and environment variable overlay.

use crate::{ConfigError, GatherConfig};
use std::env;
use std::path::{Path, PathBuf};

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files in standard locations.
///
/// Returns paths in load order (system, user, local).
/// Only returns files that exist.
pub fn discover_config_files() -> Vec<PathBuf> {
    discover_config_files_with_override(None)
}

/// Discover config files, optionally with a CLI override path.
///
/// If `cli_path` is provided and exists, it replaces the local override.
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/gather/config.toml");
    if system.exists() {
        files.push(system);
    }

    // XDG_CONFIG_HOME or ~/.config
    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("gather/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    let local = PathBuf::from("gather.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Read a TOML file and overlay its values onto `config`.
pub fn load_into(config: &mut GatherConfig, path: &Path) -> Result<(), ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    apply_toml(config, &contents, path)
}

/// Overlay values from a TOML document. Keys absent from the document
/// leave the existing value in place.
pub(crate) fn apply_toml(
    config: &mut GatherConfig,
    contents: &str,
    path: &Path,
) -> Result<(), ConfigError> {
    let table: toml::Table = contents.parse().map_err(|e: toml::de::Error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    if let Some(bind) = table.get("bind").and_then(|v| v.as_table()) {
        if let Some(v) = bind.get("host").and_then(|v| v.as_str()) {
            config.bind.host = v.to_string();
        }
        if let Some(v) = bind.get("http_port").and_then(|v| v.as_integer()) {
            config.bind.http_port = u16::try_from(v).map_err(|_| ConfigError::Invalid {
                key: "bind.http_port".to_string(),
                message: format!("{} is not a valid port", v),
            })?;
        }
    }

    if let Some(window) = table.get("window").and_then(|v| v.as_table()) {
        if let Some(v) = window.get("duration_ms").and_then(|v| v.as_integer()) {
            config.window.duration_ms = u64::try_from(v).map_err(|_| ConfigError::Invalid {
                key: "window.duration_ms".to_string(),
                message: format!("{} is negative", v),
            })?;
        }
    }

    if let Some(telemetry) = table.get("telemetry").and_then(|v| v.as_table()) {
        if let Some(v) = telemetry.get("log_level").and_then(|v| v.as_str()) {
            config.telemetry.log_level = v.to_string();
        }
        if let Some(v) = telemetry.get("otlp_endpoint").and_then(|v| v.as_str()) {
            config.telemetry.otlp_endpoint = Some(v.to_string());
        }
    }

    Ok(())
}

/// Apply environment variable overrides to config.
pub fn apply_env_overrides(config: &mut GatherConfig, sources: &mut ConfigSources) {
    apply_overrides_from(config, sources, |key| env::var(key).ok());
}

/// Same as [`apply_env_overrides`] with an injectable lookup.
pub(crate) fn apply_overrides_from<F>(
    config: &mut GatherConfig,
    sources: &mut ConfigSources,
    lookup: F,
) where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("GATHER_HOST") {
        config.bind.host = v;
        sources.env_overrides.push("GATHER_HOST".to_string());
    }
    if let Some(v) = lookup("GATHER_HTTP_PORT") {
        if let Ok(port) = v.parse() {
            config.bind.http_port = port;
            sources.env_overrides.push("GATHER_HTTP_PORT".to_string());
        }
    }

    if let Some(v) = lookup("GATHER_WINDOW_MS") {
        if let Ok(ms) = v.parse() {
            config.window.duration_ms = ms;
            sources.env_overrides.push("GATHER_WINDOW_MS".to_string());
        }
    }

    if let Some(v) = lookup("GATHER_LOG_LEVEL") {
        config.telemetry.log_level = v;
        sources.env_overrides.push("GATHER_LOG_LEVEL".to_string());
    }
    // RUST_LOG wins over our own variable
    if let Some(v) = lookup("RUST_LOG") {
        config.telemetry.log_level = v;
        sources.env_overrides.push("RUST_LOG".to_string());
    }

    if let Some(v) = lookup("GATHER_OTLP_ENDPOINT") {
        config.telemetry.otlp_endpoint = Some(v);
        sources.env_overrides.push("GATHER_OTLP_ENDPOINT".to_string());
    }
    if let Some(v) = lookup("OTEL_EXPORTER_OTLP_ENDPOINT") {
        config.telemetry.otlp_endpoint = Some(v);
        sources.env_overrides.push("OTEL_EXPORTER_OTLP_ENDPOINT".to_string());
    }
}
