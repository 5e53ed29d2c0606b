//! CLI command implementations
//!
//! Thin HTTP clients for a running collector, plus config inspection.

use anyhow::{bail, Context, Result};
use reqwest::StatusCode;
use std::path::Path;
use std::time::Duration;

use crate::web::SNAPSHOT_FILENAME;

/// Validate that a server URL looks like an HTTP base URL
fn validate_url(url: &str) -> Result<&str> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        bail!(
            "Invalid server URL: '{}'\n\n\
             Expected something like:\n  \
             http://localhost:8380",
            url
        );
    }
    Ok(url.trim_end_matches('/'))
}

fn client(timeout_ms: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_millis(timeout_ms))
        .build()
        .context("Failed to build HTTP client")
}

/// Ask whether the collector is ready for a snapshot request
pub async fn ping(url: &str, timeout_ms: u64) -> Result<()> {
    let base = validate_url(url)?;
    let response = client(timeout_ms)?
        .get(format!("{}/ping", base))
        .send()
        .await
        .with_context(|| format!("Failed to reach {}", base))?;

    match response.status() {
        StatusCode::OK => println!("ready"),
        StatusCode::NOT_IMPLEMENTED => println!("busy"),
        other => bail!("Unexpected status {}", other),
    }
    Ok(())
}

/// Trigger a collection window and save the result
pub async fn snapshot(url: &str, output: Option<&Path>, timeout_ms: u64) -> Result<()> {
    let base = validate_url(url)?;
    let response = client(timeout_ms)?
        .get(format!("{}/", base))
        .send()
        .await
        .with_context(|| format!("Failed to reach {}", base))?;

    match response.status() {
        StatusCode::OK => {}
        StatusCode::CONFLICT => bail!("A collection window is already open, try again shortly"),
        other => {
            let body = response.text().await.unwrap_or_default();
            bail!("Snapshot failed with {}: {}", other, body);
        }
    }

    let body = response.bytes().await.context("Failed to read snapshot")?;
    let path = output.unwrap_or_else(|| Path::new(SNAPSHOT_FILENAME));
    tokio::fs::write(path, &body)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!("Wrote {} bytes to {}", body.len(), path.display());
    Ok(())
}

/// Submit one sample for an instrument
pub async fn push(url: &str, instrument: &str, json: &str, timeout_ms: u64) -> Result<()> {
    let base = validate_url(url)?;
    // Validate locally so typos fail before reaching the server
    let payload: serde_json::Value =
        serde_json::from_str(json).context("Payload is not valid JSON")?;

    let response = client(timeout_ms)?
        .post(format!("{}/collect", base))
        .query(&[("instrument", instrument)])
        .body(payload.to_string())
        .send()
        .await
        .with_context(|| format!("Failed to reach {}", base))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        bail!("Collector rejected sample ({}): {}", status, body);
    }
    println!("ok");
    Ok(())
}

/// Print the effective configuration and where it came from
pub fn show_config(config_path: Option<&Path>) -> Result<()> {
    let (config, sources) = gatherconf::GatherConfig::load_with_sources_from(config_path)
        .context("Failed to load configuration")?;

    for file in &sources.files {
        println!("# from file: {}", file.display());
    }
    for var in &sources.env_overrides {
        println!("# from env: {}", var);
    }
    print!("{}", config.to_toml().context("Failed to render configuration")?);
    Ok(())
}
