//! Configuration loader
//!
//! Loads the client configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If the API key is not set there, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! - `ISSUANCE_API_KEY`: API key (required)
//! - `ISSUANCE_BASE_URL`: API base URL
//! - `ISSUANCE_TIMEOUT_MS`: Per-attempt timeout in milliseconds
//! - `ISSUANCE_MAX_RETRIES`: Retries after the initial attempt
//!
//! A config file may omit `api_key`; it is then taken from
//! `ISSUANCE_API_KEY`, so the secret never has to live on disk.
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./issuance.{json,toml}` and `./config.{json,toml}`
//! 2. The same names in the parent and grandparent directories
//! 3. The same names next to the executable

use std::path::{Path, PathBuf};
use std::time::Duration;

use issuance_domain::{ClassifiedError, ClientConfig, Result};

use crate::errors::InfraError;

pub const ENV_API_KEY: &str = "ISSUANCE_API_KEY";
pub const ENV_BASE_URL: &str = "ISSUANCE_BASE_URL";
pub const ENV_TIMEOUT_MS: &str = "ISSUANCE_TIMEOUT_MS";
pub const ENV_MAX_RETRIES: &str = "ISSUANCE_MAX_RETRIES";

const CONFIG_FILE_NAMES: &[&str] = &["issuance.json", "issuance.toml", "config.json", "config.toml"];

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If that fails, falls
/// back to loading from a config file.
///
/// # Errors
/// Returns a `Configuration` error if neither source yields a valid
/// configuration.
pub fn load() -> Result<ClientConfig> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = %e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// # Errors
/// Returns a `Configuration` error if `ISSUANCE_API_KEY` is missing or a
/// variable has an invalid value.
pub fn load_from_env() -> Result<ClientConfig> {
    load_from_env_with(|key| std::env::var(key).ok())
}

/// Load configuration from an arbitrary variable lookup.
///
/// # Errors
/// Same as [`load_from_env`].
pub fn load_from_env_with<F>(lookup: F) -> Result<ClientConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let api_key = non_empty(&lookup, ENV_API_KEY).ok_or_else(|| {
        ClassifiedError::configuration(format!("Missing required environment variable: {ENV_API_KEY}"))
    })?;
    let mut config = ClientConfig::new(api_key);

    if let Some(base_url) = non_empty(&lookup, ENV_BASE_URL) {
        config.base_url = base_url;
    }
    if let Some(raw) = non_empty(&lookup, ENV_TIMEOUT_MS) {
        let millis = raw.parse::<u64>().map_err(|e| {
            ClassifiedError::configuration(format!("Invalid {ENV_TIMEOUT_MS} '{raw}': {e}"))
        })?;
        config.timeout = Duration::from_millis(millis);
    }
    if let Some(raw) = non_empty(&lookup, ENV_MAX_RETRIES) {
        config.retry.max_attempts = raw.parse::<u32>().map_err(|e| {
            ClassifiedError::configuration(format!("Invalid {ENV_MAX_RETRIES} '{raw}': {e}"))
        })?;
    }

    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the standard locations. Format is detected by
/// file extension. A missing `api_key` is filled from `ISSUANCE_API_KEY`.
///
/// # Errors
/// Returns a `Configuration` error if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
/// - The resulting configuration does not validate
pub fn load_from_file(path: Option<PathBuf>) -> Result<ClientConfig> {
    load_from_file_with(path, |key| std::env::var(key).ok())
}

fn load_from_file_with<F>(path: Option<PathBuf>, lookup: F) -> Result<ClientConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(ClassifiedError::configuration(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            ClassifiedError::configuration("No config file found in any of the standard locations")
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path).map_err(InfraError::from)?;
    let mut config = parse_config(&contents, &config_path)?;

    if config.api_key.trim().is_empty() {
        if let Some(api_key) = non_empty(&lookup, ENV_API_KEY) {
            config.api_key = api_key;
        }
    }

    config.validate()?;
    Ok(config)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
///
/// # Errors
/// Returns a `Configuration` error if the format is unsupported or parsing
/// fails.
fn parse_config(contents: &str, path: &Path) -> Result<ClientConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => Ok(toml::from_str(contents).map_err(InfraError::from)?),
        "json" => Ok(serde_json::from_str(contents).map_err(InfraError::from)?),
        _ => Err(ClassifiedError::configuration(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe multiple paths for configuration files
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut roots = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        roots.extend([cwd.clone(), cwd.join(".."), cwd.join("../..")]);
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            roots.push(exe_dir.to_path_buf());
        }
    }

    roots
        .iter()
        .flat_map(|root| CONFIG_FILE_NAMES.iter().map(move |name| root.join(name)))
        .find(|path| path.exists())
}

fn non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}
