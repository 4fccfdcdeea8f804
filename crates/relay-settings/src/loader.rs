//! Settings loading: file discovery, deep merge, and environment overrides.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::errors::{Result, SettingsError};
use crate::types::RelaySettings;

/// Settings file looked up in the working directory when no path is given.
pub const DEFAULT_SETTINGS_FILE: &str = "relay.json";

/// Environment variable naming an explicit settings file.
const SETTINGS_PATH_VAR: &str = "RELAY_SETTINGS";

/// Resolve settings from defaults, an optional file, and the environment.
///
/// File selection:
/// - `explicit` if given (a missing file is an error),
/// - else `$RELAY_SETTINGS` if set (a missing file is an error),
/// - else `./relay.json` if it exists,
/// - else compiled defaults only.
pub fn load_settings(explicit: Option<&Path>) -> Result<RelaySettings> {
    let chosen = explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os(SETTINGS_PATH_VAR).map(PathBuf::from));

    let mut settings = match chosen {
        Some(path) => read_file_layer(&path)?,
        None => {
            let fallback = Path::new(DEFAULT_SETTINGS_FILE);
            if fallback.is_file() {
                read_file_layer(fallback)?
            } else {
                tracing::debug!("no settings file found, using defaults");
                RelaySettings::default()
            }
        }
    };

    apply_env_overrides(&mut settings);
    settings.validate();
    Ok(settings)
}

fn read_file_layer(path: &Path) -> Result<RelaySettings> {
    let raw = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let json_err = |source: serde_json::Error| SettingsError::Json {
        path: path.to_path_buf(),
        source,
    };
    let user: Value = serde_json::from_str(&raw).map_err(json_err)?;
    let defaults = serde_json::to_value(RelaySettings::default()).map_err(json_err)?;
    let merged = deep_merge(defaults, user);
    let settings = serde_json::from_value(merged).map_err(json_err)?;
    tracing::info!(path = %path.display(), "settings loaded");
    Ok(settings)
}

/// Recursively merge `overlay` into `base`.
///
/// Objects merge key by key; any other overlay value replaces the base
/// value outright (arrays are not concatenated).
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                let merged = match base.remove(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value,
                };
                let _ = base.insert(key, merged);
            }
            Value::Object(base)
        }
        (_, overlay) => overlay,
    }
}

/// Apply `RELAY_*` and `PORT` environment overrides.
pub fn apply_env_overrides(settings: &mut RelaySettings) {
    apply_overrides_from(settings, |key| std::env::var(key).ok());
}

/// Apply overrides using `lookup` as the variable source.
///
/// | Variable | Field |
/// |----------|-------|
/// | `RELAY_HOST` | `server.host` |
/// | `PORT`, `RELAY_PORT` | `server.port` (`RELAY_PORT` wins) |
/// | `RELAY_CLIENT_FILE` | `server.clientFile` |
/// | `RELAY_METRICS` | `server.metricsEnabled` |
/// | `RELAY_LOG_LEVEL` | `logging.level` |
/// | `RELAY_LOG_JSON` | `logging.json` |
///
/// Unparseable values are skipped with a warning.
pub fn apply_overrides_from(settings: &mut RelaySettings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(host) = lookup("RELAY_HOST") {
        settings.server.host = host;
    }
    for key in ["PORT", "RELAY_PORT"] {
        if let Some(raw) = lookup(key) {
            match raw.trim().parse::<u16>() {
                Ok(port) => settings.server.port = port,
                Err(e) => tracing::warn!(key, value = %raw, error = %e, "ignoring invalid port"),
            }
        }
    }
    if let Some(path) = lookup("RELAY_CLIENT_FILE") {
        settings.server.client_file = path;
    }
    if let Some(raw) = lookup("RELAY_METRICS") {
        if let Some(flag) = parse_flag("RELAY_METRICS", &raw) {
            settings.server.metrics_enabled = flag;
        }
    }
    if let Some(level) = lookup("RELAY_LOG_LEVEL") {
        settings.logging.level = level;
    }
    if let Some(raw) = lookup("RELAY_LOG_JSON") {
        if let Some(flag) = parse_flag("RELAY_LOG_JSON", &raw) {
            settings.logging.json = flag;
        }
    }
}

fn parse_flag(key: &str, raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => {
            tracing::warn!(key, value = %raw, "ignoring invalid boolean");
            None
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
