//! # relay-settings
//!
//! Configuration management with layered sources for the chat relay.
//!
//! Settings are resolved from these layers (in priority order, lowest first):
//! 1. **Compiled defaults**: [`RelaySettings::default()`]
//! 2. **Settings file**: JSON, deep-merged over defaults
//! 3. **Environment variables**: `RELAY_*` and `PORT` overrides
//!
//! Command-line flags are applied on top by the binary.
//!
//! Settings are resolved once at startup and handed to the server by value;
//! there is no global instance.
//!
//! # Usage
//!
//! ```no_run
//! use relay_settings::load_settings;
//!
//! let settings = load_settings(None).unwrap();
//! println!("listening on {}", settings.server.bind_addr());
//! ```

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    DEFAULT_SETTINGS_FILE, apply_env_overrides, apply_overrides_from, deep_merge, load_settings,
};
pub use types::*;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
