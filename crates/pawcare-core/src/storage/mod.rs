//! Local persistence collaborators: TOML config, the secret store holding the
//! refresh token, and the JSON key-value store caching the user profile.

mod config;
pub mod kv_store;
pub mod profile;
pub mod secret_store;

pub use config::{BackendConfig, Config, ProgressionConfig, RemindersConfig, SessionConfig};
pub use kv_store::{JsonFileStore, KeyValueStore, MemoryKeyValueStore};
pub use profile::{UserProfile, USER_PROFILE_KEY};
pub use secret_store::{KeyringSecretStore, MemorySecretStore, SecretStore, REFRESH_TOKEN_KEY};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns `~/.config/pawcare[-dev]/` based on PAWCARE_ENV.
///
/// Set PAWCARE_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("PAWCARE_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("pawcare-dev")
    } else {
        base_dir.join("pawcare")
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
