//! Client configuration loader.
//!
//! Reads `config.toml` from the config directory (`~/.hadiya/` by default)
//! and deserializes it into [`ClientConfig`]. Falls back to defaults when
//! the file is missing or malformed, then applies environment overrides.

use std::path::{Path, PathBuf};

use hadiya_types::config::ClientConfig;

/// Overrides `api_url`.
pub const ENV_API_URL: &str = "HADIYA_API_URL";
/// Overrides `ws_url`.
pub const ENV_WS_URL: &str = "HADIYA_WS_URL";
/// Overrides the config directory itself.
pub const ENV_CONFIG_DIR: &str = "HADIYA_CONFIG_DIR";

/// Resolve the config directory.
///
/// `HADIYA_CONFIG_DIR` wins; otherwise `~/.hadiya`, or `./.hadiya` when no
/// home directory can be determined.
pub fn resolve_config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(ENV_CONFIG_DIR) {
        return PathBuf::from(dir);
    }

    dirs::home_dir()
        .map(|home| home.join(".hadiya"))
        .unwrap_or_else(|| PathBuf::from(".hadiya"))
}

/// Load `{config_dir}/config.toml` and apply environment overrides.
pub async fn load_client_config(config_dir: &Path) -> ClientConfig {
    let mut config = read_config_file(config_dir).await;
    apply_overrides(&mut config, |key| std::env::var(key).ok());
    config
}

/// Load `{config_dir}/config.toml` without environment overrides.
///
/// - Missing file: [`ClientConfig::default()`].
/// - Unreadable or unparsable file: logs a warning and returns the default.
pub async fn read_config_file(config_dir: &Path) -> ClientConfig {
    let config_path = config_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return ClientConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return ClientConfig::default();
        }
    };

    match toml::from_str::<ClientConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            ClientConfig::default()
        }
    }
}

/// Apply `HADIYA_API_URL` / `HADIYA_WS_URL` from `lookup`.
///
/// Empty values are ignored.
pub fn apply_overrides(config: &mut ClientConfig, lookup: impl Fn(&str) -> Option<String>) {
    let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    if let Some(api_url) = non_empty(ENV_API_URL) {
        tracing::debug!(api_url = %api_url, "api_url overridden from environment");
        config.api_url = api_url;
    }
    if let Some(ws_url) = non_empty(ENV_WS_URL) {
        tracing::debug!(ws_url = %ws_url, "ws_url overridden from environment");
        config.ws_url = Some(ws_url);
    }
}
