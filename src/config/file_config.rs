//! Configuration file support.
//!
//! # Configuration File Format
//!
//! ```toml
//! [api_keys]
//! google_books = "your-google-api-key"
//! rakuten_application_id = "your-rakuten-app-id"
//!
//! [sources]
//! enabled = ["google_books", "rakuten", "ndl"]
//! search_order = ["google_books", "rakuten", "ndl"]
//! isbn_order = ["ndl", "rakuten", "google_books"]
//! dedup_priority = ["rakuten", "ndl", "google_books"]
//!
//! [google_books]
//! lang_restrict = "ja"
//!
//! [http]
//! timeout_secs = 10
//! source_timeout_secs = 20
//! max_attempts = 2
//!
//! [rate_limits]
//! google_books = 5.0
//! ndl = 2.0
//! rakuten = 1.0
//!
//! [logging]
//! level = "info"
//! ```

use std::path::Path;

use super::Config;

/// Render the default configuration as TOML, with API keys left unset
pub fn default_config_toml() -> Result<String, ConfigFileError> {
    toml::to_string_pretty(&Config::default()).map_err(|e| ConfigFileError::Serialize(e.to_string()))
}

/// Save configuration to a TOML file, creating parent directories as needed
pub fn save_config(config: &Config, path: &Path) -> Result<(), ConfigFileError> {
    let content =
        toml::to_string_pretty(config).map_err(|e| ConfigFileError::Serialize(e.to_string()))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| ConfigFileError::Io(e.to_string()))?;
    }

    std::fs::write(path, content).map_err(|e| ConfigFileError::Io(e.to_string()))
}

/// Configuration file errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialize error: {0}")]
    Serialize(String),
}
