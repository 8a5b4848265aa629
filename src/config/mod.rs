//! Configuration management.
//!
//! Configuration is read once at startup (file + environment) and handed to
//! the [`SourceRegistry`](crate::sources::SourceRegistry) and
//! [`SearchAggregator`](crate::aggregator::SearchAggregator); nothing mutates
//! it afterwards.

mod file_config;

pub use file_config::{default_config_toml, save_config, ConfigFileError};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::models::SourceId;

/// Environment variable prefix for configuration overrides
/// (e.g. `BOOKSHELF_SEARCH__HTTP__TIMEOUT_SECS=5`)
pub const ENV_PREFIX: &str = "BOOKSHELF_SEARCH";

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// API keys for the catalogs
    #[serde(default)]
    pub api_keys: ApiKeys,

    /// Which catalogs to use and in what order
    #[serde(default)]
    pub sources: SourcesConfig,

    /// Catalog base URLs
    #[serde(default)]
    pub endpoints: EndpointsConfig,

    /// Google Books specific settings
    #[serde(default)]
    pub google_books: GoogleBooksConfig,

    /// HTTP transport settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Per-source request rate ceilings
    #[serde(default)]
    pub rate_limits: RateLimitConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// API keys for external services
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiKeys {
    /// Google Books API key (optional, raises the daily quota)
    #[serde(default)]
    pub google_books: Option<String>,

    /// Rakuten application id (required for the Rakuten source)
    #[serde(default)]
    pub rakuten_application_id: Option<String>,
}

impl ApiKeys {
    /// Fill keys missing from the configuration file from the conventional
    /// `GOOGLE_BOOKS_API_KEY` and `RAKUTEN_APPLICATION_ID` variables
    pub fn fill_from_env(&mut self) {
        if is_blank(&self.google_books) {
            self.google_books = non_empty_env("GOOGLE_BOOKS_API_KEY");
        }
        if is_blank(&self.rakuten_application_id) {
            self.rakuten_application_id = non_empty_env("RAKUTEN_APPLICATION_ID");
        }
    }

    /// The Rakuten application id, if one is set and non-blank
    pub fn rakuten(&self) -> Option<&str> {
        self.rakuten_application_id
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    /// The Google Books key, if one is set and non-blank
    pub fn google(&self) -> Option<&str> {
        self.google_books
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Source selection and ordering
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Catalogs to register
    #[serde(default = "default_enabled_sources")]
    pub enabled: Vec<String>,

    /// Order in which fan-out results are concatenated
    #[serde(default = "default_search_order")]
    pub search_order: Vec<String>,

    /// Order in which ISBN lookups try catalogs
    #[serde(default = "default_isbn_order")]
    pub isbn_order: Vec<String>,

    /// Precedence for duplicate records; the first entry is the preferred source
    #[serde(default = "default_dedup_priority")]
    pub dedup_priority: Vec<String>,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled_sources(),
            search_order: default_search_order(),
            isbn_order: default_isbn_order(),
            dedup_priority: default_dedup_priority(),
        }
    }
}

impl SourcesConfig {
    pub fn search_order_ids(&self) -> Vec<SourceId> {
        to_source_ids(&self.search_order)
    }

    pub fn isbn_order_ids(&self) -> Vec<SourceId> {
        to_source_ids(&self.isbn_order)
    }

    pub fn dedup_priority_ids(&self) -> Vec<SourceId> {
        to_source_ids(&self.dedup_priority)
    }

    /// Whether `source` is listed in `enabled`
    pub fn is_enabled(&self, source: &SourceId) -> bool {
        self.enabled
            .iter()
            .any(|id| &SourceId::from_id(id) == source)
    }
}

fn to_source_ids(ids: &[String]) -> Vec<SourceId> {
    ids.iter().map(|id| SourceId::from_id(id)).collect()
}

fn default_enabled_sources() -> Vec<String> {
    vec!["google_books".into(), "rakuten".into(), "ndl".into()]
}

fn default_search_order() -> Vec<String> {
    vec!["google_books".into(), "rakuten".into(), "ndl".into()]
}

// NDL is the national catalog and the most authoritative for Japanese ISBNs.
fn default_isbn_order() -> Vec<String> {
    vec!["ndl".into(), "rakuten".into(), "google_books".into()]
}

fn default_dedup_priority() -> Vec<String> {
    vec!["rakuten".into(), "ndl".into(), "google_books".into()]
}

/// Catalog base URLs (overridable for testing or proxies)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointsConfig {
    #[serde(default = "default_google_books_url")]
    pub google_books: String,

    #[serde(default = "default_ndl_url")]
    pub ndl: String,

    #[serde(default = "default_ndl_thumbnail_url")]
    pub ndl_thumbnail: String,

    #[serde(default = "default_rakuten_url")]
    pub rakuten: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            google_books: default_google_books_url(),
            ndl: default_ndl_url(),
            ndl_thumbnail: default_ndl_thumbnail_url(),
            rakuten: default_rakuten_url(),
        }
    }
}

fn default_google_books_url() -> String {
    "https://www.googleapis.com/books/v1".to_string()
}

fn default_ndl_url() -> String {
    "https://ndlsearch.ndl.go.jp/api/opensearch".to_string()
}

fn default_ndl_thumbnail_url() -> String {
    "https://ndlsearch.ndl.go.jp/thumbnail".to_string()
}

fn default_rakuten_url() -> String {
    "https://app.rakuten.co.jp/services/api/BooksBook/Search/20170404".to_string()
}

/// Google Books settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleBooksConfig {
    /// Restrict results to a language (`langRestrict`); empty disables
    #[serde(default = "default_lang_restrict")]
    pub lang_restrict: String,
}

impl Default for GoogleBooksConfig {
    fn default() -> Self {
        Self {
            lang_restrict: default_lang_restrict(),
        }
    }
}

fn default_lang_restrict() -> String {
    "ja".to_string()
}

/// HTTP transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Whole-request timeout for a single HTTP call
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Upper bound on one adapter call including retries
    #[serde(default = "default_source_timeout_secs")]
    pub source_timeout_secs: u64,

    /// Attempts per HTTP call for transient failures
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_retry_initial_delay_ms")]
    pub retry_initial_delay_ms: u64,

    #[serde(default)]
    pub user_agent: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            source_timeout_secs: default_source_timeout_secs(),
            max_attempts: default_max_attempts(),
            retry_initial_delay_ms: default_retry_initial_delay_ms(),
            user_agent: None,
        }
    }
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_source_timeout_secs() -> u64 {
    20
}

fn default_max_attempts() -> u32 {
    2
}

fn default_retry_initial_delay_ms() -> u64 {
    500
}

/// Requests per second allowed towards each catalog; 0 disables limiting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_google_books_rps")]
    pub google_books: f64,

    #[serde(default = "default_ndl_rps")]
    pub ndl: f64,

    /// Rakuten allows one request per second per application id
    #[serde(default = "default_rakuten_rps")]
    pub rakuten: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            google_books: default_google_books_rps(),
            ndl: default_ndl_rps(),
            rakuten: default_rakuten_rps(),
        }
    }
}

fn default_google_books_rps() -> f64 {
    5.0
}

fn default_ndl_rps() -> f64 {
    2.0
}

fn default_rakuten_rps() -> f64 {
    1.0
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// `pretty` (default) or `json`
    #[serde(default)]
    pub format: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Load configuration from a file, with `BOOKSHELF_SEARCH__*` environment overrides
pub fn load_config(path: &Path) -> Result<Config, config::ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::from(path))
        .add_source(environment_source())
        .build()?;

    let mut config: Config = settings.try_deserialize()?;
    config.api_keys.fill_from_env();
    Ok(config)
}

/// Get the configuration from environment overrides and defaults only
pub fn get_config() -> Result<Config, config::ConfigError> {
    let mut config: Config = config::Config::builder()
        .add_source(environment_source())
        .build()?
        .try_deserialize()?;
    config.api_keys.fill_from_env();
    Ok(config)
}

fn environment_source() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .list_separator(",")
        .with_list_parse_key("sources.enabled")
        .with_list_parse_key("sources.search_order")
        .with_list_parse_key("sources.isbn_order")
        .with_list_parse_key("sources.dedup_priority")
        .try_parsing(true)
}

/// Find a configuration file in the default locations.
///
/// Checks `./bookshelf-search.toml`, then
/// `<config dir>/bookshelf-search/config.toml`.
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("bookshelf-search.toml");
    if local.is_file() {
        return Some(local);
    }

    dirs::config_dir()
        .map(|dir| dir.join("bookshelf-search").join("config.toml"))
        .filter(|path| path.is_file())
}
