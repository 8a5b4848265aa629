//! Book catalog plugins with extensible trait-based architecture.
//!
//! This module defines the [`Source`] trait that all catalog adapters
//! implement. Each adapter translates a generic title/author/ISBN query into
//! its catalog's wire format and maps the response into [`Book`] records.
//! Adapters are built from [`Config`](crate::config::Config) by the
//! [`SourceRegistry`].
//!
//! # Feature Flags
//!
//! Individual catalogs can be disabled at compile time using Cargo features:
//!
//! - `google_books` - Enable Google Books (default: enabled)
//! - `ndl` - Enable National Diet Library Search (default: enabled)
//! - `rakuten` - Enable Rakuten Books (default: enabled, requires an application id at runtime)
//!
//! # Runtime Source Configuration
//!
//! - `[sources] enabled` in the configuration file lists the catalogs to use
//! - `BOOKSHELF_SEARCH__SOURCES__ENABLED` overrides it from the environment
//! - Rakuten is only registered when `RAKUTEN_APPLICATION_ID` (or
//!   `[api_keys] rakuten_application_id`) is set

#[cfg(feature = "source-google_books")]
mod google_books;
#[cfg(feature = "source-ndl")]
mod ndl;
#[cfg(feature = "source-rakuten")]
mod rakuten;
mod registry;

pub mod mock;

#[cfg(feature = "source-google_books")]
pub use google_books::GoogleBooksSource;
pub use mock::MockSource;
#[cfg(feature = "source-ndl")]
pub use ndl::NdlSource;
#[cfg(feature = "source-rakuten")]
pub use rakuten::RakutenSource;
pub use registry::{SourceCapabilities, SourceRegistry};

use crate::models::{Book, SortOrder, SourceId};
use async_trait::async_trait;
use serde::{Deserialize, Deserializer};

/// The Source trait defines the interface for all catalog adapters.
///
/// # Implementing a New Source
///
/// 1. Create a new struct that implements `Source`
/// 2. Implement `id`, `source_id`, `name`, `max_page_size` and the methods
///    matching the capabilities it advertises
/// 3. Register it in `SourceRegistry::from_config` or dynamically with
///    [`SourceRegistry::register`]
///
/// Callers validate search terms before invoking an adapter. Adapters clamp
/// `max_results` to [`Source::max_page_size`] and never fail because of it.
#[async_trait]
pub trait Source: Send + Sync + std::fmt::Debug {
    /// Unique identifier for this source (e.g. "google_books", "ndl")
    fn id(&self) -> &str;

    /// Tag applied to every record this source produces
    fn source_id(&self) -> SourceId;

    /// Human-readable name of this source
    fn name(&self) -> &str;

    /// Describe the capabilities of this source
    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::TITLE_SEARCH
            | SourceCapabilities::AUTHOR_SEARCH
            | SourceCapabilities::ISBN_LOOKUP
    }

    /// Largest page the upstream API returns in one request
    fn max_page_size(&self) -> usize;

    /// Whether the upstream API can order results itself
    fn supports_native_sort(&self) -> bool {
        self.capabilities().contains(SourceCapabilities::NATIVE_SORT)
    }

    /// Whether this source supports lookup by ISBN
    fn supports_isbn_lookup(&self) -> bool {
        self.capabilities().contains(SourceCapabilities::ISBN_LOOKUP)
    }

    /// Search for books whose title matches `term`
    async fn search_by_title(
        &self,
        _term: &str,
        _max_results: usize,
        _sort: SortOrder,
    ) -> Result<Vec<Book>, SourceError> {
        Err(SourceError::NotSupported)
    }

    /// Search for books by an author matching `term`
    async fn search_by_author(
        &self,
        _term: &str,
        _max_results: usize,
        _sort: SortOrder,
    ) -> Result<Vec<Book>, SourceError> {
        Err(SourceError::NotSupported)
    }

    /// Look up a single book by ISBN-10 or ISBN-13
    async fn fetch_by_isbn(&self, _isbn: &str) -> Result<Option<Book>, SourceError> {
        Err(SourceError::NotSupported)
    }
}

/// Deserialize a field that upstream may send as `null`, mapping it to the
/// type's default. Pair with `#[serde(default)]` for absent fields.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Clamp a requested page size to a source's ceiling (and to at least one)
pub(crate) fn clamp_page_size(requested: usize, ceiling: usize) -> usize {
    requested.clamp(1, ceiling.max(1))
}

/// Errors that can occur when interacting with a source
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SourceError {
    /// The requested operation is not available for this source
    #[error("Operation not supported by this source")]
    NotSupported,

    /// Network or connection error
    #[error("Network error: {0}")]
    Network(String),

    /// The request did not complete in time
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Upstream answered with a non-success status
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// Malformed response body (XML, JSON)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Upstream rate limit exceeded; the source should back off
    #[error("Rate limit exceeded")]
    RateLimited,

    /// Invalid request parameters or configuration
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl SourceError {
    /// True for the rate-limit case, which callers log separately
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, SourceError::RateLimited)
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SourceError::Timeout(err.to_string())
        } else if err.is_decode() {
            SourceError::Parse(err.to_string())
        } else {
            SourceError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Parse(format!("JSON: {}", err))
    }
}

impl From<quick_xml::Error> for SourceError {
    fn from(err: quick_xml::Error) -> Self {
        SourceError::Parse(format!("XML: {}", err))
    }
}
