//! Search request and response models.

use serde::{Deserialize, Serialize};

use crate::models::{Book, SourceId};

/// Default number of results returned by an aggregated search
pub const DEFAULT_MAX_RESULTS: usize = 20;

/// Ordering requested for search results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Newest publication date first, undated records last
    #[default]
    Newest,
    /// Catalog-native relevance order
    Relevance,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Newest => "newest",
            SortOrder::Relevance => "relevance",
        }
    }
}

/// Which field a free-text search matches against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchKind {
    Title,
    Author,
}

impl std::fmt::Display for SearchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchKind::Title => write!(f, "title"),
            SearchKind::Author => write!(f, "author"),
        }
    }
}

/// Restricts a request to one catalog or fans it out to all of them
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceSelection {
    #[default]
    All,
    Only(SourceId),
}

impl SourceSelection {
    /// Parse `"all"`/`"both"` or a single source identifier
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "all" | "both" | "" => SourceSelection::All,
            other => SourceSelection::Only(SourceId::from_id(other)),
        }
    }

    pub fn is_single(&self) -> bool {
        matches!(self, SourceSelection::Only(_))
    }
}

/// Search query parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Title or author text to search for
    pub term: String,

    /// Maximum number of results across all queried sources
    pub max_results: usize,

    pub sort: SortOrder,

    pub selection: SourceSelection,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            term: String::new(),
            max_results: DEFAULT_MAX_RESULTS,
            sort: SortOrder::default(),
            selection: SourceSelection::default(),
        }
    }
}

impl SearchQuery {
    /// Create a new search query with default limits and ordering
    pub fn new(term: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            ..Default::default()
        }
    }

    /// Set maximum results
    pub fn max_results(mut self, max: usize) -> Self {
        self.max_results = max;
        self
    }

    /// Set sort order
    pub fn sort(mut self, sort: SortOrder) -> Self {
        self.sort = sort;
        self
    }

    /// Restrict the query to one source or all of them
    pub fn selection(mut self, selection: SourceSelection) -> Self {
        self.selection = selection;
        self
    }

    /// Restrict the query to a single source
    pub fn only(self, source: SourceId) -> Self {
        self.selection(SourceSelection::Only(source))
    }
}

/// A source that failed during a fan-out and contributed nothing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFailure {
    pub source: SourceId,
    pub error: String,
    pub rate_limited: bool,
}

/// Result of an aggregated search including per-source failures
///
/// `books` empty with `failures` empty means the catalogs genuinely had no
/// match; `failures` non-empty means some (or all) catalogs could not answer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchReport {
    pub books: Vec<Book>,
    pub failures: Vec<SourceFailure>,
    /// Sources that answered successfully
    pub queried: Vec<SourceId>,
}

impl SearchReport {
    /// True when at least one selected source failed
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }

    /// True when every selected source failed
    pub fn all_failed(&self) -> bool {
        self.queried.is_empty() && !self.failures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_defaults() {
        let query = SearchQuery::new("ワンピース");
        assert_eq!(query.max_results, 20);
        assert_eq!(query.sort, SortOrder::Newest);
        assert_eq!(query.selection, SourceSelection::All);
    }

    #[test]
    fn test_query_builder() {
        let query = SearchQuery::new("Dune")
            .max_results(5)
            .sort(SortOrder::Relevance)
            .only(SourceId::Ndl);
        assert_eq!(query.max_results, 5);
        assert_eq!(query.sort, SortOrder::Relevance);
        assert_eq!(query.selection, SourceSelection::Only(SourceId::Ndl));
        assert!(query.selection.is_single());
    }

    #[test]
    fn test_selection_parse() {
        assert_eq!(SourceSelection::parse("all"), SourceSelection::All);
        assert_eq!(SourceSelection::parse("BOTH"), SourceSelection::All);
        assert_eq!(
            SourceSelection::parse("rakuten"),
            SourceSelection::Only(SourceId::Rakuten)
        );
    }

    #[test]
    fn test_report_flags() {
        let mut report = SearchReport::default();
        assert!(!report.is_partial());
        assert!(!report.all_failed());

        report.failures.push(SourceFailure {
            source: SourceId::Ndl,
            error: "Network error: refused".to_string(),
            rate_limited: false,
        });
        assert!(report.is_partial());
        assert!(report.all_failed());

        report.queried.push(SourceId::GoogleBooks);
        assert!(!report.all_failed());
    }
}
