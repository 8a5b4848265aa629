//! Multi-source search orchestration.
//!
//! # Pipeline
//!
//! 1. Resolve the source selection against the registry
//! 2. Fan the query out to every selected source concurrently, each call
//!    bounded by the per-source timeout
//! 3. Log per-source failures; a failing source contributes nothing unless it
//!    was the only one selected
//! 4. Tag every record with the source that produced it
//! 5. Concatenate in the configured search order and deduplicate
//! 6. Sort newest-first when requested (relevance keeps source order)
//! 7. Truncate to `max_results` across all sources
//!
//! ISBN lookups do not fan out: sources are tried one after another in the
//! configured ISBN order and the first hit wins.

use futures_util::future::join_all;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::models::{
    Book, SearchKind, SearchQuery, SearchReport, SortOrder, SourceFailure, SourceId,
    SourceSelection,
};
use crate::sources::{Source, SourceCapabilities, SourceError, SourceRegistry};
use crate::utils::{clean_isbn, deduplicate_books, sort_newest_first, SourcePriority};

/// Errors surfaced to callers of the aggregator
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SearchError {
    /// Caller input was rejected before any network call
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// The only selected source failed
    #[error("{source_id} is unavailable: {error}")]
    SourceUnavailable {
        source_id: SourceId,
        #[source]
        error: SourceError,
    },

    /// The selection names a source that is not configured
    #[error("Unknown or unconfigured source: {0}")]
    UnknownSource(String),

    /// No source is configured for this operation
    #[error("No book sources are configured")]
    NoSources,
}

impl SearchError {
    /// True when the failure was an upstream rate limit
    pub fn is_rate_limited(&self) -> bool {
        matches!(
            self,
            SearchError::SourceUnavailable { error, .. } if error.is_rate_limited()
        )
    }
}

/// Ordering and timing policy for the aggregator
#[derive(Debug, Clone)]
pub struct SearchSettings {
    /// Order in which fan-out results are concatenated
    pub search_order: Vec<SourceId>,
    /// Order in which ISBN lookups try sources
    pub isbn_order: Vec<SourceId>,
    /// Precedence for duplicate records
    pub priority: SourcePriority,
    /// Upper bound on one source call
    pub source_timeout: Duration,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl SearchSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            search_order: config.sources.search_order_ids(),
            isbn_order: config.sources.isbn_order_ids(),
            priority: SourcePriority::new(config.sources.dedup_priority_ids()),
            source_timeout: Duration::from_secs(config.http.source_timeout_secs.max(1)),
        }
    }
}

/// Aggregates searches across the registered book sources
#[derive(Debug, Clone)]
pub struct SearchAggregator {
    registry: Arc<SourceRegistry>,
    settings: SearchSettings,
}

impl SearchAggregator {
    pub fn new(registry: Arc<SourceRegistry>, settings: SearchSettings) -> Self {
        Self { registry, settings }
    }

    /// Build the registry and settings from configuration
    pub fn from_config(config: &Config) -> Result<Self, SourceError> {
        let registry = SourceRegistry::from_config(config)?;
        Ok(Self::new(Arc::new(registry), SearchSettings::from_config(config)))
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &SearchSettings {
        &self.settings
    }

    /// Search all selected sources by title
    pub async fn search_by_title(
        &self,
        term: &str,
        max_results: usize,
        sort: SortOrder,
        selection: SourceSelection,
    ) -> Result<Vec<Book>, SearchError> {
        let query = SearchQuery::new(term)
            .max_results(max_results)
            .sort(sort)
            .selection(selection);
        self.search(SearchKind::Title, &query).await
    }

    /// Search all selected sources by author
    pub async fn search_by_author(
        &self,
        term: &str,
        max_results: usize,
        sort: SortOrder,
        selection: SourceSelection,
    ) -> Result<Vec<Book>, SearchError> {
        let query = SearchQuery::new(term)
            .max_results(max_results)
            .sort(sort)
            .selection(selection);
        self.search(SearchKind::Author, &query).await
    }

    /// Run a search and return only the books
    pub async fn search(
        &self,
        kind: SearchKind,
        query: &SearchQuery,
    ) -> Result<Vec<Book>, SearchError> {
        self.search_detailed(kind, query).await.map(|report| report.books)
    }

    /// Run a search and report which sources answered and which failed.
    ///
    /// With a single-source selection a failure is returned as
    /// [`SearchError::SourceUnavailable`]. In a fan-out, failures are
    /// recorded in [`SearchReport::failures`] and the remaining sources'
    /// results are still returned.
    pub async fn search_detailed(
        &self,
        kind: SearchKind,
        query: &SearchQuery,
    ) -> Result<SearchReport, SearchError> {
        let term = validate_term(&query.term)?;
        if query.max_results == 0 {
            return Err(SearchError::InvalidQuery(
                "max_results must be at least 1".to_string(),
            ));
        }

        let single = query.selection.is_single();
        let capability = match kind {
            SearchKind::Title => SourceCapabilities::TITLE_SEARCH,
            SearchKind::Author => SourceCapabilities::AUTHOR_SEARCH,
        };

        let mut sources = self.select(&query.selection, &self.settings.search_order)?;
        if !single {
            sources.retain(|s| s.capabilities().contains(capability));
            if sources.is_empty() {
                return Err(SearchError::NoSources);
            }
        }

        tracing::debug!(
            "Searching {} by {} '{}' (max {}, {})",
            sources.len(),
            kind,
            term,
            query.max_results,
            query.sort.as_str()
        );

        let calls = sources.iter().map(|source| {
            let source = Arc::clone(source);
            async move {
                let outcome = self
                    .bounded(source.as_ref(), async {
                        match kind {
                            SearchKind::Title => {
                                source
                                    .search_by_title(term, query.max_results, query.sort)
                                    .await
                            }
                            SearchKind::Author => {
                                source
                                    .search_by_author(term, query.max_results, query.sort)
                                    .await
                            }
                        }
                    })
                    .await;
                (source, outcome)
            }
        });
        let outcomes = join_all(calls).await;

        let mut report = SearchReport::default();
        let mut merged: Vec<Book> = Vec::new();

        for (source, outcome) in outcomes {
            let source_id = source.source_id();
            match outcome {
                Ok(books) => {
                    tracing::debug!("{} returned {} books", source.name(), books.len());
                    merged.extend(books.into_iter().map(|b| b.tagged(source_id.clone())));
                    report.queried.push(source_id);
                }
                Err(error) if single => {
                    return Err(SearchError::SourceUnavailable { source_id, error });
                }
                Err(error) => {
                    if error.is_rate_limited() {
                        tracing::warn!("{} is rate limiting requests, skipping it", source.name());
                    } else {
                        tracing::warn!("Search failed for {}: {}", source.name(), error);
                    }
                    report.failures.push(SourceFailure {
                        source: source_id,
                        rate_limited: error.is_rate_limited(),
                        error: error.to_string(),
                    });
                }
            }
        }

        let merged_count = merged.len();
        let mut books = deduplicate_books(merged, &self.settings.priority);
        if query.sort == SortOrder::Newest {
            sort_newest_first(&mut books);
        }
        books.truncate(query.max_results);

        tracing::info!(
            "Found {} books ({} before dedup) from {} of {} sources",
            books.len(),
            merged_count,
            report.queried.len(),
            report.queried.len() + report.failures.len()
        );

        report.books = books;
        Ok(report)
    }

    /// Look up a book by ISBN.
    ///
    /// With [`SourceSelection::All`] the sources are tried in the configured
    /// ISBN order and the first hit is returned without querying the rest; a
    /// failing source is skipped. With a single source its failure is
    /// returned as [`SearchError::SourceUnavailable`].
    pub async fn fetch_by_isbn(
        &self,
        isbn: &str,
        selection: SourceSelection,
    ) -> Result<Option<Book>, SearchError> {
        if clean_isbn(isbn).is_empty() {
            return Err(SearchError::InvalidQuery(format!(
                "'{}' is not an ISBN",
                isbn.trim()
            )));
        }
        let isbn = isbn.trim();

        let single = selection.is_single();
        let mut sources = self.select(&selection, &self.settings.isbn_order)?;
        if !single {
            sources.retain(|s| s.supports_isbn_lookup());
            if sources.is_empty() {
                return Err(SearchError::NoSources);
            }
        }

        for source in sources {
            let source_id = source.source_id();
            match self.bounded(source.as_ref(), source.fetch_by_isbn(isbn)).await {
                Ok(Some(book)) => {
                    tracing::debug!("ISBN {} found in {}", isbn, source.name());
                    return Ok(Some(book.tagged(source_id)));
                }
                Ok(None) => {
                    tracing::debug!("ISBN {} not found in {}", isbn, source.name());
                }
                Err(error) if single => {
                    return Err(SearchError::SourceUnavailable { source_id, error });
                }
                Err(error) => {
                    if error.is_rate_limited() {
                        tracing::warn!("{} is rate limiting requests, trying next source", source.name());
                    } else {
                        tracing::warn!("ISBN lookup failed for {}: {}", source.name(), error);
                    }
                }
            }
        }

        Ok(None)
    }

    fn select(
        &self,
        selection: &SourceSelection,
        order: &[SourceId],
    ) -> Result<Vec<Arc<dyn Source>>, SearchError> {
        match selection {
            SourceSelection::All => {
                let sources = self.registry.ordered(order);
                if sources.is_empty() {
                    Err(SearchError::NoSources)
                } else {
                    Ok(sources)
                }
            }
            SourceSelection::Only(id) => self
                .registry
                .get(id.id())
                .map(|source| vec![Arc::clone(source)])
                .ok_or_else(|| SearchError::UnknownSource(id.id().to_string())),
        }
    }

    async fn bounded<T, F>(&self, source: &dyn Source, call: F) -> Result<T, SourceError>
    where
        F: Future<Output = Result<T, SourceError>>,
    {
        let limit = self.settings.source_timeout;
        match tokio::time::timeout(limit, call).await {
            Ok(result) => result,
            Err(_) => Err(SourceError::Timeout(format!(
                "{} did not answer within {:?}",
                source.name(),
                limit
            ))),
        }
    }
}

fn validate_term(term: &str) -> Result<&str, SearchError> {
    let trimmed = term.trim();
    if trimmed.is_empty() {
        return Err(SearchError::InvalidQuery(
            "search term must not be empty".to_string(),
        ));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_term() {
        assert_eq!(validate_term("  ワンピース "), Ok("ワンピース"));
        assert!(matches!(validate_term(""), Err(SearchError::InvalidQuery(_))));
        assert!(matches!(validate_term(" \t "), Err(SearchError::InvalidQuery(_))));
    }

    #[test]
    fn test_settings_from_config() {
        let settings = SearchSettings::default();
        assert_eq!(
            settings.search_order,
            vec![SourceId::GoogleBooks, SourceId::Rakuten, SourceId::Ndl]
        );
        assert_eq!(settings.isbn_order[0], SourceId::Ndl);
        assert_eq!(settings.priority.preferred(), Some(&SourceId::Rakuten));
        assert_eq!(settings.source_timeout, Duration::from_secs(20));
    }

    #[test]
    fn test_rate_limited_error() {
        let err = SearchError::SourceUnavailable {
            source_id: SourceId::Rakuten,
            error: SourceError::RateLimited,
        };
        assert!(err.is_rate_limited());
        assert_eq!(
            err.to_string(),
            "Rakuten Books is unavailable: Rate limit exceeded"
        );
        assert!(!SearchError::NoSources.is_rate_limited());
    }
}
