//! Mock source for testing purposes.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::models::{Book, BookBuilder, SortOrder, SourceId};
use crate::sources::{clamp_page_size, Source, SourceCapabilities, SourceError};

/// A mock catalog that returns predefined books and counts its calls.
#[derive(Debug)]
pub struct MockSource {
    id: String,
    name: String,
    source_id: SourceId,
    capabilities: SourceCapabilities,
    max_page_size: usize,
    title_results: Vec<Book>,
    author_results: Vec<Book>,
    isbn_result: Option<Book>,
    failure: Option<SourceError>,
    delay: Option<Duration>,
    search_calls: AtomicUsize,
    isbn_calls: AtomicUsize,
    last_max_results: AtomicUsize,
}

impl MockSource {
    /// Start building a mock source with the given id
    pub fn builder(id: &str) -> MockSourceBuilder {
        MockSourceBuilder::new(id)
    }

    /// Number of title or author searches received
    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    /// Number of ISBN lookups received
    pub fn isbn_calls(&self) -> usize {
        self.isbn_calls.load(Ordering::SeqCst)
    }

    /// `max_results` passed to the most recent search, 0 before any search
    pub fn last_max_results(&self) -> usize {
        self.last_max_results.load(Ordering::SeqCst)
    }

    async fn respond(
        &self,
        books: &[Book],
        max_results: usize,
    ) -> Result<Vec<Book>, SourceError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        self.last_max_results.store(max_results, Ordering::SeqCst);
        self.pause().await;

        if let Some(err) = &self.failure {
            return Err(err.clone());
        }

        let limit = clamp_page_size(max_results, self.max_page_size);
        Ok(books
            .iter()
            .take(limit)
            .cloned()
            .map(|b| b.tagged(self.source_id.clone()))
            .collect())
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl Source for MockSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn source_id(&self) -> SourceId {
        self.source_id.clone()
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> SourceCapabilities {
        self.capabilities
    }

    fn max_page_size(&self) -> usize {
        self.max_page_size
    }

    async fn search_by_title(
        &self,
        _term: &str,
        max_results: usize,
        _sort: SortOrder,
    ) -> Result<Vec<Book>, SourceError> {
        self.respond(&self.title_results, max_results).await
    }

    async fn search_by_author(
        &self,
        _term: &str,
        max_results: usize,
        _sort: SortOrder,
    ) -> Result<Vec<Book>, SourceError> {
        self.respond(&self.author_results, max_results).await
    }

    async fn fetch_by_isbn(&self, _isbn: &str) -> Result<Option<Book>, SourceError> {
        self.isbn_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;

        if let Some(err) = &self.failure {
            return Err(err.clone());
        }

        Ok(self
            .isbn_result
            .clone()
            .map(|b| b.tagged(self.source_id.clone())))
    }
}

/// Builder for [`MockSource`]
#[derive(Debug)]
pub struct MockSourceBuilder {
    source: MockSource,
}

impl MockSourceBuilder {
    fn new(id: &str) -> Self {
        let source_id = SourceId::from_id(id);
        Self {
            source: MockSource {
                id: id.to_string(),
                name: format!("Mock {}", id),
                source_id,
                capabilities: SourceCapabilities::TITLE_SEARCH
                    | SourceCapabilities::AUTHOR_SEARCH
                    | SourceCapabilities::ISBN_LOOKUP,
                max_page_size: 40,
                title_results: Vec::new(),
                author_results: Vec::new(),
                isbn_result: None,
                failure: None,
                delay: None,
                search_calls: AtomicUsize::new(0),
                isbn_calls: AtomicUsize::new(0),
                last_max_results: AtomicUsize::new(0),
            },
        }
    }

    /// Tag results with a specific source
    pub fn source_id(mut self, source_id: SourceId) -> Self {
        self.source.source_id = source_id;
        self
    }

    pub fn capabilities(mut self, capabilities: SourceCapabilities) -> Self {
        self.source.capabilities = capabilities;
        self
    }

    pub fn max_page_size(mut self, size: usize) -> Self {
        self.source.max_page_size = size;
        self
    }

    /// Books returned by title searches
    pub fn title_results(mut self, books: Vec<Book>) -> Self {
        self.source.title_results = books;
        self
    }

    /// Books returned by author searches
    pub fn author_results(mut self, books: Vec<Book>) -> Self {
        self.source.author_results = books;
        self
    }

    /// Book returned by ISBN lookups
    pub fn isbn_result(mut self, book: Book) -> Self {
        self.source.isbn_result = Some(book);
        self
    }

    /// Make every call fail with `error`
    pub fn failing(mut self, error: SourceError) -> Self {
        self.source.failure = Some(error);
        self
    }

    /// Delay every response
    pub fn delay(mut self, delay: Duration) -> Self {
        self.source.delay = Some(delay);
        self
    }

    pub fn build(self) -> MockSource {
        self.source
    }
}

/// Helper function to create a book for testing.
pub fn make_book(id: &str, title: &str, isbn13: &str, source: SourceId) -> Book {
    BookBuilder::new(id, title, source)
        .authors([format!("Author of {}", title)])
        .isbns("", isbn13)
        .published_date("2020-01-01")
        .build()
}

/// Create `count` distinct books with unique ISBNs under `prefix`.
pub fn make_books(prefix: &str, count: usize, source: SourceId) -> Vec<Book> {
    (0..count)
        .map(|n| {
            make_book(
                &format!("{}-{}", prefix, n),
                &format!("{} {}", prefix, n),
                &format!("978-{}-{}", prefix, n),
                source.clone(),
            )
        })
        .collect()
}
