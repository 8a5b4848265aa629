//! Utility modules supporting catalog operations.
//!
//! - [`deduplicate_books`]: Collapse records describing the same book, honoring source priority
//! - [`HttpClient`]: HTTP client with per-source rate limiting and retries
//! - [`RetryConfig`] / [`with_retry`]: Exponential backoff for transient errors
//! - [`normalize_date`], [`classify_isbn`] and friends: Field normalization shared by the adapters
//!
//! # Deduplication
//!
//! ```rust
//! use bookshelf_search::models::{Book, SourceId};
//! use bookshelf_search::utils::{deduplicate_books, SourcePriority};
//!
//! # fn example(books: Vec<Book>) {
//! let priority = SourcePriority::new(vec![SourceId::Rakuten, SourceId::Ndl]);
//! let unique = deduplicate_books(books, &priority);
//! # }
//! ```

mod dedup;
mod http;
mod normalize;
mod retry;

pub use dedup::{dedup_key, deduplicate_books, DedupKey, SourcePriority};
pub use http::{status_error, HttpClient};
pub use normalize::{
    classify_isbn, clean_isbn, compare_newest_first, extract_typed_isbns, isbn10_to_isbn13,
    normalize_date, parse_published_date, sort_newest_first,
};
pub use retry::{with_retry, RetryConfig, TransientError};
