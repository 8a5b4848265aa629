//! # Bookshelf Search
//!
//! A multi-source book search client. Queries Google Books, the National
//! Diet Library and Rakuten Books, normalizes their answers into one
//! [`Book`] record, removes duplicates and orders the results.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`models`]: Core data structures (Book, SearchQuery, SearchReport, etc.)
//! - [`sources`]: Catalog adapters behind the [`Source`] trait
//! - [`aggregator`]: Fan-out, merge, dedup and ordering across sources
//! - [`utils`]: HTTP client, retries, deduplication and normalization helpers
//! - [`config`]: Configuration management
//!
//! ```rust,no_run
//! use bookshelf_search::{Config, SearchAggregator};
//! use bookshelf_search::models::{SortOrder, SourceSelection};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let aggregator = SearchAggregator::from_config(&Config::default())?;
//! let books = aggregator
//!     .search_by_title("ノルウェイの森", 20, SortOrder::Newest, SourceSelection::All)
//!     .await?;
//! for book in books {
//!     println!("{} ({})", book.title, book.source_id);
//! }
//! # Ok(())
//! # }
//! ```

pub mod aggregator;
pub mod config;
pub mod models;
pub mod sources;
pub mod utils;

// Re-export commonly used types
pub use aggregator::{SearchAggregator, SearchError, SearchSettings};
pub use config::Config;
pub use models::{Book, SourceId};
pub use sources::{Source, SourceError, SourceRegistry};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
