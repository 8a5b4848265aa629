//! Core data models for book records and search operations.

mod book;
mod search;

pub use book::{Book, BookBuilder, SourceId};
pub use search::{
    SearchKind, SearchQuery, SearchReport, SortOrder, SourceFailure, SourceSelection,
    DEFAULT_MAX_RESULTS,
};
