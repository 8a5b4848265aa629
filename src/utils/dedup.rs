//! Deduplication of book records across catalogs.
//!
//! Two records describe the same book when they share a non-empty ISBN-13,
//! or, lacking one, the same title and author list. When duplicates collide
//! the record from the higher-priority source survives; otherwise the first
//! one seen is kept. Survivors stay at the position where their key first
//! appeared.

use std::collections::HashMap;

use crate::models::{Book, SourceId};

/// Ordering of sources used to break ties between duplicate records.
///
/// The first source in the list is the preferred one. Sources missing from
/// the list rank below every listed source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourcePriority {
    order: Vec<SourceId>,
}

impl SourcePriority {
    pub fn new(order: Vec<SourceId>) -> Self {
        Self { order }
    }

    /// The source whose records win every tie
    pub fn preferred(&self) -> Option<&SourceId> {
        self.order.first()
    }

    /// Position of `source` in the priority list; lower wins
    pub fn rank(&self, source: &SourceId) -> usize {
        self.order
            .iter()
            .position(|s| s == source)
            .unwrap_or(self.order.len())
    }
}

/// Identity of a book for deduplication purposes
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DedupKey {
    Isbn13(String),
    TitleAuthors { title: String, authors: String },
    /// Records with neither ISBN-13 nor title nor authors are never merged
    Unkeyed(usize),
}

fn fold_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Derive the deduplication key for the record at `position`
pub fn dedup_key(book: &Book, position: usize) -> DedupKey {
    let isbn13 = book.isbn13.trim();
    if !isbn13.is_empty() {
        return DedupKey::Isbn13(isbn13.to_string());
    }

    let title = fold_text(&book.title);
    let authors = book
        .authors
        .iter()
        .map(|a| fold_text(a))
        .collect::<Vec<_>>()
        .join("; ");

    if title.is_empty() && authors.is_empty() {
        return DedupKey::Unkeyed(position);
    }

    DedupKey::TitleAuthors { title, authors }
}

/// Remove duplicate books, keeping one record per key.
///
/// A later duplicate replaces the kept record only when its source ranks
/// strictly higher in `priority`. The output preserves first-appearance
/// order, and running it twice changes nothing.
pub fn deduplicate_books(books: Vec<Book>, priority: &SourcePriority) -> Vec<Book> {
    let mut kept: Vec<Book> = Vec::with_capacity(books.len());
    let mut index: HashMap<DedupKey, usize> = HashMap::new();

    for (position, book) in books.into_iter().enumerate() {
        let key = dedup_key(&book, position);
        match index.get(&key) {
            Some(&slot) => {
                if priority.rank(&book.source_id) < priority.rank(&kept[slot].source_id) {
                    tracing::trace!(
                        "Replacing {} record {} with {} record {}",
                        kept[slot].source_id.id(),
                        kept[slot].id,
                        book.source_id.id(),
                        book.id
                    );
                    kept[slot] = book;
                }
            }
            None => {
                index.insert(key, kept.len());
                kept.push(book);
            }
        }
    }

    kept
}
