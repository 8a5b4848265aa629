//! Book model representing a search hit from any catalog.

use serde::{Deserialize, Serialize};

/// The catalog a book record was found in
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceId {
    GoogleBooks,
    Ndl,
    Rakuten,
    #[serde(untagged)]
    Other(String),
}

impl SourceId {
    /// Returns the display name of the source
    pub fn name(&self) -> &str {
        match self {
            SourceId::GoogleBooks => "Google Books",
            SourceId::Ndl => "NDL Search",
            SourceId::Rakuten => "Rakuten Books",
            SourceId::Other(s) => s,
        }
    }

    /// Returns the source identifier (used in configuration and on the command line)
    pub fn id(&self) -> &str {
        match self {
            SourceId::GoogleBooks => "google_books",
            SourceId::Ndl => "ndl",
            SourceId::Rakuten => "rakuten",
            SourceId::Other(s) => s,
        }
    }

    /// Parse a source identifier. Unknown identifiers become [`SourceId::Other`].
    pub fn from_id(id: &str) -> Self {
        match id.trim().to_lowercase().as_str() {
            "google_books" | "google" | "googlebooks" => SourceId::GoogleBooks,
            "ndl" => SourceId::Ndl,
            "rakuten" => SourceId::Rakuten,
            other => SourceId::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A book found in one of the configured catalogs
///
/// Every field carries a concrete value: missing upstream data becomes an
/// empty string, `0` or an empty list, so records from different catalogs can
/// be merged and displayed uniformly. Records are built by the adapters
/// through [`BookBuilder`] and live only for one search response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    /// Catalog-native identifier, or a source-prefixed synthetic one
    pub id: String,

    pub title: String,

    pub subtitle: String,

    /// Authors in catalog order
    pub authors: Vec<String>,

    pub publisher: String,

    /// `YYYY`, `YYYY-MM` or `YYYY-MM-DD` when the catalog provides it
    pub published_date: String,

    pub description: String,

    /// Number of pages, 0 if unknown
    pub page_count: u32,

    pub categories: Vec<String>,

    /// Language code as reported by the catalog
    pub language: String,

    pub isbn10: String,

    pub isbn13: String,

    pub cover_image: String,

    pub preview_link: String,

    pub info_link: String,

    /// Catalog that produced this record
    pub source_id: SourceId,
}

impl Book {
    /// Returns the best available ISBN (ISBN-13 preferred)
    pub fn isbn(&self) -> &str {
        if self.isbn13.is_empty() {
            &self.isbn10
        } else {
            &self.isbn13
        }
    }

    /// Returns the authors joined for display
    pub fn author_line(&self) -> String {
        self.authors.join(", ")
    }

    /// Returns a copy of this record attributed to `source`
    pub fn tagged(self, source: SourceId) -> Self {
        Self {
            source_id: source,
            ..self
        }
    }
}

/// Builder for constructing Book objects
#[derive(Debug, Clone)]
pub struct BookBuilder {
    book: Book,
}

impl BookBuilder {
    /// Create a new builder with the required fields; everything else starts empty
    pub fn new(id: impl Into<String>, title: impl Into<String>, source: SourceId) -> Self {
        Self {
            book: Book {
                id: id.into(),
                title: title.into(),
                subtitle: String::new(),
                authors: Vec::new(),
                publisher: String::new(),
                published_date: String::new(),
                description: String::new(),
                page_count: 0,
                categories: Vec::new(),
                language: String::new(),
                isbn10: String::new(),
                isbn13: String::new(),
                cover_image: String::new(),
                preview_link: String::new(),
                info_link: String::new(),
                source_id: source,
            },
        }
    }

    pub fn subtitle(mut self, subtitle: impl Into<String>) -> Self {
        self.book.subtitle = subtitle.into();
        self
    }

    pub fn authors<I, S>(mut self, authors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.book.authors = authors.into_iter().map(Into::into).collect();
        self
    }

    pub fn publisher(mut self, publisher: impl Into<String>) -> Self {
        self.book.publisher = publisher.into();
        self
    }

    pub fn published_date(mut self, date: impl Into<String>) -> Self {
        self.book.published_date = date.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.book.description = description.into();
        self
    }

    pub fn page_count(mut self, pages: u32) -> Self {
        self.book.page_count = pages;
        self
    }

    pub fn categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.book.categories = categories.into_iter().map(Into::into).collect();
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.book.language = language.into();
        self
    }

    /// Set both ISBN fields at once
    pub fn isbns(mut self, isbn10: impl Into<String>, isbn13: impl Into<String>) -> Self {
        self.book.isbn10 = isbn10.into();
        self.book.isbn13 = isbn13.into();
        self
    }

    pub fn cover_image(mut self, url: impl Into<String>) -> Self {
        self.book.cover_image = url.into();
        self
    }

    pub fn preview_link(mut self, url: impl Into<String>) -> Self {
        self.book.preview_link = url.into();
        self
    }

    pub fn info_link(mut self, url: impl Into<String>) -> Self {
        self.book.info_link = url.into();
        self
    }

    /// Build the Book
    pub fn build(self) -> Book {
        self.book
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults_are_empty_values() {
        let book = BookBuilder::new("vol-1", "", SourceId::Ndl).build();

        assert_eq!(book.id, "vol-1");
        assert_eq!(book.title, "");
        assert_eq!(book.subtitle, "");
        assert!(book.authors.is_empty());
        assert_eq!(book.publisher, "");
        assert_eq!(book.published_date, "");
        assert_eq!(book.description, "");
        assert_eq!(book.page_count, 0);
        assert!(book.categories.is_empty());
        assert_eq!(book.language, "");
        assert_eq!(book.isbn10, "");
        assert_eq!(book.isbn13, "");
        assert_eq!(book.cover_image, "");
        assert_eq!(book.preview_link, "");
        assert_eq!(book.info_link, "");
        assert_eq!(book.source_id, SourceId::Ndl);
    }

    #[test]
    fn test_builder_sets_fields() {
        let book = BookBuilder::new("abc", "Dune", SourceId::GoogleBooks)
            .authors(["Frank Herbert"])
            .published_date("1965-08-01")
            .page_count(412)
            .isbns("0441013597", "9780441013593")
            .build();

        assert_eq!(book.author_line(), "Frank Herbert");
        assert_eq!(book.page_count, 412);
        assert_eq!(book.isbn(), "9780441013593");
    }

    #[test]
    fn test_isbn_falls_back_to_isbn10() {
        let book = BookBuilder::new("abc", "Dune", SourceId::GoogleBooks)
            .isbns("0441013597", "")
            .build();
        assert_eq!(book.isbn(), "0441013597");
    }

    #[test]
    fn test_tagged_overwrites_source() {
        let book = BookBuilder::new("abc", "Dune", SourceId::Other("stray".into())).build();
        let tagged = book.tagged(SourceId::Rakuten);
        assert_eq!(tagged.source_id, SourceId::Rakuten);
        assert_eq!(tagged.title, "Dune");
    }

    #[test]
    fn test_serialized_field_names() {
        let book = BookBuilder::new("abc", "Dune", SourceId::GoogleBooks).build();
        let value = serde_json::to_value(&book).unwrap();

        for field in [
            "id",
            "title",
            "subtitle",
            "authors",
            "publisher",
            "publishedDate",
            "description",
            "pageCount",
            "categories",
            "language",
            "isbn10",
            "isbn13",
            "coverImage",
            "previewLink",
            "infoLink",
            "sourceId",
        ] {
            assert!(value.get(field).is_some(), "missing field {}", field);
        }
        assert_eq!(value["sourceId"], "google_books");
    }

    #[test]
    fn test_source_id_round_trip_names() {
        assert_eq!(SourceId::from_id("google_books"), SourceId::GoogleBooks);
        assert_eq!(SourceId::from_id(" NDL "), SourceId::Ndl);
        assert_eq!(SourceId::from_id("rakuten"), SourceId::Rakuten);
        assert_eq!(SourceId::from_id("mock"), SourceId::Other("mock".into()));
        assert_eq!(SourceId::Rakuten.id(), "rakuten");
        assert_eq!(SourceId::Ndl.to_string(), "NDL Search");
    }
}
