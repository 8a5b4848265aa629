//! Rakuten Books catalog implementation.
//!
//! Uses the Rakuten Books book search API (`BooksBook/Search`). An
//! application id is required; the registry only builds this source when one
//! is configured.

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use crate::config::Config;
use crate::models::{Book, BookBuilder, SortOrder, SourceId};
use crate::sources::{clamp_page_size, null_as_default, Source, SourceCapabilities, SourceError};
use crate::utils::{classify_isbn, clean_isbn, isbn10_to_isbn13, normalize_date, HttpClient};

/// Rakuten returns at most 30 items per page
const MAX_PAGE_SIZE: usize = 30;

/// Rakuten Books catalog
#[derive(Debug, Clone)]
pub struct RakutenSource {
    client: HttpClient,
    endpoint: Url,
    application_id: String,
}

impl RakutenSource {
    pub fn new(config: &Config) -> Result<Self, SourceError> {
        let application_id = config
            .api_keys
            .rakuten()
            .ok_or_else(|| {
                SourceError::InvalidRequest("Rakuten application id is not configured".to_string())
            })?
            .to_string();

        let endpoint = Url::parse(&config.endpoints.rakuten).map_err(|e| {
            SourceError::InvalidRequest(format!("Invalid Rakuten endpoint: {}", e))
        })?;

        Ok(Self {
            client: HttpClient::new(&config.http)?.with_rate_limit(config.rate_limits.rakuten),
            endpoint,
            application_id,
        })
    }

    fn build_url(&self, field: &str, value: &str, hits: usize, sort: Option<SortOrder>) -> Url {
        let mut url = self.endpoint.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("applicationId", &self.application_id)
                .append_pair("format", "json")
                .append_pair("formatVersion", "2")
                .append_pair(field, value)
                .append_pair("hits", &hits.to_string());
            if let Some(sort) = sort {
                pairs.append_pair("sort", sort_param(sort));
            }
        }
        url
    }

    async fn query(&self, url: Url) -> Result<Vec<Book>, SourceError> {
        tracing::debug!("Querying Rakuten Books: {}", url.path());

        let data: SearchResponse = match self.client.get_json(&url).await {
            Ok(data) => data,
            // "not_found" is how Rakuten reports zero hits
            Err(SourceError::Api { status: 404, message }) if message.contains("not_found") => {
                tracing::debug!("Rakuten Books returned no items");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        tracing::debug!(
            "Rakuten Books returned {} of {} items",
            data.items.len(),
            data.count
        );
        Ok(data
            .items
            .into_iter()
            .enumerate()
            .map(|(position, item)| parse_item(item, position))
            .collect())
    }

    async fn search(
        &self,
        field: &str,
        term: &str,
        max_results: usize,
        sort: SortOrder,
    ) -> Result<Vec<Book>, SourceError> {
        let url = self.build_url(
            field,
            term.trim(),
            clamp_page_size(max_results, MAX_PAGE_SIZE),
            Some(sort),
        );
        self.query(url).await
    }
}

fn sort_param(sort: SortOrder) -> &'static str {
    match sort {
        SortOrder::Newest => "-releaseDate",
        SortOrder::Relevance => "standard",
    }
}

#[async_trait]
impl Source for RakutenSource {
    fn id(&self) -> &str {
        "rakuten"
    }

    fn source_id(&self) -> SourceId {
        SourceId::Rakuten
    }

    fn name(&self) -> &str {
        "Rakuten Books"
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::TITLE_SEARCH
            | SourceCapabilities::AUTHOR_SEARCH
            | SourceCapabilities::ISBN_LOOKUP
            | SourceCapabilities::NATIVE_SORT
    }

    fn max_page_size(&self) -> usize {
        MAX_PAGE_SIZE
    }

    async fn search_by_title(
        &self,
        term: &str,
        max_results: usize,
        sort: SortOrder,
    ) -> Result<Vec<Book>, SourceError> {
        self.search("title", term, max_results, sort).await
    }

    async fn search_by_author(
        &self,
        term: &str,
        max_results: usize,
        sort: SortOrder,
    ) -> Result<Vec<Book>, SourceError> {
        self.search("author", term, max_results, sort).await
    }

    async fn fetch_by_isbn(&self, isbn: &str) -> Result<Option<Book>, SourceError> {
        let cleaned = clean_isbn(isbn);
        // Rakuten only indexes ISBN-13
        let isbn13 = match cleaned.len() {
            13 => cleaned,
            10 => match isbn10_to_isbn13(&cleaned) {
                Some(converted) => converted,
                None => return Ok(None),
            },
            _ => return Ok(None),
        };

        let url = self.build_url("isbn", &isbn13, 1, None);
        Ok(self.query(url).await?.into_iter().next())
    }
}

/// Map one item to a [`Book`], defaulting every missing field
fn parse_item(item: Item, position: usize) -> Book {
    let (isbn10, isbn13) = classify_isbn(&item.isbn);
    let isbn = if isbn13.is_empty() { &isbn10 } else { &isbn13 };

    let id = if isbn.is_empty() {
        format!("rakuten-{}", position)
    } else {
        format!("rakuten-{}", isbn)
    };

    let authors = item
        .author
        .split('/')
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string)
        .collect::<Vec<_>>();

    let cover = [item.large_image_url, item.medium_image_url, item.small_image_url]
        .into_iter()
        .find(|u| !u.is_empty())
        .unwrap_or_default();

    let categories = if item.size.trim().is_empty() {
        Vec::new()
    } else {
        vec![item.size.trim().to_string()]
    };

    BookBuilder::new(id, item.title, SourceId::Rakuten)
        .subtitle(item.sub_title)
        .authors(authors)
        .publisher(item.publisher_name)
        .published_date(normalize_date(&item.sales_date))
        .description(item.item_caption)
        .categories(categories)
        .isbns(isbn10.clone(), isbn13.clone())
        .cover_image(cover)
        .preview_link(item.item_url.clone())
        .info_link(item.item_url)
        .build()
}

// Rakuten Books API response types (formatVersion=2)

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchResponse {
    #[serde(deserialize_with = "null_as_default")]
    count: u64,
    #[serde(rename = "Items", deserialize_with = "null_as_default")]
    items: Vec<Item>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct Item {
    #[serde(deserialize_with = "null_as_default")]
    title: String,
    #[serde(deserialize_with = "null_as_default")]
    sub_title: String,
    #[serde(deserialize_with = "null_as_default")]
    author: String,
    #[serde(deserialize_with = "null_as_default")]
    publisher_name: String,
    #[serde(deserialize_with = "null_as_default")]
    size: String,
    #[serde(deserialize_with = "null_as_default")]
    isbn: String,
    #[serde(deserialize_with = "null_as_default")]
    item_caption: String,
    #[serde(deserialize_with = "null_as_default")]
    sales_date: String,
    #[serde(deserialize_with = "null_as_default")]
    item_url: String,
    #[serde(deserialize_with = "null_as_default")]
    small_image_url: String,
    #[serde(deserialize_with = "null_as_default")]
    medium_image_url: String,
    #[serde(deserialize_with = "null_as_default")]
    large_image_url: String,
}
