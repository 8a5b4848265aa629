//! Google Books catalog implementation.

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use crate::config::Config;
use crate::models::{Book, BookBuilder, SortOrder, SourceId};
use crate::sources::{clamp_page_size, null_as_default, Source, SourceCapabilities, SourceError};
use crate::utils::{extract_typed_isbns, HttpClient};

/// Google Books returns at most 40 volumes per request
const MAX_PAGE_SIZE: usize = 40;

/// Google Books catalog
///
/// Uses the public volumes API. An API key is optional; without one the
/// shared anonymous quota applies.
#[derive(Debug, Clone)]
pub struct GoogleBooksSource {
    client: HttpClient,
    volumes_url: Url,
    api_key: Option<String>,
    lang_restrict: String,
}

impl GoogleBooksSource {
    pub fn new(config: &Config) -> Result<Self, SourceError> {
        let base = config.endpoints.google_books.trim_end_matches('/');
        let volumes_url = Url::parse(&format!("{}/volumes", base)).map_err(|e| {
            SourceError::InvalidRequest(format!("Invalid Google Books endpoint: {}", e))
        })?;

        Ok(Self {
            client: HttpClient::new(&config.http)?.with_rate_limit(config.rate_limits.google_books),
            volumes_url,
            api_key: config.api_keys.google().map(str::to_string),
            lang_restrict: config.google_books.lang_restrict.trim().to_string(),
        })
    }

    fn build_url(&self, q: &str, max_results: usize, sort: Option<SortOrder>) -> Url {
        let mut url = self.volumes_url.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("q", q);
            pairs.append_pair("maxResults", &max_results.to_string());
            if let Some(sort) = sort {
                pairs.append_pair("orderBy", sort.as_str());
            }
            if !self.lang_restrict.is_empty() {
                pairs.append_pair("langRestrict", &self.lang_restrict);
            }
            if let Some(key) = &self.api_key {
                pairs.append_pair("key", key);
            }
        }
        url
    }

    async fn query_volumes(&self, url: Url) -> Result<Vec<Book>, SourceError> {
        tracing::debug!("Querying Google Books: {}", redact_key(&url));
        let data: VolumesResponse = self.client.get_json(&url).await?;
        tracing::debug!(
            "Google Books returned {} of {} volumes",
            data.items.len(),
            data.total_items
        );
        Ok(data
            .items
            .into_iter()
            .enumerate()
            .map(|(position, volume)| parse_volume(volume, position))
            .collect())
    }

    async fn search(
        &self,
        prefix: &str,
        term: &str,
        max_results: usize,
        sort: SortOrder,
    ) -> Result<Vec<Book>, SourceError> {
        let q = format!("{}:{}", prefix, term.trim());
        let url = self.build_url(&q, clamp_page_size(max_results, MAX_PAGE_SIZE), Some(sort));
        self.query_volumes(url).await
    }
}

fn redact_key(url: &Url) -> String {
    let mut redacted = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let v = if k == "key" { "***".into() } else { v.into_owned() };
            (k.into_owned(), v)
        })
        .collect();
    redacted.query_pairs_mut().clear().extend_pairs(pairs);
    redacted.to_string()
}

#[async_trait]
impl Source for GoogleBooksSource {
    fn id(&self) -> &str {
        "google_books"
    }

    fn source_id(&self) -> SourceId {
        SourceId::GoogleBooks
    }

    fn name(&self) -> &str {
        "Google Books"
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
        self.search("intitle", term, max_results, sort).await
    }

    async fn search_by_author(
        &self,
        term: &str,
        max_results: usize,
        sort: SortOrder,
    ) -> Result<Vec<Book>, SourceError> {
        self.search("inauthor", term, max_results, sort).await
    }

    async fn fetch_by_isbn(&self, isbn: &str) -> Result<Option<Book>, SourceError> {
        let isbn = crate::utils::clean_isbn(isbn);
        if isbn.is_empty() {
            return Ok(None);
        }

        let url = self.build_url(&format!("isbn:{}", isbn), 1, None);
        Ok(self.query_volumes(url).await?.into_iter().next())
    }
}

/// Map one volume to a [`Book`], defaulting every missing field
fn parse_volume(volume: Volume, position: usize) -> Book {
    let info = volume.volume_info;
    let id = if volume.id.trim().is_empty() {
        format!("google_books-{}", position)
    } else {
        volume.id
    };

    let (isbn10, isbn13) = extract_typed_isbns(
        info.industry_identifiers
            .iter()
            .map(|i| (i.kind.as_str(), i.identifier.as_str())),
    );

    let cover = info
        .image_links
        .map(|links| {
            if links.thumbnail.is_empty() {
                links.small_thumbnail
            } else {
                links.thumbnail
            }
        })
        .unwrap_or_default();

    BookBuilder::new(id, info.title, SourceId::GoogleBooks)
        .subtitle(info.subtitle)
        .authors(info.authors)
        .publisher(info.publisher)
        .published_date(info.published_date)
        .description(info.description)
        .page_count(info.page_count)
        .categories(info.categories)
        .language(info.language)
        .isbns(isbn10, isbn13)
        .cover_image(cover)
        .preview_link(info.preview_link)
        .info_link(info.info_link)
        .build()
}

// Google Books API response types

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct VolumesResponse {
    #[serde(deserialize_with = "null_as_default")]
    total_items: u64,
    #[serde(deserialize_with = "null_as_default")]
    items: Vec<Volume>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct Volume {
    #[serde(deserialize_with = "null_as_default")]
    id: String,
    #[serde(deserialize_with = "null_as_default")]
    volume_info: VolumeInfo,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct VolumeInfo {
    #[serde(deserialize_with = "null_as_default")]
    title: String,
    #[serde(deserialize_with = "null_as_default")]
    subtitle: String,
    #[serde(deserialize_with = "null_as_default")]
    authors: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    publisher: String,
    #[serde(deserialize_with = "null_as_default")]
    published_date: String,
    #[serde(deserialize_with = "null_as_default")]
    description: String,
    #[serde(deserialize_with = "null_as_default")]
    page_count: u32,
    #[serde(deserialize_with = "null_as_default")]
    categories: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    language: String,
    #[serde(deserialize_with = "null_as_default")]
    industry_identifiers: Vec<IndustryIdentifier>,
    image_links: Option<ImageLinks>,
    #[serde(deserialize_with = "null_as_default")]
    preview_link: String,
    #[serde(deserialize_with = "null_as_default")]
    info_link: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct IndustryIdentifier {
    #[serde(rename = "type", deserialize_with = "null_as_default")]
    kind: String,
    #[serde(deserialize_with = "null_as_default")]
    identifier: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ImageLinks {
    #[serde(deserialize_with = "null_as_default")]
    small_thumbnail: String,
    #[serde(deserialize_with = "null_as_default")]
    thumbnail: String,
}
