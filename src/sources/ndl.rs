//! National Diet Library Search (NDL Search) catalog implementation.
//!
//! NDL exposes an OpenSearch endpoint that answers with an RSS 2.0 document
//! enriched with Dublin Core (`dc:`) and NDL (`dcndl:`) elements. The API
//! has no ordering parameter, so results are sorted client-side.

use async_trait::async_trait;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use url::Url;

use crate::config::Config;
use crate::models::{Book, BookBuilder, SortOrder, SourceId};
use crate::sources::{clamp_page_size, Source, SourceError};
use crate::utils::{classify_isbn, clean_isbn, normalize_date, sort_newest_first, HttpClient};

/// OpenSearch accepts up to 500 records per request
const MAX_PAGE_SIZE: usize = 500;

/// Subjects kept per record
const MAX_CATEGORIES: usize = 5;

/// NDL Search catalog
#[derive(Debug, Clone)]
pub struct NdlSource {
    client: HttpClient,
    endpoint: Url,
    thumbnail_base: String,
}

impl NdlSource {
    pub fn new(config: &Config) -> Result<Self, SourceError> {
        let endpoint = Url::parse(&config.endpoints.ndl)
            .map_err(|e| SourceError::InvalidRequest(format!("Invalid NDL endpoint: {}", e)))?;

        Ok(Self {
            client: HttpClient::new(&config.http)?.with_rate_limit(config.rate_limits.ndl),
            endpoint,
            thumbnail_base: config.endpoints.ndl_thumbnail.trim_end_matches('/').to_string(),
        })
    }

    async fn opensearch(
        &self,
        field: &str,
        value: &str,
        count: usize,
    ) -> Result<Vec<Book>, SourceError> {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("cnt", &count.to_string())
            .append_pair(field, value);

        tracing::debug!("Querying NDL Search: {}", url);
        let body = self.client.get_text(&url).await?;
        let books = parse_opensearch(&body, &self.thumbnail_base)?;
        tracing::debug!("NDL Search returned {} records", books.len());
        Ok(books)
    }

    async fn search(
        &self,
        field: &str,
        term: &str,
        max_results: usize,
        sort: SortOrder,
    ) -> Result<Vec<Book>, SourceError> {
        let mut books = self
            .opensearch(field, term.trim(), clamp_page_size(max_results, MAX_PAGE_SIZE))
            .await?;

        if sort == SortOrder::Newest {
            sort_newest_first(&mut books);
        }
        Ok(books)
    }
}

#[async_trait]
impl Source for NdlSource {
    fn id(&self) -> &str {
        "ndl"
    }

    fn source_id(&self) -> SourceId {
        SourceId::Ndl
    }

    fn name(&self) -> &str {
        "NDL Search"
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
        self.search("creator", term, max_results, sort).await
    }

    async fn fetch_by_isbn(&self, isbn: &str) -> Result<Option<Book>, SourceError> {
        let isbn = clean_isbn(isbn);
        if isbn.is_empty() {
            return Ok(None);
        }

        Ok(self.opensearch("isbn", &isbn, 1).await?.into_iter().next())
    }
}

/// Item element currently collecting text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    DcTitle,
    Link,
    Description,
    Creator,
    Publisher,
    Date,
    Issued,
    Subject,
    Language,
    Isbn,
}

impl Field {
    fn from_start(element: &BytesStart<'_>) -> Result<Option<Self>, SourceError> {
        let name = element.name();
        let field = match name.as_ref() {
            b"title" => Field::Title,
            b"dc:title" => Field::DcTitle,
            b"link" => Field::Link,
            b"description" => Field::Description,
            b"dc:creator" => Field::Creator,
            b"dc:publisher" => Field::Publisher,
            b"dc:date" => Field::Date,
            b"dcterms:issued" => Field::Issued,
            b"dc:subject" => Field::Subject,
            b"dc:language" => Field::Language,
            b"dc:identifier" => {
                if !is_isbn_identifier(element)? {
                    return Ok(None);
                }
                Field::Isbn
            }
            _ => return Ok(None),
        };
        Ok(Some(field))
    }
}

fn is_isbn_identifier(element: &BytesStart<'_>) -> Result<bool, SourceError> {
    let attr = element.try_get_attribute("xsi:type").map_err(xml_error)?;
    Ok(attr
        .map(|a| a.value.ends_with(b"ISBN"))
        .unwrap_or(false))
}

fn xml_error(err: impl std::fmt::Display) -> SourceError {
    SourceError::Parse(format!("XML: {}", err))
}

/// Raw text collected from one `<item>`
#[derive(Debug, Default)]
struct RawItem {
    title: String,
    dc_title: String,
    link: String,
    description: String,
    creators: Vec<String>,
    publisher: String,
    date: String,
    issued: String,
    subjects: Vec<String>,
    language: String,
    isbn: String,
}

impl RawItem {
    fn push(&mut self, field: Field, text: String) {
        let text = text.trim().to_string();
        if text.is_empty() {
            return;
        }

        // Scalar fields keep the first occurrence
        let keep_first = |slot: &mut String, text: String| {
            if slot.is_empty() {
                *slot = text;
            }
        };

        match field {
            Field::Title => keep_first(&mut self.title, text),
            Field::DcTitle => keep_first(&mut self.dc_title, text),
            Field::Link => keep_first(&mut self.link, text),
            Field::Description => keep_first(&mut self.description, text),
            Field::Creator => self.creators.push(text),
            Field::Publisher => keep_first(&mut self.publisher, text),
            Field::Date => keep_first(&mut self.date, text),
            Field::Issued => keep_first(&mut self.issued, text),
            Field::Subject => self.subjects.push(text),
            Field::Language => keep_first(&mut self.language, text),
            Field::Isbn => keep_first(&mut self.isbn, text),
        }
    }

    fn into_book(self, position: usize, thumbnail_base: &str) -> Book {
        let (isbn10, isbn13) = classify_isbn(&self.isbn);
        let isbn = if isbn13.is_empty() { &isbn10 } else { &isbn13 };

        let id = self
            .link
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|segment| !segment.is_empty() && !segment.contains(':'))
            .map(str::to_string)
            .unwrap_or_else(|| {
                if isbn.is_empty() {
                    format!("ndl-{}", position)
                } else {
                    format!("ndl-{}", isbn)
                }
            });

        let cover = if isbn.is_empty() {
            String::new()
        } else {
            format!("{}/{}.jpg", thumbnail_base, isbn)
        };

        let raw_title = if self.title.is_empty() { self.dc_title } else { self.title };
        let title = raw_title.replace(" / ", "").trim().to_string();

        let date = if self.date.is_empty() { self.issued } else { self.date };

        BookBuilder::new(id, title, SourceId::Ndl)
            .authors(self.creators)
            .publisher(self.publisher)
            .published_date(normalize_date(&date))
            .description(self.description)
            .categories(self.subjects.into_iter().take(MAX_CATEGORIES))
            .language(self.language)
            .isbns(isbn10.clone(), isbn13.clone())
            .cover_image(cover)
            .preview_link(self.link.clone())
            .info_link(self.link)
            .build()
    }
}

/// Parse an OpenSearch RSS document into books, in document order
fn parse_opensearch(xml: &str, thumbnail_base: &str) -> Result<Vec<Book>, SourceError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut books = Vec::new();
    let mut item: Option<RawItem> = None;
    let mut field: Option<Field> = None;
    let mut text = String::new();

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(e) => {
                if e.name().as_ref() == b"item" {
                    item = Some(RawItem::default());
                } else if item.is_some() {
                    field = Field::from_start(&e)?;
                    text.clear();
                }
            }
            Event::Text(t) => {
                if field.is_some() {
                    text.push_str(&t.unescape().map_err(xml_error)?);
                }
            }
            Event::CData(t) => {
                if field.is_some() {
                    text.push_str(&String::from_utf8_lossy(&t.into_inner()));
                }
            }
            Event::End(e) => {
                if e.name().as_ref() == b"item" {
                    if let Some(raw) = item.take() {
                        books.push(raw.into_book(books.len(), thumbnail_base));
                    }
                    field = None;
                } else if let (Some(current), Some(raw)) = (field.take(), item.as_mut()) {
                    raw.push(current, std::mem::take(&mut text));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(books)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    const THUMBNAILS: &str = "https://ndlsearch.ndl.go.jp/thumbnail";

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss xmlns:dc="http://purl.org/dc/elements/1.1/"
     xmlns:dcterms="http://purl.org/dc/terms/"
     xmlns:dcndl="http://ndl.go.jp/dcndl/terms/"
     xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
     version="2.0">
  <channel>
    <title>ノルウェイの森 - 国立国会図書館サーチ OpenSearch</title>
    <link>https://ndlsearch.ndl.go.jp/api/opensearch?title=x</link>
    <description>Search results</description>
    <item>
      <title>ノルウェイの森 / 上</title>
      <link>https://ndlsearch.ndl.go.jp/books/R100000002-I000007433131</link>
      <description><![CDATA[<p>講談社文庫</p>]]></description>
      <dc:title>ノルウェイの森</dc:title>
      <dc:creator>村上, 春樹, 1949-</dc:creator>
      <dc:creator>Murakami &amp; Co.</dc:creator>
      <dc:publisher>講談社</dc:publisher>
      <dcterms:issued xsi:type="dcterms:W3CDTF">2004</dcterms:issued>
      <dc:subject>小説</dc:subject>
      <dc:subject>日本文学</dc:subject>
      <dc:subject>現代</dc:subject>
      <dc:subject>恋愛</dc:subject>
      <dc:subject>青春</dc:subject>
      <dc:subject xsi:type="dcndl:NDC9">913.6</dc:subject>
      <dc:identifier xsi:type="dcndl:JPNO">20704063</dc:identifier>
      <dc:identifier xsi:type="dcndl:ISBN">978-4-06-274868-1</dc:identifier>
      <dc:language xsi:type="dcterms:ISO639-2">jpn</dc:language>
      <dc:date xsi:type="dcterms:W3CDTF">2004.9</dc:date>
    </item>
    <item>
      <title>ノルウェイの森</title>
      <link>https://ndlsearch.ndl.go.jp/books/R100000002-I000002004449</link>
      <dc:creator>村上春樹</dc:creator>
      <dc:date>2010.12</dc:date>
      <dc:identifier xsi:type="dcndl:ISBN">406203993X</dc:identifier>
    </item>
    <item>
      <title>書名なし</title>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn test_parse_opensearch_items() {
        let books = parse_opensearch(RSS, THUMBNAILS).unwrap();
        assert_eq!(books.len(), 3);

        let first = &books[0];
        assert_eq!(first.id, "R100000002-I000007433131");
        assert_eq!(first.title, "ノルウェイの森上");
        assert_eq!(first.authors, vec!["村上, 春樹, 1949-", "Murakami & Co."]);
        assert_eq!(first.publisher, "講談社");
        assert_eq!(first.published_date, "2004-09");
        assert_eq!(first.description, "<p>講談社文庫</p>");
        assert_eq!(first.categories.len(), 5);
        assert_eq!(first.categories[0], "小説");
        assert_eq!(first.language, "jpn");
        assert_eq!(first.isbn13, "9784062748681");
        assert_eq!(first.isbn10, "");
        assert_eq!(
            first.cover_image,
            "https://ndlsearch.ndl.go.jp/thumbnail/9784062748681.jpg"
        );
        assert_eq!(first.info_link, first.preview_link);
        assert_eq!(first.source_id, SourceId::Ndl);

        let second = &books[1];
        assert_eq!(second.isbn10, "406203993X");
        assert_eq!(second.isbn13, "");
        assert_eq!(second.published_date, "2010-12");
    }

    #[test]
    fn test_missing_fields_default_to_zero_values() {
        let books = parse_opensearch(RSS, THUMBNAILS).unwrap();
        let bare = &books[2];

        assert_eq!(bare.id, "ndl-2");
        assert_eq!(bare.title, "書名なし");
        assert!(bare.authors.is_empty());
        assert_eq!(bare.publisher, "");
        assert_eq!(bare.published_date, "");
        assert_eq!(bare.page_count, 0);
        assert!(bare.categories.is_empty());
        assert_eq!(bare.language, "");
        assert_eq!(bare.isbn10, "");
        assert_eq!(bare.isbn13, "");
        assert_eq!(bare.cover_image, "");
        assert_eq!(bare.info_link, "");
    }

    #[test]
    fn test_channel_fields_are_ignored() {
        let empty = r#"<rss><channel><title>nothing</title><link>x</link></channel></rss>"#;
        assert!(parse_opensearch(empty, THUMBNAILS).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_xml_is_parse_error() {
        let broken = "<rss><channel><item><title>x</titl></item></channel></rss>";
        assert!(matches!(
            parse_opensearch(broken, THUMBNAILS),
            Err(SourceError::Parse(_))
        ));
    }

    fn source_for(server: &mockito::Server) -> NdlSource {
        let mut config = Config::default();
        config.endpoints.ndl = format!("{}/api/opensearch", server.url());
        config.http.max_attempts = 1;
        config.rate_limits.ndl = 0.0;
        NdlSource::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_search_by_title_sorts_newest_first() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/opensearch")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("cnt".into(), "500".into()),
                Matcher::UrlEncoded("title".into(), "ノルウェイの森".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/rss+xml")
            .with_body(RSS)
            .create_async()
            .await;

        let source = source_for(&server);
        let books = source
            .search_by_title("ノルウェイの森", 1000, SortOrder::Newest)
            .await
            .unwrap();

        mock.assert_async().await;
        let dates: Vec<&str> = books.iter().map(|b| b.published_date.as_str()).collect();
        assert_eq!(dates, vec!["2010-12", "2004-09", ""]);
    }

    #[tokio::test]
    async fn test_relevance_keeps_upstream_order() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/opensearch")
            .match_query(Matcher::UrlEncoded("creator".into(), "村上春樹".into()))
            .with_status(200)
            .with_body(RSS)
            .create_async()
            .await;

        let source = source_for(&server);
        let books = source
            .search_by_author("村上春樹", 20, SortOrder::Relevance)
            .await
            .unwrap();

        let dates: Vec<&str> = books.iter().map(|b| b.published_date.as_str()).collect();
        assert_eq!(dates, vec!["2004-09", "2010-12", ""]);
    }

    #[tokio::test]
    async fn test_fetch_by_isbn() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/opensearch")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("cnt".into(), "1".into()),
                Matcher::UrlEncoded("isbn".into(), "9784062748681".into()),
            ]))
            .with_status(200)
            .with_body(RSS)
            .create_async()
            .await;

        let source = source_for(&server);
        let book = source.fetch_by_isbn("978-4-06-274868-1").await.unwrap();
        assert_eq!(book.map(|b| b.isbn13), Some("9784062748681".to_string()));
    }

    #[tokio::test]
    async fn test_server_error_is_reported() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/opensearch")
            .match_query(Matcher::Any)
            .with_status(503)
            .create_async()
            .await;

        let source = source_for(&server);
        assert!(matches!(
            source.search_by_title("x", 10, SortOrder::Newest).await,
            Err(SourceError::Api { status: 503, .. })
        ));
    }
}
