//! Normalization helpers shared by the catalog adapters.
//!
//! Upstream catalogs disagree on identifier shapes and date formats. The
//! helpers here turn them into the conventions used by [`Book`]: ISBN-10 and
//! ISBN-13 as bare digit strings, dates as `YYYY`, `YYYY-MM` or `YYYY-MM-DD`.

use chrono::NaiveDate;
use regex::Regex;
use std::cmp::Ordering;
use std::sync::OnceLock;

use crate::models::Book;

/// Strip everything but digits and the ISBN-10 check character `X`
pub fn clean_isbn(input: &str) -> String {
    input
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == 'x' || *c == 'X')
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Classify an opaque identifier by length into `(isbn10, isbn13)`.
///
/// Length 13 fills the ISBN-13 slot, length 10 the ISBN-10 slot, anything
/// else leaves both empty.
pub fn classify_isbn(identifier: &str) -> (String, String) {
    let cleaned = clean_isbn(identifier);
    match cleaned.len() {
        13 => (String::new(), cleaned),
        10 => (cleaned, String::new()),
        _ => (String::new(), String::new()),
    }
}

/// Pick ISBNs out of a typed identifier list (`ISBN_10` / `ISBN_13` tags).
///
/// Untagged or unknown identifier types are ignored.
pub fn extract_typed_isbns<'a, I>(identifiers: I) -> (String, String)
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut isbn10 = String::new();
    let mut isbn13 = String::new();

    for (kind, identifier) in identifiers {
        match kind {
            "ISBN_10" => isbn10 = identifier.trim().to_string(),
            "ISBN_13" => isbn13 = identifier.trim().to_string(),
            _ => {}
        }
    }

    (isbn10, isbn13)
}

/// Convert an ISBN-10 to its ISBN-13 form (978 prefix)
pub fn isbn10_to_isbn13(isbn10: &str) -> Option<String> {
    let cleaned = clean_isbn(isbn10);
    if cleaned.len() != 10 {
        return None;
    }

    let mut digits: Vec<u32> = vec![9, 7, 8];
    for c in cleaned.chars().take(9) {
        digits.push(c.to_digit(10)?);
    }

    let sum: u32 = digits
        .iter()
        .enumerate()
        .map(|(i, d)| if i % 2 == 0 { *d } else { d * 3 })
        .sum();
    let check = (10 - (sum % 10)) % 10;

    let mut isbn13: String = digits.iter().map(|d| d.to_string()).collect();
    isbn13.push_str(&check.to_string());
    Some(isbn13)
}

fn date_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\D{0,2}(\d{4})(?:\s*[年./-]\s*(\d{1,2})(?:\s*[月./-]\s*(\d{1,2}))?)?")
            .expect("date pattern is valid")
    })
}

/// Normalize a catalog date string to `YYYY`, `YYYY-MM` or `YYYY-MM-DD`.
///
/// Handles ISO dates, dotted and slashed dates (`2021.5`, `2021/05/01`) and
/// Japanese dates (`2021年05月21日`, `2021年05月下旬`). Strings that do not
/// start with a year are returned trimmed and otherwise untouched.
pub fn normalize_date(raw: &str) -> String {
    let trimmed = raw.trim();
    let Some(caps) = date_pattern().captures(trimmed) else {
        return trimmed.to_string();
    };

    let year = &caps[1];
    let month = caps
        .get(2)
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .filter(|m| (1..=12).contains(m));
    let day = caps
        .get(3)
        .and_then(|d| d.as_str().parse::<u32>().ok())
        .filter(|d| (1..=31).contains(d));

    match (month, day) {
        (Some(m), Some(d)) => format!("{}-{:02}-{:02}", year, m, d),
        (Some(m), None) => format!("{}-{:02}", year, m),
        _ => year.to_string(),
    }
}

/// Parse a publication date for ordering.
///
/// Missing month or day default to the first. Returns `None` for empty or
/// unparseable input.
pub fn parse_published_date(raw: &str) -> Option<NaiveDate> {
    let normalized = normalize_date(raw);
    let mut parts = normalized.split('-');

    let year_part = parts.next()?;
    if year_part.len() != 4 {
        return None;
    }
    let year: i32 = year_part.parse().ok()?;
    let month: u32 = match parts.next() {
        Some(m) => m.parse().ok()?,
        None => 1,
    };
    let day: u32 = match parts.next() {
        Some(d) => d.parse().ok()?,
        None => 1,
    };

    NaiveDate::from_ymd_opt(year, month, day)
}

/// Compare two books newest-first; undated books sort after dated ones
pub fn compare_newest_first(a: &Book, b: &Book) -> Ordering {
    let date_a = parse_published_date(&a.published_date);
    let date_b = parse_published_date(&b.published_date);
    // Option orders None < Some, so reversing puts None last
    date_b.cmp(&date_a)
}

/// Sort books newest-first. The sort is stable: equal dates keep their order.
pub fn sort_newest_first(books: &mut [Book]) {
    books.sort_by(compare_newest_first);
}
