//! Fetched pages and the documents assembled from them.

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use doc_parser::{ApiEndpoint, CodeExample, PageParser, ParseError};
use serde::{Deserialize, Serialize};
use url::Url;

/// Section assigned to pages at the site root.
pub const ROOT_SECTION: &str = "root";
/// Slug used when a page has no path segments past its section.
pub const INDEX_SLUG: &str = "index";

/// Raw response body plus fetch metadata.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// URL that was requested.
    pub url: Url,
    /// HTTP status code.
    pub status: u16,
    /// Decoded response body.
    pub body: String,
    /// True when the body was not valid UTF-8.
    pub lossy_decoding: bool,
    /// Fetch completion time.
    pub fetched_at: DateTime<Utc>,
}

impl FetchedPage {
    /// Builds a page from raw body bytes.
    pub fn new(url: Url, status: u16, body: &[u8]) -> Self {
        let (decoded, lossy) = decode_body(body);
        Self {
            url,
            status,
            body: decoded.into_owned(),
            lossy_decoding: lossy,
            fetched_at: Utc::now(),
        }
    }
}

/// Decodes UTF-8, falling back to lossy replacement.
pub fn decode_body(bytes: &[u8]) -> (Cow<'_, str>, bool) {
    match std::str::from_utf8(bytes) {
        Ok(text) => (Cow::Borrowed(text), false),
        Err(_) => (
            Cow::Owned(String::from_utf8_lossy(bytes).into_owned()),
            true,
        ),
    }
}

/// A fully extracted documentation page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Canonical page URL.
    pub url: String,
    /// URL path component.
    pub path: String,
    /// Page title.
    pub title: String,
    /// Meta description, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Cleaned markdown body.
    pub content: String,
    /// Code examples in page order.
    #[serde(default)]
    pub code_examples: Vec<CodeExample>,
    /// First path segment, or [`ROOT_SECTION`].
    pub section: String,
    /// Second path segment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subsection: Option<String>,
    /// Endpoint metadata for API reference pages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_endpoint: Option<ApiEndpoint>,
    /// When the page was fetched.
    pub fetched_at: DateTime<Utc>,
}

impl Document {
    /// Runs `parser` over `page` and assembles the result.
    pub fn assemble(page: &FetchedPage, parser: &PageParser) -> Result<Self, ParseError> {
        let parsed = parser.parse(&page.body)?;
        let (section, subsection) = section_for(&page.url);
        Ok(Self {
            url: page.url.to_string(),
            path: page.url.path().to_string(),
            title: parsed.title,
            description: parsed.description,
            content: parsed.markdown,
            code_examples: parsed.code_examples,
            section,
            subsection,
            api_endpoint: parsed.api_endpoint,
            fetched_at: page.fetched_at,
        })
    }

    /// File stem used under the section directory.
    pub fn slug(&self) -> String {
        Url::parse(&self.url)
            .map(|url| slug_for(&url))
            .unwrap_or_else(|_| INDEX_SLUG.to_string())
    }
}

fn segments(url: &Url) -> Vec<&str> {
    url.path_segments()
        .map(|parts| parts.filter(|part| !part.is_empty()).collect())
        .unwrap_or_default()
}

/// Derives `(section, subsection)` from the URL path.
pub fn section_for(url: &Url) -> (String, Option<String>) {
    let parts = segments(url);
    let section = parts
        .first()
        .map(|part| part.to_string())
        .unwrap_or_else(|| ROOT_SECTION.to_string());
    let subsection = parts.get(1).map(|part| part.to_string());
    (section, subsection)
}

/// Joins the path segments after the section with `-`.
pub fn slug_for(url: &Url) -> String {
    let parts = segments(url);
    if parts.len() <= 1 {
        return INDEX_SLUG.to_string();
    }
    sanitize_component(&parts[1..].join("-"))
}

/// Replaces characters that are awkward in file names.
pub fn sanitize_component(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.') {
                ch
            } else {
                '-'
            }
        })
        .collect();
    let trimmed = cleaned.trim_matches(|ch| ch == '-' || ch == '.');
    if trimmed.is_empty() {
        INDEX_SLUG.to_string()
    } else {
        trimmed.to_string()
    }
}
