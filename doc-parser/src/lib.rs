//! Extract structured content from documentation HTML pages.
//!
//! The crate focuses on Mintlify-style documentation: it strips site chrome,
//! picks the main content container, pulls out code examples and API endpoint
//! metadata, and renders the remaining tree as markdown.

use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod api;
pub mod clean;
pub mod code;
pub mod content;
pub mod markdown;

pub use api::{EndpointExtractor, HeuristicEndpointExtractor};
pub use clean::{clean_document, CleaningPass, CLEANING_PASSES};
pub use code::{detect_language, extract_code_examples, infer_language, CodeContext};
pub use content::{
    first_match, select_content_root, select_content_root_with, CONTENT_ROOT_SELECTORS,
};
pub use markdown::{normalize_markdown, render_markdown};

/// A code sample lifted verbatim from a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeExample {
    /// Normalized language tag (`"text"` when unknown).
    pub language: String,
    /// Exact text of the source element, whitespace included.
    pub code: String,
    /// Text of the paragraph or heading right before the block.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// One row of an endpoint parameter table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiParameter {
    /// Parameter name.
    pub name: String,
    /// Declared type column.
    #[serde(rename = "type")]
    pub param_type: String,
    /// Whether the table marks the parameter as required.
    pub required: bool,
    /// Free-form description column.
    pub description: String,
}

/// Best-effort description of an HTTP endpoint documented on a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEndpoint {
    /// Upper-case HTTP verb.
    pub method: String,
    /// Endpoint path or absolute URL.
    pub path: String,
    /// First paragraph of the page.
    pub description: String,
    /// Rows parsed from the parameter table.
    pub parameters: Vec<ApiParameter>,
    /// Example response body, when one is labelled as such.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_example: Option<String>,
}

/// Everything extracted from a single HTML page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedPage {
    /// Page title (first `h1`, then `<title>`).
    pub title: String,
    /// `<meta name="description">` content.
    pub description: Option<String>,
    /// Cleaned markdown body.
    pub markdown: String,
    /// Code examples in extraction order.
    pub code_examples: Vec<CodeExample>,
    /// Endpoint metadata when the page documents an API call.
    pub api_endpoint: Option<ApiEndpoint>,
}

/// Reasons a page produced no usable content.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The input had no markup at all.
    #[error("document is empty")]
    EmptyDocument,
    /// Cleaning left nothing with visible text.
    #[error("no content container with text found")]
    NoContent,
}

/// HTML to [`ParsedPage`] pipeline with a pluggable endpoint heuristic.
pub struct PageParser {
    endpoints: Option<Box<dyn EndpointExtractor>>,
}

impl PageParser {
    /// Parser with the default heuristic endpoint extractor.
    pub fn new() -> Self {
        Self {
            endpoints: Some(Box::new(HeuristicEndpointExtractor)),
        }
    }

    /// Parser that never reports API endpoints.
    pub fn without_endpoints() -> Self {
        Self { endpoints: None }
    }

    /// Replaces the endpoint extractor.
    pub fn with_endpoint_extractor(mut self, extractor: Box<dyn EndpointExtractor>) -> Self {
        self.endpoints = Some(extractor);
        self
    }

    /// Runs clean → root selection → code/API extraction → markdown.
    pub fn parse(&self, html: &str) -> Result<ParsedPage, ParseError> {
        if html.trim().is_empty() {
            return Err(ParseError::EmptyDocument);
        }

        let mut document = Html::parse_document(html);
        let description = meta_description(&document);
        clean::clean_document(&mut document);

        let root = select_content_root(&document).ok_or(ParseError::NoContent)?;
        let title = extract_title(&document, root);
        let code_examples = extract_code_examples(root);
        let api_endpoint = self
            .endpoints
            .as_ref()
            .and_then(|extractor| extractor.extract(root));
        let markdown = render_markdown(root);

        if markdown.is_empty() && code_examples.is_empty() {
            return Err(ParseError::NoContent);
        }

        Ok(ParsedPage {
            title,
            description,
            markdown,
            code_examples,
            api_endpoint,
        })
    }
}

impl Default for PageParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Parses `html` with the default [`PageParser`].
///
/// # Example
///
/// ```
/// let page = doc_parser::parse_page("<main><h1>Intro</h1><p>Hello <b>docs</b>.</p></main>")
///     .expect("page has content");
/// assert_eq!(page.title, "Intro");
/// assert_eq!(page.markdown, "# Intro\n\nHello **docs**.");
/// ```
pub fn parse_page(html: &str) -> Result<ParsedPage, ParseError> {
    PageParser::new().parse(html)
}

fn extract_title(document: &Html, root: scraper::ElementRef<'_>) -> String {
    let h1 = Selector::parse("h1").expect("h1 selector");
    if let Some(heading) = root.select(&h1).next() {
        let text = collapse_whitespace(&heading.text().collect::<String>());
        if !text.is_empty() {
            return text;
        }
    }

    let title = Selector::parse("title").expect("title selector");
    document
        .select(&title)
        .next()
        .map(|node| collapse_whitespace(&node.text().collect::<String>()))
        .and_then(|text| {
            let head = text
                .split(" - ")
                .next()
                .and_then(|part| part.split(" | ").next())
                .unwrap_or_default()
                .trim()
                .to_string();
            (!head.is_empty()).then_some(head)
        })
        .unwrap_or_else(|| "Untitled".to_string())
}

fn meta_description(document: &Html) -> Option<String> {
    let selector = Selector::parse(r#"meta[name="description"]"#).expect("meta selector");
    document
        .select(&selector)
        .next()
        .and_then(|meta| meta.value().attr("content"))
        .map(collapse_whitespace)
        .filter(|text| !text.is_empty())
}

/// Collapses whitespace runs to single spaces and trims the ends.
pub(crate) fn collapse_whitespace(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last_was_space = false;
    for ch in input.chars() {
        if ch.is_whitespace() {
            if !last_was_space {
                out.push(' ');
                last_was_space = true;
            }
        } else {
            out.push(ch);
            last_was_space = false;
        }
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn title_prefers_content_heading() {
        let html = r#"
        <html>
          <head><title>Quickstart - Acme Docs</title></head>
          <body><main><h1>Getting started</h1><p>Install it.</p></main></body>
        </html>
        "#;
        let page = parse_page(html).expect("parse");
        assert_eq!(page.title, "Getting started");
    }

    #[test]
    fn title_falls_back_to_document_title() {
        let html = r#"
        <html>
          <head><title>Quickstart - Acme Docs</title></head>
          <body><main><p>Install it.</p></main></body>
        </html>
        "#;
        let page = parse_page(html).expect("parse");
        assert_eq!(page.title, "Quickstart");
    }

    #[test]
    fn reads_meta_description() {
        let html = r#"
        <html>
          <head><meta name="description" content="  How to   install "></head>
          <body><main><p>Body.</p></main></body>
        </html>
        "#;
        let page = parse_page(html).expect("parse");
        assert_eq!(page.description.as_deref(), Some("How to install"));
    }

    #[test]
    fn empty_input_is_rejected() {
        assert_eq!(parse_page("   "), Err(ParseError::EmptyDocument));
    }

    #[test]
    fn chrome_only_page_has_no_content() {
        let html = r#"<body><nav><a href="/a">A</a></nav><script>var x = 1;</script></body>"#;
        assert_eq!(parse_page(html), Err(ParseError::NoContent));
    }

    #[test]
    fn endpoint_extraction_can_be_disabled() {
        let html = r#"
        <main>
          <div class="api-endpoint"><code>POST /v1/users</code></div>
          <p>Create a user.</p>
        </main>
        "#;
        let with = PageParser::new().parse(html).expect("parse");
        let without = PageParser::without_endpoints().parse(html).expect("parse");
        assert!(with.api_endpoint.is_some());
        assert!(without.api_endpoint.is_none());
    }
}
