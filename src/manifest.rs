//! `metadata.json` records consumed by downstream generators.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::document::Document;

/// Summary of one scraped page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageEntry {
    /// Canonical page URL.
    pub url: String,
    /// URL path component.
    pub path: String,
    /// Page title.
    pub title: String,
    /// Section the page was filed under.
    pub section: String,
    /// Second path segment, or `null`.
    pub subsection: Option<String>,
    /// Whether endpoint metadata was extracted.
    pub has_api_endpoint: bool,
    /// Number of code examples on the page.
    pub code_examples_count: usize,
}

impl PageEntry {
    /// Derives the entry for `document`.
    pub fn from_document(document: &Document) -> Self {
        Self {
            url: document.url.clone(),
            path: document.path.clone(),
            title: document.title.clone(),
            section: document.section.clone(),
            subsection: document.subsection.clone(),
            has_api_endpoint: document.api_endpoint.is_some(),
            code_examples_count: document.code_examples.len(),
        }
    }
}

/// Top-level shape of `metadata.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteManifest {
    /// Site that was crawled.
    pub base_url: String,
    /// When the outputs were written.
    pub scraped_at: DateTime<Utc>,
    /// Number of entries in `pages`.
    pub total_pages: usize,
    /// Distinct sections in first-seen order.
    pub sections: Vec<String>,
    /// One entry per document, in output order.
    pub pages: Vec<PageEntry>,
}

impl SiteManifest {
    /// Builds the manifest for documents already in output order.
    pub fn new(base_url: &str, documents: &[&Document], scraped_at: DateTime<Utc>) -> Self {
        let mut sections: Vec<String> = Vec::new();
        for document in documents {
            if !sections.contains(&document.section) {
                sections.push(document.section.clone());
            }
        }
        Self {
            base_url: base_url.to_string(),
            scraped_at,
            total_pages: documents.len(),
            sections,
            pages: documents
                .iter()
                .map(|doc| PageEntry::from_document(doc))
                .collect(),
        }
    }
}
