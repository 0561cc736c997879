//! Explicit crawl state: progress bookkeeping plus the pending frontier.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::document::Document;
use crate::frontier::{Frontier, FrontierError};
use crate::target::CrawlTarget;

/// Retry bookkeeping for a URL that never succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedUrl {
    /// Total fetch attempts made.
    pub attempts: u32,
    /// Error from the final attempt.
    pub last_error: String,
}

/// Serializable crawl progress, written to the checkpoint file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlProgress {
    /// Site being crawled.
    pub base_url: String,
    /// URLs that reached a terminal outcome.
    pub visited_urls: BTreeSet<String>,
    /// URLs that exhausted their retries.
    pub failed_urls: BTreeMap<String, FailedUrl>,
    /// Documents extracted so far.
    pub scraped_pages: Vec<Document>,
    /// Targets still waiting, in queue order.
    pub remaining_queue: Vec<CrawlTarget>,
    /// When this snapshot was taken.
    pub timestamp: DateTime<Utc>,
}

/// The mutable state of one crawl, passed explicitly through the loop.
#[derive(Debug)]
pub struct CrawlSession {
    base_url: Url,
    visited: BTreeSet<String>,
    failed: BTreeMap<String, FailedUrl>,
    documents: Vec<Document>,
    frontier: Frontier,
    parse_failures: usize,
    since_checkpoint: usize,
}

impl CrawlSession {
    /// Starts a fresh session seeded with discovered targets.
    pub fn new(base_url: Url, seeds: Vec<CrawlTarget>) -> Self {
        let mut frontier = Frontier::new();
        for seed in seeds {
            if let Err(FrontierError::Duplicate(target)) = frontier.push(seed) {
                tracing::debug!(url = %target.url(), "duplicate seed skipped");
            }
        }
        Self {
            base_url,
            visited: BTreeSet::new(),
            failed: BTreeMap::new(),
            documents: Vec::new(),
            frontier,
            parse_failures: 0,
            since_checkpoint: 0,
        }
    }

    /// Rebuilds a session from a checkpoint.
    pub fn from_progress(progress: CrawlProgress) -> Result<Self, url::ParseError> {
        let base_url = Url::parse(&progress.base_url)?;
        let mut known: Vec<String> = progress.visited_urls.iter().cloned().collect();
        known.extend(progress.scraped_pages.iter().map(|doc| doc.url.clone()));
        let frontier = Frontier::restore(progress.remaining_queue, &known);
        Ok(Self {
            base_url,
            visited: progress.visited_urls,
            failed: progress.failed_urls,
            documents: progress.scraped_pages,
            frontier,
            parse_failures: 0,
            since_checkpoint: 0,
        })
    }

    /// Site being crawled.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Documents in the order they were scraped.
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// Consumes the session, returning its documents.
    pub fn into_documents(self) -> Vec<Document> {
        self.documents
    }

    /// URLs that exhausted their retries.
    pub fn failed(&self) -> &BTreeMap<String, FailedUrl> {
        &self.failed
    }

    /// URLs with a terminal outcome.
    pub fn visited(&self) -> &BTreeSet<String> {
        &self.visited
    }

    /// Pages that fetched but yielded no content.
    pub fn parse_failures(&self) -> usize {
        self.parse_failures
    }

    /// Targets still queued.
    pub fn pending(&self) -> usize {
        self.frontier.pending()
    }

    /// Successful pages since the last checkpoint.
    pub fn since_checkpoint(&self) -> usize {
        self.since_checkpoint
    }

    /// Resets the checkpoint counter after a save.
    pub fn mark_checkpointed(&mut self) {
        self.since_checkpoint = 0;
    }

    /// Pops the next batch, dropping anything already visited.
    pub fn next_batch(&mut self, size: usize) -> Vec<CrawlTarget> {
        let mut batch = Vec::with_capacity(size);
        while batch.len() < size && !self.frontier.is_empty() {
            for target in self.frontier.next_batch(size - batch.len()) {
                if !self.visited.contains(target.url().as_str()) {
                    batch.push(target);
                }
            }
        }
        batch
    }

    /// Queues a newly discovered target. Returns `false` for known URLs.
    pub fn schedule(&mut self, target: CrawlTarget) -> bool {
        if self.visited.contains(target.url().as_str()) {
            return false;
        }
        self.frontier.push(target).is_ok()
    }

    /// Records a scraped document.
    pub fn record_success(&mut self, document: Document) {
        self.visited.insert(document.url.clone());
        self.failed.remove(&document.url);
        self.documents.push(document);
        self.since_checkpoint += 1;
    }

    /// Records a URL whose fetch kept failing.
    pub fn record_failure(&mut self, url: &Url, attempts: u32, error: impl Into<String>) {
        self.visited.insert(url.to_string());
        self.failed.insert(
            url.to_string(),
            FailedUrl {
                attempts,
                last_error: error.into(),
            },
        );
    }

    /// Records a page that fetched but had nothing to extract.
    pub fn record_parse_failure(&mut self, url: &Url) {
        self.visited.insert(url.to_string());
        self.parse_failures += 1;
    }

    /// Captures the current state for the checkpoint file.
    pub fn snapshot(&self) -> CrawlProgress {
        CrawlProgress {
            base_url: self.base_url.to_string(),
            visited_urls: self.visited.clone(),
            failed_urls: self.failed.clone(),
            scraped_pages: self.documents.clone(),
            remaining_queue: self.frontier.remaining(),
            timestamp: Utc::now(),
        }
    }
}
