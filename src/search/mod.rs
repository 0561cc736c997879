//! Lexical TF-IDF search over scraped documents.
//!
//! Scores combine cosine similarity with flat bonuses for title, section and code matches,
//! a fuzzy-match term, and multiplicative quality and recency boosts. All weights live in
//! [`ScoringWeights`].

mod fuzzy;
mod snapshot;
mod tokenizer;

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::document::Document;
use crate::output::{fenced_code, SitePage};

pub use fuzzy::{fuzzy_score, levenshtein};
pub use snapshot::INDEX_VERSION;
pub use tokenizer::{strip_code_fences, tokenize};

use snapshot::{
    truncate_chars, IndexSnapshot, SnapshotDocument, VersionHeader, EXPORTED_CONTENT_CHARS,
};

/// Term → weight, ordered so scoring is deterministic.
pub type TermVector = BTreeMap<String, f64>;

/// Queries kept for suggestions and popularity.
pub const HISTORY_LIMIT: usize = 100;

const SNIPPET_CHARS: usize = 160;

/// Errors from building, querying or loading an index.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Search was called before any documents were indexed.
    #[error("search index has not been built")]
    IndexNotBuilt,
    /// The snapshot carries a different version tag.
    #[error("index version {found:?} is not supported (expected {expected:?})")]
    VersionMismatch {
        /// Version found in the snapshot.
        found: String,
        /// Version this build reads.
        expected: &'static str,
    },
    /// The snapshot is not valid JSON for an index.
    #[error("invalid index json: {0}")]
    Json(#[from] serde_json::Error),
}

/// A document as the search engine sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchDocument {
    /// Stable identifier.
    pub id: String,
    /// Page URL.
    pub url: String,
    /// Page title.
    pub title: String,
    /// Section name.
    pub section: String,
    /// Markdown body.
    pub content: String,
    /// Code example bodies.
    #[serde(default)]
    pub code_examples: Vec<String>,
    /// Optional quality score on a 0..100 scale.
    #[serde(default)]
    pub quality_score: Option<f64>,
    /// Optional last-updated time used for the recency boost.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<&Document> for SearchDocument {
    fn from(document: &Document) -> Self {
        Self {
            id: document.url.clone(),
            url: document.url.clone(),
            title: document.title.clone(),
            section: document.section.clone(),
            content: document.content.clone(),
            code_examples: document
                .code_examples
                .iter()
                .map(|example| example.code.clone())
                .collect(),
            quality_score: None,
            updated_at: Some(document.fetched_at),
        }
    }
}

impl From<&SitePage> for SearchDocument {
    fn from(page: &SitePage) -> Self {
        let id = page
            .file
            .components()
            .map(|part| part.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        Self {
            id,
            url: page.entry.url.clone(),
            title: page.entry.title.clone(),
            section: page.entry.section.clone(),
            code_examples: fenced_code(&page.content),
            content: page.content.clone(),
            quality_score: None,
            updated_at: None,
        }
    }
}

/// Ranking weights.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringWeights {
    /// Multiplier on cosine similarity.
    pub cosine: f64,
    /// Bonus when the title contains the query.
    pub title: f64,
    /// Bonus when the section contains the query.
    pub section: f64,
    /// Bonus when a code example contains the query.
    pub code: f64,
    /// Multiplier on the fuzzy score.
    pub fuzzy: f64,
    /// Quality scores above this get [`ScoringWeights::quality_boost`].
    pub quality_threshold: f64,
    /// Multiplicative quality boost.
    pub quality_boost: f64,
    /// Documents updated within this window get [`ScoringWeights::recency_boost`].
    pub recency_window: TimeDelta,
    /// Multiplicative recency boost.
    pub recency_boost: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            cosine: 100.0,
            title: 50.0,
            section: 20.0,
            code: 30.0,
            fuzzy: 10.0,
            quality_threshold: 70.0,
            quality_boost: 1.10,
            recency_window: TimeDelta::days(30),
            recency_boost: 1.05,
        }
    }
}

/// Per-query knobs.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOptions {
    /// Maximum results returned.
    pub limit: usize,
    /// Results scoring below this are dropped.
    pub min_score: f64,
    /// Only search this section.
    pub section: Option<String>,
    /// Whether code examples earn the code bonus.
    pub include_code: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: 10,
            min_score: 0.1,
            section: None,
            include_code: true,
        }
    }
}

/// One ranked hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    /// Document id.
    pub id: String,
    /// Page URL.
    pub url: String,
    /// Page title.
    pub title: String,
    /// Section name.
    pub section: String,
    /// Final score.
    pub score: f64,
    /// Start of the prose content.
    pub snippet: String,
}

#[derive(Debug, Clone)]
struct Indexed {
    doc: SearchDocument,
    vector: TermVector,
    norm: f64,
}

impl Indexed {
    fn new(doc: SearchDocument, vector: TermVector) -> Self {
        let norm = norm(&vector);
        Self { doc, vector, norm }
    }
}

fn norm(vector: &TermVector) -> f64 {
    vector.values().map(|w| w * w).sum::<f64>().sqrt()
}

fn term_frequencies(tokens: &[String]) -> BTreeMap<&str, f64> {
    let mut counts: BTreeMap<&str, f64> = BTreeMap::new();
    for token in tokens {
        *counts.entry(token.as_str()).or_default() += 1.0;
    }
    let total = tokens.len().max(1) as f64;
    for count in counts.values_mut() {
        *count /= total;
    }
    counts
}

fn weigh(tokens: &[String], idf: &BTreeMap<String, f64>) -> TermVector {
    term_frequencies(tokens)
        .into_iter()
        .filter_map(|(term, tf)| {
            let weight = tf * idf.get(term).copied()?;
            (weight != 0.0).then(|| (term.to_string(), weight))
        })
        .collect()
}

fn snippet(content: &str) -> String {
    let prose = strip_code_fences(content);
    let collapsed = prose.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate_chars(&collapsed, SNIPPET_CHARS)
}

/// In-memory TF-IDF index plus query history.
#[derive(Debug, Clone, Default)]
pub struct SearchEngine {
    documents: Vec<Indexed>,
    idf: BTreeMap<String, f64>,
    weights: ScoringWeights,
    history: VecDeque<String>,
}

impl SearchEngine {
    /// An empty, unbuilt engine with default weights.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the scoring weights.
    pub fn with_weights(mut self, weights: ScoringWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Seeds the query history, keeping the newest entries.
    pub fn with_history(mut self, entries: impl IntoIterator<Item = String>) -> Self {
        for entry in entries {
            self.remember(entry);
        }
        self
    }

    /// Whether any documents are indexed.
    pub fn is_built(&self) -> bool {
        !self.documents.is_empty()
    }

    /// Number of indexed documents.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// True when nothing is indexed.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Past queries, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &str> {
        self.history.iter().map(String::as_str)
    }

    /// Rebuilds the index from scratch.
    pub fn build(&mut self, documents: Vec<SearchDocument>) {
        let tokenized: Vec<(Vec<String>, Vec<String>)> = documents
            .iter()
            .map(|doc| (tokenize(&doc.title), tokenize(&doc.content)))
            .collect();

        let mut document_frequency: HashMap<&str, usize> = HashMap::new();
        for (title, content) in &tokenized {
            let unique: HashSet<&str> = title.iter().chain(content).map(String::as_str).collect();
            for term in unique {
                *document_frequency.entry(term).or_default() += 1;
            }
        }

        let total = documents.len() as f64;
        let idf: BTreeMap<String, f64> = document_frequency
            .into_iter()
            .map(|(term, df)| (term.to_string(), (total / df as f64).ln()))
            .collect();

        let indexed = documents
            .into_iter()
            .zip(&tokenized)
            .map(|(doc, (title, content))| {
                let mut weighted = Vec::with_capacity(title.len() * 2 + content.len());
                weighted.extend(title.iter().cloned());
                weighted.extend(title.iter().cloned());
                weighted.extend(content.iter().cloned());
                let vector = weigh(&weighted, &idf);
                Indexed::new(doc, vector)
            })
            .collect();

        self.documents = indexed;
        self.idf = idf;
        debug!(
            documents = self.documents.len(),
            terms = self.idf.len(),
            "search index built"
        );
    }

    /// Runs `query` and records it in the history.
    pub fn search(
        &mut self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>, SearchError> {
        self.search_at(query, options, Utc::now())
    }

    /// [`SearchEngine::search`] with an explicit clock for the recency boost.
    pub fn search_at(
        &mut self,
        query: &str,
        options: &SearchOptions,
        now: DateTime<Utc>,
    ) -> Result<Vec<SearchResult>, SearchError> {
        if !self.is_built() {
            return Err(SearchError::IndexNotBuilt);
        }
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let needle = query.to_lowercase();
        let query_vector = weigh(&tokenize(query), &self.idf);
        let query_norm = norm(&query_vector);

        let mut results: Vec<SearchResult> = self
            .documents
            .iter()
            .filter(|indexed| {
                options
                    .section
                    .as_ref()
                    .map_or(true, |section| &indexed.doc.section == section)
            })
            .filter_map(|indexed| {
                let score = self.score(
                    indexed,
                    query,
                    &needle,
                    &query_vector,
                    query_norm,
                    options,
                    now,
                );
                (score >= options.min_score).then(|| SearchResult {
                    id: indexed.doc.id.clone(),
                    url: indexed.doc.url.clone(),
                    title: indexed.doc.title.clone(),
                    section: indexed.doc.section.clone(),
                    score,
                    snippet: snippet(&indexed.doc.content),
                })
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.title.cmp(&b.title))
                .then_with(|| a.id.cmp(&b.id))
        });
        results.truncate(options.limit);

        self.remember(query.to_string());
        Ok(results)
    }

    #[allow(clippy::too_many_arguments)]
    fn score(
        &self,
        indexed: &Indexed,
        query: &str,
        needle: &str,
        query_vector: &TermVector,
        query_norm: f64,
        options: &SearchOptions,
        now: DateTime<Utc>,
    ) -> f64 {
        let weights = &self.weights;
        let doc = &indexed.doc;

        let mut score = 0.0;
        if query_norm > 0.0 && indexed.norm > 0.0 {
            let dot: f64 = query_vector
                .iter()
                .filter_map(|(term, q)| indexed.vector.get(term).map(|d| q * d))
                .sum();
            score += weights.cosine * dot / (query_norm * indexed.norm);
        }
        if doc.title.to_lowercase().contains(needle) {
            score += weights.title;
        }
        if doc.section.to_lowercase().contains(needle) {
            score += weights.section;
        }
        if options.include_code
            && doc
                .code_examples
                .iter()
                .any(|code| code.to_lowercase().contains(needle))
        {
            score += weights.code;
        }
        score += weights.fuzzy * fuzzy_score(query, &doc.title, &doc.content);

        if doc
            .quality_score
            .is_some_and(|quality| quality > weights.quality_threshold)
        {
            score *= weights.quality_boost;
        }
        if doc
            .updated_at
            .is_some_and(|updated| now.signed_duration_since(updated) <= weights.recency_window)
        {
            score *= weights.recency_boost;
        }
        score
    }

    fn remember(&mut self, query: String) {
        self.history.push_back(query);
        while self.history.len() > HISTORY_LIMIT {
            self.history.pop_front();
        }
    }

    /// Past queries and title words starting with `prefix`.
    ///
    /// History matches come first, most popular first, then title words alphabetically.
    pub fn suggest(&self, prefix: &str, limit: usize) -> Vec<String> {
        let prefix = prefix.trim().to_lowercase();
        if prefix.is_empty() {
            return Vec::new();
        }

        let mut seen = HashSet::new();
        let from_history = self
            .popular_queries(HISTORY_LIMIT)
            .into_iter()
            .map(|(query, _)| query.to_lowercase())
            .filter(|query| query.starts_with(&prefix));
        let title_words: BTreeSet<String> = self
            .documents
            .iter()
            .flat_map(|indexed| tokenizer::words(&indexed.doc.title))
            .filter(|word| {
                word.chars().count() >= fuzzy::MIN_QUERY_WORD && word.starts_with(&prefix)
            })
            .collect();

        from_history
            .chain(title_words)
            .filter(|candidate| seen.insert(candidate.clone()))
            .take(limit)
            .collect()
    }

    /// Most frequent past queries with their counts.
    pub fn popular_queries(&self, limit: usize) -> Vec<(String, usize)> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for query in &self.history {
            *counts.entry(query.as_str()).or_default() += 1;
        }
        let mut ranked: Vec<(String, usize)> = counts
            .into_iter()
            .map(|(query, count)| (query.to_string(), count))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(limit);
        ranked
    }

    /// Indexed sections with their document counts, alphabetically.
    pub fn sections(&self) -> Vec<(String, usize)> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for indexed in &self.documents {
            *counts.entry(indexed.doc.section.as_str()).or_default() += 1;
        }
        counts
            .into_iter()
            .map(|(section, count)| (section.to_string(), count))
            .collect()
    }

    /// Serializes the index to versioned JSON.
    pub fn export_index(&self) -> Result<String, SearchError> {
        if !self.is_built() {
            return Err(SearchError::IndexNotBuilt);
        }
        let snapshot = IndexSnapshot {
            documents: self
                .documents
                .iter()
                .map(|indexed| SnapshotDocument {
                    id: indexed.doc.id.clone(),
                    url: indexed.doc.url.clone(),
                    title: indexed.doc.title.clone(),
                    section: indexed.doc.section.clone(),
                    content: truncate_chars(&indexed.doc.content, EXPORTED_CONTENT_CHARS),
                    vector: indexed
                        .vector
                        .iter()
                        .map(|(term, weight)| (term.clone(), *weight))
                        .collect(),
                    code_examples: indexed.doc.code_examples.clone(),
                    quality_score: indexed.doc.quality_score,
                    updated_at: indexed.doc.updated_at,
                })
                .collect(),
            idf: self
                .idf
                .iter()
                .map(|(term, value)| (term.clone(), *value))
                .collect(),
            version: INDEX_VERSION.to_string(),
        };
        Ok(serde_json::to_string_pretty(&snapshot)?)
    }

    /// Replaces the index with an exported snapshot.
    ///
    /// Nothing changes unless the whole snapshot decodes with a matching version.
    pub fn import_index(&mut self, json: &str) -> Result<(), SearchError> {
        let header: VersionHeader = serde_json::from_str(json)?;
        if header.version != INDEX_VERSION {
            return Err(SearchError::VersionMismatch {
                found: header.version,
                expected: INDEX_VERSION,
            });
        }
        let snapshot: IndexSnapshot = serde_json::from_str(json)?;

        self.documents = snapshot
            .documents
            .into_iter()
            .map(|doc| {
                let vector: TermVector = doc.vector.into_iter().collect();
                Indexed::new(
                    SearchDocument {
                        id: doc.id,
                        url: doc.url,
                        title: doc.title,
                        section: doc.section,
                        content: doc.content,
                        code_examples: doc.code_examples,
                        quality_score: doc.quality_score,
                        updated_at: doc.updated_at,
                    },
                    vector,
                )
            })
            .collect();
        self.idf = snapshot.idf.into_iter().collect();
        debug!(documents = self.documents.len(), "search index imported");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn doc(id: &str, title: &str, section: &str, content: &str) -> SearchDocument {
        SearchDocument {
            id: id.to_string(),
            url: format!("https://docs.acme.dev/{id}"),
            title: title.to_string(),
            section: section.to_string(),
            content: content.to_string(),
            code_examples: Vec::new(),
            quality_score: None,
            updated_at: None,
        }
    }

    fn engine() -> SearchEngine {
        let mut engine = SearchEngine::new();
        engine.build(vec![
            doc(
                "auth",
                "Authentication",
                "guides",
                "Use API keys to authenticate requests.",
            ),
            doc(
                "hooks",
                "Webhooks",
                "guides",
                "Receive events when payments settle.",
            ),
            doc(
                "users",
                "Create user",
                "api-reference",
                "Creates a user account.",
            ),
        ]);
        engine
    }

    #[test]
    fn idf_is_log_of_inverse_document_share() {
        let engine = engine();
        assert_eq!(engine.idf["webhooks"], 3f64.ln());
        assert!(engine.idf.get("the").is_none());
    }

    #[test]
    fn empty_query_returns_nothing() {
        let mut engine = engine();
        let results = engine.search("   ", &SearchOptions::default()).unwrap();
        assert!(results.is_empty());
        assert_eq!(engine.history().count(), 0);
    }

    #[test]
    fn section_filter_and_limit() {
        let mut engine = engine();
        let options = SearchOptions {
            section: Some("api-reference".to_string()),
            ..SearchOptions::default()
        };
        let results = engine.search("user", &options).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "users");

        let options = SearchOptions {
            limit: 0,
            ..SearchOptions::default()
        };
        assert!(engine.search("user", &options).unwrap().is_empty());
    }

    #[test]
    fn boosts_multiply_final_score() {
        let now = Utc::now();
        let mut plain = SearchEngine::new();
        plain.build(vec![doc("a", "Quotas", "limits", "Quota details.")]);
        let base = plain.search_at("quotas", &SearchOptions::default(), now).unwrap()[0].score;

        let mut boosted_doc = doc("a", "Quotas", "limits", "Quota details.");
        boosted_doc.quality_score = Some(90.0);
        boosted_doc.updated_at = Some(now - TimeDelta::days(3));
        let mut boosted = SearchEngine::new();
        boosted.build(vec![boosted_doc]);
        let score = boosted.search_at("quotas", &SearchOptions::default(), now).unwrap()[0].score;

        assert!((score - base * 1.10 * 1.05).abs() < 1e-9);
    }

    #[test]
    fn code_bonus_respects_option() {
        let mut with_code = doc("a", "Install", "guides", "Steps.");
        with_code.code_examples = vec!["npm install acme-cli".to_string()];
        let mut engine = SearchEngine::new();
        engine.build(vec![with_code]);

        let with = engine.search("acme-cli", &SearchOptions::default()).unwrap();
        let without = engine
            .search(
                "acme-cli",
                &SearchOptions {
                    include_code: false,
                    ..SearchOptions::default()
                },
            )
            .unwrap();
        assert_eq!(
            with[0].score - without.first().map_or(0.0, |r| r.score),
            30.0
        );
    }

    #[test]
    fn history_drives_suggestions_and_popularity() {
        let mut engine = engine();
        for query in ["webhooks", "auth", "webhooks", "authentication"] {
            engine.search(query, &SearchOptions::default()).unwrap();
        }
        assert_eq!(
            engine.popular_queries(2),
            [("webhooks".to_string(), 2), ("auth".to_string(), 1)]
        );
        assert_eq!(engine.suggest("au", 5), ["auth", "authentication"]);
        assert_eq!(engine.suggest("cr", 5), ["create"]);
        assert!(engine.suggest("", 5).is_empty());
    }

    #[test]
    fn history_is_capped() {
        let engine =
            SearchEngine::new().with_history((0..150).map(|n| format!("query {n}")));
        assert_eq!(engine.history().count(), HISTORY_LIMIT);
        assert_eq!(engine.history().next(), Some("query 50"));
    }

    #[test]
    fn sections_are_counted() {
        assert_eq!(
            engine().sections(),
            [("api-reference".to_string(), 1), ("guides".to_string(), 2)]
        );
    }
}
