//! JSON form of an exported index.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Only snapshots carrying exactly this tag can be imported.
pub const INDEX_VERSION: &str = "1.0";
/// Content characters kept per exported document.
pub const EXPORTED_CONTENT_CHARS: usize = 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct IndexSnapshot {
    pub(crate) documents: Vec<SnapshotDocument>,
    pub(crate) idf: Vec<(String, f64)>,
    pub(crate) version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SnapshotDocument {
    pub(crate) id: String,
    pub(crate) url: String,
    pub(crate) title: String,
    pub(crate) section: String,
    pub(crate) content: String,
    pub(crate) vector: Vec<(String, f64)>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(crate) code_examples: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) quality_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) updated_at: Option<DateTime<Utc>>,
}

/// Reads only the version tag.
#[derive(Deserialize)]
pub(crate) struct VersionHeader {
    pub(crate) version: String,
}

pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    #[test]
    fn vectors_serialize_as_pairs() {
        let doc = SnapshotDocument {
            id: "a".into(),
            url: "https://d.dev/a".into(),
            title: "A".into(),
            section: "root".into(),
            content: String::new(),
            vector: vec![("auth".into(), 0.5)],
            code_examples: Vec::new(),
            quality_score: None,
            updated_at: None,
        };
        let value = serde_json::to_value(&doc).expect("encode");
        assert_eq!(value["vector"], serde_json::json!([["auth", 0.5]]));
        assert!(value.get("codeExamples").is_none());
    }
}
