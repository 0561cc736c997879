use mintcrawl::search::{ScoringWeights, INDEX_VERSION};
use mintcrawl::{SearchDocument, SearchEngine, SearchError, SearchOptions};
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

fn corpus() -> Vec<SearchDocument> {
    let mut hooks = doc(
        "guides/webhooks",
        "Webhooks",
        "guides",
        "Webhooks notify your server about payment events. Verify each signature.\n\n```js\nconst authentication = verify(req);\n```",
    );
    hooks.code_examples = vec!["const authentication = verify(req);\n".to_string()];
    vec![
        doc(
            "guides/authentication",
            "Authentication",
            "guides",
            "Send an API key in the Authorization header. Keys are scoped per project.",
        ),
        hooks,
        doc(
            "api-reference/tokens",
            "Create token",
            "api-reference",
            "Exchange credentials for an access token used for authentication on later requests.",
        ),
        doc(
            "guides/pagination",
            "Pagination",
            "guides",
            "List endpoints return cursors. Pass the cursor to fetch the next page of results.",
        ),
    ]
}

fn built() -> SearchEngine {
    let mut engine = SearchEngine::new();
    engine.build(corpus());
    engine
}

#[test]
fn exact_title_query_ranks_that_document_first() {
    let mut engine = SearchEngine::new();
    engine.build(vec![
        doc(
            "a",
            "Rate limits",
            "guides",
            "Requests beyond the quota receive HTTP 429 responses.",
        ),
        doc(
            "b",
            "Errors",
            "guides",
            "Errors follow rate limits conventions and include a code field.",
        ),
    ]);
    for title in ["Rate limits", "Errors"] {
        let results = engine.search(title, &SearchOptions::default()).unwrap();
        assert_eq!(results[0].title, title);
    }
}

#[test]
fn authentication_title_bonus_applies() {
    let mut engine = built();
    let results = engine
        .search("authentication", &SearchOptions::default())
        .unwrap();

    assert_eq!(results[0].id, "guides/authentication");
    assert!(results[0].score >= ScoringWeights::default().title);
    let others: Vec<&str> = results[1..].iter().map(|r| r.id.as_str()).collect();
    assert!(others.contains(&"api-reference/tokens"));
    assert!(others.contains(&"guides/webhooks"));
    assert!(results[1..].iter().all(|r| r.score < ScoringWeights::default().title));
}

#[test]
fn code_text_is_matched_by_bonus_not_term_space() {
    let mut engine = built();
    let with_code = engine.search("verify(req)", &SearchOptions::default()).unwrap();
    assert_eq!(with_code[0].id, "guides/webhooks");

    let prose_only = SearchOptions {
        include_code: false,
        ..SearchOptions::default()
    };
    let without = engine.search("verify(req)", &prose_only).unwrap();
    assert!(without.iter().all(|r| r.score < with_code[0].score));
}

#[test]
fn export_import_round_trip_preserves_rankings() {
    let mut original = built();
    let json = original.export_index().expect("export");

    let mut restored = SearchEngine::new();
    restored.import_index(&json).expect("import");
    assert_eq!(restored.len(), original.len());
    assert_eq!(restored.sections(), original.sections());

    for query in ["authentication", "webhooks payment", "cursor", "tokn", "api key"] {
        let before = original.search(query, &SearchOptions::default()).unwrap();
        let after = restored.search(query, &SearchOptions::default()).unwrap();
        let ranked = |results: &[mintcrawl::search::SearchResult]| -> Vec<(String, f64)> {
            results.iter().map(|r| (r.id.clone(), r.score)).collect()
        };
        assert_eq!(ranked(&after), ranked(&before), "query {query:?}");
    }
}

#[test]
fn snapshot_layout_is_stable() {
    let json = built().export_index().expect("export");
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["version"], INDEX_VERSION);
    let first = &value["documents"][0];
    assert_eq!(first["id"], "guides/authentication");
    let pair = first["vector"][0].as_array().expect("term pair");
    assert_eq!(pair.len(), 2);
    assert!(value["idf"].as_array().is_some_and(|idf| !idf.is_empty()));
    assert!(value["documents"][1]["codeExamples"].is_array());
}

#[test]
fn version_mismatch_rejects_whole_import() {
    let json = built().export_index().expect("export");
    let tampered = json.replace("\"version\": \"1.0\"", "\"version\": \"2.0\"");
    assert_ne!(tampered, json);

    let mut engine = SearchEngine::new();
    engine.build(vec![doc("kept", "Kept", "root", "Original content.")]);
    let err = engine.import_index(&tampered).expect_err("mismatch");
    assert!(matches!(err, SearchError::VersionMismatch { ref found, .. } if found == "2.0"));
    assert_eq!(engine.len(), 1);
    assert_eq!(engine.sections(), [("root".to_string(), 1)]);
}

#[test]
fn search_before_build_fails_clearly() {
    let mut engine = SearchEngine::new();
    assert!(matches!(
        engine.search("anything", &SearchOptions::default()),
        Err(SearchError::IndexNotBuilt)
    ));
    assert!(matches!(
        engine.export_index(),
        Err(SearchError::IndexNotBuilt)
    ));
}
