//! Main content container selection.

use scraper::{ElementRef, Html, Selector};

/// Candidate selectors for the content container, tried in order.
pub const CONTENT_ROOT_SELECTORS: &[&str] = &[
    "main",
    "[class*=\"content\"]",
    "article",
    ".markdown",
    "body",
];

/// Picks the first [`CONTENT_ROOT_SELECTORS`] match that carries visible text.
pub fn select_content_root(document: &Html) -> Option<ElementRef<'_>> {
    select_content_root_with(document, CONTENT_ROOT_SELECTORS)
}

/// Like [`select_content_root`] with a caller-provided candidate list.
///
/// Selectors that fail to parse are skipped.
pub fn select_content_root_with<'a>(
    document: &'a Html,
    candidates: &[&str],
) -> Option<ElementRef<'a>> {
    first_match(candidates.iter().copied(), |raw| {
        let selector = Selector::parse(raw).ok()?;
        document.select(&selector).find(has_visible_text)
    })
}

/// Returns the first hit produced by `pick`, walking `candidates` in order.
///
/// Knows nothing about the DOM; callers decide what a candidate is and what counts as a hit.
pub fn first_match<C, T>(
    candidates: impl IntoIterator<Item = C>,
    pick: impl FnMut(C) -> Option<T>,
) -> Option<T> {
    candidates.into_iter().find_map(pick)
}

fn has_visible_text(element: &ElementRef<'_>) -> bool {
    element.text().any(|piece| !piece.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root_name(html: &str, candidates: &[&str]) -> Option<String> {
        let document = Html::parse_document(html);
        select_content_root_with(&document, candidates).map(|root| {
            let value = root.value();
            value
                .id()
                .map(str::to_string)
                .unwrap_or_else(|| value.name().to_string())
        })
    }

    #[test]
    fn first_match_stops_at_first_hit() {
        let mut seen = Vec::new();
        let hit = first_match(["a", "bb", "ccc"], |c| {
            seen.push(c);
            (c.len() > 1).then(|| c.to_uppercase())
        });
        assert_eq!(hit.as_deref(), Some("BB"));
        assert_eq!(seen, ["a", "bb"]);
    }

    #[test]
    fn main_wins_over_article() {
        let html = r#"<body><article>Side</article><main>Primary</main></body>"#;
        assert_eq!(
            root_name(html, CONTENT_ROOT_SELECTORS).as_deref(),
            Some("main")
        );
    }

    #[test]
    fn empty_candidates_are_skipped() {
        let html = r#"<body><main>   </main><div id="page" class="page-content">Text</div></body>"#;
        assert_eq!(
            root_name(html, CONTENT_ROOT_SELECTORS).as_deref(),
            Some("page")
        );
    }

    #[test]
    fn falls_back_to_body() {
        let html = r#"<body><p>Loose text</p></body>"#;
        assert_eq!(
            root_name(html, CONTENT_ROOT_SELECTORS).as_deref(),
            Some("body")
        );
    }

    #[test]
    fn custom_candidate_order_is_respected() {
        let html = r#"<body><main>Primary</main><article>Secondary</article></body>"#;
        assert_eq!(
            root_name(html, &["article", "main"]).as_deref(),
            Some("article")
        );
    }

    #[test]
    fn invalid_selectors_are_ignored() {
        let html = r#"<body><main>Primary</main></body>"#;
        assert_eq!(root_name(html, &["[[", "main"]).as_deref(), Some("main"));
    }
}
