//! Removal of non-content markup ahead of extraction.
//!
//! Passes run in a fixed order. Scripts go first so that later heuristics
//! never see inline script text and mistake it for a code sample.

use scraper::{ElementRef, Html, Selector};

/// A named group of selectors removed in one sweep.
#[derive(Debug, Clone, Copy)]
pub struct CleaningPass {
    /// Short label used in debug logs.
    pub name: &'static str,
    /// CSS selectors whose matches are detached.
    pub selectors: &'static [&'static str],
}

/// Selector-driven passes, in execution order. The class-name chrome
/// heuristic runs after all of them.
pub const CLEANING_PASSES: &[CleaningPass] = &[
    CleaningPass {
        name: "scripts",
        selectors: &["script", "style", "noscript"],
    },
    CleaningPass {
        name: "navigation",
        selectors: &[
            "nav",
            "aside",
            "[role=\"navigation\"]",
            "#sidebar",
            ".sidebar",
            "#table-of-contents",
            ".table-of-contents",
            "#toc",
            ".toc",
        ],
    },
    CleaningPass {
        name: "embeds",
        selectors: &["iframe", "embed", "object"],
    },
];

const CHROME_FRAGMENTS: &[&str] = &[
    "navbar",
    "footer",
    "banner",
    "breadcrumb",
    "share",
    "social",
    "comment",
    "advert",
    "sponsor",
    "cookie",
    "pagination",
    "feedback",
    "edit-this-page",
    "skip-link",
];

const CHROME_TOKENS: &[&str] = &["ad", "ads", "ad-slot", "adsbygoogle"];

const PROTECTED_TAGS: &[&str] = &["html", "head", "body", "main", "article"];

/// Strips scripts, navigation, embeds and site chrome from `document` in place.
///
/// Returns the number of detached elements.
pub fn clean_document(document: &mut Html) -> usize {
    let mut removed = 0usize;
    for pass in CLEANING_PASSES {
        let mut ids = Vec::new();
        for raw in pass.selectors {
            let selector = Selector::parse(raw).expect("cleaning selector");
            ids.extend(
                document
                    .select(&selector)
                    .filter(|element| !inside_pre(element))
                    .map(|element| (*element).id()),
            );
        }
        tracing::trace!(pass = pass.name, matches = ids.len(), "cleaning pass");
        for id in ids {
            if let Some(mut node) = document.tree.get_mut(id) {
                node.detach();
                removed += 1;
            }
        }
    }

    let chrome: Vec<_> = document
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|element| is_site_chrome(element) && !inside_pre(element))
        .map(|element| (*element).id())
        .collect();
    tracing::trace!(pass = "chrome", matches = chrome.len(), "cleaning pass");
    for id in chrome {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
            removed += 1;
        }
    }
    removed
}

fn is_site_chrome(element: &ElementRef<'_>) -> bool {
    let value = element.value();
    if PROTECTED_TAGS.contains(&value.name()) {
        return false;
    }
    let id_matches = value.id().map(is_chrome_token).unwrap_or(false);
    id_matches || value.classes().any(is_chrome_token)
}

fn is_chrome_token(token: &str) -> bool {
    let token = token.to_ascii_lowercase();
    CHROME_TOKENS.contains(&token.as_str())
        || CHROME_FRAGMENTS
            .iter()
            .any(|fragment| token.contains(fragment))
}

fn inside_pre(element: &ElementRef<'_>) -> bool {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|ancestor| ancestor.value().name() == "pre")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cleaned_body(html: &str) -> String {
        let mut document = Html::parse_document(html);
        clean_document(&mut document);
        let body = Selector::parse("body").unwrap();
        document
            .select(&body)
            .next()
            .map(|node| node.text().collect::<String>())
            .unwrap_or_default()
    }

    #[test]
    fn removes_scripts_and_navigation() {
        let text = cleaned_body(
            r#"<body>
              <nav>Docs Home</nav>
              <div id="sidebar">Guides</div>
              <script>const hidden = true;</script>
              <main><p>Visible</p></main>
            </body>"#,
        );
        assert!(text.contains("Visible"));
        assert!(!text.contains("Docs Home"));
        assert!(!text.contains("Guides"));
        assert!(!text.contains("hidden"));
    }

    #[test]
    fn removes_chrome_by_class_name() {
        let text = cleaned_body(
            r#"<body><main>
              <div class="breadcrumbs">API / Users</div>
              <p>Keep</p>
              <div class="page-footer">Copyright</div>
              <div class="ad">Buy now</div>
              <div id="feedback-widget">Was this helpful?</div>
            </main></body>"#,
        );
        assert_eq!(text.trim(), "Keep");
    }

    #[test]
    fn leaves_highlighter_spans_inside_pre() {
        let text = cleaned_body(
            r#"<body><main><pre><code><span class="token comment"># setup</span>
pip install acme</code></pre></main></body>"#,
        );
        assert!(text.contains("# setup"));
        assert!(text.contains("pip install acme"));
    }

    #[test]
    fn does_not_remove_protected_containers() {
        let text =
            cleaned_body(r#"<body class="footer-visible"><main><p>Still here</p></main></body>"#);
        assert!(text.contains("Still here"));
    }
}
