//! Link collection built on `lol_html`.

use std::cell::RefCell;
use std::rc::Rc;

use lol_html::{element, HtmlRewriter, OutputSink, Settings};
use thiserror::Error;

/// Which anchors [`collect_links`] looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkScope {
    /// Navigation chrome: `nav`, `aside`, sidebars, navbars, menus.
    Navigation,
    /// The main content area.
    Content,
    /// Every anchor on the page.
    Anywhere,
}

impl LinkScope {
    fn selectors(self) -> &'static [&'static str] {
        match self {
            Self::Navigation => &[
                "nav a[href]",
                "aside a[href]",
                "#sidebar a[href]",
                "[class*=\"sidebar\"] a[href]",
                "[class*=\"navbar\"] a[href]",
                "[class*=\"menu\"] a[href]",
            ],
            Self::Content => &[
                "main a[href]",
                "article a[href]",
                "[class*=\"content\"] a[href]",
            ],
            Self::Anywhere => &["a[href]"],
        }
    }
}

/// Collects anchors in `scope`, mapping each `href` through `transform`.
///
/// `transform` returning `None` drops the link; only kept links count against `limit`. An anchor
/// matched by several scope selectors is reported once per match, so callers dedupe.
pub fn collect_links<T, F>(
    html: &str,
    scope: LinkScope,
    limit: usize,
    transform: F,
) -> Result<Vec<T>, HtmlError>
where
    F: Fn(&str) -> Option<T>,
{
    if limit == 0 {
        return Ok(Vec::new());
    }

    let found: Rc<RefCell<Vec<T>>> = Rc::new(RefCell::new(Vec::new()));
    let transform = Rc::new(transform);

    let handlers = scope
        .selectors()
        .iter()
        .map(|selector| {
            let found = Rc::clone(&found);
            let transform = Rc::clone(&transform);
            element!(*selector, move |anchor| {
                let mut links = found.borrow_mut();
                if links.len() < limit {
                    if let Some(link) = anchor
                        .get_attribute("href")
                        .and_then(|href| transform(&href))
                    {
                        links.push(link);
                    }
                }
                Ok(())
            })
        })
        .collect::<Vec<_>>();

    let mut rewriter = HtmlRewriter::new(
        Settings {
            element_content_handlers: handlers,
            ..Settings::default()
        },
        NoopSink,
    );
    rewriter.write(html.as_bytes())?;
    rewriter.end()?;

    Rc::try_unwrap(found)
        .map(RefCell::into_inner)
        .map_err(|_| HtmlError::CollectorInUse)
}

/// Errors surfaced while scanning HTML.
#[derive(Debug, Error)]
pub enum HtmlError {
    /// The rewriter rejected the markup.
    #[error("html rewrite error: {0}")]
    Rewrite(#[from] lol_html::errors::RewritingError),
    /// A handler still held the link buffer after the rewrite finished.
    #[error("link collector still in use")]
    CollectorInUse,
}

struct NoopSink;

impl OutputSink for NoopSink {
    fn handle_chunk(&mut self, _chunk: &[u8]) {}
}
