//! Builds the initial crawl queue for a documentation site.
//!
//! Strategies run in order until one yields targets: the optional `llms.txt`
//! index, then `sitemap.xml` (an index is followed one level), then links
//! collected from the homepage navigation.

use std::collections::HashSet;
use std::sync::OnceLock;

use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::fetch::PageSource;
use crate::html::{collect_links, LinkScope};
use crate::target::{tags, CrawlTarget};

/// Path fragments that are never crawled.
pub const DENYLIST: &[&str] = &[
    "/blog",
    "/changelog",
    "/search",
    "/404",
    "/legal",
    "/privacy",
    "/terms",
];

/// Discovery failed to produce any targets.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Neither the sitemap nor the homepage could be used.
    #[error("no pages discovered for {base}: {reason}")]
    Unreachable {
        /// Site being crawled.
        base: String,
        /// Homepage failure.
        reason: String,
    },
    /// Sitemap XML could not be parsed.
    #[error("invalid sitemap: {0}")]
    Sitemap(#[from] quick_xml::Error),
}

/// Whether the URL path contains a denylisted fragment.
pub fn is_denied(url: &Url) -> bool {
    let path = url.path();
    DENYLIST.iter().any(|fragment| path.contains(fragment))
}

/// Same host as the base URL.
pub fn same_host(base: &Url, candidate: &Url) -> bool {
    candidate.host_str() == base.host_str()
}

/// Drops the fragment so anchors on one page share a URL.
pub fn canonicalize(mut url: Url) -> Url {
    url.set_fragment(None);
    url
}

/// One `<url>` entry from a sitemap.
#[derive(Debug, Clone, PartialEq)]
pub struct SitemapEntry {
    /// `<loc>` value.
    pub loc: String,
    /// `<priority>` value, when present and numeric.
    pub priority: Option<f32>,
}

/// A parsed sitemap document.
#[derive(Debug, Clone, PartialEq)]
pub enum Sitemap {
    /// `<urlset>` of pages.
    UrlSet(Vec<SitemapEntry>),
    /// `<sitemapindex>` pointing at child sitemaps.
    Index(Vec<String>),
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Field {
    None,
    Loc,
    Priority,
}

/// Parses a sitemap or sitemap index.
pub fn parse_sitemap(xml: &str) -> Result<Sitemap, DiscoveryError> {
    let mut reader = Reader::from_str(xml);
    let mut entries = Vec::new();
    let mut children = Vec::new();
    let mut is_index = false;
    let mut in_entry = false;
    let mut field = Field::None;
    let mut current = SitemapEntry {
        loc: String::new(),
        priority: None,
    };
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"sitemapindex" => is_index = true,
                b"url" | b"sitemap" => {
                    in_entry = true;
                    current = SitemapEntry {
                        loc: String::new(),
                        priority: None,
                    };
                }
                b"loc" if in_entry => field = Field::Loc,
                b"priority" if in_entry => field = Field::Priority,
                _ => {}
            },
            Event::Text(e) if field != Field::None => {
                let text = e.unescape()?;
                let text = text.trim();
                match field {
                    Field::Loc => current.loc.push_str(text),
                    Field::Priority => current.priority = text.parse().ok(),
                    Field::None => {}
                }
            }
            Event::CData(e) if field == Field::Loc => {
                current
                    .loc
                    .push_str(String::from_utf8_lossy(&e.into_inner()).trim());
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"loc" | b"priority" => field = Field::None,
                b"url" => {
                    in_entry = false;
                    if !current.loc.is_empty() {
                        entries.push(current.clone());
                    }
                }
                b"sitemap" => {
                    in_entry = false;
                    if !current.loc.is_empty() {
                        children.push(current.loc.clone());
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(if is_index {
        Sitemap::Index(children)
    } else {
        Sitemap::UrlSet(entries)
    })
}

fn llms_link_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[[^\]]*\]\(([^)\s]+)\)").expect("llms link regex"))
}

/// Extracts same-host page URLs from an `llms.txt` index.
///
/// Links are markdown `[title](url)` pairs; a trailing `.md` is removed.
pub fn parse_llms_index(text: &str, base: &Url) -> Vec<Url> {
    let mut seen = HashSet::new();
    llms_link_regex()
        .captures_iter(text)
        .filter_map(|caps| base.join(caps.get(1)?.as_str()).ok())
        .map(|mut url| {
            if let Some(stripped) = url.path().strip_suffix(".md").map(str::to_string) {
                url.set_path(&stripped);
            }
            canonicalize(url)
        })
        .filter(|url| same_host(base, url) && !is_denied(url))
        .filter(|url| seen.insert(url.to_string()))
        .collect()
}

/// Discovery configuration for one site.
#[derive(Debug, Clone)]
pub struct Discovery {
    base: Url,
    use_llms_index: bool,
}

impl Discovery {
    /// Discovery rooted at `base`.
    pub fn new(base: Url) -> Self {
        Self {
            base,
            use_llms_index: false,
        }
    }

    /// Enables the `llms.txt` lookup.
    pub fn with_llms_index(mut self, enabled: bool) -> Self {
        self.use_llms_index = enabled;
        self
    }

    /// Resolves `name` under the base URL's directory, so a base of
    /// `https://acme.dev/docs` looks for `https://acme.dev/docs/<name>`.
    fn site_file(&self, name: &str) -> Result<Url, url::ParseError> {
        let mut dir = self.base.clone();
        dir.set_query(None);
        dir.set_fragment(None);
        if !dir.path().ends_with('/') {
            let path = format!("{}/", dir.path());
            dir.set_path(&path);
        }
        dir.join(name)
    }

    /// Runs the strategies in order and returns the initial queue.
    pub async fn run(&self, source: &dyn PageSource) -> Result<Vec<CrawlTarget>, DiscoveryError> {
        if self.use_llms_index {
            let targets = self.from_llms_index(source).await;
            if !targets.is_empty() {
                info!(count = targets.len(), "discovered pages from llms.txt");
                return Ok(targets);
            }
        }

        let targets = self.from_sitemap(source).await;
        if !targets.is_empty() {
            info!(count = targets.len(), "discovered pages from sitemap");
            return Ok(targets);
        }

        let targets = self.from_homepage(source).await?;
        info!(
            count = targets.len(),
            "discovered pages from homepage navigation"
        );
        Ok(targets)
    }

    async fn from_llms_index(&self, source: &dyn PageSource) -> Vec<CrawlTarget> {
        let Ok(llms_url) = self.site_file("llms.txt") else {
            return Vec::new();
        };
        match source.fetch(&llms_url).await {
            Ok(page) => parse_llms_index(&page.body, &self.base)
                .into_iter()
                .map(|url| CrawlTarget::new(url, 0).with_tag(tags::LLMS_INDEX))
                .collect(),
            Err(err) => {
                debug!(url = %llms_url, %err, "llms.txt unavailable");
                Vec::new()
            }
        }
    }

    async fn from_sitemap(&self, source: &dyn PageSource) -> Vec<CrawlTarget> {
        let Ok(sitemap_url) = self.site_file("sitemap.xml") else {
            return Vec::new();
        };
        let entries = match self.read_sitemap(source, &sitemap_url).await {
            Some(Sitemap::UrlSet(entries)) => entries,
            Some(Sitemap::Index(children)) => {
                let mut entries = Vec::new();
                for child in children {
                    let Ok(child_url) = self.base.join(&child) else {
                        continue;
                    };
                    match self.read_sitemap(source, &child_url).await {
                        Some(Sitemap::UrlSet(found)) => entries.extend(found),
                        Some(Sitemap::Index(_)) => {
                            debug!(url = %child_url, "nested sitemap index ignored")
                        }
                        None => {}
                    }
                }
                entries
            }
            None => Vec::new(),
        };

        let mut seen = HashSet::new();
        entries
            .into_iter()
            .filter_map(|entry| {
                let url = canonicalize(self.base.join(&entry.loc).ok()?);
                if !same_host(&self.base, &url) || is_denied(&url) {
                    return None;
                }
                let target = CrawlTarget::new(url, 0).with_tag(tags::SITEMAP);
                Some(match entry.priority {
                    Some(priority) => target.with_priority(priority),
                    None => target,
                })
            })
            .filter(|target| seen.insert(target.url().to_string()))
            .collect()
    }

    async fn read_sitemap(&self, source: &dyn PageSource, url: &Url) -> Option<Sitemap> {
        let page = match source.fetch(url).await {
            Ok(page) => page,
            Err(err) => {
                debug!(%url, %err, "sitemap unavailable");
                return None;
            }
        };
        match parse_sitemap(&page.body) {
            Ok(sitemap) => Some(sitemap),
            Err(err) => {
                warn!(%url, %err, "ignoring unparsable sitemap");
                None
            }
        }
    }

    async fn from_homepage(
        &self,
        source: &dyn PageSource,
    ) -> Result<Vec<CrawlTarget>, DiscoveryError> {
        let page = source
            .fetch(&self.base)
            .await
            .map_err(|err| DiscoveryError::Unreachable {
                base: self.base.to_string(),
                reason: err.to_string(),
            })?;

        let base = self.base.clone();
        let links = collect_links(&page.body, LinkScope::Navigation, usize::MAX, move |href| {
            base.join(href).ok().map(canonicalize)
        })
        .unwrap_or_else(|err| {
            warn!(%err, "homepage navigation could not be scanned");
            Vec::new()
        });

        let homepage = canonicalize(self.base.clone());
        let mut seen = HashSet::new();
        seen.insert(homepage.to_string());
        let mut targets = vec![CrawlTarget::new(homepage, 0).with_tag(tags::HOMEPAGE)];
        targets.extend(
            links
                .into_iter()
                .filter(|url| same_host(&self.base, url) && !is_denied(url))
                .filter(|url| seen.insert(url.to_string()))
                .map(|url| CrawlTarget::new(url, 0).with_tag(tags::HOMEPAGE)),
        );
        Ok(targets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::FetchedPage;
    use crate::fetch::FetchError;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    struct StaticSite(HashMap<&'static str, &'static str>);

    #[async_trait(?Send)]
    impl PageSource for StaticSite {
        async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError> {
            self.0
                .get(url.as_str())
                .map(|body| FetchedPage::new(url.clone(), 200, body.as_bytes()))
                .ok_or(FetchError::Status(404))
        }
    }

    fn urls(targets: &[CrawlTarget]) -> Vec<String> {
        targets.iter().map(|t| t.url().to_string()).collect()
    }

    const SITEMAP: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc>https://docs.x.com/intro</loc><priority>0.9</priority></url>
  <url><loc>https://docs.x.com/blog/post</loc></url>
  <url><loc>https://other.com/page</loc></url>
  <url><loc>https://docs.x.com/guides/setup#top</loc></url>
</urlset>"#;

    #[test]
    fn parses_urlset_with_priorities() {
        let Sitemap::UrlSet(entries) = parse_sitemap(SITEMAP).expect("parse") else {
            panic!("expected urlset");
        };
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0].priority, Some(0.9));
        assert_eq!(entries[1].priority, None);
    }

    #[test]
    fn parses_sitemap_index() {
        let xml = r#"<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
            <sitemap><loc>https://docs.x.com/sitemap-1.xml</loc></sitemap>
        </sitemapindex>"#;
        assert_eq!(
            parse_sitemap(xml).expect("parse"),
            Sitemap::Index(vec!["https://docs.x.com/sitemap-1.xml".to_string()])
        );
    }

    #[test]
    fn denylist_matches_path_fragments() {
        assert!(is_denied(&Url::parse("https://docs.x.com/blog/post").unwrap()));
        assert!(is_denied(&Url::parse("https://docs.x.com/en/changelog").unwrap()));
        assert!(!is_denied(&Url::parse("https://docs.x.com/intro").unwrap()));
    }

    #[test]
    fn llms_index_links_lose_md_suffix() {
        let base = Url::parse("https://docs.x.com/").unwrap();
        let text = "# Docs\n- [Intro](https://docs.x.com/intro.md): start here\n- [Setup](/guides/setup.md)\n- [Ext](https://other.com/a.md)\n- [Intro again](https://docs.x.com/intro.md)";
        let found: Vec<String> = parse_llms_index(text, &base)
            .into_iter()
            .map(|u| u.to_string())
            .collect();
        assert_eq!(
            found,
            ["https://docs.x.com/intro", "https://docs.x.com/guides/setup"]
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn sitemap_filters_denylist_and_foreign_hosts() {
        let site = StaticSite(HashMap::from([("https://docs.x.com/sitemap.xml", SITEMAP)]));
        let targets = Discovery::new(Url::parse("https://docs.x.com").unwrap())
            .run(&site)
            .await
            .expect("discovered");
        assert_eq!(
            urls(&targets),
            ["https://docs.x.com/intro", "https://docs.x.com/guides/setup"]
        );
        assert_eq!(targets[0].priority(), 0.9);
        assert_eq!(targets[1].priority(), 0.5);
        assert_eq!(targets[0].tags(), ["sitemap".to_string()]);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn sitemap_index_is_followed_one_level() {
        let site = StaticSite(HashMap::from([
            (
                "https://docs.x.com/sitemap.xml",
                "<sitemapindex><sitemap><loc>https://docs.x.com/pages.xml</loc></sitemap></sitemapindex>",
            ),
            (
                "https://docs.x.com/pages.xml",
                "<urlset><url><loc>https://docs.x.com/a</loc></url></urlset>",
            ),
        ]));
        let targets = Discovery::new(Url::parse("https://docs.x.com/").unwrap())
            .run(&site)
            .await
            .expect("discovered");
        assert_eq!(urls(&targets), ["https://docs.x.com/a"]);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn falls_back_to_homepage_navigation() {
        let site = StaticSite(HashMap::from([(
            "https://docs.x.com/",
            r#"<nav><a href="/intro">Intro</a><a href="/intro#x">Intro</a><a href="/terms">Terms</a><a href="https://other.com/">Out</a></nav>
               <main><a href="/not-nav">Body link</a></main>"#,
        )]));
        let targets = Discovery::new(Url::parse("https://docs.x.com/").unwrap())
            .run(&site)
            .await
            .expect("discovered");
        assert_eq!(
            urls(&targets),
            ["https://docs.x.com/", "https://docs.x.com/intro"]
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn llms_index_is_preferred_when_enabled() {
        let site = StaticSite(HashMap::from([
            (
                "https://docs.x.com/llms.txt",
                "- [Intro](https://docs.x.com/intro.md)",
            ),
            ("https://docs.x.com/sitemap.xml", SITEMAP),
        ]));
        let base = Url::parse("https://docs.x.com/").unwrap();
        let targets = Discovery::new(base.clone())
            .with_llms_index(true)
            .run(&site)
            .await
            .expect("discovered");
        assert_eq!(urls(&targets), ["https://docs.x.com/intro"]);

        let without = Discovery::new(base).run(&site).await.expect("discovered");
        assert_eq!(without.len(), 2);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn site_files_resolve_under_base_path() {
        let site = StaticSite(HashMap::from([
            (
                "https://acme.dev/sitemap.xml",
                "<urlset><url><loc>https://acme.dev/pricing</loc></url></urlset>",
            ),
            (
                "https://acme.dev/docs/sitemap.xml",
                "<urlset><url><loc>https://acme.dev/docs/a</loc></url></urlset>",
            ),
            (
                "https://acme.dev/docs/llms.txt",
                "- [B](https://acme.dev/docs/b.md)",
            ),
        ]));
        let base = Url::parse("https://acme.dev/docs").unwrap();

        let targets = Discovery::new(base.clone())
            .run(&site)
            .await
            .expect("discovered");
        assert_eq!(urls(&targets), ["https://acme.dev/docs/a"]);

        let targets = Discovery::new(base)
            .with_llms_index(true)
            .run(&site)
            .await
            .expect("discovered");
        assert_eq!(urls(&targets), ["https://acme.dev/docs/b"]);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn unreachable_site_is_an_error() {
        let site = StaticSite(HashMap::new());
        let err = Discovery::new(Url::parse("https://docs.x.com/").unwrap())
            .run(&site)
            .await
            .expect_err("nothing reachable");
        assert!(matches!(err, DiscoveryError::Unreachable { .. }));
    }
}
