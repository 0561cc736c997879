//! Units of crawl work handed from discovery to the fetch stage.

use serde::{Deserialize, Serialize};
use url::Url;

/// Selector profile applied when a target does not name one.
pub const DEFAULT_PROFILE: &str = "mintlify";
/// Priority assigned when the sitemap does not provide one.
pub const DEFAULT_PRIORITY: f32 = 0.5;

/// Discovery sources recorded in [`CrawlTarget::tags`].
pub mod tags {
    /// Found in `sitemap.xml`.
    pub const SITEMAP: &str = "sitemap";
    /// Listed by `llms.txt`.
    pub const LLMS_INDEX: &str = "llms-index";
    /// Linked from the homepage navigation.
    pub const HOMEPAGE: &str = "homepage";
    /// Followed from another page's content.
    pub const LINK: &str = "link";
}

/// A URL scheduled for fetching, plus where it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlTarget {
    url: Url,
    #[serde(default = "default_profile")]
    profile: String,
    #[serde(default = "default_priority")]
    priority: f32,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    depth: u8,
}

fn default_profile() -> String {
    DEFAULT_PROFILE.to_string()
}

fn default_priority() -> f32 {
    DEFAULT_PRIORITY
}

impl CrawlTarget {
    /// Creates a target with the default profile and priority.
    pub fn new(url: Url, depth: u8) -> Self {
        Self {
            url,
            profile: default_profile(),
            priority: DEFAULT_PRIORITY,
            tags: Vec::new(),
            depth,
        }
    }

    /// Overrides the priority (sitemap `<priority>`).
    pub fn with_priority(mut self, priority: f32) -> Self {
        self.priority = priority;
        self
    }

    /// Appends a discovery tag.
    pub fn with_tag(mut self, tag: &str) -> Self {
        self.tags.push(tag.to_string());
        self
    }

    /// Target URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Selector profile key.
    pub fn profile(&self) -> &str {
        &self.profile
    }

    /// Scheduling priority in `0.0..=1.0`.
    pub fn priority(&self) -> f32 {
        self.priority
    }

    /// Discovery tags.
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Link distance from the discovered seed set.
    pub fn depth(&self) -> u8 {
        self.depth
    }
}
