//! Crawl tuning knobs and the command-line surface that sets them.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use url::Url;

use crate::fetch::{RetryPolicy, DEFAULT_USER_AGENT};

/// Tunable knobs that bound crawl behavior.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CrawlControls {
    max_concurrent: usize,
    batch_delay: Duration,
    crawl_depth: u8,
    follow_links: bool,
    checkpoint_every: usize,
    llms_index: bool,
}

impl CrawlControls {
    /// Constructs a new set of crawl controls.
    pub fn new(
        max_concurrent: usize,
        batch_delay: Duration,
        crawl_depth: u8,
        follow_links: bool,
    ) -> Self {
        Self {
            max_concurrent: max_concurrent.max(1),
            batch_delay,
            crawl_depth,
            follow_links,
            ..Self::default()
        }
    }

    /// Sets how many successful pages trigger a checkpoint.
    pub fn with_checkpoint_every(mut self, pages: usize) -> Self {
        self.checkpoint_every = pages.max(1);
        self
    }

    /// Enables `llms.txt` discovery.
    pub fn with_llms_index(mut self, enabled: bool) -> Self {
        self.llms_index = enabled;
        self
    }

    /// Pages fetched concurrently per batch.
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Pause between batches.
    pub fn batch_delay(&self) -> Duration {
        self.batch_delay
    }

    /// Links are followed while a target's depth is below this.
    pub fn crawl_depth(&self) -> u8 {
        self.crawl_depth
    }

    /// Whether content links are enqueued.
    pub fn follow_links(&self) -> bool {
        self.follow_links
    }

    /// Successful pages between checkpoints.
    pub fn checkpoint_every(&self) -> usize {
        self.checkpoint_every
    }

    /// Whether discovery reads `llms.txt` first.
    pub fn llms_index(&self) -> bool {
        self.llms_index
    }
}

impl Default for CrawlControls {
    fn default() -> Self {
        Self {
            max_concurrent: 3,
            batch_delay: Duration::from_millis(1000),
            crawl_depth: 3,
            follow_links: true,
            checkpoint_every: 10,
            llms_index: false,
        }
    }
}

/// Command-line interface of the crawler.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "mintcrawl",
    version,
    about = "Crawl a Mintlify documentation site into markdown"
)]
pub struct Cli {
    /// Base URL of the documentation site
    #[arg(env = "MINTCRAWL_URL")]
    pub url: Option<String>,

    /// Output directory (default: output/<host>)
    #[arg(short, long, env = "MINTCRAWL_OUTPUT")]
    pub output: Option<PathBuf>,

    /// Pages fetched concurrently per batch
    #[arg(long, env = "MINTCRAWL_CONCURRENT", default_value_t = 3)]
    pub concurrent: usize,

    /// Milliseconds to wait between batches
    #[arg(long, env = "MINTCRAWL_DELAY", default_value_t = 1000)]
    pub delay: u64,

    /// Maximum link depth followed from discovered pages
    #[arg(long, env = "MINTCRAWL_CRAWL_DEPTH", default_value_t = 3)]
    pub crawl_depth: u8,

    /// Archive the output directory into <output>.zip
    #[arg(long, env = "MINTCRAWL_ZIP", default_value_t = false)]
    pub zip: bool,

    /// Only crawl discovered pages, never follow content links
    #[arg(long, env = "MINTCRAWL_NO_FOLLOW_LINKS", default_value_t = false)]
    pub no_follow_links: bool,

    /// Resume from the progress file in this directory
    #[arg(long, env = "MINTCRAWL_RESUME")]
    pub resume: Option<PathBuf>,

    /// Try <base>/llms.txt before the sitemap
    #[arg(long, env = "MINTCRAWL_LLMS_INDEX", default_value_t = false)]
    pub llms_index: bool,

    /// User agent sent with every request
    #[arg(long, env = "MINTCRAWL_USER_AGENT", default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,

    /// Per-request timeout in seconds
    #[arg(long, env = "MINTCRAWL_TIMEOUT", default_value_t = 30)]
    pub timeout: u64,

    /// Retries after the first failed attempt
    #[arg(long, env = "MINTCRAWL_RETRIES", default_value_t = 3)]
    pub retries: u32,

    /// Debug logging
    #[arg(short, long, env = "MINTCRAWL_VERBOSE", default_value_t = false)]
    pub verbose: bool,
}

impl Cli {
    /// Converts the parsed CLI into `CrawlControls`.
    pub fn build_controls(&self) -> CrawlControls {
        CrawlControls::new(
            self.concurrent,
            Duration::from_millis(self.delay),
            self.crawl_depth,
            !self.no_follow_links,
        )
        .with_llms_index(self.llms_index)
    }

    /// Retry policy with the configured retry count.
    pub fn retry_policy(&self) -> RetryPolicy {
        let defaults = RetryPolicy::default();
        RetryPolicy::new(
            self.retries,
            defaults.backoff(1),
            defaults.backoff(u32::MAX),
        )
    }

    /// Per-request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Output directory for a crawl of `base`.
    ///
    /// An explicit `--output` wins, then the `--resume` directory, then `output/<host>`.
    pub fn output_dir(&self, base: &Url) -> PathBuf {
        if let Some(output) = &self.output {
            return output.clone();
        }
        if let Some(resume) = &self.resume {
            return resume.clone();
        }
        let host = base.host_str().unwrap_or("site");
        PathBuf::from("output").join(host)
    }
}
