use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use mintcrawl::checkpoint::Checkpoint;
use mintcrawl::control::ControlEvent;
use mintcrawl::{
    CrawlControls, CrawlOutcome, CrawlProgress, CrawlSession, Crawler, Discovery, FetchError,
    FetchedPage, PageSource, RetryPolicy,
};
use pretty_assertions::assert_eq;
use tokio::sync::mpsc;
use url::Url;

const BASE: &str = "https://docs.test/";

struct FakeSite {
    pages: HashMap<&'static str, (u16, String)>,
    calls: RefCell<HashMap<String, u32>>,
}

fn page(title: &str, links: &[&str]) -> String {
    let anchors: String = links
        .iter()
        .map(|href| format!("<a href=\"{href}\">{href}</a> "))
        .collect();
    format!(
        "<html><head><title>{title}</title></head><body>\
         <nav><a href=\"/nav-only\">Nav</a></nav>\
         <main><h1>{title}</h1><p>About {title}. {anchors}</p>\
         <pre><code class=\"language-bash\">curl {title}\n</code></pre></main></body></html>"
    )
}

impl FakeSite {
    fn docs() -> Self {
        let mut pages = HashMap::new();
        pages.insert(
            "/sitemap.xml",
            (
                200,
                "<urlset>\
                 <url><loc>https://docs.test/intro</loc></url>\
                 <url><loc>https://docs.test/guides/setup</loc></url>\
                 <url><loc>https://docs.test/blog/news</loc></url>\
                 </urlset>"
                    .to_string(),
            ),
        );
        pages.insert(
            "/intro",
            (
                200,
                page("Intro", &["/guides/auth", "/guides/setup#install"]),
            ),
        );
        pages.insert("/guides/setup", (200, page("Setup", &["/guides/advanced"])));
        pages.insert(
            "/guides/auth",
            (200, page("Auth", &["/guides/deep", "https://other.test/x"])),
        );
        pages.insert("/guides/advanced", (200, page("Advanced", &[])));
        pages.insert("/guides/deep", (200, page("Deep", &[])));
        Self {
            pages,
            calls: RefCell::new(HashMap::new()),
        }
    }

    fn with(mut self, path: &'static str, status: u16, body: &str) -> Self {
        self.pages.insert(path, (status, body.to_string()));
        self
    }

    fn calls(&self, path: &str) -> u32 {
        self.calls.borrow().get(path).copied().unwrap_or(0)
    }
}

#[async_trait(?Send)]
impl PageSource for FakeSite {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        *self
            .calls
            .borrow_mut()
            .entry(url.path().to_string())
            .or_default() += 1;
        match self.pages.get(url.path()) {
            Some((200, body)) => Ok(FetchedPage::new(url.clone(), 200, body.as_bytes())),
            Some((status, _)) => Err(FetchError::Status(*status)),
            None => Err(FetchError::Status(404)),
        }
    }
}

fn controls(batch: usize, depth: u8) -> CrawlControls {
    CrawlControls::new(batch, Duration::ZERO, depth, true)
}

fn no_wait(retries: u32) -> RetryPolicy {
    RetryPolicy::new(retries, Duration::ZERO, Duration::ZERO)
}

async fn seeded(site: &FakeSite) -> CrawlSession {
    let base = Url::parse(BASE).unwrap();
    let seeds = Discovery::new(base.clone())
        .run(site)
        .await
        .expect("discovery");
    CrawlSession::new(base, seeds)
}

fn urls(session: &CrawlSession) -> BTreeSet<String> {
    session
        .documents()
        .iter()
        .map(|doc| doc.url.clone())
        .collect()
}

#[tokio::test(flavor = "current_thread")]
async fn link_following_stops_at_crawl_depth() {
    let site = FakeSite::docs();
    let mut session = seeded(&site).await;
    let mut crawler = Crawler::new(&site, controls(2, 1), no_wait(0));

    let outcome = crawler.crawl(&mut session).await.expect("crawl");

    assert_eq!(outcome, CrawlOutcome::Completed);
    assert_eq!(
        urls(&session),
        BTreeSet::from([
            "https://docs.test/guides/advanced".to_string(),
            "https://docs.test/guides/auth".to_string(),
            "https://docs.test/guides/setup".to_string(),
            "https://docs.test/intro".to_string(),
        ])
    );
    assert_eq!(site.calls("/blog/news"), 0);
    assert_eq!(site.calls("/guides/deep"), 0);
    assert_eq!(site.calls("/nav-only"), 0);
    assert_eq!(site.calls("/guides/setup"), 1);

    let setup = session
        .documents()
        .iter()
        .find(|doc| doc.url.ends_with("/guides/setup"))
        .expect("setup page");
    assert_eq!(setup.section, "guides");
    assert_eq!(setup.subsection.as_deref(), Some("setup"));
    assert_eq!(setup.code_examples[0].code, "curl Setup\n");
}

#[tokio::test(flavor = "current_thread")]
async fn failures_are_recorded_with_attempt_counts() {
    let site = FakeSite::docs()
        .with("/guides/advanced", 503, "")
        .with("/guides/auth", 403, "");
    let mut session = seeded(&site).await;
    let mut crawler = Crawler::new(&site, controls(3, 1), no_wait(2));

    crawler.crawl(&mut session).await.expect("crawl");

    let failed = session.failed();
    assert_eq!(failed["https://docs.test/guides/advanced"].attempts, 3);
    assert_eq!(
        failed["https://docs.test/guides/advanced"].last_error,
        "HTTP 503"
    );
    assert_eq!(failed["https://docs.test/guides/auth"].attempts, 1);
    assert_eq!(site.calls("/guides/advanced"), 3);
    assert_eq!(session.documents().len(), 2);
    assert!(session.visited().contains("https://docs.test/guides/auth"));
}

#[tokio::test(flavor = "current_thread")]
async fn resumed_crawl_matches_uninterrupted_run() {
    let reference_site = FakeSite::docs();
    let mut reference = seeded(&reference_site).await;
    Crawler::new(&reference_site, controls(2, 3), no_wait(0))
        .crawl(&mut reference)
        .await
        .expect("reference crawl");

    let site = FakeSite::docs();
    let mut interrupted = seeded(&site).await;
    let mut crawler = Crawler::new(&site, controls(2, 3), no_wait(0));
    assert!(crawler.crawl_batch(&mut interrupted).await);
    let progress = interrupted.snapshot();
    assert_eq!(progress.visited_urls.len(), 2);
    assert!(!progress.remaining_queue.is_empty());

    let json = serde_json::to_string(&progress).expect("encode");
    let restored: CrawlProgress = serde_json::from_str(&json).expect("decode");
    let mut resumed = CrawlSession::from_progress(restored).expect("resume");
    Crawler::new(&site, controls(2, 3), no_wait(0))
        .crawl(&mut resumed)
        .await
        .expect("resumed crawl");

    assert_eq!(urls(&resumed), urls(&reference));
    assert_eq!(urls(&resumed).len(), 5);
    for path in ["/intro", "/guides/setup", "/guides/deep"] {
        assert_eq!(site.calls(path), 1, "{path} fetched once");
    }
}

#[tokio::test(flavor = "current_thread")]
async fn pause_then_save_writes_checkpoint() {
    let dir = tempfile::tempdir().expect("tempdir");
    let checkpoint = Checkpoint::in_dir(dir.path());
    let site = FakeSite::docs();
    let mut session = seeded(&site).await;

    let (tx, rx) = mpsc::channel(4);
    tx.send(ControlEvent::Key('p')).await.unwrap();
    tx.send(ControlEvent::Key('s')).await.unwrap();
    let mut crawler = Crawler::new(&site, controls(2, 3), no_wait(0))
        .with_checkpoint(checkpoint.clone())
        .with_events(rx);

    let outcome = crawler.crawl(&mut session).await.expect("crawl");

    assert_eq!(outcome, CrawlOutcome::Saved);
    let progress = checkpoint.load().expect("load").expect("saved");
    assert_eq!(progress.base_url, BASE);
    assert!(progress.scraped_pages.is_empty());
    assert_eq!(progress.remaining_queue.len(), 2);
    assert_eq!(site.calls("/intro"), 0);
    drop(tx);
}

#[tokio::test(flavor = "current_thread")]
async fn checkpoints_every_n_successes() {
    let dir = tempfile::tempdir().expect("tempdir");
    let checkpoint = Checkpoint::in_dir(dir.path());
    let site = FakeSite::docs();
    let mut session = seeded(&site).await;
    let mut crawler = Crawler::new(
        &site,
        CrawlControls::new(1, Duration::ZERO, 0, false).with_checkpoint_every(1),
        no_wait(0),
    )
    .with_checkpoint(checkpoint.clone());

    crawler.crawl(&mut session).await.expect("crawl");

    let progress = checkpoint.load().expect("load").expect("checkpointed");
    assert_eq!(progress.scraped_pages.len(), 2);
    assert!(progress.remaining_queue.is_empty());
    assert_eq!(session.since_checkpoint(), 0);
}
