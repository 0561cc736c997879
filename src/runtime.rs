//! Crawl orchestration: batch fetching, link following, checkpoints and the interactive
//! control loop, plus the `run` entry point used by the `mintcrawl` binary.

use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::Utc;
use doc_parser::PageParser;
use futures_util::future::join_all;
use thiserror::Error;
use tokio::runtime::Builder;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::task::LocalSet;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use url::Url;

use crate::archive::{zip_dir, ArchiveError};
use crate::checkpoint::{Checkpoint, CheckpointError};
use crate::control::{spawn_terminal_events, ControlEvent, ControlState, PAUSE_POLL_INTERVAL};
use crate::controls::{Cli, CrawlControls};
use crate::discovery::{canonicalize, is_denied, Discovery, DiscoveryError};
use crate::document::{Document, FetchedPage};
use crate::fetch::{fetch_with_retry, FetchError, HttpSource, PageSource, RetryFailure, RetryPolicy};
use crate::html::{collect_links, LinkScope};
use crate::output::{write_site, OutputError};
use crate::session::CrawlSession;
use crate::target::{tags, CrawlTarget};

/// Crawl-level failures. Page-level failures never surface here.
#[derive(Debug, Error)]
pub enum CrawlError {
    /// No base URL was given and nothing is being resumed.
    #[error("missing base URL (pass it as an argument or set MINTCRAWL_URL)")]
    MissingUrl,
    /// The base URL could not be parsed.
    #[error("invalid URL {url:?}: {source}")]
    InvalidUrl {
        /// Raw input.
        url: String,
        /// Parser error.
        source: url::ParseError,
    },
    /// `--resume` pointed at a directory without a progress file.
    #[error("no progress file at {0}")]
    NothingToResume(PathBuf),
    /// The tokio runtime could not start.
    #[error("failed to start runtime: {0}")]
    Runtime(#[source] io::Error),
    /// The HTTP client could not be built.
    #[error("failed to build http client: {0}")]
    Client(#[source] FetchError),
    /// Discovery found nothing to crawl.
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    /// Reading or writing the progress file failed.
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
    /// Writing outputs failed.
    #[error(transparent)]
    Output(#[from] OutputError),
    /// Zipping outputs failed.
    #[error(transparent)]
    Archive(#[from] ArchiveError),
}

/// How a call to [`Crawler::crawl`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlOutcome {
    /// The queue drained.
    Completed,
    /// The user saved progress and exited.
    Saved,
    /// The user deleted progress and exited.
    Discarded,
    /// The user exited without saving.
    Exited,
}

/// End-of-run numbers printed for the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CrawlSummary {
    /// Documents extracted.
    pub pages_scraped: usize,
    /// URLs that exhausted their retries.
    pub failed: usize,
    /// Pages fetched without extractable content.
    pub parse_failures: usize,
    /// Code examples across all documents.
    pub code_examples: usize,
}

impl CrawlSummary {
    /// Tallies a session.
    pub fn from_session(session: &CrawlSession) -> Self {
        Self {
            pages_scraped: session.documents().len(),
            failed: session.failed().len(),
            parse_failures: session.parse_failures(),
            code_examples: session
                .documents()
                .iter()
                .map(|doc| doc.code_examples.len())
                .sum(),
        }
    }

    /// Prints the summary to stdout.
    pub fn report(&self, elapsed: Duration) {
        let secs = elapsed.as_secs_f32();
        println!("--- crawl summary ({secs:.1}s) ---");
        println!("pages scraped: {}", self.pages_scraped);
        println!("failed: {}", self.failed);
        println!("parse failures: {}", self.parse_failures);
        println!("code examples: {}", self.code_examples);
        println!(
            "pages/sec: {:.2}",
            self.pages_scraped as f32 / secs.max(f32::EPSILON)
        );
    }
}

/// Drives a [`CrawlSession`] to completion or until the user stops it.
pub struct Crawler<'a> {
    source: &'a dyn PageSource,
    parser: PageParser,
    controls: CrawlControls,
    retry: RetryPolicy,
    checkpoint: Option<Checkpoint>,
    events: Option<mpsc::Receiver<ControlEvent>>,
    state: ControlState,
}

impl<'a> Crawler<'a> {
    /// A crawler without checkpointing or interactive control.
    pub fn new(source: &'a dyn PageSource, controls: CrawlControls, retry: RetryPolicy) -> Self {
        Self {
            source,
            parser: PageParser::new(),
            controls,
            retry,
            checkpoint: None,
            events: None,
            state: ControlState::Running,
        }
    }

    /// Replaces the page parser.
    pub fn with_parser(mut self, parser: PageParser) -> Self {
        self.parser = parser;
        self
    }

    /// Writes progress to `checkpoint`.
    pub fn with_checkpoint(mut self, checkpoint: Checkpoint) -> Self {
        self.checkpoint = Some(checkpoint);
        self
    }

    /// Listens for control events on `events`.
    pub fn with_events(mut self, events: mpsc::Receiver<ControlEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Current control state.
    pub fn state(&self) -> ControlState {
        self.state
    }

    /// Fetches and merges one batch. Returns `false` once the queue is empty.
    pub async fn crawl_batch(&mut self, session: &mut CrawlSession) -> bool {
        let batch = session.next_batch(self.controls.max_concurrent());
        if batch.is_empty() {
            return false;
        }

        let source = self.source;
        let retry = self.retry;
        let results = join_all(
            batch
                .iter()
                .map(|target| fetch_with_retry(source, target.url(), &retry)),
        )
        .await;

        for (target, result) in batch.into_iter().zip(results) {
            self.merge(session, target, result);
        }
        true
    }

    fn merge(
        &self,
        session: &mut CrawlSession,
        target: CrawlTarget,
        result: Result<(FetchedPage, u32), RetryFailure>,
    ) {
        let url = target.url();
        let (page, attempts) = match result {
            Ok(fetched) => fetched,
            Err(failure) => {
                println!("✗ {url}: {failure}");
                warn!(%url, attempts = failure.attempts, error = %failure.error, "page failed");
                session.record_failure(url, failure.attempts, failure.error.to_string());
                return;
            }
        };
        if page.lossy_decoding {
            debug!(%url, "body was not valid utf-8");
        }

        let queued = self.follow_links(session, &target, &page);
        match Document::assemble(&page, &self.parser) {
            Ok(document) => {
                let done = session.documents().len() + 1;
                println!(
                    "✓ [{done}/{}] {} ({} code examples{})",
                    done + session.pending(),
                    document.title,
                    document.code_examples.len(),
                    if attempts > 1 {
                        format!(", {attempts} attempts")
                    } else {
                        String::new()
                    }
                );
                debug!(%url, links = queued, "page scraped");
                session.record_success(document);
            }
            Err(err) => {
                println!("⚠ {url}: {err}");
                warn!(%url, %err, "no content extracted");
                session.record_parse_failure(url);
            }
        }
    }

    fn follow_links(
        &self,
        session: &mut CrawlSession,
        target: &CrawlTarget,
        page: &FetchedPage,
    ) -> usize {
        if !self.controls.follow_links() || target.depth() >= self.controls.crawl_depth() {
            return 0;
        }
        let page_url = page.url.clone();
        let links = match collect_links(&page.body, LinkScope::Content, usize::MAX, move |href| {
            page_url.join(href).ok().map(canonicalize)
        }) {
            Ok(links) => links,
            Err(err) => {
                warn!(url = %page.url, %err, "could not scan links");
                return 0;
            }
        };

        let origin = session.base_url().origin();
        let depth = target.depth() + 1;
        let mut queued = 0;
        for link in links {
            if link.origin() != origin || is_denied(&link) {
                continue;
            }
            if session.schedule(CrawlTarget::new(link, depth).with_tag(tags::LINK)) {
                queued += 1;
            }
        }
        queued
    }

    /// Runs batches until the queue drains or a control event stops the crawl.
    pub async fn crawl(&mut self, session: &mut CrawlSession) -> Result<CrawlOutcome, CrawlError> {
        loop {
            self.drain_events();

            match self.state {
                ControlState::Paused | ControlState::ConfirmExit => {
                    sleep(PAUSE_POLL_INTERVAL).await;
                    continue;
                }
                ControlState::SavingAndExiting => {
                    self.save(session)?;
                    return Ok(CrawlOutcome::Saved);
                }
                ControlState::DeletingAndExiting => {
                    if let Some(checkpoint) = &self.checkpoint {
                        checkpoint.delete()?;
                    }
                    return Ok(CrawlOutcome::Discarded);
                }
                ControlState::Exiting => return Ok(CrawlOutcome::Exited),
                ControlState::Resuming => {
                    self.reload(session)?;
                    self.state = ControlState::Running;
                    continue;
                }
                ControlState::Running => {}
            }

            if !self.crawl_batch(session).await {
                break;
            }
            if session.since_checkpoint() >= self.controls.checkpoint_every() {
                self.save(session)?;
            }
            let delay = self.controls.batch_delay();
            if session.pending() > 0 && !delay.is_zero() {
                sleep(delay).await;
            }
        }
        info!(
            pages = session.documents().len(),
            failed = session.failed().len(),
            "crawl finished"
        );
        Ok(CrawlOutcome::Completed)
    }

    fn drain_events(&mut self) {
        let Some(events) = self.events.as_mut() else {
            return;
        };
        loop {
            match events.try_recv() {
                Ok(event) => {
                    let next = self.state.transition(event);
                    if next != self.state {
                        debug!(from = ?self.state, to = ?next, ?event, "control transition");
                        if let Some(prompt) = next.prompt() {
                            println!("{prompt}");
                        }
                        self.state = next;
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.events = None;
                    if self.state.is_waiting() {
                        warn!("control input closed while waiting; saving and exiting");
                        self.state = ControlState::SavingAndExiting;
                    }
                    break;
                }
            }
        }
    }

    fn save(&self, session: &mut CrawlSession) -> Result<(), CheckpointError> {
        let Some(checkpoint) = &self.checkpoint else {
            return Ok(());
        };
        checkpoint.save(&session.snapshot())?;
        session.mark_checkpointed();
        println!(
            "💾 progress saved ({} pages, {} queued)",
            session.documents().len(),
            session.pending()
        );
        Ok(())
    }

    fn reload(&self, session: &mut CrawlSession) -> Result<(), CrawlError> {
        let Some(checkpoint) = &self.checkpoint else {
            return Ok(());
        };
        match checkpoint.load()? {
            Some(progress) => {
                let base = progress.base_url.clone();
                *session = CrawlSession::from_progress(progress)
                    .map_err(|source| CrawlError::InvalidUrl { url: base, source })?;
                println!(
                    "↻ reloaded checkpoint ({} pages, {} queued)",
                    session.documents().len(),
                    session.pending()
                );
            }
            None => println!("↻ no checkpoint to reload, continuing"),
        }
        Ok(())
    }
}

fn parse_base(raw: &str) -> Result<Url, CrawlError> {
    Url::parse(raw).map_err(|source| CrawlError::InvalidUrl {
        url: raw.to_string(),
        source,
    })
}

async fn prepare_session(
    cli: &Cli,
    controls: &CrawlControls,
    source: &dyn PageSource,
) -> Result<(CrawlSession, PathBuf), CrawlError> {
    if let Some(dir) = &cli.resume {
        let checkpoint = Checkpoint::in_dir(dir);
        let progress = checkpoint
            .load()?
            .ok_or_else(|| CrawlError::NothingToResume(checkpoint.path().to_path_buf()))?;
        let base = progress.base_url.clone();
        let session = CrawlSession::from_progress(progress)
            .map_err(|source| CrawlError::InvalidUrl { url: base, source })?;
        println!(
            "Resuming {} ({} pages scraped, {} queued)",
            session.base_url(),
            session.documents().len(),
            session.pending()
        );
        let output_dir = cli.output_dir(session.base_url());
        return Ok((session, output_dir));
    }

    let raw = cli.url.as_deref().ok_or(CrawlError::MissingUrl)?;
    let base = parse_base(raw)?;
    println!("Discovering pages on {base}");
    let seeds = Discovery::new(base.clone())
        .with_llms_index(controls.llms_index())
        .run(source)
        .await?;
    println!("Found {} pages", seeds.len());
    let output_dir = cli.output_dir(&base);
    Ok((CrawlSession::new(base, seeds), output_dir))
}

async fn run_crawl(cli: Cli) -> Result<(), CrawlError> {
    let started = Instant::now();
    let controls = cli.build_controls();
    let source =
        HttpSource::new(&cli.user_agent, cli.request_timeout()).map_err(CrawlError::Client)?;

    let (mut session, output_dir) = prepare_session(&cli, &controls, &source).await?;
    let checkpoint = Checkpoint::in_dir(&output_dir);

    println!("Controls: [SPACE] or p then Enter to pause, Ctrl+C to stop");
    let mut crawler = Crawler::new(&source, controls, cli.retry_policy())
        .with_checkpoint(checkpoint.clone())
        .with_events(spawn_terminal_events());

    match crawler.crawl(&mut session).await? {
        CrawlOutcome::Completed => {
            write_site(
                &output_dir,
                session.base_url().as_str(),
                session.documents(),
                Utc::now(),
            )?;
            checkpoint.delete()?;
            if cli.zip {
                let archive = zip_dir(&output_dir)?;
                println!("Archive: {}", archive.display());
            }
            CrawlSummary::from_session(&session).report(started.elapsed());
            println!("Output: {}", output_dir.display());
        }
        CrawlOutcome::Saved => println!(
            "Progress saved. Resume with: mintcrawl --resume {}",
            output_dir.display()
        ),
        CrawlOutcome::Discarded => println!("Progress deleted."),
        CrawlOutcome::Exited => println!("Exited without saving."),
    }
    Ok(())
}

/// Runs a crawl described by `cli` on a current-thread runtime.
pub fn run(cli: Cli) -> Result<(), CrawlError> {
    let rt = Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(CrawlError::Runtime)?;
    let local = LocalSet::new();
    let result = rt.block_on(local.run_until(run_crawl(cli)));
    drop(local);
    // The stdin reader may still be parked on a blocking read.
    rt.shutdown_background();
    result
}
