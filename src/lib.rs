#![warn(missing_docs)]
//! Core library for the mintcrawl documentation crawler and its lexical search index.

pub mod archive;
pub mod checkpoint;
pub mod control;
pub mod controls;
pub mod discovery;
pub mod document;
pub mod fetch;
pub mod frontier;
pub mod html;
pub mod manifest;
pub mod output;
pub mod runtime;
pub mod search;
pub mod session;
pub mod target;

pub use checkpoint::{Checkpoint, CheckpointError, PROGRESS_FILE};
pub use control::{ControlEvent, ControlState};
pub use controls::{Cli, CrawlControls};
pub use discovery::{Discovery, DiscoveryError};
pub use document::{Document, FetchedPage};
pub use fetch::{FetchError, HttpSource, PageSource, RetryPolicy};
pub use frontier::{Frontier, FrontierError};
pub use manifest::{PageEntry, SiteManifest};
pub use runtime::{run as run_crawler, CrawlError, CrawlOutcome, Crawler};
pub use search::{SearchDocument, SearchEngine, SearchError, SearchOptions};
pub use session::{CrawlProgress, CrawlSession};
pub use target::CrawlTarget;
