//! Deduplicating FIFO of pending crawl targets.

use std::collections::{HashSet, VecDeque};

use crate::target::CrawlTarget;

/// Reasons a target was not queued.
#[derive(Debug, Clone, PartialEq)]
pub enum FrontierError {
    /// The URL was already scheduled or crawled; the caller keeps the target.
    Duplicate(CrawlTarget),
}

/// Ordered queue that never schedules the same URL twice.
#[derive(Debug, Default)]
pub struct Frontier {
    queue: VecDeque<CrawlTarget>,
    scheduled: HashSet<String>,
}

impl Frontier {
    /// Constructs an empty frontier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a frontier from a saved queue. `known` URLs are treated as
    /// already scheduled so they are never queued again.
    pub fn restore<'a>(
        queue: impl IntoIterator<Item = CrawlTarget>,
        known: impl IntoIterator<Item = &'a String>,
    ) -> Self {
        let mut frontier = Self::new();
        frontier.scheduled.extend(known.into_iter().cloned());
        for target in queue {
            let _ = frontier.push(target);
        }
        frontier
    }

    /// Number of targets waiting.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// True when nothing is waiting.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Whether `url` was ever scheduled.
    pub fn is_scheduled(&self, url: &str) -> bool {
        self.scheduled.contains(url)
    }

    /// Queues a target at the back, rejecting duplicates.
    pub fn push(&mut self, target: CrawlTarget) -> Result<(), FrontierError> {
        if !self.scheduled.insert(target.url().to_string()) {
            return Err(FrontierError::Duplicate(target));
        }
        self.queue.push_back(target);
        Ok(())
    }

    /// Removes up to `size` targets from the front.
    pub fn next_batch(&mut self, size: usize) -> Vec<CrawlTarget> {
        let take = size.max(1).min(self.queue.len());
        self.queue.drain(..take).collect()
    }

    /// Snapshot of the waiting targets in queue order.
    pub fn remaining(&self) -> Vec<CrawlTarget> {
        self.queue.iter().cloned().collect()
    }
}
