//! Breadth-first crawl frontier.
//!
//! URLs are keyed by their normalized form. A URL is accepted into the queue
//! at most once over the whole crawl (`seen`), and once dequeued for a visit
//! it is recorded in `visited`. Enqueue is a single test-and-insert under one
//! lock, so the queue never holds a URL that was already visited or queued.

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;
use url::Url;

use super::urls::normalize_url;

/// One unit of crawl work.
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlTask {
    pub url: Url,
    /// Normalized frontier key.
    pub key: String,
    pub depth: usize,
}

#[derive(Debug, Default)]
struct FrontierState {
    seen: HashSet<String>,
    visited: HashSet<String>,
    queue: VecDeque<CrawlTask>,
}

/// FIFO frontier with URL deduplication.
#[derive(Debug, Default)]
pub struct Frontier {
    state: Mutex<FrontierState>,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `url` at `depth` unless it was seen before.
    ///
    /// Returns `true` when the URL was newly queued.
    pub fn push(&self, url: Url, depth: usize) -> bool {
        let key = normalize_url(&url);
        let mut state = self.lock();
        if !state.seen.insert(key.clone()) {
            return false;
        }
        state.queue.push_back(CrawlTask { url, key, depth });
        true
    }

    /// Next task in breadth-first order.
    pub fn pop(&self) -> Option<CrawlTask> {
        self.lock().queue.pop_front()
    }

    /// Record that `key` has been handled (fetched or skipped).
    ///
    /// Returns `false` when it was already visited.
    pub fn mark_visited(&self, key: &str) -> bool {
        self.lock().visited.insert(key.to_string())
    }

    pub fn is_visited(&self, key: &str) -> bool {
        self.lock().visited.contains(key)
    }

    pub fn pending(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn visited_count(&self) -> usize {
        self.lock().visited.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FrontierState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn fifo_order() {
        let f = Frontier::new();
        assert!(f.push(u("https://a.test/"), 0));
        assert!(f.push(u("https://a.test/x"), 1));
        assert!(f.push(u("https://a.test/y"), 1));
        assert_eq!(f.pop().unwrap().key, "https://a.test");
        assert_eq!(f.pop().unwrap().key, "https://a.test/x");
        assert_eq!(f.pop().unwrap().key, "https://a.test/y");
        assert!(f.pop().is_none());
    }

    #[test]
    fn variants_of_the_same_url_are_queued_once() {
        let f = Frontier::new();
        assert!(f.push(u("https://a.test/about"), 1));
        assert!(!f.push(u("https://a.test/about/"), 1));
        assert!(!f.push(u("https://a.test/about?ref=nav#team"), 2));
        assert_eq!(f.pending(), 1);
    }

    #[test]
    fn visited_urls_never_requeue() {
        let f = Frontier::new();
        f.push(u("https://a.test/"), 0);
        let task = f.pop().unwrap();
        assert!(f.mark_visited(&task.key));
        assert!(!f.mark_visited(&task.key));
        assert!(!f.push(u("https://a.test"), 1));
        assert_eq!(f.pending(), 0);
        assert!(f.is_visited("https://a.test"));
        assert_eq!(f.visited_count(), 1);
    }
}
