//! Progress-callback trait for crawl and image-download events.
//!
//! Inject an [`Arc<dyn HarvestProgressCallback>`] via
//! [`crate::config::CrawlConfigBuilder::progress_callback`] to receive
//! events as the harvester visits pages and downloads images.
//!
//! # Example
//!
//! ```rust
//! use content_archiver::{CrawlConfig, HarvestProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct PageCounter {
//!     pages: AtomicUsize,
//! }
//!
//! impl HarvestProgressCallback for PageCounter {
//!     fn on_page_scraped(&self, url: &str, pages_done: usize, max_pages: usize) {
//!         self.pages.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("[{}/{}] {}", pages_done, max_pages, url);
//!     }
//! }
//!
//! let counter = Arc::new(PageCounter { pages: AtomicUsize::new(0) });
//!
//! let config = CrawlConfig::builder()
//!     .progress_callback(counter as Arc<dyn HarvestProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the harvester as it crawls pages and fetches images.
///
/// Implementations must be `Send + Sync`: image events arrive from the
/// download pool. All methods have default no-op implementations so callers
/// only override what they care about.
pub trait HarvestProgressCallback: Send + Sync {
    /// Called once before the first page request.
    fn on_crawl_start(&self, start_url: &str, max_pages: usize) {
        let _ = (start_url, max_pages);
    }

    /// Called after a page was fetched and extracted.
    ///
    /// `pages_done` is 1-indexed and never exceeds `max_pages`.
    fn on_page_scraped(&self, url: &str, pages_done: usize, max_pages: usize) {
        let _ = (url, pages_done, max_pages);
    }

    /// Called when a page is skipped (fetch failure, robots denial, non-HTML).
    fn on_page_skipped(&self, url: &str, reason: &str) {
        let _ = (url, reason);
    }

    /// Called once before image downloads begin.
    ///
    /// # Arguments
    /// * `total_images`: distinct image references across all pages
    fn on_images_start(&self, total_images: usize) {
        let _ = total_images;
    }

    /// Called after each image reference is resolved.
    ///
    /// # Arguments
    /// * `done`: references resolved so far
    /// * `total`: total references
    /// * `success`: `false` when the image was rejected or failed to download
    fn on_image_done(&self, done: usize, total: usize, success: bool) {
        let _ = (done, total, success);
    }

    /// Called once after the last image.
    fn on_harvest_complete(&self, pages_scraped: usize, images_stored: usize) {
        let _ = (pages_scraped, images_stored);
    }
}

/// A no-op implementation for callers that don't need progress events.
///
/// This is the default when no callback is configured.
pub struct NoopProgressCallback;

impl HarvestProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::CrawlConfig`].
pub type ProgressCallback = Arc<dyn HarvestProgressCallback>;
