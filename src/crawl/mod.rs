//! Bounded web harvester.
//!
//! ## Data Flow
//!
//! ```text
//! start URL ──▶ frontier ──▶ robots ──▶ limiter ──▶ http ──▶ html
//!               (BFS,         (per-      (per-       (GET)    (blocks,
//!                dedup)        origin)    origin)              images, links)
//!                                                       │
//!                                  fetcher ◀────────────┘
//!                                  (bounded pool, hash dedup)
//! ```
//!
//! 1. [`frontier`] queues each normalized URL at most once
//! 2. [`robots`] decides per origin, fetched lazily and cached
//! 3. [`limiter`] spaces requests to the same origin by the configured delay
//! 4. [`http`] is the injectable transport capability
//! 5. [`html`] reduces a page to blocks, image references and links
//! 6. [`crawler`] drives the breadth-first loop; [`fetcher`] downloads images

pub mod crawler;
pub mod fetcher;
pub mod frontier;
pub mod html;
pub mod http;
pub mod limiter;
pub mod robots;
pub mod urls;

pub use crawler::{CrawlOutcome, CrawledPage, Crawler};
pub use fetcher::FetchedImages;
pub use http::{HttpClient, HttpResponse, ReqwestClient};
