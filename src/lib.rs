//! # content-archiver
//!
//! Turn extracted documents and polite, bounded website crawls into
//! portable project archives: a `project.json` manifest of categories and
//! items plus the images attached to them, packed into one ZIP file.
//!
//! ## Why this crate?
//!
//! Documents and web pages rarely carry an explicit outline. This crate
//! infers one from typography: the most common font size is body text, and
//! anything noticeably larger (or short and bold) is a heading. Headings
//! become categories and items, body text is folded into the nearest item,
//! and every image is attached to the item it sits closest to.
//!
//! ## Pipeline Overview
//!
//! ```text
//! block dump (JSON)            start URL
//!  │                             │
//!  ├─ 1. Adapter  blocks+images  ├─ 1. Crawl   BFS, robots, per-origin pacing
//!  │                             ├─ 2. Fetch   images (bounded pool, dedup)
//!  ├─ 2. Classify  heading threshold (1.2 × body size)
//!  ├─ 3. Structure categories → items
//!  ├─ 4. Associate one image per item, nearest first
//!  └─ 5. Archive   project.json + images/content/* → ZIP
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use content_archiver::{harvest_to_file, ArchiveOptions, CrawlConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = CrawlConfig::builder().max_depth(2).max_pages(30).build()?;
//!     let options = ArchiveOptions::builder().language("en").build()?;
//!     let report = harvest_to_file("example.com", "example_archive.zip", &config, &options).await?;
//!     eprintln!("{}", report.summary());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `archiver` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! content-archiver = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod adapter;
pub mod archive;
pub mod config;
pub mod convert;
pub mod crawl;
pub mod error;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use adapter::{BlockDumpAdapter, SourceAdapter};
pub use archive::{validate, ArchiveSink, MemorySink, ProjectArchive, ValidationReport, ZipSink};
pub use config::{
    ArchiveOptions, ArchiveOptionsBuilder, ContentMode, CrawlConfig, CrawlConfigBuilder, GroupDisplay,
    WebGrouping,
};
pub use convert::{
    convert_document, document_to_file, harvest, harvest_sync, harvest_to_file, inspect, structure_document,
    write_archive,
};
pub use crawl::{HttpClient, HttpResponse};
pub use error::{Diagnostic, FetchError, HarvestError};
pub use model::{Block, BlockKind, SourceDocument, SourceImage};
pub use output::{RunOutput, RunReport, RunStats};
pub use progress::{HarvestProgressCallback, NoopProgressCallback, ProgressCallback};
