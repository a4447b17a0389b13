//! Error types for the content-archiver library.
//!
//! Three error types map onto the three failure scopes of a run:
//!
//! * [`HarvestError`] is **fatal**: the run cannot produce an archive at all
//!   (unreadable source, blocked start domain, robots denial of the start
//!   URL, invalid configuration, nothing extracted). Returned as
//!   `Err(HarvestError)` from the top-level entry points in [`crate::convert`].
//!
//! * [`Diagnostic`] is **non-fatal**: one page or one image failed while
//!   everything else is fine. Diagnostics are collected into
//!   [`crate::output::RunReport`] and the run carries on.
//!
//! * [`FetchError`] is what an [`crate::crawl::HttpClient`] returns for a
//!   single request. The crawler turns it into a [`Diagnostic`] or, for the
//!   start URL pre-flight, into a [`HarvestError`].

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the content-archiver library.
///
/// Per-page and per-image failures use [`Diagnostic`] instead.
#[derive(Debug, Error)]
pub enum HarvestError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Source file was not found at the given path.
    #[error("Source file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The source exists but its format is not one we can read.
    #[error("Unsupported source '{path}': {detail}")]
    UnsupportedSource { path: PathBuf, detail: String },

    /// The start URL could not be parsed as an HTTP/HTTPS URL.
    #[error("Invalid URL '{input}': {reason}")]
    InvalidUrl { input: String, reason: String },

    /// The start URL belongs to a platform we never crawl.
    #[error("Refusing to crawl blocked domain '{domain}'")]
    BlockedDomain { domain: String },

    /// robots.txt disallows the start URL itself.
    #[error("robots.txt disallows crawling '{url}'")]
    RobotsDisallowed { url: String },

    // ── Extraction errors ─────────────────────────────────────────────────
    /// The adapter produced zero blocks for the whole source.
    #[error("No content could be extracted from '{source_name}'")]
    NoContent { source_name: String },

    /// The crawl finished without collecting a single page.
    #[error("No pages were scraped from '{url}'.\nFirst problem: {first_problem}")]
    NoPagesScraped { url: String, first_problem: String },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create or write the output archive.
    #[error("Failed to write archive '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The archive container itself rejected an entry.
    #[error("Archive container error: {0}")]
    Container(String),

    /// An archive being read back is malformed.
    #[error("Invalid archive: {0}")]
    InvalidArchive(String),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<zip::result::ZipError> for HarvestError {
    fn from(e: zip::result::ZipError) -> Self {
        HarvestError::Container(e.to_string())
    }
}

/// A non-fatal problem recorded during a run.
///
/// Stored in [`crate::output::RunReport::diagnostics`] in the order they
/// happened.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum Diagnostic {
    /// A page could not be fetched (transport error or non-2xx status).
    #[error("Failed to fetch {url}: {detail}")]
    PageFetchFailed { url: String, detail: String },

    /// A page was fetched but is not HTML we can read.
    #[error("Error parsing {url}: {detail}")]
    PageUnreadable { url: String, detail: String },

    /// robots.txt disallows a non-start page.
    #[error("Robots.txt blocked: {url}")]
    RobotsBlocked { url: String },

    /// An image could not be downloaded.
    #[error("Image download failed {url}: {detail}")]
    ImageFetchFailed { url: String, detail: String },

    /// An image was downloaded (or supplied) but failed validation.
    #[error("Image rejected {source_ref}: {reason}")]
    ImageRejected { source_ref: String, reason: String },

    /// There was no item to attach an image to.
    #[error("Image {source_ref} has no item to attach to")]
    ImageUnassigned { source_ref: String },

    /// The crawl was cancelled before the queue drained.
    #[error("Crawl cancelled after {pages} pages")]
    Cancelled { pages: usize },
}

/// Failure of a single HTTP request made through [`crate::crawl::HttpClient`].
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// The request did not complete within the configured timeout.
    #[error("timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The body exceeded the byte ceiling (declared or while streaming).
    #[error("body exceeds {limit} bytes")]
    TooLarge { limit: usize },

    /// DNS, TLS, connection reset and similar transport failures.
    #[error("{0}")]
    Transport(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocked_domain_display() {
        let e = HarvestError::BlockedDomain {
            domain: "www.facebook.com".into(),
        };
        assert!(e.to_string().contains("www.facebook.com"));
    }

    #[test]
    fn no_pages_display_carries_first_problem() {
        let e = HarvestError::NoPagesScraped {
            url: "https://example.com".into(),
            first_problem: "HTTP 500".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("https://example.com"), "got: {msg}");
        assert!(msg.contains("HTTP 500"), "got: {msg}");
    }

    #[test]
    fn robots_diagnostic_display() {
        let d = Diagnostic::RobotsBlocked {
            url: "https://example.com/private".into(),
        };
        assert_eq!(d.to_string(), "Robots.txt blocked: https://example.com/private");
    }

    #[test]
    fn diagnostic_is_serialisable() {
        let d = Diagnostic::ImageRejected {
            source_ref: "https://example.com/a.bmp".into(),
            reason: "format bmp is not allowed".into(),
        };
        let json = serde_json::to_string(&d).unwrap();
        let back: Diagnostic = serde_json::from_str(&json).unwrap();
        assert_eq!(back, d);
    }

    #[test]
    fn fetch_error_display() {
        assert_eq!(FetchError::Timeout { secs: 30 }.to_string(), "timed out after 30s");
        assert!(FetchError::TooLarge { limit: 10 }.to_string().contains("10 bytes"));
    }
}
