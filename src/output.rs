//! Result types returned by the top-level entry points.

use crate::archive::ProjectArchive;
use crate::error::Diagnostic;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// How many diagnostics the summary lists before collapsing the rest.
pub const SUMMARY_DIAGNOSTICS: usize = 5;

/// Counters collected over one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub pages_scraped: usize,
    pub pages_skipped: usize,
    /// Image references seen (per page, per document).
    pub images_found: usize,
    /// Distinct images stored after deduplication.
    pub images_downloaded: usize,
    /// References that could not be fetched or failed validation.
    pub images_failed: usize,
}

/// Stats plus every non-fatal problem, in the order they happened.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub stats: RunStats,
    pub diagnostics: Vec<Diagnostic>,
    /// The crawl stopped early because the cancel flag was raised.
    pub cancelled: bool,
}

impl RunReport {
    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// Human-readable run-end summary.
    ///
    /// Lists the first [`SUMMARY_DIAGNOSTICS`] problems and the count of the
    /// remaining ones.
    pub fn summary(&self) -> String {
        let s = &self.stats;
        let mut out = String::new();
        let _ = writeln!(out, "Pages scraped:     {}", s.pages_scraped);
        let _ = writeln!(out, "Pages skipped:     {}", s.pages_skipped);
        let _ = writeln!(out, "Images found:      {}", s.images_found);
        let _ = writeln!(out, "Images downloaded: {}", s.images_downloaded);
        let _ = writeln!(out, "Images failed:     {}", s.images_failed);
        if self.cancelled {
            let _ = writeln!(out, "Crawl was cancelled; partial results kept.");
        }
        if !self.diagnostics.is_empty() {
            let _ = writeln!(out, "Problems ({}):", self.diagnostics.len());
            for d in self.diagnostics.iter().take(SUMMARY_DIAGNOSTICS) {
                let _ = writeln!(out, "  - {}", d);
            }
            let rest = self.diagnostics.len().saturating_sub(SUMMARY_DIAGNOSTICS);
            if rest > 0 {
                let _ = writeln!(out, "  ... and {} more", rest);
            }
        }
        out
    }
}

/// Result of structuring a document or harvesting a site.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub archive: ProjectArchive,
    pub report: RunReport,
}
