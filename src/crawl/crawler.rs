//! Bounded breadth-first harvester.
//!
//! ```text
//! start URL ──▶ pre-flight ──▶ BFS page loop ──▶ CrawlOutcome
//!               (blocked?      (robots, pacing,
//!                robots?)       fetch, extract)
//! ```
//!
//! Pages are fetched by a single logical worker, one at a time, in
//! breadth-first order. The loop stops when the page budget is reached, the
//! frontier drains, or the cancel flag is raised; in every case the pages
//! collected so far are kept.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

use super::frontier::Frontier;
use super::html::{extract_page, ImageRef, LinkPolicy};
use super::http::{HttpClient, ReqwestClient};
use super::limiter::RateLimiter;
use super::robots::RobotsCache;
use super::urls::{is_blocked_domain, origin};
use crate::config::CrawlConfig;
use crate::error::{Diagnostic, HarvestError};
use crate::model::Block;
use crate::output::RunReport;
use crate::progress::{HarvestProgressCallback, NoopProgressCallback};

/// One successfully harvested page.
#[derive(Debug, Clone)]
pub struct CrawledPage {
    pub url: Url,
    pub depth: usize,
    pub title: String,
    /// Blocks with `page_index` set to this page's index in crawl order.
    pub blocks: Vec<Block>,
    pub images: Vec<ImageRef>,
}

/// Pages in crawl order plus the page-phase part of the run report.
#[derive(Debug, Clone, Default)]
pub struct CrawlOutcome {
    pub pages: Vec<CrawledPage>,
    pub report: RunReport,
}

/// Harvester state shared by the page loop and the image phase.
pub struct Crawler {
    config: CrawlConfig,
    client: Arc<dyn HttpClient>,
    limiter: Arc<RateLimiter>,
    robots: RobotsCache,
    progress: Arc<dyn HarvestProgressCallback>,
}

impl Crawler {
    /// Build a crawler, constructing a [`ReqwestClient`] unless one was injected.
    pub fn new(config: CrawlConfig) -> Result<Self, HarvestError> {
        let client: Arc<dyn HttpClient> = match &config.client {
            Some(client) => Arc::clone(client),
            None => Arc::new(
                ReqwestClient::new(&config.user_agent, config.request_timeout_secs)
                    .map_err(|e| HarvestError::Internal(format!("HTTP client: {}", e)))?,
            ),
        };
        let progress: Arc<dyn HarvestProgressCallback> = config
            .progress_callback
            .clone()
            .unwrap_or_else(|| Arc::new(NoopProgressCallback));
        Ok(Self {
            limiter: Arc::new(RateLimiter::new(config.delay)),
            robots: RobotsCache::new(config.user_agent.clone()),
            client,
            progress,
            config,
        })
    }

    pub fn config(&self) -> &CrawlConfig {
        &self.config
    }

    pub fn client(&self) -> &Arc<dyn HttpClient> {
        &self.client
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn progress(&self) -> &Arc<dyn HarvestProgressCallback> {
        &self.progress
    }

    /// Fatal checks on the start URL: blocked platform, then robots.txt.
    pub async fn preflight(&self, start: &Url) -> Result<(), HarvestError> {
        let host = start.host_str().unwrap_or_default();
        if is_blocked_domain(host) {
            return Err(HarvestError::BlockedDomain {
                domain: host.to_string(),
            });
        }
        if !self
            .robots
            .is_allowed(start, self.client.as_ref(), &self.limiter)
            .await
        {
            return Err(HarvestError::RobotsDisallowed {
                url: start.to_string(),
            });
        }
        Ok(())
    }

    /// Run the pre-flight and the breadth-first page loop.
    pub async fn crawl(&self, start: &Url) -> Result<CrawlOutcome, HarvestError> {
        self.preflight(start).await?;

        let cfg = &self.config;
        info!(
            "Starting crawl: {} (max depth {}, max pages {}, same domain only: {})",
            start, cfg.max_depth, cfg.max_pages, cfg.same_domain_only
        );
        self.progress.on_crawl_start(start.as_str(), cfg.max_pages);

        let frontier = Frontier::new();
        frontier.push(start.clone(), 0);
        let mut outcome = CrawlOutcome::default();

        while outcome.pages.len() < cfg.max_pages {
            if cfg.cancel.load(Ordering::SeqCst) {
                warn!("Crawl cancelled after {} pages", outcome.pages.len());
                outcome.report.cancelled = true;
                outcome.report.push(Diagnostic::Cancelled {
                    pages: outcome.pages.len(),
                });
                break;
            }
            let Some(task) = frontier.pop() else {
                break;
            };
            if frontier.is_visited(&task.key) || task.depth > cfg.max_depth {
                continue;
            }

            if !self
                .robots
                .is_allowed(&task.url, self.client.as_ref(), &self.limiter)
                .await
            {
                frontier.mark_visited(&task.key);
                self.skip(&mut outcome.report, Diagnostic::RobotsBlocked {
                    url: task.url.to_string(),
                });
                continue;
            }

            let result = self.fetch_page(&task.url, task.depth, outcome.pages.len(), start).await;
            frontier.mark_visited(&task.key);

            match result {
                Ok((page, links)) => {
                    outcome.pages.push(page);
                    outcome.report.stats.pages_scraped += 1;
                    info!("[{}/{}] Scraped: {}", outcome.pages.len(), cfg.max_pages, task.url);
                    self.progress
                        .on_page_scraped(task.url.as_str(), outcome.pages.len(), cfg.max_pages);

                    let mut queued = 0;
                    for link in links {
                        if frontier.push(link, task.depth + 1) {
                            queued += 1;
                        }
                    }
                    debug!("Queued {} new links from {}", queued, task.url);
                }
                Err(diagnostic) => self.skip(&mut outcome.report, diagnostic),
            }
        }

        info!(
            "Crawl complete: {} pages scraped, {} skipped",
            outcome.report.stats.pages_scraped, outcome.report.stats.pages_skipped
        );
        Ok(outcome)
    }

    fn skip(&self, report: &mut RunReport, diagnostic: Diagnostic) {
        let (url, reason) = match &diagnostic {
            Diagnostic::RobotsBlocked { url } => (url.as_str(), "disallowed by robots.txt".to_string()),
            Diagnostic::PageFetchFailed { url, detail } | Diagnostic::PageUnreadable { url, detail } => {
                (url.as_str(), detail.clone())
            }
            _ => ("", diagnostic.to_string()),
        };
        warn!("{}", diagnostic);
        self.progress.on_page_skipped(url, &reason);
        report.stats.pages_skipped += 1;
        report.push(diagnostic);
    }

    async fn fetch_page(
        &self,
        url: &Url,
        depth: usize,
        page_index: usize,
        start: &Url,
    ) -> Result<(CrawledPage, Vec<Url>), Diagnostic> {
        self.limiter.acquire(&origin(url)).await;

        let response = self
            .client
            .get(url.as_str(), Some(self.config.max_page_bytes))
            .await
            .map_err(|e| Diagnostic::PageFetchFailed {
                url: url.to_string(),
                detail: e.to_string(),
            })?;

        if !response.is_success() {
            return Err(Diagnostic::PageFetchFailed {
                url: url.to_string(),
                detail: format!("HTTP {}", response.status),
            });
        }
        if !response.is_html() {
            return Err(Diagnostic::PageUnreadable {
                url: url.to_string(),
                detail: format!(
                    "unsupported content type {}",
                    response.header("content-type").unwrap_or("unknown")
                ),
            });
        }

        let html = String::from_utf8_lossy(&response.body);
        let policy = LinkPolicy {
            collect: depth < self.config.max_depth,
            restrict_to: self.config.same_domain_only.then_some(start),
        };
        let content = extract_page(&html, url, page_index, policy);
        debug!(
            "{}: {} blocks, {} images, {} links",
            url,
            content.blocks.len(),
            content.images.len(),
            content.links.len()
        );

        Ok((
            CrawledPage {
                url: url.clone(),
                depth,
                title: content.title,
                blocks: content.blocks,
                images: content.images,
            },
            content.links,
        ))
    }
}
