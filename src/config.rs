//! Configuration types for archiving and crawling.
//!
//! Two builder-validated structs cover the two halves of a run:
//!
//! * [`ArchiveOptions`] holds the card metadata written into `project.json`
//!   (name, language, content mode, grouping, group display). Both sources
//!   share it.
//! * [`CrawlConfig`] holds the harvester's budgets and politeness settings
//!   plus the injectable HTTP client, progress callback and cancel flag.
//!
//! Validation happens in `build()`. Out-of-range budgets are rejected with
//! [`HarvestError::InvalidConfig`] rather than silently clamped.

use crate::crawl::HttpClient;
use crate::error::HarvestError;
use crate::progress::HarvestProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

// ── Archive options ──────────────────────────────────────────────────────

/// Card-level settings for the produced archive.
///
/// # Example
/// ```rust
/// use content_archiver::{ArchiveOptions, ContentMode};
///
/// let options = ArchiveOptions::builder()
///     .name("Museum Guide")
///     .language("fr")
///     .content_mode(ContentMode::Cards)
///     .build()
///     .unwrap();
/// assert_eq!(options.language, "fr");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveOptions {
    /// Project name. When `None` the name is derived from the source
    /// (first page title, file stem, or domain).
    pub name: Option<String>,

    /// Original language code. Default: `"en"`.
    pub language: String,

    /// How the consuming application lays items out. Default: [`ContentMode::List`].
    pub content_mode: ContentMode,

    /// Force `is_grouped` on or off. `None` means "more than one category".
    pub grouped: Option<bool>,

    /// Default: [`GroupDisplay::Expanded`].
    pub group_display: GroupDisplay,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            name: None,
            language: "en".to_string(),
            content_mode: ContentMode::default(),
            grouped: None,
            group_display: GroupDisplay::default(),
        }
    }
}

impl ArchiveOptions {
    pub fn builder() -> ArchiveOptionsBuilder {
        ArchiveOptionsBuilder {
            options: Self::default(),
        }
    }
}

/// Builder for [`ArchiveOptions`].
#[derive(Debug)]
pub struct ArchiveOptionsBuilder {
    options: ArchiveOptions,
}

impl ArchiveOptionsBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.options.name = Some(name.into());
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.options.language = language.into();
        self
    }

    pub fn content_mode(mut self, mode: ContentMode) -> Self {
        self.options.content_mode = mode;
        self
    }

    pub fn grouped(mut self, grouped: bool) -> Self {
        self.options.grouped = Some(grouped);
        self
    }

    pub fn group_display(mut self, display: GroupDisplay) -> Self {
        self.options.group_display = display;
        self
    }

    /// Build the options, validating constraints.
    pub fn build(mut self) -> Result<ArchiveOptions, HarvestError> {
        if let Some(name) = &self.options.name {
            let trimmed = name.trim();
            if trimmed.is_empty() {
                return Err(HarvestError::InvalidConfig(
                    "Project name must not be blank".into(),
                ));
            }
            self.options.name = Some(trimmed.to_string());
        }
        let language = self.options.language.trim();
        if language.is_empty() || !language.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(HarvestError::InvalidConfig(format!(
                "Language must be a code like 'en' or 'zh-Hant', got '{}'",
                self.options.language
            )));
        }
        self.options.language = language.to_string();
        Ok(self.options)
    }
}

// ── Crawl configuration ──────────────────────────────────────────────────

/// Smallest and largest accepted `max_depth`.
pub const DEPTH_RANGE: (usize, usize) = (1, 3);
/// Smallest and largest accepted `max_pages`.
pub const PAGES_RANGE: (usize, usize) = (1, 100);

/// Configuration for a bounded web harvest.
///
/// Built via [`CrawlConfig::builder()`] or using [`CrawlConfig::default()`].
///
/// # Example
/// ```rust
/// use content_archiver::CrawlConfig;
/// use std::time::Duration;
///
/// let config = CrawlConfig::builder()
///     .max_depth(2)
///     .max_pages(40)
///     .delay(Duration::from_millis(500))
///     .build()
///     .unwrap();
/// assert_eq!(config.max_pages, 40);
/// ```
#[derive(Clone)]
pub struct CrawlConfig {
    /// Link depth below the start page. Range: 1–3. Default: 1.
    pub max_depth: usize,

    /// Hard cap on collected pages. Range: 1–100. Default: 20.
    pub max_pages: usize,

    /// Only follow links whose host and port match the start URL. Default: true.
    pub same_domain_only: bool,

    /// Minimum gap between two requests to the same origin. Default: 1 s.
    ///
    /// Applies to every network fetch: pages, robots.txt and images.
    pub delay: Duration,

    /// Per-request timeout in seconds. Default: 30.
    pub request_timeout_secs: u64,

    /// Byte ceiling for a single image body. Default: 10 MiB.
    pub max_image_bytes: usize,

    /// Byte ceiling for a single page body. Default: 5 MiB.
    pub max_page_bytes: usize,

    /// Concurrent image downloads. Default: 4.
    pub image_concurrency: usize,

    /// `User-Agent` header, also the agent matched against robots.txt groups.
    pub user_agent: String,

    /// How pages become categories. Default: [`WebGrouping::Headings`].
    pub grouping: WebGrouping,

    /// Pre-constructed HTTP client. When `None` a [`crate::crawl::ReqwestClient`]
    /// is built from the timeout and user agent above.
    pub client: Option<Arc<dyn HttpClient>>,

    /// Optional progress callback.
    pub progress_callback: Option<Arc<dyn HarvestProgressCallback>>,

    /// Set to `true` to stop the crawl at the next page boundary.
    pub cancel: Arc<AtomicBool>,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_depth: 1,
            max_pages: 20,
            same_domain_only: true,
            delay: Duration::from_secs(1),
            request_timeout_secs: 30,
            max_image_bytes: crate::pipeline::images::MAX_IMAGE_BYTES,
            max_page_bytes: 5 * 1024 * 1024,
            image_concurrency: 4,
            user_agent: default_user_agent(),
            grouping: WebGrouping::default(),
            client: None,
            progress_callback: None,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }
}

/// `content-archiver/<version>`.
pub fn default_user_agent() -> String {
    concat!("content-archiver/", env!("CARGO_PKG_VERSION")).to_string()
}

impl fmt::Debug for CrawlConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrawlConfig")
            .field("max_depth", &self.max_depth)
            .field("max_pages", &self.max_pages)
            .field("same_domain_only", &self.same_domain_only)
            .field("delay", &self.delay)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_image_bytes", &self.max_image_bytes)
            .field("image_concurrency", &self.image_concurrency)
            .field("user_agent", &self.user_agent)
            .field("grouping", &self.grouping)
            .field("client", &self.client.as_ref().map(|_| "<dyn HttpClient>"))
            .finish()
    }
}

impl CrawlConfig {
    /// Create a new builder for `CrawlConfig`.
    pub fn builder() -> CrawlConfigBuilder {
        CrawlConfigBuilder {
            config: Self::default(),
            invalid_delay: None,
        }
    }
}

/// Builder for [`CrawlConfig`].
pub struct CrawlConfigBuilder {
    config: CrawlConfig,
    invalid_delay: Option<f64>,
}

impl CrawlConfigBuilder {
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.config.max_depth = depth;
        self
    }

    pub fn max_pages(mut self, pages: usize) -> Self {
        self.config.max_pages = pages;
        self
    }

    pub fn same_domain_only(mut self, v: bool) -> Self {
        self.config.same_domain_only = v;
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.config.delay = delay;
        self
    }

    /// Delay in (fractional) seconds, as accepted on the command line.
    ///
    /// Negative or non-finite values are rejected by `build()`.
    pub fn delay_secs(mut self, secs: f64) -> Self {
        match Duration::try_from_secs_f64(secs) {
            Ok(d) => self.config.delay = d,
            Err(_) => self.invalid_delay = Some(secs),
        }
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn max_image_bytes(mut self, bytes: usize) -> Self {
        self.config.max_image_bytes = bytes;
        self
    }

    pub fn max_page_bytes(mut self, bytes: usize) -> Self {
        self.config.max_page_bytes = bytes;
        self
    }

    pub fn image_concurrency(mut self, n: usize) -> Self {
        self.config.image_concurrency = n;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    pub fn grouping(mut self, grouping: WebGrouping) -> Self {
        self.config.grouping = grouping;
        self
    }

    pub fn client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.config.client = Some(client);
        self
    }

    pub fn progress_callback(mut self, cb: Arc<dyn HarvestProgressCallback>) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    pub fn cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.config.cancel = flag;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<CrawlConfig, HarvestError> {
        if let Some(secs) = self.invalid_delay {
            return Err(HarvestError::InvalidConfig(format!(
                "Delay must be non-negative, got {}",
                secs
            )));
        }
        let c = &self.config;
        if c.max_depth < DEPTH_RANGE.0 || c.max_depth > DEPTH_RANGE.1 {
            return Err(HarvestError::InvalidConfig(format!(
                "max_depth must be between {} and {}, got {}",
                DEPTH_RANGE.0, DEPTH_RANGE.1, c.max_depth
            )));
        }
        if c.max_pages < PAGES_RANGE.0 || c.max_pages > PAGES_RANGE.1 {
            return Err(HarvestError::InvalidConfig(format!(
                "max_pages must be between {} and {}, got {}",
                PAGES_RANGE.0, PAGES_RANGE.1, c.max_pages
            )));
        }
        if c.image_concurrency == 0 {
            return Err(HarvestError::InvalidConfig(
                "image_concurrency must be at least 1".into(),
            ));
        }
        if c.request_timeout_secs == 0 {
            return Err(HarvestError::InvalidConfig(
                "request_timeout_secs must be at least 1".into(),
            ));
        }
        if c.user_agent.trim().is_empty() {
            return Err(HarvestError::InvalidConfig("user_agent must not be blank".into()));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Layout hint stored in `card.content_mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentMode {
    Single,
    #[default]
    List,
    Grid,
    Cards,
}

impl ContentMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentMode::Single => "single",
            ContentMode::List => "list",
            ContentMode::Grid => "grid",
            ContentMode::Cards => "cards",
        }
    }
}

impl FromStr for ContentMode {
    type Err = HarvestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "single" => Ok(ContentMode::Single),
            "list" => Ok(ContentMode::List),
            "grid" => Ok(ContentMode::Grid),
            "cards" => Ok(ContentMode::Cards),
            other => Err(HarvestError::InvalidConfig(format!(
                "Unknown content mode '{}' (expected single, list, grid or cards)",
                other
            ))),
        }
    }
}

/// Whether category groups start expanded or collapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupDisplay {
    #[default]
    Expanded,
    Collapsed,
}

impl GroupDisplay {
    pub fn as_str(self) -> &'static str {
        match self {
            GroupDisplay::Expanded => "expanded",
            GroupDisplay::Collapsed => "collapsed",
        }
    }
}

impl FromStr for GroupDisplay {
    type Err = HarvestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "expanded" => Ok(GroupDisplay::Expanded),
            "collapsed" => Ok(GroupDisplay::Collapsed),
            other => Err(HarvestError::InvalidConfig(format!(
                "Unknown group display '{}' (expected expanded or collapsed)",
                other
            ))),
        }
    }
}

/// How crawled pages are turned into categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WebGrouping {
    /// Run the heading-based structure builder over all pages in crawl order.
    #[default]
    Headings,
    /// One category per first URL path segment, one item per page.
    UrlPath,
}
