//! End-to-end tests for content-archiver.
//!
//! Web harvests run against [`FakeSite`], an in-memory [`HttpClient`] that
//! serves canned pages and records every request, so no test touches the
//! network. Document tests write a block dump into a temp dir.
//!
//! Run with:
//!   cargo test --test e2e -- --nocapture

use async_trait::async_trait;
use content_archiver::archive::IMAGE_DIR;
use content_archiver::{
    document_to_file, harvest, harvest_to_file, inspect, ArchiveOptions, CrawlConfig, Diagnostic, FetchError,
    HarvestError, HarvestProgressCallback, HttpClient, HttpResponse, WebGrouping,
};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ── Test helpers ─────────────────────────────────────────────────────────────

const ORIGIN: &str = "https://example.com";

/// Canned site keyed by `origin + path` (no trailing slash).
#[derive(Default)]
struct FakeSite {
    routes: HashMap<String, (u16, &'static str, Vec<u8>)>,
    requests: Mutex<Vec<String>>,
}

impl FakeSite {
    fn new() -> Self {
        Self::default()
    }

    fn page(mut self, path: &str, html: &str) -> Self {
        self.routes
            .insert(route(path), (200, "text/html; charset=utf-8", html.as_bytes().to_vec()));
        self
    }

    fn file(mut self, path: &str, content_type: &'static str, body: Vec<u8>) -> Self {
        self.routes.insert(route(path), (200, content_type, body));
        self
    }

    fn status(mut self, path: &str, status: u16) -> Self {
        self.routes.insert(route(path), (status, "text/plain", Vec::new()));
        self
    }

    fn requested(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    fn hits(&self, path: &str) -> usize {
        let key = route(path);
        self.requested().iter().filter(|r| **r == key).count()
    }
}

fn route(path: &str) -> String {
    format!("{}{}", ORIGIN, path.trim_end_matches('/'))
}

fn request_key(url: &str) -> String {
    let parsed = url::Url::parse(url).expect("crawler requests absolute URLs");
    format!(
        "{}://{}{}",
        parsed.scheme(),
        parsed.host_str().unwrap_or_default(),
        parsed.path().trim_end_matches('/')
    )
}

#[async_trait]
impl HttpClient for FakeSite {
    async fn get(&self, url: &str, _max_bytes: Option<usize>) -> Result<HttpResponse, FetchError> {
        let key = request_key(url);
        self.requests.lock().unwrap().push(key.clone());
        let (status, content_type, body) = self
            .routes
            .get(&key)
            .cloned()
            .unwrap_or((404, "text/plain", Vec::new()));
        Ok(HttpResponse {
            status,
            headers: HashMap::from([("content-type".to_string(), content_type.to_string())]),
            body,
        })
    }
}

fn config_for(site: &Arc<FakeSite>) -> content_archiver::CrawlConfigBuilder {
    CrawlConfig::builder()
        .delay(Duration::ZERO)
        .client(Arc::clone(site) as Arc<dyn HttpClient>)
}

fn png(shade: u8) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(80, 60, Rgb([shade, 120, 30])));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png).unwrap();
    buf
}

fn html(title: &str, main: &str) -> String {
    format!(
        "<html><head><title>{title}</title></head><body>\
         <nav><a href=\"/nav-only\">Menu</a></nav><main>{main}</main>\
         <footer>Footer text</footer></body></html>"
    )
}

// ── Structuring scenarios ────────────────────────────────────────────────────

#[tokio::test]
async fn test_welcome_page_becomes_one_item() {
    let site = Arc::new(FakeSite::new().page(
        "/",
        &html(
            "Home",
            "<h1>Welcome</h1><p>First paragraph.</p><p>Second paragraph.</p><p>Third paragraph.</p>",
        ),
    ));
    let config = config_for(&site).build().unwrap();

    let out = harvest("example.com", &config, &ArchiveOptions::default())
        .await
        .unwrap();

    let items = &out.archive.manifest.content_items;
    assert_eq!(items.len(), 2, "{items:#?}");
    assert_eq!(items[0].name, "Welcome");
    assert_eq!(items[0].parent_name, None);
    assert_eq!(items[1].name, "Welcome");
    assert_eq!(
        items[1].content,
        "First paragraph.\n\nSecond paragraph.\n\nThird paragraph."
    );
    assert_eq!(out.archive.manifest.card.name, "Home");
    assert!(!out.archive.manifest.card.is_grouped);
    assert_eq!(out.report.stats.pages_scraped, 1);
}

#[tokio::test]
async fn test_page_budget_stops_before_second_link() {
    let site = Arc::new(
        FakeSite::new()
            .page(
                "/",
                &html("Home", r#"<h1>Home</h1><p>Intro text.</p><a href="/a">A</a><a href="/b">B</a>"#),
            )
            .page("/a", &html("A", "<h1>Page A</h1><p>Alpha text.</p>"))
            .page("/b", &html("B", "<h1>Page B</h1><p>Beta text.</p>")),
    );
    let config = config_for(&site).max_depth(1).max_pages(2).build().unwrap();

    let out = harvest(ORIGIN, &config, &ArchiveOptions::default()).await.unwrap();

    assert_eq!(out.report.stats.pages_scraped, 2);
    assert_eq!(site.hits("/"), 1);
    assert_eq!(site.hits("/a"), 1);
    assert_eq!(site.hits("/b"), 0, "second link must never be fetched");
    assert_eq!(site.hits("/nav-only"), 0, "links inside <nav> are ignored");
}

#[tokio::test]
async fn test_identical_images_stored_once() {
    let bytes = png(7);
    let site = Arc::new(
        FakeSite::new()
            .page(
                "/",
                &html(
                    "Home",
                    r#"<h1>Home</h1><p>Intro text.</p><p>More intro.</p>
                       <img src="/img/one.png"><a href="/a">A</a>"#,
                ),
            )
            .page(
                "/a",
                &html(
                    "Tour",
                    r#"<h1>Tour</h1><p>Tour text.</p><p>More tour.</p><img src="/img/two.png">"#,
                ),
            )
            .file("/img/one.png", "image/png", bytes.clone())
            .file("/img/two.png", "image/png", bytes.clone()),
    );
    let config = config_for(&site).build().unwrap();

    let out = harvest(ORIGIN, &config, &ArchiveOptions::default()).await.unwrap();

    assert_eq!(out.report.stats.images_found, 2);
    assert_eq!(out.report.stats.images_downloaded, 1);
    assert_eq!(out.archive.images.len(), 1);

    let (path, data) = out.archive.images.iter().next().unwrap();
    assert!(path.starts_with(IMAGE_DIR), "{path}");
    assert_eq!(data, &bytes);

    let with_image: Vec<_> = out
        .archive
        .manifest
        .content_items
        .iter()
        .filter_map(|i| i.image.as_deref())
        .collect();
    assert_eq!(with_image, vec![path.as_str(), path.as_str()]);
    assert!(out.archive.manifest.card.is_grouped);
}

#[tokio::test]
async fn test_failed_and_small_images_are_counted() {
    let site = Arc::new(
        FakeSite::new()
            .page(
                "/",
                &html(
                    "Home",
                    r#"<h1>Home</h1><p>Intro text.</p>
                       <img src="/img/missing.png"><img src="/img/tiny.png"><img src="/img/ok.png">"#,
                ),
            )
            .file("/img/tiny.png", "image/png", {
                let img = DynamicImage::ImageRgb8(RgbImage::new(10, 10));
                let mut buf = Vec::new();
                img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png).unwrap();
                buf
            })
            .file("/img/ok.png", "image/png", png(50)),
    );
    let config = config_for(&site).build().unwrap();

    let out = harvest(ORIGIN, &config, &ArchiveOptions::default()).await.unwrap();

    assert_eq!(out.report.stats.images_found, 3);
    assert_eq!(out.report.stats.images_failed, 2);
    assert_eq!(out.report.stats.images_downloaded, 1);
    assert!(out
        .report
        .diagnostics
        .iter()
        .any(|d| matches!(d, Diagnostic::ImageFetchFailed { detail, .. } if detail == "HTTP 404")));
    assert!(out
        .report
        .diagnostics
        .iter()
        .any(|d| matches!(d, Diagnostic::ImageRejected { .. })));
    assert_eq!(out.archive.images.len(), 1);
}

// ── Crawl policy ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_blocked_domain_is_fatal() {
    let site = Arc::new(FakeSite::new());
    let config = config_for(&site).build().unwrap();

    let err = harvest("https://www.facebook.com/some-page", &config, &ArchiveOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, HarvestError::BlockedDomain { .. }), "{err}");
    assert!(site.requested().is_empty());
}

#[tokio::test]
async fn test_robots_denying_start_is_fatal() {
    let site = Arc::new(
        FakeSite::new()
            .file("/robots.txt", "text/plain", b"User-agent: *\nDisallow: /\n".to_vec())
            .page("/", &html("Home", "<h1>Home</h1><p>Intro text.</p>")),
    );
    let config = config_for(&site).build().unwrap();

    let err = harvest(ORIGIN, &config, &ArchiveOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, HarvestError::RobotsDisallowed { .. }), "{err}");
    assert_eq!(site.hits("/"), 0);
}

#[tokio::test]
async fn test_robots_denied_page_is_skipped() {
    let site = Arc::new(
        FakeSite::new()
            .file(
                "/robots.txt",
                "text/plain",
                b"User-agent: *\nDisallow: /private\n".to_vec(),
            )
            .page(
                "/",
                &html(
                    "Home",
                    r#"<h1>Home</h1><p>Intro text.</p><a href="/private/x">P</a><a href="/a">A</a>"#,
                ),
            )
            .page("/a", &html("A", "<h1>Page A</h1><p>Alpha text.</p>")),
    );
    let config = config_for(&site).build().unwrap();

    let out = harvest(ORIGIN, &config, &ArchiveOptions::default()).await.unwrap();

    assert_eq!(out.report.stats.pages_scraped, 2);
    assert_eq!(out.report.stats.pages_skipped, 1);
    assert!(matches!(
        &out.report.diagnostics[0],
        Diagnostic::RobotsBlocked { url } if url.ends_with("/private/x")
    ));
    assert_eq!(site.hits("/private/x"), 0);
    assert_eq!(site.hits("/robots.txt"), 1, "robots.txt is fetched once per origin");
}

#[tokio::test]
async fn test_url_variants_fetched_once() {
    let site = Arc::new(
        FakeSite::new()
            .page(
                "/",
                &html(
                    "Home",
                    r#"<h1>Home</h1><p>Intro text.</p>
                       <a href="/a">1</a><a href="/a/">2</a><a href="/a?x=1">3</a>
                       <a href="/a#team">4</a><a href="https://example.com/a">5</a>"#,
                ),
            )
            .page(
                "/a",
                &html("A", r#"<h1>Page A</h1><p>Alpha text.</p><a href="/">home</a>"#),
            ),
    );
    let config = config_for(&site).max_depth(2).max_pages(10).build().unwrap();

    let out = harvest(ORIGIN, &config, &ArchiveOptions::default()).await.unwrap();

    assert_eq!(out.report.stats.pages_scraped, 2);
    assert_eq!(site.hits("/"), 1);
    assert_eq!(site.hits("/a"), 1);
}

#[tokio::test]
async fn test_external_links_not_followed() {
    let site = Arc::new(FakeSite::new().page(
        "/",
        &html(
            "Home",
            r#"<h1>Home</h1><p>Intro text.</p><a href="https://other.org/page">elsewhere</a>"#,
        ),
    ));
    let config = config_for(&site).build().unwrap();

    harvest(ORIGIN, &config, &ArchiveOptions::default()).await.unwrap();

    assert!(site.requested().iter().all(|r| !r.contains("other.org")));
}

#[tokio::test]
async fn test_non_html_and_broken_pages_are_skipped() {
    let site = Arc::new(
        FakeSite::new()
            .page(
                "/",
                &html(
                    "Home",
                    r#"<h1>Home</h1><p>Intro text.</p><a href="/guide.pdf">pdf</a><a href="/gone">gone</a>"#,
                ),
            )
            .file("/guide.pdf", "application/pdf", b"%PDF-1.7".to_vec())
            .status("/gone", 500),
    );
    let config = config_for(&site).build().unwrap();

    let out = harvest(ORIGIN, &config, &ArchiveOptions::default()).await.unwrap();

    assert_eq!(out.report.stats.pages_scraped, 1);
    assert_eq!(out.report.stats.pages_skipped, 2);
    assert!(matches!(out.report.diagnostics[0], Diagnostic::PageUnreadable { .. }));
    assert!(matches!(
        &out.report.diagnostics[1],
        Diagnostic::PageFetchFailed { detail, .. } if detail == "HTTP 500"
    ));
    assert!(out.report.summary().contains("Pages skipped:     2"));
}

#[tokio::test]
async fn test_unreachable_start_reports_first_problem() {
    let site = Arc::new(FakeSite::new());
    let config = config_for(&site).build().unwrap();

    let err = harvest(ORIGIN, &config, &ArchiveOptions::default())
        .await
        .unwrap_err();

    match err {
        HarvestError::NoPagesScraped { first_problem, .. } => {
            assert!(first_problem.contains("HTTP 404"), "{first_problem}")
        }
        other => panic!("unexpected error: {other}"),
    }
}

/// Raises the cancel flag as soon as the first page is scraped.
struct CancelAfterFirstPage {
    flag: Arc<AtomicBool>,
}

impl HarvestProgressCallback for CancelAfterFirstPage {
    fn on_page_scraped(&self, _url: &str, _pages_done: usize, _max_pages: usize) {
        self.flag.store(true, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn test_cancel_keeps_partial_results() {
    let site = Arc::new(
        FakeSite::new()
            .page(
                "/",
                &html("Home", r#"<h1>Home</h1><p>Intro text.</p><a href="/a">A</a>"#),
            )
            .page("/a", &html("A", "<h1>Page A</h1><p>Alpha text.</p>")),
    );
    let flag = Arc::new(AtomicBool::new(false));
    let config = config_for(&site)
        .cancel_flag(Arc::clone(&flag))
        .progress_callback(Arc::new(CancelAfterFirstPage {
            flag: Arc::clone(&flag),
        }))
        .build()
        .unwrap();

    let out = harvest(ORIGIN, &config, &ArchiveOptions::default()).await.unwrap();

    assert!(out.report.cancelled);
    assert_eq!(out.report.stats.pages_scraped, 1);
    assert_eq!(site.hits("/a"), 0);
    assert!(out
        .report
        .diagnostics
        .iter()
        .any(|d| matches!(d, Diagnostic::Cancelled { pages: 1 })));
}

// ── Grouping strategies ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_url_path_grouping() {
    let site = Arc::new(
        FakeSite::new()
            .page(
                "/",
                &html(
                    "Home",
                    r#"<h1>Home</h1><p>Intro text.</p>
                       <a href="/guided-tours/day-one">t1</a><a href="/guided-tours/day-two">t2</a>
                       <a href="/shop">shop</a>"#,
                ),
            )
            .page("/guided-tours/day-one", &html("Day One", "<h2>Morning</h2><p>Walk the old town.</p>"))
            .page("/guided-tours/day-two", &html("Day Two", "<p>Visit the harbour.</p>"))
            .page("/shop", &html("Shop", "<p>Tickets and maps.</p>")),
    );
    let config = config_for(&site)
        .grouping(WebGrouping::UrlPath)
        .build()
        .unwrap();

    let out = harvest(ORIGIN, &config, &ArchiveOptions::default()).await.unwrap();

    let names: Vec<(&str, Option<&str>)> = out
        .archive
        .manifest
        .content_items
        .iter()
        .map(|i| (i.name.as_str(), i.parent_name.as_deref()))
        .collect();
    assert_eq!(
        names,
        vec![
            ("Default", None),
            ("Home", Some("Default")),
            ("Guided Tours", None),
            ("Day One", Some("Guided Tours")),
            ("Day Two", Some("Guided Tours")),
            ("Shop", None),
            ("Shop", Some("Shop")),
        ]
    );
    let day_one = &out.archive.manifest.content_items[3];
    assert_eq!(day_one.content, "Walk the old town.");
}

// ── Output files ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_harvest_to_file_round_trip() {
    let site = Arc::new(
        FakeSite::new()
            .page(
                "/",
                &html(
                    "Café Guide",
                    r#"<h1>Café</h1><p>Crème brûlée is served daily.</p><img src="/img/cake.png">"#,
                ),
            )
            .file("/img/cake.png", "image/png", png(99)),
    );
    let config = config_for(&site).build().unwrap();
    let options = ArchiveOptions::builder().language("fr").build().unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("example.com_archive.zip");
    let report = harvest_to_file(ORIGIN, &path, &config, &options).await.unwrap();
    assert_eq!(report.stats.pages_scraped, 1);

    let (archive, validation) = inspect(&path).unwrap();
    assert!(validation.is_valid(), "{:?}", validation.errors);
    assert!(validation.warnings.is_empty(), "{:?}", validation.warnings);
    assert_eq!(archive.manifest.card.name, "Café Guide");
    assert_eq!(archive.manifest.card.original_language, "fr");
    assert_eq!(archive.images.len(), 1);
    assert_eq!(
        archive.manifest.content_items[1].content,
        "Crème brûlée is served daily."
    );

    let json = archive.manifest_json().unwrap();
    assert!(json.contains("Crème brûlée"), "non-ASCII must stay unescaped");
    assert!(json.contains("\"exportedAt\""));
}

#[tokio::test]
async fn test_document_to_file_round_trip() {
    use base64::Engine as _;
    let image = base64::engine::general_purpose::STANDARD.encode(png(12));
    let dump = serde_json::json!({
        "blocks": [
            {"kind": "text", "text": "Ground Floor", "font_size": 24, "is_bold": true, "page_index": 0, "position_key": 10},
            {"kind": "text", "text": "Entrance hall.", "font_size": 12, "page_index": 0, "position_key": 40},
            {"kind": "text", "text": "Ticket desk.", "font_size": 12, "page_index": 0, "position_key": 60},
            {"kind": "text", "text": "First Floor", "font_size": 24, "is_bold": true, "page_index": 1, "position_key": 10},
            {"kind": "text", "text": "Paintings.", "font_size": 12, "page_index": 1, "position_key": 40}
        ],
        "images": [
            {"data": image, "ext": "png", "page_index": 1, "position_key": 80}
        ]
    });

    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("museum.json");
    std::fs::write(&input, serde_json::to_vec(&dump).unwrap()).unwrap();
    let output = dir.path().join("out").join("museum_archive.zip");

    let report = document_to_file(&input, &output, &ArchiveOptions::default())
        .await
        .unwrap();
    assert_eq!(report.stats.images_found, 1);
    assert_eq!(report.stats.images_downloaded, 1);

    let (archive, validation) = inspect(&output).unwrap();
    assert!(validation.is_valid(), "{:?}", validation.errors);
    assert_eq!(archive.manifest.card.name, "museum");
    assert!(archive.manifest.card.is_grouped);
    let items = &archive.manifest.content_items;
    assert_eq!(items.len(), 4);
    assert_eq!(items[3].name, "First Floor");
    assert_eq!(items[3].image.as_deref(), Some("images/content/1-First-Floor.png"));
    let sorts: Vec<i64> = items.iter().map(|i| i.sort_order).collect();
    assert_eq!(sorts, vec![0, 1, 2, 3]);
}

#[tokio::test]
async fn test_document_without_text_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("empty.json");
    std::fs::write(&input, br#"{"blocks": []}"#).unwrap();
    let output = dir.path().join("empty_archive.zip");

    let err = document_to_file(&input, &output, &ArchiveOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, HarvestError::NoContent { .. }), "{err}");
    assert!(!output.exists(), "no archive is written on fatal errors");
}

#[test]
fn test_callback_is_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<CancelAfterFirstPage>();
    assert_send_sync::<FakeSite>();
}
