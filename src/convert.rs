//! Top-level entry points: structure a document, harvest a site, write and
//! inspect archives.
//!
//! Both sources end in the same place. An adapter (the block dump reader or
//! the crawler) produces blocks and positioned images, the shared pipeline
//! turns them into categories and items, and [`build_archive`] flattens the
//! result into a [`ProjectArchive`].
//!
//! Fatal problems come back as `Err(HarvestError)` and no archive is built.
//! Everything else is recorded in the returned [`RunReport`].

use crate::adapter::{adapter_for, default_adapters};
use crate::archive::{build_archive, read_archive, sanitize_filename, validate, ProjectArchive, ValidationReport};
use crate::config::{ArchiveOptions, CrawlConfig, WebGrouping};
use crate::crawl::urls::{display_domain, resolve_start_url};
use crate::crawl::{CrawledPage, Crawler};
use crate::error::{Diagnostic, HarvestError};
use crate::model::{Block, ImageAsset, Placement, SourceDocument};
use crate::output::{RunOutput, RunReport};
use crate::pipeline::associate::associate;
use crate::pipeline::images::{prepare_image, FormatPolicy};
use crate::pipeline::structure::{build_structure, group_by_url_path, PageOutline, Structure};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Name used when neither the options nor the source provide one.
const UNTITLED: &str = "Untitled";

// ── Documents ────────────────────────────────────────────────────────────

/// Structure an already-extracted document into an archive.
///
/// Images are validated with [`FormatPolicy::Skip`]: formats the archive
/// cannot carry are dropped, not converted.
///
/// # Errors
/// [`HarvestError::NoContent`] when the document has no text at all.
pub fn structure_document(
    doc: SourceDocument,
    options: &ArchiveOptions,
) -> Result<RunOutput, HarvestError> {
    let source_name = doc.name.clone().unwrap_or_else(|| "document".to_string());

    // ── Step 1: Reject empty sources ─────────────────────────────────────
    if !doc.blocks.iter().any(Block::has_text) {
        return Err(HarvestError::NoContent { source_name });
    }

    // ── Step 2: Build categories and items ───────────────────────────────
    let structure = build_structure(&doc.blocks, options.name.as_deref());
    if structure.orphaned_blocks > 0 {
        debug!(
            "{} body blocks before the first heading were dropped",
            structure.orphaned_blocks
        );
    }

    // ── Step 3: Validate images ──────────────────────────────────────────
    let mut report = RunReport::default();
    report.stats.images_found = doc.images.len();

    let mut placements: Vec<Placement> = Vec::new();
    let mut assets: Vec<ImageAsset> = Vec::new();
    let mut refs: Vec<String> = Vec::new();
    for (i, image) in doc.images.into_iter().enumerate() {
        let source_ref = format!("page {} image {}", image.page_index + 1, i + 1);
        let known_size = image.width.zip(image.height);
        match prepare_image(image.data, Some(&image.ext), known_size, FormatPolicy::Skip) {
            Ok(asset) => {
                placements.push(Placement {
                    page_index: image.page_index,
                    position_key: image.position_key,
                });
                assets.push(asset);
                refs.push(source_ref);
            }
            Err(reason) => {
                debug!("Skipping {}: {}", source_ref, reason);
                report.stats.images_failed += 1;
                report.push(Diagnostic::ImageRejected {
                    source_ref,
                    reason: reason.to_string(),
                });
            }
        }
    }

    // ── Step 4: Attach images to items ───────────────────────────────────
    let items = structure.flat_items();
    let association = associate(&items, &placements);
    for &idx in &association.unassigned {
        report.push(Diagnostic::ImageUnassigned {
            source_ref: refs[idx].clone(),
        });
    }
    if !association.dropped.is_empty() {
        debug!(
            "{} images lost to an earlier image on the same item",
            association.dropped.len()
        );
    }
    let item_images: Vec<Option<&ImageAsset>> = (0..items.len())
        .map(|i| association.image_for(i).map(|img| &assets[img]))
        .collect();
    report.stats.images_downloaded = item_images
        .iter()
        .flatten()
        .map(|a| a.hash.as_str())
        .collect::<HashSet<_>>()
        .len();

    // ── Step 5: Assemble the archive ─────────────────────────────────────
    let project_name = options
        .name
        .clone()
        .or(doc.name)
        .unwrap_or_else(|| UNTITLED.to_string());
    let archive = build_archive(&structure, &item_images, &project_name, options);

    info!(
        "Structured '{}': {} categories, {} items, {} images",
        project_name,
        archive.category_count(),
        archive.item_count(),
        archive.images.len()
    );
    Ok(RunOutput { archive, report })
}

/// Read a source file with the first adapter that accepts it and structure it.
///
/// Reading and structuring run on the blocking pool.
pub async fn convert_document(
    path: impl AsRef<Path>,
    options: &ArchiveOptions,
) -> Result<RunOutput, HarvestError> {
    let path = path.as_ref().to_path_buf();
    let options = options.clone();
    info!("Starting document conversion: {}", path.display());

    tokio::task::spawn_blocking(move || {
        let adapters = default_adapters();
        let adapter = adapter_for(&adapters, &path)?;
        debug!("Using {} adapter for {}", adapter.name(), path.display());
        let doc = adapter.read(&path)?;
        structure_document(doc, &options)
    })
    .await
    .map_err(|e| HarvestError::Internal(format!("document task failed: {}", e)))?
}

/// Convert a document and write the archive to `output_path`.
pub async fn document_to_file(
    path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    options: &ArchiveOptions,
) -> Result<RunReport, HarvestError> {
    let output = convert_document(path, options).await?;
    write_archive(&output.archive, output_path).await?;
    Ok(output.report)
}

// ── Web ──────────────────────────────────────────────────────────────────

/// Crawl a site and structure the collected pages into an archive.
///
/// `input` may be a bare host (`example.com`); `https://` is assumed.
///
/// # Returns
/// `Ok(RunOutput)` as long as at least one page was scraped, even when
/// other pages or images failed (see `output.report`).
///
/// # Errors
/// - [`HarvestError::InvalidUrl`] for an unusable start URL
/// - [`HarvestError::BlockedDomain`] / [`HarvestError::RobotsDisallowed`]
///   from the pre-flight
/// - [`HarvestError::NoPagesScraped`] when nothing could be collected
pub async fn harvest(
    input: &str,
    config: &CrawlConfig,
    options: &ArchiveOptions,
) -> Result<RunOutput, HarvestError> {
    // ── Step 1: Resolve the start URL ────────────────────────────────────
    let start = resolve_start_url(input)?;

    // ── Step 2: Crawl pages ──────────────────────────────────────────────
    let crawler = Crawler::new(config.clone())?;
    let outcome = crawler.crawl(&start).await?;
    let mut report = outcome.report;
    let pages = outcome.pages;

    if pages.is_empty() {
        let first_problem = report
            .diagnostics
            .first()
            .map(|d| d.to_string())
            .unwrap_or_else(|| "no HTML pages found".to_string());
        return Err(HarvestError::NoPagesScraped {
            url: start.to_string(),
            first_problem,
        });
    }

    // ── Step 3: Download images ──────────────────────────────────────────
    let fetched = crawler.fetch_images(&pages).await;
    report.stats.images_found = fetched.found;
    report.stats.images_failed = fetched.failed;
    report.stats.images_downloaded = fetched.store.len();
    for d in fetched.diagnostics {
        warn!("{}", d);
        report.push(d);
    }

    // ── Step 4: Build categories and items ───────────────────────────────
    let structure = structure_pages(&pages, config.grouping, options.name.as_deref());

    // ── Step 5: Attach images to items ───────────────────────────────────
    let mut placements: Vec<Placement> = Vec::new();
    let mut hashes: Vec<String> = Vec::new();
    for (page_index, (page, page_hashes)) in pages.iter().zip(&fetched.hashes).enumerate() {
        for (image, hash) in page.images.iter().zip(page_hashes) {
            if let Some(hash) = hash {
                placements.push(Placement {
                    page_index,
                    position_key: image.position_key,
                });
                hashes.push(hash.clone());
            }
        }
    }
    let items = structure.flat_items();
    let association = associate(&items, &placements);
    debug!(
        "Assigned {} images to {} items ({} dropped)",
        association.assignments.len(),
        items.len(),
        association.dropped.len()
    );

    let assets: HashMap<String, ImageAsset> = fetched.store.into_assets();
    let item_images: Vec<Option<&ImageAsset>> = (0..items.len())
        .map(|i| {
            association
                .image_for(i)
                .and_then(|img| assets.get(&hashes[img]))
        })
        .collect();

    // ── Step 6: Assemble the archive ─────────────────────────────────────
    let project_name = web_project_name(options, &pages, &start);
    let archive = build_archive(&structure, &item_images, &project_name, options);

    info!(
        "Harvested '{}': {} pages, {} categories, {} items, {} images",
        project_name,
        pages.len(),
        archive.category_count(),
        archive.item_count(),
        archive.images.len()
    );
    crawler
        .progress()
        .on_harvest_complete(report.stats.pages_scraped, assets.len());

    Ok(RunOutput { archive, report })
}

/// Harvest a site and write the archive to `output_path`.
pub async fn harvest_to_file(
    input: &str,
    output_path: impl AsRef<Path>,
    config: &CrawlConfig,
    options: &ArchiveOptions,
) -> Result<RunReport, HarvestError> {
    let output = harvest(input, config, options).await?;
    write_archive(&output.archive, output_path).await?;
    Ok(output.report)
}

/// Synchronous wrapper around [`harvest`].
///
/// Creates a temporary tokio runtime internally.
pub fn harvest_sync(
    input: &str,
    config: &CrawlConfig,
    options: &ArchiveOptions,
) -> Result<RunOutput, HarvestError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| HarvestError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(harvest(input, config, options))
}

fn structure_pages(pages: &[CrawledPage], grouping: WebGrouping, fallback_item: Option<&str>) -> Structure {
    match grouping {
        WebGrouping::Headings => {
            let blocks: Vec<Block> = pages.iter().flat_map(|p| p.blocks.iter().cloned()).collect();
            build_structure(&blocks, fallback_item)
        }
        WebGrouping::UrlPath => {
            let outlines: Vec<PageOutline<'_>> = pages
                .iter()
                .enumerate()
                .map(|(page_index, p)| PageOutline {
                    url: &p.url,
                    title: &p.title,
                    page_index,
                    blocks: &p.blocks,
                })
                .collect();
            group_by_url_path(&outlines)
        }
    }
}

fn web_project_name(options: &ArchiveOptions, pages: &[CrawledPage], start: &url::Url) -> String {
    if let Some(name) = &options.name {
        return name.clone();
    }
    pages
        .first()
        .map(|p| p.title.trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| sanitize_filename(&display_domain(start)))
}

// ── Output ───────────────────────────────────────────────────────────────

/// Write `archive` as a ZIP file.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn write_archive(archive: &ProjectArchive, output_path: impl AsRef<Path>) -> Result<(), HarvestError> {
    let path = output_path.as_ref();
    let bytes = archive.to_zip_bytes()?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| HarvestError::OutputWriteFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
    }

    let tmp_path = path.with_extension("zip.tmp");
    tokio::fs::write(&tmp_path, &bytes)
        .await
        .map_err(|e| HarvestError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| HarvestError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    info!("Wrote {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

/// Read an archive back and check it the way an importer would.
pub fn inspect(path: impl AsRef<Path>) -> Result<(ProjectArchive, ValidationReport), HarvestError> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => HarvestError::FileNotFound {
            path: path.to_path_buf(),
        },
        std::io::ErrorKind::PermissionDenied => HarvestError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => HarvestError::InvalidArchive(e.to_string()),
    })?;
    let archive = read_archive(std::io::BufReader::new(file))?;
    let report = validate(&archive);
    Ok((archive, report))
}

/// `<base>_archive.zip`, with `base` sanitized.
pub fn default_output_name(base: &str) -> PathBuf {
    PathBuf::from(format!("{}_archive.zip", sanitize_filename(base)))
}

/// Default output file for a harvest of `url`, named after its domain.
pub fn default_web_output(url: &url::Url) -> PathBuf {
    default_output_name(&display_domain(url))
}

/// Default output file for a document, named after its file stem.
pub fn default_document_output(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    default_output_name(&stem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SourceImage;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn png(shade: u8) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 64, Rgb([shade, 10, 10])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png).unwrap();
        buf
    }

    fn image_at(data: Vec<u8>, page_index: usize, position_key: f64) -> SourceImage {
        SourceImage {
            data,
            ext: "png".into(),
            page_index,
            position_key,
            width: None,
            height: None,
        }
    }

    fn doc(blocks: Vec<Block>, images: Vec<SourceImage>) -> SourceDocument {
        SourceDocument {
            name: Some("guide".into()),
            blocks,
            images,
        }
    }

    #[test]
    fn welcome_scenario() {
        let blocks = vec![
            Block::text("Welcome", 24.0, true, 0, 0.0),
            Block::text("one", 12.0, false, 0, 1.0),
            Block::text("two", 12.0, false, 0, 2.0),
            Block::text("three", 12.0, false, 0, 3.0),
        ];
        let out = structure_document(doc(blocks, vec![]), &ArchiveOptions::default()).unwrap();
        let items = &out.archive.manifest.content_items;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].name, "Welcome");
        assert!(items[0].is_category());
        assert_eq!(items[1].name, "Welcome");
        assert_eq!(items[1].content, "one\n\ntwo\n\nthree");
        assert_eq!(items[1].parent_name.as_deref(), Some("Welcome"));
        assert_eq!(out.archive.manifest.card.name, "guide");
        assert!(!out.archive.manifest.card.is_grouped);
    }

    #[test]
    fn empty_document_is_fatal() {
        let blocks = vec![Block::text("  ", 12.0, false, 0, 0.0)];
        let err = structure_document(doc(blocks, vec![]), &ArchiveOptions::default()).unwrap_err();
        assert!(matches!(err, HarvestError::NoContent { source_name } if source_name == "guide"));
    }

    #[test]
    fn images_go_to_nearest_item() {
        let blocks = vec![
            Block::text("Hall", 24.0, true, 0, 0.0),
            Block::text("Room A", 12.0, true, 0, 10.0),
            Block::text("a", 12.0, false, 0, 11.0),
            Block::text("Room B", 12.0, true, 0, 100.0),
            Block::text("b", 12.0, false, 0, 101.0),
            Block::text("more", 12.0, false, 0, 102.0),
        ];
        let images = vec![image_at(png(1), 0, 95.0), image_at(png(2), 0, 12.0)];
        let out = structure_document(doc(blocks, images), &ArchiveOptions::default()).unwrap();
        let items = &out.archive.manifest.content_items;
        assert_eq!(items[1].name, "Room A");
        assert_eq!(items[1].image.as_deref(), Some("images/content/0-Room-A.png"));
        assert_eq!(items[2].image.as_deref(), Some("images/content/1-Room-B.png"));
        assert_eq!(out.archive.images.len(), 2);
        assert_eq!(out.report.stats.images_downloaded, 2);
    }

    #[test]
    fn small_images_are_reported_not_fatal() {
        let blocks = vec![
            Block::text("Hall", 24.0, true, 0, 0.0),
            Block::text("body", 12.0, false, 0, 1.0),
            Block::text("more", 12.0, false, 0, 2.0),
        ];
        let mut tiny = image_at(vec![0; 8], 0, 1.0);
        tiny.width = Some(20);
        tiny.height = Some(20);
        let out = structure_document(doc(blocks, vec![tiny]), &ArchiveOptions::default()).unwrap();
        assert_eq!(out.report.stats.images_failed, 1);
        assert!(matches!(
            out.report.diagnostics[0],
            Diagnostic::ImageRejected { .. }
        ));
        assert!(out.archive.images.is_empty());
    }

    #[test]
    fn image_without_items_is_unassigned() {
        let blocks = vec![Block::text("Only a heading", 24.0, true, 0, 0.0)];
        let out = structure_document(doc(blocks, vec![image_at(png(3), 0, 5.0)]), &ArchiveOptions::default())
            .unwrap();
        assert_eq!(out.archive.item_count(), 0);
        assert!(matches!(
            out.report.diagnostics[..],
            [Diagnostic::ImageUnassigned { .. }]
        ));
        assert!(out.archive.images.is_empty());
    }

    #[test]
    fn second_image_for_same_item_is_dropped() {
        let blocks = vec![
            Block::text("Hall", 24.0, true, 0, 0.0),
            Block::text("body", 12.0, false, 0, 1.0),
            Block::text("more", 12.0, false, 0, 2.0),
        ];
        let images = vec![image_at(png(3), 0, 1.0), image_at(png(4), 0, 1.5)];
        let out = structure_document(doc(blocks, images), &ArchiveOptions::default()).unwrap();
        assert_eq!(out.archive.images.len(), 1);
        assert_eq!(out.report.stats.images_found, 2);
        assert_eq!(out.report.stats.images_downloaded, 1);
        let stored = out.archive.images.values().next().unwrap();
        assert_eq!(stored, &png(3));
    }

    #[test]
    fn fallback_uses_configured_name() {
        let blocks = vec![
            Block::text("plain", 12.0, false, 0, 0.0),
            Block::text("text", 12.0, false, 0, 1.0),
        ];
        let options = ArchiveOptions::builder().name("Tour").build().unwrap();
        let out = structure_document(doc(blocks, vec![]), &options).unwrap();
        let items = &out.archive.manifest.content_items;
        assert_eq!(items[0].name, "default");
        assert_eq!(items[1].name, "Tour");
        assert_eq!(items[1].content, "plain\n\ntext");
        assert_eq!(out.archive.manifest.card.name, "Tour");
    }

    #[test]
    fn default_output_names() {
        assert_eq!(default_output_name("example.com"), PathBuf::from("example.com_archive.zip"));
        let url = url::Url::parse("https://www.example.org/a").unwrap();
        assert_eq!(default_web_output(&url), PathBuf::from("example.org_archive.zip"));
        assert_eq!(
            default_document_output(Path::new("/tmp/City Walk.json")),
            PathBuf::from("City-Walk_archive.zip")
        );
    }

    #[tokio::test]
    async fn write_then_inspect() {
        let blocks = vec![
            Block::text("Hall", 24.0, true, 0, 0.0),
            Block::text("body", 12.0, false, 0, 1.0),
        ];
        let out = structure_document(
            doc(blocks, vec![image_at(png(9), 0, 1.0)]),
            &ArchiveOptions::default(),
        )
        .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("guide_archive.zip");
        write_archive(&out.archive, &path).await.unwrap();
        assert!(!path.with_extension("zip.tmp").exists());

        let (archive, report) = inspect(&path).unwrap();
        assert!(report.is_valid(), "{:?}", report.errors);
        assert_eq!(archive.manifest.content_items, out.archive.manifest.content_items);
        assert_eq!(archive.images, out.archive.images);
    }

    #[test]
    fn inspect_missing_file() {
        let err = inspect("/no/such/archive.zip").unwrap_err();
        assert!(matches!(err, HarvestError::FileNotFound { .. }));
    }
}
