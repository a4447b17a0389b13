//! Project archive: `project.json` plus image files, packed into a ZIP.
//!
//! [`build_archive`] flattens a [`Structure`] into the manifest's
//! `contentItems` list (each category followed by its items) and lays the
//! assigned images out under `images/content/`. [`ProjectArchive::write_to`]
//! streams the result into any [`ArchiveSink`]; [`read_archive`] and
//! [`validate`] read one back and check it the way an importer would.

use crate::config::{ArchiveOptions, ContentMode, GroupDisplay};
use crate::error::HarvestError;
use crate::model::ImageAsset;
use crate::pipeline::images::content_hash;
use crate::pipeline::structure::Structure;
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::{Read, Seek, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Manifest format version.
pub const ARCHIVE_VERSION: u32 = 1;
/// Manifest entry name inside the container.
pub const MANIFEST_PATH: &str = "project.json";
/// Directory holding item images.
pub const IMAGE_DIR: &str = "images/content";

const QR_POSITIONS: &[&str] = &["TL", "TR", "BL", "BR"];

// ── Manifest types ───────────────────────────────────────────────────────

/// `project.json`. Field order is the on-disk order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectManifest {
    pub version: u32,
    #[serde(rename = "exportedAt")]
    pub exported_at: String,
    pub card: ArchiveCard,
    #[serde(rename = "contentItems", default)]
    pub content_items: Vec<ArchiveContentItem>,
}

/// Card-level metadata.
///
/// Enumerated fields are kept as strings so archives written by other tools
/// (with legacy or unknown values) still load and can be reported on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveCard {
    pub name: String,
    pub description: String,
    pub original_language: String,
    pub content_mode: String,
    pub is_grouped: bool,
    pub group_display: String,
    pub billing_type: String,
    pub default_daily_session_limit: Option<u32>,
    pub conversation_ai_enabled: bool,
    pub ai_instruction: String,
    pub ai_knowledge_base: String,
    pub ai_welcome_general: String,
    pub ai_welcome_item: String,
    pub qr_code_position: String,
    pub image: Option<String>,
    pub crop_parameters: Option<serde_json::Value>,
    pub translations: Option<serde_json::Value>,
    pub content_hash: Option<String>,
}

impl Default for ArchiveCard {
    fn default() -> Self {
        Self {
            name: "Untitled".to_string(),
            description: String::new(),
            original_language: "en".to_string(),
            content_mode: ContentMode::default().as_str().to_string(),
            is_grouped: false,
            group_display: GroupDisplay::default().as_str().to_string(),
            billing_type: "digital".to_string(),
            default_daily_session_limit: None,
            conversation_ai_enabled: false,
            ai_instruction: String::new(),
            ai_knowledge_base: String::new(),
            ai_welcome_general: String::new(),
            ai_welcome_item: String::new(),
            qr_code_position: "BR".to_string(),
            image: None,
            crop_parameters: None,
            translations: None,
            content_hash: None,
        }
    }
}

/// One entry of `contentItems`: a category (`parent_name` is `None`) or an
/// item under the named category.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveContentItem {
    pub name: String,
    pub content: String,
    pub ai_knowledge_base: String,
    pub sort_order: i64,
    pub parent_name: Option<String>,
    pub image: Option<String>,
    pub crop_parameters: Option<serde_json::Value>,
    pub translations: Option<serde_json::Value>,
    pub content_hash: Option<String>,
}

impl ArchiveContentItem {
    pub fn is_category(&self) -> bool {
        self.parent_name.is_none()
    }
}

/// Manifest plus image bytes keyed by archive path.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectArchive {
    pub manifest: ProjectManifest,
    pub images: BTreeMap<String, Vec<u8>>,
}

impl ProjectArchive {
    /// `project.json` text: 2-space indent, non-ASCII kept as-is.
    pub fn manifest_json(&self) -> Result<String, HarvestError> {
        serde_json::to_string_pretty(&self.manifest)
            .map_err(|e| HarvestError::Internal(format!("manifest serialisation: {}", e)))
    }

    /// Write `project.json` followed by every image into `sink`.
    pub fn write_to(&self, sink: &mut dyn ArchiveSink) -> Result<(), HarvestError> {
        sink.put(MANIFEST_PATH, self.manifest_json()?.as_bytes())?;
        for (path, data) in &self.images {
            sink.put(path, data)?;
        }
        Ok(())
    }

    /// The archive as ZIP bytes.
    pub fn to_zip_bytes(&self) -> Result<Vec<u8>, HarvestError> {
        let mut sink = ZipSink::new(std::io::Cursor::new(Vec::new()));
        self.write_to(&mut sink)?;
        Ok(sink.finish()?.into_inner())
    }

    pub fn category_count(&self) -> usize {
        self.manifest
            .content_items
            .iter()
            .filter(|i| i.is_category())
            .count()
    }

    pub fn item_count(&self) -> usize {
        self.manifest.content_items.len() - self.category_count()
    }
}

/// `exportedAt` timestamp: UTC, microseconds, explicit `+00:00` offset.
pub fn export_timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6f+00:00").to_string()
}

// ── Building ─────────────────────────────────────────────────────────────

/// Flatten `structure` into a [`ProjectArchive`].
///
/// `item_images[i]` is the image assigned to the `i`-th item in flattened
/// order (see [`Structure::flat_items`]). An image is written once per
/// distinct hash; later items sharing the hash point at the same path.
pub fn build_archive(
    structure: &Structure,
    item_images: &[Option<&ImageAsset>],
    project_name: &str,
    options: &ArchiveOptions,
) -> ProjectArchive {
    let mut images: BTreeMap<String, Vec<u8>> = BTreeMap::new();
    let mut path_by_hash: HashMap<&str, String> = HashMap::new();
    let mut content_items: Vec<ArchiveContentItem> = Vec::with_capacity(
        structure.categories.len() + structure.item_count(),
    );

    let mut item_idx = 0usize;
    for category in &structure.categories {
        content_items.push(ArchiveContentItem {
            name: category.name.clone(),
            sort_order: content_items.len() as i64,
            ..Default::default()
        });
        for item in &category.items {
            let image = item_images.get(item_idx).copied().flatten().map(|asset| {
                path_by_hash
                    .entry(asset.hash.as_str())
                    .or_insert_with(|| {
                        let path = format!(
                            "{}/{}-{}.{}",
                            IMAGE_DIR,
                            item_idx,
                            sanitize_filename(&item.name),
                            asset.ext
                        );
                        images.insert(path.clone(), asset.data.clone());
                        path
                    })
                    .clone()
            });
            content_items.push(ArchiveContentItem {
                name: item.name.clone(),
                content: item.content.clone(),
                sort_order: content_items.len() as i64,
                parent_name: Some(category.name.clone()),
                image,
                ..Default::default()
            });
            item_idx += 1;
        }
    }

    let card = ArchiveCard {
        name: project_name.to_string(),
        original_language: options.language.clone(),
        content_mode: options.content_mode.as_str().to_string(),
        is_grouped: options.grouped.unwrap_or_else(|| structure.is_grouped()),
        group_display: options.group_display.as_str().to_string(),
        ..Default::default()
    };

    ProjectArchive {
        manifest: ProjectManifest {
            version: ARCHIVE_VERSION,
            exported_at: export_timestamp(),
            card,
            content_items,
        },
        images,
    }
}

static RE_UNSAFE_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9_\-. ]").unwrap());
static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Safe file-name fragment: ASCII letters, digits, `_-. `, whitespace runs
/// turned into `-`, at most 80 characters, `untitled` when nothing is left.
pub fn sanitize_filename(name: &str) -> String {
    let kept = RE_UNSAFE_CHARS.replace_all(name, "");
    let dashed = RE_WHITESPACE.replace_all(&kept, "-");
    let trimmed: String = dashed.trim_matches('-').chars().take(80).collect();
    if trimmed.is_empty() {
        "untitled".to_string()
    } else {
        trimmed
    }
}

// ── Sinks ────────────────────────────────────────────────────────────────

/// Destination for archive entries (path → bytes).
pub trait ArchiveSink {
    fn put(&mut self, path: &str, data: &[u8]) -> Result<(), HarvestError>;
}

/// Writes entries into a deflate-compressed ZIP.
pub struct ZipSink<W: Write + Seek> {
    writer: ZipWriter<W>,
}

impl<W: Write + Seek> ZipSink<W> {
    pub fn new(inner: W) -> Self {
        Self {
            writer: ZipWriter::new(inner),
        }
    }

    /// Write the central directory and hand back the underlying writer.
    pub fn finish(self) -> Result<W, HarvestError> {
        Ok(self.writer.finish()?)
    }
}

impl<W: Write + Seek> ArchiveSink for ZipSink<W> {
    fn put(&mut self, path: &str, data: &[u8]) -> Result<(), HarvestError> {
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        self.writer.start_file(path, options)?;
        self.writer
            .write_all(data)
            .map_err(|e| HarvestError::Container(format!("{}: {}", path, e)))
    }
}

/// Keeps entries in memory, in write order.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub entries: Vec<(String, Vec<u8>)>,
}

impl ArchiveSink for MemorySink {
    fn put(&mut self, path: &str, data: &[u8]) -> Result<(), HarvestError> {
        if self.entries.iter().any(|(p, _)| p == path) {
            return Err(HarvestError::Container(format!("duplicate entry {}", path)));
        }
        self.entries.push((path.to_string(), data.to_vec()));
        Ok(())
    }
}

// ── Reading back ─────────────────────────────────────────────────────────

/// Load an archive from ZIP data.
pub fn read_archive<R: Read + Seek>(reader: R) -> Result<ProjectArchive, HarvestError> {
    let mut zip = ZipArchive::new(reader)?;
    let mut manifest: Option<ProjectManifest> = None;
    let mut images = BTreeMap::new();

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i)?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        let mut data = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut data)
            .map_err(|e| HarvestError::InvalidArchive(format!("{}: {}", name, e)))?;
        if name == MANIFEST_PATH {
            let parsed = serde_json::from_slice(&data)
                .map_err(|e| HarvestError::InvalidArchive(format!("invalid JSON in {}: {}", MANIFEST_PATH, e)))?;
            manifest = Some(parsed);
        } else {
            images.insert(name, data);
        }
    }

    let manifest =
        manifest.ok_or_else(|| HarvestError::InvalidArchive(format!("missing {}", MANIFEST_PATH)))?;
    Ok(ProjectArchive { manifest, images })
}

/// Problems found in an archive. Errors make it unimportable; warnings are
/// fixed up or ignored by an importer.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Check an archive the way an importer would.
pub fn validate(archive: &ProjectArchive) -> ValidationReport {
    let mut report = ValidationReport::default();
    let manifest = &archive.manifest;
    let card = &manifest.card;

    if manifest.version != ARCHIVE_VERSION {
        report
            .warnings
            .push(format!("Unknown archive version {}", manifest.version));
    }

    // Card enums, with the legacy content modes mapped
    match card.content_mode.as_str() {
        "inline" => report
            .warnings
            .push(r#"Mapped legacy content_mode "inline" to "cards""#.to_string()),
        "grouped" => report
            .warnings
            .push(r#"Mapped legacy content_mode "grouped" to "list""#.to_string()),
        mode if mode.parse::<ContentMode>().is_err() => report
            .warnings
            .push(format!(r#"Invalid content_mode "{}", defaulting to "list""#, mode)),
        _ => {}
    }
    if card.group_display.parse::<GroupDisplay>().is_err() {
        report.warnings.push(format!(
            r#"Invalid group_display "{}", defaulting to "expanded""#,
            card.group_display
        ));
    }
    if !QR_POSITIONS.contains(&card.qr_code_position.as_str()) {
        report.warnings.push(format!(
            r#"Invalid qr_code_position "{}", defaulting to "BR""#,
            card.qr_code_position
        ));
    }
    if let Some(image) = &card.image {
        if !archive.images.contains_key(image) {
            report
                .warnings
                .push(format!(r#"Card image "{}" referenced but not found in archive"#, image));
        }
    }
    if let (Some(hash), false) = (&card.content_hash, card.description.is_empty()) {
        if &content_hash(card.description.as_bytes()) != hash {
            report
                .warnings
                .push("Card description hash mismatch - data may have been modified".to_string());
        }
    }

    // Items
    let mut categories_seen: HashSet<&str> = HashSet::new();
    let mut last_sort: Option<i64> = None;
    for item in &manifest.content_items {
        if let Some(prev) = last_sort {
            if item.sort_order <= prev {
                report.errors.push(format!(
                    r#"sort_order of "{}" ({}) does not increase (previous {})"#,
                    item.name, item.sort_order, prev
                ));
            }
        }
        last_sort = Some(item.sort_order);

        match &item.parent_name {
            None => {
                categories_seen.insert(item.name.as_str());
            }
            Some(parent) if !categories_seen.contains(parent.as_str()) => {
                report.errors.push(format!(
                    r#"Item "{}" references parent "{}" which does not precede it"#,
                    item.name, parent
                ));
            }
            Some(_) => {}
        }

        if let Some(image) = &item.image {
            if !archive.images.contains_key(image) {
                report.warnings.push(format!(
                    r#"Image "{}" for item "{}" not found in archive"#,
                    image, item.name
                ));
            }
        }
        if let (Some(hash), false) = (&item.content_hash, item.content.is_empty()) {
            if &content_hash(item.content.as_bytes()) != hash {
                report.warnings.push(format!(
                    r#"Content hash mismatch for "{}" - data may have been modified"#,
                    item.name
                ));
            }
        }
    }

    report
}
