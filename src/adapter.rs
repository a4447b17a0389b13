//! Source adapters: turn a source file into a [`SourceDocument`].
//!
//! Format-specific extraction (PDF text runs, DOCX paragraphs) happens
//! outside this crate; what arrives here is a normalized dump of positioned
//! blocks and images. [`BlockDumpAdapter`] reads that dump as JSON:
//!
//! ```json
//! {
//!   "name": "Museum Guide",
//!   "blocks": [
//!     {"kind": "text", "text": "Welcome", "font_size": 24, "is_bold": true,
//!      "page_index": 0, "position_key": 72.0}
//!   ],
//!   "images": [
//!     {"data": "<base64>", "ext": "png", "page_index": 0, "position_key": 140.0,
//!      "width": 640, "height": 480}
//!   ]
//! }
//! ```
//!
//! The adapter cleans every text fragment and sorts blocks by page, then
//! position, so downstream stages can rely on source order.

use crate::error::HarvestError;
use crate::model::{Block, SourceDocument, SourceImage};
use crate::pipeline::clean::clean_text;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Reads one kind of source file.
pub trait SourceAdapter: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// `true` when this adapter understands `path` (usually by extension).
    fn accepts(&self, path: &Path) -> bool;

    /// Extract blocks and images from `path`.
    fn read(&self, path: &Path) -> Result<SourceDocument, HarvestError>;
}

/// Adapter for JSON block dumps.
#[derive(Debug, Default, Clone, Copy)]
pub struct BlockDumpAdapter;

#[derive(Debug, Deserialize)]
struct DumpFile {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    blocks: Vec<Block>,
    #[serde(default)]
    images: Vec<DumpImage>,
}

#[derive(Debug, Deserialize)]
struct DumpImage {
    data: String,
    #[serde(default)]
    ext: String,
    #[serde(default)]
    page_index: usize,
    #[serde(default)]
    position_key: f64,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
}

impl BlockDumpAdapter {
    /// Parse dump bytes. `fallback_name` is used when the dump carries no name.
    pub fn parse(&self, bytes: &[u8], fallback_name: Option<String>) -> Result<SourceDocument, String> {
        let dump: DumpFile = serde_json::from_slice(bytes).map_err(|e| format!("invalid block dump: {}", e))?;

        let mut blocks: Vec<Block> = dump
            .blocks
            .into_iter()
            .map(|mut b| {
                if let Some(text) = b.text.take() {
                    b.text = Some(clean_text(&text));
                }
                b
            })
            .collect();
        blocks.sort_by(|a, b| {
            a.page_index
                .cmp(&b.page_index)
                .then(a.position_key.total_cmp(&b.position_key))
        });

        let images = dump
            .images
            .into_iter()
            .enumerate()
            .map(|(i, img)| {
                let data = BASE64
                    .decode(img.data.trim())
                    .map_err(|e| format!("image {} has invalid base64: {}", i, e))?;
                Ok(SourceImage {
                    data,
                    ext: img.ext.trim_start_matches('.').to_ascii_lowercase(),
                    page_index: img.page_index,
                    position_key: img.position_key,
                    width: img.width,
                    height: img.height,
                })
            })
            .collect::<Result<Vec<_>, String>>()?;

        let name = dump
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .or(fallback_name);

        Ok(SourceDocument {
            name,
            blocks,
            images,
        })
    }
}

impl SourceAdapter for BlockDumpAdapter {
    fn name(&self) -> &'static str {
        "block-dump"
    }

    fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"))
    }

    fn read(&self, path: &Path) -> Result<SourceDocument, HarvestError> {
        let path = resolve_local(path)?;
        let bytes = std::fs::read(&path).map_err(|e| io_to_input_error(&path, e))?;
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .filter(|s| !s.is_empty());
        let doc = self
            .parse(&bytes, stem)
            .map_err(|detail| HarvestError::UnsupportedSource {
                path: path.clone(),
                detail,
            })?;
        info!(
            "Read {} blocks and {} images from {}",
            doc.blocks.len(),
            doc.images.len(),
            path.display()
        );
        Ok(doc)
    }
}

/// Pick the first adapter in `adapters` that accepts `path`.
pub fn adapter_for<'a>(
    adapters: &'a [Box<dyn SourceAdapter>],
    path: &Path,
) -> Result<&'a dyn SourceAdapter, HarvestError> {
    adapters
        .iter()
        .find(|a| a.accepts(path))
        .map(|a| &**a)
        .ok_or_else(|| HarvestError::UnsupportedSource {
            path: path.to_path_buf(),
            detail: "no adapter accepts this file type".into(),
        })
}

/// The adapters shipped with the crate.
pub fn default_adapters() -> Vec<Box<dyn SourceAdapter>> {
    vec![Box::new(BlockDumpAdapter)]
}

/// Validate that a local source file exists and is readable.
pub fn resolve_local(path: &Path) -> Result<PathBuf, HarvestError> {
    let path = path.to_path_buf();
    if !path.exists() {
        return Err(HarvestError::FileNotFound { path });
    }
    if path.is_dir() {
        return Err(HarvestError::UnsupportedSource {
            path,
            detail: "is a directory".into(),
        });
    }
    match std::fs::File::open(&path) {
        Ok(_) => {
            debug!("Resolved local source: {}", path.display());
            Ok(path)
        }
        Err(e) => Err(io_to_input_error(&path, e)),
    }
}

fn io_to_input_error(path: &Path, e: std::io::Error) -> HarvestError {
    match e.kind() {
        std::io::ErrorKind::PermissionDenied => HarvestError::PermissionDenied {
            path: path.to_path_buf(),
        },
        std::io::ErrorKind::NotFound => HarvestError::FileNotFound {
            path: path.to_path_buf(),
        },
        _ => HarvestError::UnsupportedSource {
            path: path.to_path_buf(),
            detail: e.to_string(),
        },
    }
}
