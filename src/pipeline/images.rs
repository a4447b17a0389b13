//! Image validation, normalization and content-hash deduplication.
//!
//! Both sources funnel raw bytes through [`prepare_image`]:
//!
//! * document images use [`FormatPolicy::Skip`], so anything outside the
//!   archive's formats is dropped;
//! * web images use [`FormatPolicy::Reencode`], so decodable formats we do
//!   not store as-is are re-encoded to JPEG.
//!
//! Accepted images are fingerprinted with SHA-256 and kept in an
//! [`ImageStore`] that holds each distinct byte sequence exactly once.

use crate::model::ImageAsset;
use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, ImageReader};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Mutex;
use tracing::debug;

/// Images narrower or shorter than this are discarded.
pub const MIN_IMAGE_DIMENSION: u32 = 50;

/// Largest image body we download.
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// JPEG quality used when re-encoding.
pub const REENCODE_QUALITY: u8 = 85;

/// Extensions stored in the archive unchanged.
pub const ARCHIVE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif"];

/// Formats that are never stored, whatever the policy.
pub const REJECTED_EXTENSIONS: &[&str] = &["emf", "wmf", "tiff", "tif", "bmp", "ico", "svg"];

/// What to do with a format the archive does not store as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatPolicy {
    /// Drop it (document sources).
    Skip,
    /// Decode and re-encode to JPEG (web sources).
    Reencode,
}

/// Why an image did not make it into the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageRejection {
    Undecodable(String),
    TooSmall { width: u32, height: u32 },
    DisallowedFormat(String),
    TooLarge(usize),
}

impl std::fmt::Display for ImageRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImageRejection::Undecodable(detail) => write!(f, "not a decodable image: {detail}"),
            ImageRejection::TooSmall { width, height } => write!(
                f,
                "{width}x{height} is below the {MIN_IMAGE_DIMENSION}x{MIN_IMAGE_DIMENSION} minimum"
            ),
            ImageRejection::DisallowedFormat(ext) => write!(f, "format {ext} is not allowed"),
            ImageRejection::TooLarge(len) => {
                write!(f, "{len} bytes exceeds the {MAX_IMAGE_BYTES} byte limit")
            }
        }
    }
}

/// Lowercase hex SHA-256 of `data`.
pub fn content_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Validate raw image bytes and turn them into an [`ImageAsset`].
///
/// `declared_ext` is what the source claimed (adapter extension, URL suffix);
/// the sniffed format wins whenever the bytes can be identified. `known_size`
/// lets adapters that already measured the image skip header parsing.
pub fn prepare_image(
    data: Vec<u8>,
    declared_ext: Option<&str>,
    known_size: Option<(u32, u32)>,
    policy: FormatPolicy,
) -> Result<ImageAsset, ImageRejection> {
    if data.len() > MAX_IMAGE_BYTES {
        return Err(ImageRejection::TooLarge(data.len()));
    }

    let sniffed = image::guess_format(&data).ok();
    let ext = match sniffed {
        Some(format) => format_extension(format),
        None => declared_ext
            .map(normalise_ext)
            .unwrap_or_else(|| "jpg".to_string()),
    };

    if REJECTED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(ImageRejection::DisallowedFormat(ext));
    }

    let (width, height) = match known_size {
        Some(size) => size,
        None => dimensions(&data)?,
    };
    if width < MIN_IMAGE_DIMENSION || height < MIN_IMAGE_DIMENSION {
        return Err(ImageRejection::TooSmall { width, height });
    }

    if ARCHIVE_EXTENSIONS.contains(&ext.as_str()) {
        let hash = content_hash(&data);
        return Ok(ImageAsset {
            data,
            ext: if ext == "jpeg" { "jpg".into() } else { ext },
            hash,
        });
    }

    match policy {
        FormatPolicy::Skip if sniffed.is_none() => {
            // unidentified bytes from an adapter are stored under a jpg name
            let hash = content_hash(&data);
            Ok(ImageAsset {
                data,
                ext: "jpg".into(),
                hash,
            })
        }
        FormatPolicy::Skip => Err(ImageRejection::DisallowedFormat(ext)),
        FormatPolicy::Reencode => {
            let jpeg = reencode_jpeg(&data, &ext)?;
            debug!("Re-encoded {} image to JPEG ({} bytes)", ext, jpeg.len());
            let hash = content_hash(&jpeg);
            Ok(ImageAsset {
                data: jpeg,
                ext: "jpg".into(),
                hash,
            })
        }
    }
}

fn dimensions(data: &[u8]) -> Result<(u32, u32), ImageRejection> {
    ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| ImageRejection::Undecodable(e.to_string()))?
        .into_dimensions()
        .map_err(|e| ImageRejection::Undecodable(e.to_string()))
}

fn reencode_jpeg(data: &[u8], ext: &str) -> Result<Vec<u8>, ImageRejection> {
    let img = match ImageFormat::from_extension(ext) {
        Some(format) => image::load_from_memory_with_format(data, format),
        None => image::load_from_memory(data),
    }
    .map_err(|e| ImageRejection::Undecodable(e.to_string()))?;
    let rgb = img.to_rgb8();
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, REENCODE_QUALITY)
        .encode_image(&rgb)
        .map_err(|e| ImageRejection::Undecodable(e.to_string()))?;
    Ok(out)
}

fn format_extension(format: ImageFormat) -> String {
    match format {
        ImageFormat::Jpeg => "jpg".into(),
        ImageFormat::Tiff => "tiff".into(),
        other => other
            .extensions_str()
            .first()
            .map(|e| e.to_string())
            .unwrap_or_else(|| format!("{other:?}").to_lowercase()),
    }
}

fn normalise_ext(ext: &str) -> String {
    match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
        "jpeg" => "jpg".into(),
        "tif" => "tiff".into(),
        other => other.to_string(),
    }
}

/// Extension hinted by a URL path, if any (`.../photo.PNG?x=1` → `png`).
pub fn extension_from_url(url: &url::Url) -> Option<String> {
    let last = url.path_segments()?.next_back()?;
    let (_, ext) = last.rsplit_once('.')?;
    (!ext.is_empty()).then(|| normalise_ext(ext))
}

// ── Deduplicating store ──────────────────────────────────────────────────────

/// Content-addressed image store.
///
/// `insert` is an atomic test-and-insert, so concurrent download workers can
/// share one store without storing a duplicate.
#[derive(Debug, Default)]
pub struct ImageStore {
    assets: Mutex<HashMap<String, ImageAsset>>,
}

impl ImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `asset` unless its hash is already present.
    ///
    /// Returns `true` when the asset was new.
    pub fn insert(&self, asset: ImageAsset) -> bool {
        let mut assets = self.assets.lock().unwrap_or_else(|p| p.into_inner());
        if assets.contains_key(&asset.hash) {
            return false;
        }
        assets.insert(asset.hash.clone(), asset);
        true
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.assets
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .contains_key(hash)
    }

    pub fn len(&self) -> usize {
        self.assets.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Consume the store and return the assets keyed by hash.
    pub fn into_assets(self) -> HashMap<String, ImageAsset> {
        self.assets.into_inner().unwrap_or_else(|p| p.into_inner())
    }
}
