//! Image download phase of a harvest.
//!
//! Every distinct image URL across the crawled pages is downloaded once on a
//! bounded pool (`image_concurrency`), validated and normalized through
//! [`prepare_image`], and stored in an [`ImageStore`] keyed by content hash.
//! `buffered` keeps results in reference order, so the per-page hash lists
//! line up with each page's image references.

use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info};
use url::Url;

use super::crawler::{CrawledPage, Crawler};
use super::urls::origin;
use crate::error::Diagnostic;
use crate::model::ImageAsset;
use crate::pipeline::images::{extension_from_url, prepare_image, FormatPolicy, ImageStore};

/// Hashes resolved for each page's image references.
#[derive(Debug, Default)]
pub struct FetchedImages {
    pub store: ImageStore,
    /// `hashes[page][image]` is the stored hash for that reference, or `None`
    /// when the image failed.
    pub hashes: Vec<Vec<Option<String>>>,
    pub diagnostics: Vec<Diagnostic>,
    pub found: usize,
    pub failed: usize,
}

impl Crawler {
    /// Download, validate and deduplicate every image referenced by `pages`.
    pub async fn fetch_images(&self, pages: &[CrawledPage]) -> FetchedImages {
        let mut distinct: Vec<Url> = Vec::new();
        let mut index_of: HashMap<String, usize> = HashMap::new();
        for image in pages.iter().flat_map(|p| &p.images) {
            index_of.entry(image.url.to_string()).or_insert_with(|| {
                distinct.push(image.url.clone());
                distinct.len() - 1
            });
        }

        let found = pages.iter().map(|p| p.images.len()).sum();
        let total = distinct.len();
        info!("Downloading {} images ({} references)", total, found);
        self.progress().on_images_start(total);

        let store = ImageStore::new();
        let done = AtomicUsize::new(0);
        let concurrency = self.config().image_concurrency.max(1);

        let results: Vec<Result<String, Diagnostic>> = stream::iter(distinct.iter())
            .map(|url| {
                let store = &store;
                let done = &done;
                async move {
                    let result = self.fetch_one(url).await.map(|asset| {
                        let hash = asset.hash.clone();
                        if store.insert(asset) {
                            debug!("Stored image {} ({})", url, &hash[..12]);
                        } else {
                            debug!("Duplicate image {} ({})", url, &hash[..12]);
                        }
                        hash
                    });
                    let n = done.fetch_add(1, Ordering::SeqCst) + 1;
                    self.progress().on_image_done(n, total, result.is_ok());
                    result
                }
            })
            .buffered(concurrency)
            .collect()
            .await;

        let mut diagnostics = Vec::new();
        let mut by_url: Vec<Option<String>> = Vec::with_capacity(total);
        for result in results {
            match result {
                Ok(hash) => by_url.push(Some(hash)),
                Err(d) => {
                    diagnostics.push(d);
                    by_url.push(None);
                }
            }
        }

        let hashes = pages
            .iter()
            .map(|p| {
                p.images
                    .iter()
                    .map(|img| {
                        index_of
                            .get(img.url.as_str())
                            .and_then(|&i| by_url.get(i).cloned().flatten())
                    })
                    .collect()
            })
            .collect();

        info!(
            "Downloaded {} unique images, {} failed",
            store.len(),
            diagnostics.len()
        );
        FetchedImages {
            store,
            hashes,
            failed: diagnostics.len(),
            diagnostics,
            found,
        }
    }

    async fn fetch_one(&self, url: &Url) -> Result<ImageAsset, Diagnostic> {
        self.limiter().acquire(&origin(url)).await;
        let response = self
            .client()
            .get(url.as_str(), Some(self.config().max_image_bytes))
            .await
            .map_err(|e| Diagnostic::ImageFetchFailed {
                url: url.to_string(),
                detail: e.to_string(),
            })?;
        if !response.is_success() {
            return Err(Diagnostic::ImageFetchFailed {
                url: url.to_string(),
                detail: format!("HTTP {}", response.status),
            });
        }
        let ext = extension_from_url(url);
        prepare_image(response.body, ext.as_deref(), None, FormatPolicy::Reencode).map_err(|e| {
            Diagnostic::ImageRejected {
                source_ref: url.to_string(),
                reason: e.to_string(),
            }
        })
    }
}
