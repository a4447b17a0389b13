//! The normalized content model shared by every source.
//!
//! Adapters (document dumps, the web crawler) reduce their input to a
//! sequence of [`Block`]s plus a list of positioned images. Everything after
//! that point (classification, structuring, image association, archiving)
//! works only on these types and never on source-format specifics.

use serde::{Deserialize, Serialize};

/// What a [`Block`] carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Text,
    Image,
}

/// A positioned fragment of extracted content.
///
/// `position_key` orders blocks within a page: a vertical offset for
/// paginated sources, a running sequence index for flow sources. Blocks on
/// different pages are ordered by `page_index` first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub kind: BlockKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<String>,
    pub font_size: f64,
    #[serde(default)]
    pub is_bold: bool,
    pub position_key: f64,
    #[serde(default)]
    pub page_index: usize,
}

impl Block {
    /// A text block.
    pub fn text(
        text: impl Into<String>,
        font_size: f64,
        is_bold: bool,
        page_index: usize,
        position_key: f64,
    ) -> Self {
        Self {
            kind: BlockKind::Text,
            text: Some(text.into()),
            image_ref: None,
            font_size,
            is_bold,
            position_key,
            page_index,
        }
    }

    /// A placeholder marking where an image sat in the flow.
    pub fn image(image_ref: impl Into<String>, page_index: usize, position_key: f64) -> Self {
        Self {
            kind: BlockKind::Image,
            text: None,
            image_ref: Some(image_ref.into()),
            font_size: 0.0,
            is_bold: false,
            position_key,
            page_index,
        }
    }

    /// The block's text, or `""` for image blocks.
    pub fn text_str(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }

    /// `true` for text blocks whose text is not blank.
    pub fn has_text(&self) -> bool {
        self.kind == BlockKind::Text && !self.text_str().trim().is_empty()
    }
}

/// Anything that sits at a `(page_index, position_key)` coordinate.
///
/// The image associator measures distances between such coordinates.
pub trait Positioned {
    fn page_index(&self) -> usize;
    fn position_key(&self) -> f64;
}

impl<T: Positioned + ?Sized> Positioned for &T {
    fn page_index(&self) -> usize {
        (**self).page_index()
    }
    fn position_key(&self) -> f64 {
        (**self).position_key()
    }
}

/// A bare coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub page_index: usize,
    pub position_key: f64,
}

impl Positioned for Placement {
    fn page_index(&self) -> usize {
        self.page_index
    }
    fn position_key(&self) -> f64 {
        self.position_key
    }
}

/// Raw image bytes handed over by a document adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceImage {
    pub data: Vec<u8>,
    /// File extension as reported by the adapter (`png`, `jpg`, `emf`, ...).
    pub ext: String,
    pub page_index: usize,
    pub position_key: f64,
    /// Pixel size if the adapter already knows it.
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl Positioned for SourceImage {
    fn page_index(&self) -> usize {
        self.page_index
    }
    fn position_key(&self) -> f64 {
        self.position_key
    }
}

/// Everything an adapter extracted from one source unit.
#[derive(Debug, Clone, Default)]
pub struct SourceDocument {
    /// Human name of the source (usually the file stem).
    pub name: Option<String>,
    pub blocks: Vec<Block>,
    pub images: Vec<SourceImage>,
}

/// A leaf content unit inside a [`Category`].
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub name: String,
    pub content: String,
    pub page_index: usize,
    pub position_key: f64,
}

impl Item {
    pub fn new(
        name: impl Into<String>,
        content: impl Into<String>,
        page_index: usize,
        position_key: f64,
    ) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
            page_index,
            position_key,
        }
    }

    /// Absorb another body block, blank-line separated.
    pub fn append(&mut self, text: &str) {
        if !self.content.is_empty() {
            self.content.push_str("\n\n");
        }
        self.content.push_str(text);
    }
}

impl Positioned for Item {
    fn page_index(&self) -> usize {
        self.page_index
    }
    fn position_key(&self) -> f64 {
        self.position_key
    }
}

/// A top-level grouping. Categories never nest.
#[derive(Debug, Clone, PartialEq)]
pub struct Category {
    pub name: String,
    pub items: Vec<Item>,
    pub page_index: usize,
    pub position_key: f64,
}

impl Category {
    pub fn new(name: impl Into<String>, page_index: usize, position_key: f64) -> Self {
        Self {
            name: name.into(),
            items: Vec::new(),
            page_index,
            position_key,
        }
    }
}

/// A validated image ready to be stored, keyed by the SHA-256 of `data`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAsset {
    pub data: Vec<u8>,
    /// Archive file extension (`jpg`, `png`, `webp`, `gif`).
    pub ext: String,
    pub hash: String,
}
