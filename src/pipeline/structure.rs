//! Structure building: walk the classified block sequence and assemble the
//! two-level category → item hierarchy.
//!
//! The walk is a small state machine over [`BuilderState`]:
//!
//! ```text
//!                 top-level heading
//!   NoCategory ─────────────────────▶ InCategory ◀──────────┐
//!       │                              │    │                │ top-level
//!       │ body: orphaned               │    │ sub-heading    │ heading
//!       ▼                              │    ▼                │
//!     (dropped)      body, no items yet│  InItem ────────────┘
//!                    (default item) ───┘    │  ▲
//!                                           └──┘ body: append
//! ```
//!
//! Any heading seen while no category is open opens a category, whatever its
//! size. Categories never nest: a heading that meets the threshold always
//! starts a fresh category, even when one is already open.

use crate::model::{Block, Category, Item};
use crate::pipeline::classify::{heading_threshold, is_heading, is_top_level};
use std::collections::BTreeMap;
use tracing::debug;

/// Name of the category produced when a source has no headings.
pub const FALLBACK_CATEGORY: &str = "default";

/// Name of the fallback item when no project name was configured.
pub const FALLBACK_ITEM: &str = "Content";

/// Where the builder currently is. Indices point into the category list and
/// into that category's item list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BuilderState {
    NoCategory,
    InCategory { category: usize },
    InItem { category: usize, item: usize },
}

/// Result of one structuring pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Structure {
    pub categories: Vec<Category>,
    /// Threshold the pass classified against.
    pub threshold: f64,
    /// Body blocks that appeared before the first heading and were dropped.
    pub orphaned_blocks: usize,
    /// `true` when no heading was found and the fallback category was used.
    pub used_fallback: bool,
}

impl Structure {
    /// Number of items across all categories.
    pub fn item_count(&self) -> usize {
        self.categories.iter().map(|c| c.items.len()).sum()
    }

    /// Default for the archive's `is_grouped` flag.
    pub fn is_grouped(&self) -> bool {
        self.categories.len() > 1
    }

    /// All items in document order.
    pub fn flat_items(&self) -> Vec<&Item> {
        self.categories.iter().flat_map(|c| c.items.iter()).collect()
    }
}

/// Build the category/item hierarchy from a block sequence.
///
/// `fallback_item_name` names the single item of the fallback category
/// (normally the configured project name); `None` uses [`FALLBACK_ITEM`].
pub fn build_structure(blocks: &[Block], fallback_item_name: Option<&str>) -> Structure {
    let threshold = heading_threshold(blocks);
    let mut categories: Vec<Category> = Vec::new();
    let mut state = BuilderState::NoCategory;
    let mut orphaned_blocks = 0;

    for block in blocks.iter().filter(|b| b.has_text()) {
        let text = block.text_str().trim();

        if is_heading(block, threshold) {
            state = match state {
                BuilderState::NoCategory => open_category(&mut categories, block, text),
                _ if is_top_level(block, threshold) => open_category(&mut categories, block, text),
                BuilderState::InCategory { category } | BuilderState::InItem { category, .. } => {
                    let items = &mut categories[category].items;
                    items.push(Item::new(text, "", block.page_index, block.position_key));
                    BuilderState::InItem {
                        category,
                        item: items.len() - 1,
                    }
                }
            };
            continue;
        }

        state = match state {
            BuilderState::InItem { category, item } => {
                categories[category].items[item].append(block.text_str());
                state
            }
            BuilderState::InCategory { category } if categories[category].items.is_empty() => {
                let cat = &mut categories[category];
                cat.items.push(Item::new(
                    cat.name.clone(),
                    block.text_str(),
                    block.page_index,
                    block.position_key,
                ));
                BuilderState::InItem { category, item: 0 }
            }
            BuilderState::InCategory { .. } => state,
            BuilderState::NoCategory => {
                orphaned_blocks += 1;
                state
            }
        };
    }

    let used_fallback = categories.is_empty();
    if used_fallback {
        categories.push(fallback_category(blocks, fallback_item_name));
    }

    debug!(
        "Structured {} blocks into {} categories (threshold {:.1}, {} orphaned)",
        blocks.len(),
        categories.len(),
        threshold,
        orphaned_blocks
    );

    Structure {
        categories,
        threshold,
        orphaned_blocks,
        used_fallback,
    }
}

fn open_category(categories: &mut Vec<Category>, block: &Block, name: &str) -> BuilderState {
    categories.push(Category::new(name, block.page_index, block.position_key));
    BuilderState::InCategory {
        category: categories.len() - 1,
    }
}

fn fallback_category(blocks: &[Block], item_name: Option<&str>) -> Category {
    let content = blocks
        .iter()
        .filter(|b| b.has_text())
        .map(|b| b.text_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    let mut category = Category::new(FALLBACK_CATEGORY, 0, 0.0);
    category
        .items
        .push(Item::new(item_name.unwrap_or(FALLBACK_ITEM), content, 0, 0.0));
    category
}

// ── URL-path grouping (web sources) ─────────────────────────────────────────

/// One crawled page as seen by [`group_by_url_path`].
#[derive(Debug, Clone, Copy)]
pub struct PageOutline<'a> {
    pub url: &'a url::Url,
    pub title: &'a str,
    pub page_index: usize,
    pub blocks: &'a [Block],
}

/// Group crawled pages by the first segment of their URL path.
///
/// Each page becomes one item named after its title whose content is the
/// page's non-heading text. Items sit at position 0 of their page so the
/// image associator gives each page its own first image. With fewer than two
/// groups everything lands in a single [`FALLBACK_CATEGORY`].
pub fn group_by_url_path(pages: &[PageOutline<'_>]) -> Structure {
    let mut groups: BTreeMap<usize, (String, Vec<Item>)> = BTreeMap::new();
    let mut order: Vec<String> = Vec::new();

    for page in pages {
        let name = path_category_name(page.url);
        let slot = match order.iter().position(|n| n == &name) {
            Some(i) => i,
            None => {
                order.push(name.clone());
                order.len() - 1
            }
        };
        groups
            .entry(slot)
            .or_insert_with(|| (name, Vec::new()))
            .1
            .push(page_item(page));
    }

    let categories: Vec<Category> = if groups.len() > 1 {
        groups
            .into_values()
            .map(|(name, items)| Category {
                name,
                items,
                page_index: 0,
                position_key: 0.0,
            })
            .collect()
    } else {
        let mut category = Category::new(FALLBACK_CATEGORY, 0, 0.0);
        category.items = pages.iter().map(page_item).collect();
        vec![category]
    };

    let used_fallback = categories.len() == 1;
    Structure {
        categories,
        threshold: f64::INFINITY,
        orphaned_blocks: 0,
        used_fallback,
    }
}

fn page_item(page: &PageOutline<'_>) -> Item {
    let content = page
        .blocks
        .iter()
        .filter(|b| b.has_text() && !b.is_bold)
        .map(|b| b.text_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    Item::new(page.title, content, page.page_index, 0.0)
}

/// `/guided-tours/day-1` → `"Guided Tours"`; the site root → `"Default"`.
fn path_category_name(url: &url::Url) -> String {
    let segment = url
        .path_segments()
        .and_then(|mut segments| segments.find(|s| !s.is_empty()))
        .unwrap_or(FALLBACK_CATEGORY);
    title_case(&segment.replace(['-', '_'], " "))
}

fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for ch in s.chars() {
        if ch.is_alphabetic() {
            if at_word_start {
                out.extend(ch.to_uppercase());
            } else {
                out.extend(ch.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(ch);
            at_word_start = true;
        }
    }
    out
}
