//! Image association: attach each extracted image to the nearest item.
//!
//! Distance between an image and an item is the gap between their position
//! keys when both sit on the same page. Across pages the page gap is weighted
//! by [`PAGE_DISTANCE_WEIGHT`] so that page proximity always dominates any
//! intra-page offset.
//!
//! Association is greedy in image order. Each image picks its closest item;
//! an item keeps the first image that picks it, and later images choosing the
//! same item are dropped rather than re-routed.

use crate::model::Positioned;
use std::collections::BTreeMap;

/// Weight of one page of separation, in position-key units.
pub const PAGE_DISTANCE_WEIGHT: f64 = 10_000.0;

/// Distance between two positioned things.
pub fn distance(a: &impl Positioned, b: &impl Positioned) -> f64 {
    let dy = (a.position_key() - b.position_key()).abs();
    if a.page_index() == b.page_index() {
        dy
    } else {
        a.page_index().abs_diff(b.page_index()) as f64 * PAGE_DISTANCE_WEIGHT + dy
    }
}

/// Outcome of associating a set of images with a set of items.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Association {
    /// item index → image index, both into the slices passed to [`associate`].
    pub assignments: BTreeMap<usize, usize>,
    /// Images whose nearest item already had an image.
    pub dropped: Vec<usize>,
    /// Images that had no item at all to go to.
    pub unassigned: Vec<usize>,
}

impl Association {
    /// Image index assigned to `item`, if any.
    pub fn image_for(&self, item: usize) -> Option<usize> {
        self.assignments.get(&item).copied()
    }
}

/// Assign images to items.
///
/// `items` must be in document order: on equal distances the earliest item
/// wins, and for each item the earliest image (in `images` order) wins.
pub fn associate<I, M>(items: &[I], images: &[M]) -> Association
where
    I: Positioned,
    M: Positioned,
{
    let mut result = Association::default();

    for (image_idx, image) in images.iter().enumerate() {
        let Some(best) = nearest(items, image) else {
            result.unassigned.push(image_idx);
            continue;
        };
        if result.assignments.contains_key(&best) {
            result.dropped.push(image_idx);
        } else {
            result.assignments.insert(best, image_idx);
        }
    }

    result
}

fn nearest<I: Positioned>(items: &[I], image: &impl Positioned) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (idx, item) in items.iter().enumerate() {
        let d = distance(item, image);
        match best {
            Some((_, best_d)) if d >= best_d => {}
            _ => best = Some((idx, d)),
        }
    }
    best.map(|(idx, _)| idx)
}
