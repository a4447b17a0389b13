//! Structuring stages shared by every source.
//!
//! Each submodule implements one transformation step and is a pure,
//! synchronous function of its input, so results are deterministic for a
//! given block sequence.
//!
//! ## Data Flow
//!
//! ```text
//! adapter ──▶ clean ──▶ classify ──▶ structure ──▶ associate ──▶ archive
//! (blocks)    (text)    (threshold)  (categories,  (image per
//!                                     items)        item)
//!                                                     ▲
//!                                          images ────┘
//!                                          (validate, hash, dedup)
//! ```
//!
//! 1. [`clean`]     normalizes extracted text before it becomes a block
//! 2. [`classify`]  derives the heading threshold and labels headings
//! 3. [`structure`] builds the two-level category/item hierarchy
//! 4. [`images`]    validates, normalizes and deduplicates image bytes
//! 5. [`associate`] attaches each surviving image to its nearest item

pub mod associate;
pub mod classify;
pub mod clean;
pub mod images;
pub mod structure;
