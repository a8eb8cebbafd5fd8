//! # normdb Engine
//!
//! Schema-driven transforms between nested entity graphs and normalized
//! tables.
//!
//! - **normalize**: flatten a nested value into per-type tables plus a reference tree
//! - **denormalize**: rebuild nested values from tables, bounded by a depth policy
//! - **graph**: key closures and tree merging on the reference tree alone
//! - **preload**: fetch only the rows a bounded denormalize will read
//!
//! All operations are synchronous except `preload`, whose only suspension
//! points are the caller-supplied `Loader` calls.

pub mod data;
pub mod denormalize;
pub mod graph;
pub mod normalize;
pub mod preload;

#[cfg(test)]
mod fixtures;

pub use data::{NormalizedData, Tree, TreeNode};
pub use denormalize::{DenormalizeOptions, Denormalizer};
pub use graph::{EntityKeys, KeySelection, find_entity_keys, merge_trees};
pub use normalize::{NormalizeOptions, normalize};
pub use preload::preload;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
