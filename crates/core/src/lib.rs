//! # normdb Core
//!
//! Core types, traits, and error handling for normdb.
//!
//! This crate provides the foundational building blocks used by the schema
//! compiler and the normalization engine, including:
//!
//! - **Types**: identities (`Key`), foreign-key values (`Ref`) and depth policies
//! - **Traits**: the `KeyGenerator` and `Loader` capabilities supplied by callers
//! - **Merge**: record merge and dedup primitives
//! - **Errors**: unified error handling with `NdbError` and `NdbResult`
//!

pub mod error;
pub mod merge;
pub mod traits;
pub mod types;

// Re-export commonly used items at crate root
pub use error::{NdbError, NdbResult};
pub use traits::{KeyGenerator, Loader, UuidKeyGenerator};
pub use types::{Depth, DepthCursor, Key, REFS_FIELD, Record, Ref, value_kind};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
