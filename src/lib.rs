//! # normdb
//!
//! Schema-driven normalization and denormalization of nested entity graphs.
//!
//! `NormalizedDb` owns a compiled schema together with default options and
//! exposes every engine operation against it:
//!
//! ```rust,ignore
//! use normdb::prelude::*;
//!
//! let db = NormalizedDb::from_config_file("normdb.toml")?;
//! let data = db.normalize("post", &post)?;
//! let post = db.denormalizer(&data).from_key("post", &Key::Int(1))?;
//! ```
//!
//! The commonly used types of the underlying crates are re-exported here.

pub use normdb_core::{
    Depth, Key, KeyGenerator, Loader, NdbError, NdbResult, REFS_FIELD, Record, Ref,
    UuidKeyGenerator,
};
pub use normdb_engine::{
    DenormalizeOptions, Denormalizer, EntityKeys, KeySelection, NormalizeOptions, NormalizedData,
    Tree, TreeNode, merge_trees,
};
pub use normdb_schema::{Entity, EntitySpec, Schema, SchemaConfig, Target, TargetSpec};

use normdb_schema::serialization::{ConfigFormat, load_config, parse_config};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

// ============================================================================
// Configuration
// ============================================================================

/// Normalize defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NormalizeDefaults {
    pub reverse_refs: bool,
}

/// Defaults applied when a call does not pass its own options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DbOptions {
    pub normalize: NormalizeDefaults,
    pub denormalize: DenormalizeOptions,
}

/// A schema plus defaults, as read from one configuration file
///
/// ```toml
/// [schema."@defaults"]
/// key = "id"
///
/// [schema.post]
/// targets = { author = "user" }
///
/// [schema.user]
///
/// [options.normalize]
/// reverseRefs = true
///
/// [options.denormalize]
/// depth = 1
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DbConfig {
    pub schema: SchemaConfig,

    #[serde(default)]
    pub options: DbOptions,
}

impl DbConfig {
    pub fn from_json(json: &str) -> NdbResult<Self> {
        parse_config(json, ConfigFormat::Json)
    }

    pub fn from_toml(toml: &str) -> NdbResult<Self> {
        parse_config(toml, ConfigFormat::Toml)
    }
}

// ============================================================================
// NormalizedDb
// ============================================================================

/// A compiled schema with default options
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedDb {
    schema: Schema,
    options: DbOptions,
}

impl NormalizedDb {
    /// Compile `config` with default options
    pub fn configure(config: &SchemaConfig) -> NdbResult<Self> {
        Ok(Self {
            schema: Schema::compile(config)?,
            options: DbOptions::default(),
        })
    }

    /// Compile the schema of a combined configuration and keep its options
    pub fn from_config(config: &DbConfig) -> NdbResult<Self> {
        Ok(Self::configure(&config.schema)?.with_options(config.options.clone()))
    }

    /// Load a combined JSON or TOML configuration file
    pub fn from_config_file(path: impl AsRef<Path>) -> NdbResult<Self> {
        let config: DbConfig = load_config(path.as_ref())?;
        let db = Self::from_config(&config)?;
        tracing::info!(
            "Configured normdb with {} types from {}",
            db.schema.len(),
            path.as_ref().display()
        );
        Ok(db)
    }

    pub fn with_options(mut self, options: DbOptions) -> Self {
        self.options = options;
        self
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn options(&self) -> &DbOptions {
        &self.options
    }

    /// Normalize with the default options and no key generator
    pub fn normalize(&self, entity_type: &str, value: &Value) -> NdbResult<NormalizedData> {
        let options = NormalizeOptions::new().reverse_refs(self.options.normalize.reverse_refs);
        self.normalize_with(entity_type, value, &options)
    }

    /// Normalize with per-call options
    pub fn normalize_with(
        &self,
        entity_type: &str,
        value: &Value,
        options: &NormalizeOptions<'_>,
    ) -> NdbResult<NormalizedData> {
        normdb_engine::normalize(&self.schema, entity_type, value, options)
    }

    /// A denormalizer over `data` using the default options
    pub fn denormalizer<'a>(&'a self, data: &'a NormalizedData) -> Denormalizer<'a> {
        Denormalizer::new(&self.schema, data).with_options(self.options.denormalize.clone())
    }

    pub fn find_entity_keys(
        &self,
        tree: &Tree,
        entity_type: &str,
        selection: &KeySelection,
    ) -> NdbResult<EntityKeys> {
        normdb_engine::find_entity_keys(&self.schema, tree, entity_type, selection)
    }

    /// Load what `selection` needs through `loader`
    pub async fn preload<L>(
        &self,
        tree: &Tree,
        entity_type: &str,
        loader: &L,
        selection: &KeySelection,
    ) -> NdbResult<NormalizedData>
    where
        L: Loader + ?Sized,
    {
        normdb_engine::preload(&self.schema, tree, entity_type, loader, selection).await
    }
}

// ============================================================================
// Prelude Module
// ============================================================================

/// Convenient re-exports for common usage
pub mod prelude {
    pub use crate::{
        DbConfig, DbOptions, Depth, DenormalizeOptions, Key, KeySelection, Loader, NdbError,
        NdbResult, NormalizeOptions, NormalizedData, NormalizedDb, SchemaConfig, Tree,
    };
}

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// Tests
// ============================================================================
