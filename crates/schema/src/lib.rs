//! # normdb Schema
//!
//! This crate turns a declarative, inheritance-based configuration into a
//! compiled `Schema`: one flat `Entity` per concrete type, each naming its
//! identity field and its typed relations to other types.
//!
//! ## Core Concepts
//!
//! - **SchemaConfig**: the unresolved configuration, with `@` templates and parents
//! - **Entity**: a resolved type (identity field, targets, storage flags)
//! - **Target**: a relation from a property to another type, single or array
//! - **Validator**: rules run over the compiled schema before it is handed out
//!

pub mod compiler;
pub mod config;
pub mod entity;
pub mod serialization;
pub mod validation;

pub use compiler::compile;
pub use config::{
    DEFAULTS_TEMPLATE, DataStoreConfig, EntityConfig, EntitySpec, SchemaConfig, TargetConfig,
    TargetSpec, is_abstract,
};
pub use entity::{Entity, EventSelection, EventType, LogMode, StoreLogConfig, Target};
pub use serialization::{ConfigFormat, load_config, parse_config};
pub use validation::{ValidationResult, ValidationRule, ValidationWarning, Validator};

pub use normdb_core::{NdbError, NdbResult};

use serde::Serialize;
use std::collections::BTreeMap;

// ============================================================================
// Schema
// ============================================================================

/// A compiled schema: resolved entities by type name
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Schema {
    entities: BTreeMap<String, Entity>,
}

impl Schema {
    /// Wrap already-resolved entities.
    ///
    /// Use `compile` to build a schema from configuration; this constructor
    /// performs no validation.
    pub fn new(entities: BTreeMap<String, Entity>) -> Self {
        Self { entities }
    }

    /// Compile a configuration
    pub fn compile(config: &SchemaConfig) -> NdbResult<Self> {
        compile(config)
    }

    /// Get the entity for `entity_type`, failing if it is undefined
    pub fn entity(&self, entity_type: &str) -> NdbResult<&Entity> {
        self.entities
            .get(entity_type)
            .ok_or_else(|| NdbError::UnknownType(entity_type.to_string()))
    }

    /// Get the entity for `entity_type`
    pub fn get(&self, entity_type: &str) -> Option<&Entity> {
        self.entities.get(entity_type)
    }

    pub fn contains(&self, entity_type: &str) -> bool {
        self.entities.contains_key(entity_type)
    }

    /// Type names in sorted order
    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Entity)> {
        self.entities.iter().map(|(name, entity)| (name.as_str(), entity))
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// Prelude Module
// ============================================================================

/// Convenient re-exports for common usage
pub mod prelude {
    pub use crate::{
        Entity, EntitySpec, NdbError, NdbResult, Schema, SchemaConfig, Target, TargetSpec,
        compile,
    };
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_type_lookup() {
        let schema = Schema::new(BTreeMap::from([("user".to_string(), Entity::new("id"))]));
        assert!(schema.contains("user"));
        assert_eq!(schema.entity("user").unwrap().key, "id");

        let err = schema.entity("ghost").unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Missing schema for type 'ghost'");
    }

    #[test]
    fn test_schema_serializes_flat() {
        let schema = Schema::new(BTreeMap::from([(
            "post".to_string(),
            Entity::new("id").with_target("author", Target::one("user")),
        )]));
        let value = serde_json::to_value(&schema).unwrap();
        assert_eq!(value["post"]["key"], "id");
        assert_eq!(value["post"]["targets"]["author"]["type"], "user");
        assert_eq!(value["post"]["targets"]["author"]["isArray"], false);
    }
}
