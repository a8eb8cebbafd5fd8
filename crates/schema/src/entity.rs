//! Compiled entity definitions
//!
//! An `Entity` is the flat, fully-resolved description of one concrete type:
//! its identity field, its typed relations and the storage-facing flags that
//! the engine carries along without interpreting.

use normdb_core::{NdbError, NdbResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Entity
// ============================================================================

/// A resolved schema type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    /// Name of the field holding the identity value
    pub key: String,

    /// Relations keyed by property name
    pub targets: BTreeMap<String, Target>,

    /// Whether identities are generated rather than caller-supplied
    pub auto_key: bool,

    /// Mutation logging settings for the storage layer
    pub logging: StoreLogConfig,
}

impl Entity {
    /// Create an entity identified by `key` with no targets
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            targets: BTreeMap::new(),
            auto_key: false,
            logging: StoreLogConfig::default(),
        }
    }

    /// Add a target using builder pattern
    pub fn with_target(mut self, property: impl Into<String>, target: Target) -> Self {
        self.targets.insert(property.into(), target);
        self
    }

    /// Get the target declared on `property`
    pub fn target(&self, property: &str) -> Option<&Target> {
        self.targets.get(property)
    }

    /// Get the target declared on `property`, failing if there is none
    pub fn require_target(&self, entity_type: &str, property: &str) -> NdbResult<&Target> {
        self.targets
            .get(property)
            .ok_or_else(|| NdbError::UnknownTarget {
                entity_type: entity_type.to_string(),
                property: property.to_string(),
            })
    }

    /// Check if any target refers to `entity_type`
    pub fn references(&self, entity_type: &str) -> bool {
        self.targets.values().any(|t| t.entity_type == entity_type)
    }
}

// ============================================================================
// Target
// ============================================================================

/// A relation from a property to another type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    /// Referenced type
    #[serde(rename = "type")]
    pub entity_type: String,

    /// Whether the property holds a sequence of entities
    pub is_array: bool,

    /// Whether the storage layer removes referenced entities with the parent
    pub cascade_removal: bool,
}

impl Target {
    /// A single-valued relation to `entity_type`
    pub fn one(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            is_array: false,
            cascade_removal: false,
        }
    }

    /// A sequence-valued relation to `entity_type`
    pub fn many(entity_type: impl Into<String>) -> Self {
        Self {
            is_array: true,
            ..Self::one(entity_type)
        }
    }

    /// Enable cascade removal
    pub fn cascading(mut self) -> Self {
        self.cascade_removal = true;
        self
    }

    /// Shape name used in error messages
    pub fn shape(&self) -> &'static str {
        if self.is_array { "array" } else { "object" }
    }
}

// ============================================================================
// Logging configuration
// ============================================================================

/// How much of a mutation the storage layer records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogMode {
    /// No logging
    #[default]
    Disabled,
    /// Log entries without the item payload
    Simple,
    /// Log entries including the item payload
    Full,
}

/// Mutation kinds that can be logged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Created,
    Updated,
    Removed,
    Cleared,
}

/// One or several event types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventSelection {
    One(EventType),
    Many(Vec<EventType>),
}

/// Logging settings passed through to the storage layer unexamined
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct StoreLogConfig {
    pub mode: LogMode,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_selection: Option<EventSelection>,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entity_builder() {
        let entity = Entity::new("id")
            .with_target("author", Target::one("user"))
            .with_target("comments", Target::many("comment").cascading());

        assert_eq!(entity.key, "id");
        assert!(entity.references("user"));
        assert!(!entity.references("role"));
        assert!(entity.target("comments").unwrap().cascade_removal);
        assert!(entity.target("title").is_none());
    }

    #[test]
    fn test_require_target() {
        let entity = Entity::new("id").with_target("author", Target::one("user"));
        assert!(entity.require_target("post", "author").is_ok());
        let err = entity.require_target("post", "editor").unwrap_err();
        assert_eq!(err.to_string(), "Missing target for post.editor");
    }

    #[test]
    fn test_target_shape() {
        assert_eq!(Target::one("user").shape(), "object");
        assert_eq!(Target::many("comment").shape(), "array");
    }

    #[test]
    fn test_log_config_serde() {
        let config: StoreLogConfig = serde_json::from_value(json!({
            "mode": "full",
            "eventSelection": ["created", "removed"]
        }))
        .unwrap();
        assert_eq!(config.mode, LogMode::Full);
        assert_eq!(
            config.event_selection,
            Some(EventSelection::Many(vec![EventType::Created, EventType::Removed]))
        );

        assert_eq!(StoreLogConfig::default().mode, LogMode::Disabled);
    }
}
