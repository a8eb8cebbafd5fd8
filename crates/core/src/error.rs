//! Error types for normdb
//!
//! This module provides unified error handling across schema compilation,
//! normalization, denormalization and preloading. Every failure aborts the
//! call that raised it; no partial results are returned.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for normdb
#[derive(Debug, Error)]
pub enum NdbError {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// A type names a parent/template that is not in the configuration
    #[error("Entity '{entity}' extends unknown parent '{parent}' (known: [{known}])")]
    UnknownParent {
        entity: String,
        parent: String,
        known: String,
    },

    /// A parent chain loops back on itself
    #[error("Entity '{entity}' has a cyclic parent chain: {chain}")]
    CyclicParent { entity: String, chain: String },

    /// A resolved type ended up without an identity field
    #[error("Entity '{entity}' is missing a key path")]
    MissingKeyPath { entity: String },

    /// A target was declared without a type
    #[error("Target '{entity}.{property}' is missing its type")]
    MissingTargetType { entity: String, property: String },

    /// A target points at a type that is not a concrete type in the schema
    #[error("Target '{entity}.{property}' refers to undefined type '{target}'")]
    UnknownTargetType {
        entity: String,
        property: String,
        target: String,
    },

    /// A target was declared on the identity field itself
    #[error("Target '{entity}.{property}' shadows the key path of '{entity}'")]
    TargetShadowsKey { entity: String, property: String },

    /// Any other invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ========================================================================
    // Input Errors
    // ========================================================================
    /// An item has no identity and none could be generated
    #[error("Key {entity_type}.{key_field} is missing")]
    MissingKey {
        entity_type: String,
        key_field: String,
    },

    /// An identity field holds something that is not a string or integer
    #[error("Key {entity_type}.{key_field} has invalid value {value}")]
    InvalidKey {
        entity_type: String,
        key_field: String,
        value: String,
    },

    /// Array/object confusion on a target property
    #[error("{path} expected {expected} but was {actual}")]
    ShapeMismatch {
        path: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// A type name that the schema does not define
    #[error("Missing schema for type '{0}'")]
    UnknownType(String),

    /// A reference graph property with no matching schema target
    #[error("Missing target for {entity_type}.{property}")]
    UnknownTarget {
        entity_type: String,
        property: String,
    },

    // ========================================================================
    // Lookup Errors
    // ========================================================================
    /// Identity not present in the supplied normalized data
    #[error("Could not find entity {entity_type} with key {key} in normalized data")]
    NotFound { entity_type: String, key: String },

    /// Unbounded hydration re-entered an entity already on the current path
    #[error("Cyclic reference detected during unbounded denormalization: {path}")]
    CycleDetected { path: String },

    // ========================================================================
    // Collaborator Errors
    // ========================================================================
    /// The external loader failed to deliver rows
    #[error("Failed to load entities of type '{entity_type}': {source}")]
    Load {
        entity_type: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    // ========================================================================
    // Serialization Errors
    // ========================================================================
    /// JSON (de)serialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML deserialization error
    #[error("TOML deserialization error: {0}")]
    Toml(#[from] toml::de::Error),

    /// File read error
    #[error("Failed to read file '{path}': {message}")]
    FileRead { path: PathBuf, message: String },
}

impl NdbError {
    /// Create an invalid configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        NdbError::InvalidConfig(msg.into())
    }

    /// Create a shape mismatch error for the value found at `path`
    pub fn shape(path: impl Into<String>, expected: &'static str, actual: &serde_json::Value) -> Self {
        NdbError::ShapeMismatch {
            path: path.into(),
            expected,
            actual: crate::types::value_kind(actual),
        }
    }

    /// Create a not-found error
    pub fn not_found(entity_type: impl Into<String>, key: impl std::fmt::Display) -> Self {
        NdbError::NotFound {
            entity_type: entity_type.into(),
            key: key.to_string(),
        }
    }

    /// Check if this error stems from a malformed schema configuration
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            NdbError::UnknownParent { .. }
                | NdbError::CyclicParent { .. }
                | NdbError::MissingKeyPath { .. }
                | NdbError::MissingTargetType { .. }
                | NdbError::UnknownTargetType { .. }
                | NdbError::TargetShadowsKey { .. }
                | NdbError::InvalidConfig(_)
        )
    }

    /// Check if this error was caused by the data handed to normalize
    pub fn is_input(&self) -> bool {
        matches!(
            self,
            NdbError::MissingKey { .. }
                | NdbError::InvalidKey { .. }
                | NdbError::ShapeMismatch { .. }
        )
    }

    /// Check if this error is a not-found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, NdbError::NotFound { .. } | NdbError::UnknownType(_))
    }
}

/// Result type alias using NdbError
pub type NdbResult<T> = Result<T, NdbError>;

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_errors() {
        let err = NdbError::MissingKeyPath {
            entity: "user".to_string(),
        };
        assert!(err.is_config());
        assert!(!err.is_input());
        assert_eq!(err.to_string(), "Entity 'user' is missing a key path");

        let err = NdbError::config("empty schema");
        assert!(err.is_config());
        assert_eq!(err.to_string(), "Invalid configuration: empty schema");
    }

    #[test]
    fn test_missing_key_error() {
        let err = NdbError::MissingKey {
            entity_type: "user".to_string(),
            key_field: "userName".to_string(),
        };
        assert!(err.is_input());
        assert_eq!(err.to_string(), "Key user.userName is missing");
    }

    #[test]
    fn test_shape_mismatch_error() {
        let err = NdbError::shape("post[1].comments", "array", &serde_json::json!({ "id": 1 }));
        assert!(err.is_input());
        assert_eq!(
            err.to_string(),
            "post[1].comments expected array but was object"
        );
    }

    #[test]
    fn test_not_found_error() {
        let err = NdbError::not_found("comment", 7);
        assert!(err.is_not_found());
        assert!(!err.is_config());
        assert_eq!(
            err.to_string(),
            "Could not find entity comment with key 7 in normalized data"
        );
    }

    #[test]
    fn test_load_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "store went away");
        let err = NdbError::Load {
            entity_type: "user".to_string(),
            source: Box::new(io),
        };
        assert!(std::error::Error::source(&err).is_some());
        assert_eq!(
            err.to_string(),
            "Failed to load entities of type 'user': store went away"
        );
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: NdbError = json_err.into();
        assert!(matches!(err, NdbError::Json(_)));
    }
}
