//! Declarative schema configuration
//!
//! The configuration maps type names to entity configs. Names starting with
//! `@` are abstract templates that other entries may extend; `@defaults` is
//! the implicit parent of every other entry. An entry is either the name of
//! its parent or an object overriding the inherited settings.
//!
//! ```json
//! {
//!   "@defaults": { "key": "id" },
//!   "@authored": { "targets": { "author": "user" } },
//!   "role": "@defaults",
//!   "user": { "key": "userName", "targets": { "role": "role" } },
//!   "post": {
//!     "parent": "@authored",
//!     "targets": { "comments": { "type": "comment", "isArray": true } }
//!   },
//!   "comment": "@authored"
//! }
//! ```

use crate::entity::StoreLogConfig;
use crate::serialization::{ConfigFormat, load_config, parse_config};
use normdb_core::NdbResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Name of the implicit root template
pub const DEFAULTS_TEMPLATE: &str = "@defaults";

/// Prefix marking abstract templates
pub const ABSTRACT_PREFIX: char = '@';

/// Check if a configuration entry is an abstract template
pub fn is_abstract(name: &str) -> bool {
    name.starts_with(ABSTRACT_PREFIX)
}

// ============================================================================
// SchemaConfig
// ============================================================================

/// Unresolved schema configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaConfig {
    pub types: BTreeMap<String, EntityConfig>,
}

impl SchemaConfig {
    /// Create an empty configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration from JSON
    pub fn from_json(json: &str) -> NdbResult<Self> {
        parse_config(json, ConfigFormat::Json)
    }

    /// Parse a configuration from TOML
    pub fn from_toml(toml: &str) -> NdbResult<Self> {
        parse_config(toml, ConfigFormat::Toml)
    }

    /// Load a configuration file, picking the format from its extension
    pub fn load(path: impl AsRef<Path>) -> NdbResult<Self> {
        load_config(path.as_ref())
    }

    /// Add an entry using builder pattern
    pub fn with(mut self, name: impl Into<String>, entry: impl Into<EntityConfig>) -> Self {
        self.types.insert(name.into(), entry.into());
        self
    }

    /// Get an entry by name
    pub fn get(&self, name: &str) -> Option<&EntityConfig> {
        self.types.get(name)
    }

    /// Names of the concrete (non-template) entries
    pub fn concrete_types(&self) -> impl Iterator<Item = &str> {
        self.types
            .keys()
            .map(String::as_str)
            .filter(|name| !is_abstract(name))
    }

    /// All entry names, sorted, for error messages
    pub fn known_names(&self) -> String {
        self.types.keys().cloned().collect::<Vec<_>>().join(", ")
    }
}

// ============================================================================
// EntityConfig
// ============================================================================

/// One configuration entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityConfig {
    /// Shorthand for an entry that only names its parent
    Parent(String),
    /// Full entry
    Spec(EntitySpec),
}

impl EntityConfig {
    /// Explicitly named parent, if any
    pub fn parent(&self) -> Option<&str> {
        match self {
            EntityConfig::Parent(parent) => Some(parent),
            EntityConfig::Spec(spec) => spec.parent.as_deref(),
        }
    }

    /// Overrides declared by this entry, if it is a full entry
    pub fn spec(&self) -> Option<&EntitySpec> {
        match self {
            EntityConfig::Parent(_) => None,
            EntityConfig::Spec(spec) => Some(spec),
        }
    }
}

impl From<EntitySpec> for EntityConfig {
    fn from(spec: EntitySpec) -> Self {
        EntityConfig::Spec(spec)
    }
}

impl From<&str> for EntityConfig {
    fn from(parent: &str) -> Self {
        EntityConfig::Parent(parent.to_string())
    }
}

/// Settings an entry overrides on top of its parent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitySpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,

    /// Targets by property; a `null` entry is a configuration error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub targets: Option<BTreeMap<String, Option<TargetConfig>>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_store: Option<DataStoreConfig>,
}

impl EntitySpec {
    /// Create an empty spec
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the identity field
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Set the parent template
    pub fn parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Add a target
    pub fn target(mut self, property: impl Into<String>, target: impl Into<TargetConfig>) -> Self {
        self.targets
            .get_or_insert_with(BTreeMap::new)
            .insert(property.into(), Some(target.into()));
        self
    }

    /// Enable or disable generated identities
    pub fn auto_key(mut self, auto_key: bool) -> Self {
        self.data_store.get_or_insert_with(DataStoreConfig::default).auto_key = Some(auto_key);
        self
    }

    /// Set the logging configuration
    pub fn logging(mut self, logging: StoreLogConfig) -> Self {
        self.data_store.get_or_insert_with(DataStoreConfig::default).logging = Some(logging);
        self
    }
}

/// Storage-facing settings of an entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataStoreConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_key: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<StoreLogConfig>,
}

// ============================================================================
// TargetConfig
// ============================================================================

/// Configuration of one target property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TargetConfig {
    /// Shorthand for a single-valued relation
    Type(String),
    /// Full target definition
    Spec(TargetSpec),
}

impl From<&str> for TargetConfig {
    fn from(entity_type: &str) -> Self {
        TargetConfig::Type(entity_type.to_string())
    }
}

impl From<TargetSpec> for TargetConfig {
    fn from(spec: TargetSpec) -> Self {
        TargetConfig::Spec(spec)
    }
}

/// Full target definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetSpec {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_array: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_store: Option<TargetDataStoreConfig>,
}

impl TargetSpec {
    /// A sequence-valued relation to `entity_type`
    pub fn many(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: Some(entity_type.into()),
            is_array: Some(true),
            data_store: None,
        }
    }

    /// Enable cascade removal
    pub fn cascading(mut self) -> Self {
        self.data_store = Some(TargetDataStoreConfig {
            cascade_removal: Some(true),
        });
        self
    }
}

/// Storage-facing settings of a target
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetDataStoreConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cascade_removal: Option<bool>,
}

// ============================================================================
// Tests
// ============================================================================
