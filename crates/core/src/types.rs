//! Core types used throughout normdb
//!
//! This module contains the identity, reference and depth-policy types shared
//! by the schema compiler and the engine.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// An entity payload: a JSON object whose related-entity properties hold
/// identity values once normalized
pub type Record = serde_json::Map<String, Value>;

/// Field carrying backward references on flattened records
pub const REFS_FIELD: &str = "_refs";

// ============================================================================
// Key
// ============================================================================

/// Identity value of an entity, unique within its type
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Key {
    Int(i64),
    Str(String),
}

impl Key {
    /// Read an identity from a JSON value.
    ///
    /// Only strings and integral numbers are identities.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Key::Str(s.clone())),
            Value::Number(n) => n.as_i64().map(Key::Int),
            _ => None,
        }
    }

    /// Convert back into a JSON value
    pub fn to_value(&self) -> Value {
        match self {
            Key::Int(i) => Value::from(*i),
            Key::Str(s) => Value::String(s.clone()),
        }
    }

    /// Check whether a JSON value holds exactly this identity
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (Key::Int(i), Value::Number(n)) => n.as_i64() == Some(*i),
            (Key::Str(s), Value::String(other)) => s == other,
            _ => false,
        }
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Key::Int(i) => write!(f, "{}", i),
            Key::Str(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Key::Int(value)
    }
}

impl From<i32> for Key {
    fn from(value: i32) -> Self {
        Key::Int(i64::from(value))
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Key::Str(value)
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::Str(value.to_string())
    }
}

// ============================================================================
// Ref
// ============================================================================

/// Foreign-key value stored for a target property
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Ref {
    One(Key),
    Many(Vec<Key>),
}

impl Ref {
    /// Identities this reference points at
    pub fn keys(&self) -> &[Key] {
        match self {
            Ref::One(key) => std::slice::from_ref(key),
            Ref::Many(keys) => keys,
        }
    }

    /// Convert into the JSON value written into a flattened record
    pub fn to_value(&self) -> Value {
        match self {
            Ref::One(key) => key.to_value(),
            Ref::Many(keys) => Value::Array(keys.iter().map(Key::to_value).collect()),
        }
    }

    /// Combine with a later reference for the same property.
    ///
    /// Two sequences are unioned in first-seen order; anything else takes
    /// the later value.
    pub fn merge(&mut self, incoming: Ref) {
        match (self, incoming) {
            (Ref::Many(existing), Ref::Many(keys)) => {
                crate::merge::union_distinct(existing, keys);
            }
            (current, incoming) => *current = incoming,
        }
    }
}

// ============================================================================
// Depth
// ============================================================================

/// How much of the graph below an entity gets materialized.
///
/// `Level(n)` applies uniformly and shrinks by one per level; `Props` gives
/// each target property its own nested policy, and properties it does not
/// name are left as raw identities. An absent policy means unbounded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Depth {
    Level(u32),
    Props(BTreeMap<String, Depth>),
}

impl Depth {
    /// Build a per-property policy from `(property, depth)` pairs
    pub fn props<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Depth)>,
        K: Into<String>,
    {
        Depth::Props(entries.into_iter().map(|(k, d)| (k.into(), d)).collect())
    }
}

impl From<u32> for Depth {
    fn from(value: u32) -> Self {
        Depth::Level(value)
    }
}

/// Borrowed walker over a depth policy.
///
/// A cursor is attached to an entity and answers, per target property,
/// whether that property is hydrated and which cursor its entities get.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DepthCursor<'d> {
    Unbounded,
    Levels(u32),
    Props(&'d BTreeMap<String, Depth>),
}

impl<'d> DepthCursor<'d> {
    pub fn new(depth: Option<&'d Depth>) -> Self {
        match depth {
            None => DepthCursor::Unbounded,
            Some(Depth::Level(n)) => DepthCursor::Levels(*n),
            Some(Depth::Props(props)) => DepthCursor::Props(props),
        }
    }

    pub fn is_unbounded(self) -> bool {
        matches!(self, DepthCursor::Unbounded)
    }

    /// Budget for a target property of the entity this cursor governs
    pub fn property(self, name: &str) -> Self {
        match self {
            DepthCursor::Props(props) => props
                .get(name)
                .map_or(DepthCursor::Levels(0), |depth| DepthCursor::new(Some(depth))),
            other => other,
        }
    }

    /// Whether a property with this budget stays a raw identity
    pub fn is_exhausted(self) -> bool {
        matches!(self, DepthCursor::Levels(0))
    }

    /// Cursor for the entities reached through a property with this budget
    pub fn descend(self) -> Self {
        match self {
            DepthCursor::Levels(n) => DepthCursor::Levels(n.saturating_sub(1)),
            other => other,
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Short name of a JSON value's shape, used in error messages
pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_key_from_value() {
        assert_eq!(Key::from_value(&json!("u1")), Some(Key::from("u1")));
        assert_eq!(Key::from_value(&json!(7)), Some(Key::Int(7)));
        assert_eq!(Key::from_value(&json!(1.5)), None);
        assert_eq!(Key::from_value(&json!(true)), None);
        assert_eq!(Key::from_value(&json!({ "id": 1 })), None);
        assert_eq!(Key::from_value(&Value::Null), None);
    }

    #[test]
    fn test_key_matches_only_same_kind() {
        assert!(Key::Int(1).matches(&json!(1)));
        assert!(!Key::Int(1).matches(&json!("1")));
        assert!(Key::from("a").matches(&json!("a")));
    }

    #[test]
    fn test_key_display_and_serde() {
        assert_eq!(Key::Int(3).to_string(), "3");
        assert_eq!(Key::from("admin").to_string(), "admin");
        let keys: Vec<Key> = serde_json::from_value(json!([1, "x"])).unwrap();
        assert_eq!(keys, vec![Key::Int(1), Key::from("x")]);
    }

    #[test]
    fn test_ref_merge_unions_sequences() {
        let mut existing = Ref::Many(vec![Key::Int(1), Key::Int(2)]);
        existing.merge(Ref::Many(vec![Key::Int(2), Key::Int(3)]));
        assert_eq!(existing, Ref::Many(vec![Key::Int(1), Key::Int(2), Key::Int(3)]));
    }

    #[test]
    fn test_ref_merge_overwrites_single() {
        let mut existing = Ref::One(Key::from("admin"));
        existing.merge(Ref::One(Key::from("standard")));
        assert_eq!(existing, Ref::One(Key::from("standard")));
    }

    #[test]
    fn test_ref_to_value() {
        assert_eq!(Ref::One(Key::from("u1")).to_value(), json!("u1"));
        assert_eq!(Ref::Many(vec![Key::Int(1), Key::Int(2)]).to_value(), json!([1, 2]));
    }

    #[test]
    fn test_depth_deserializes_untagged() {
        let depth: Depth = serde_json::from_value(json!({ "author": 1, "comments": { "author": 0 } })).unwrap();
        assert_eq!(
            depth,
            Depth::props([
                ("author", Depth::Level(1)),
                ("comments", Depth::props([("author", Depth::Level(0))])),
            ])
        );
    }

    #[test]
    fn test_cursor_uniform_levels() {
        let depth = Depth::Level(1);
        let cursor = DepthCursor::new(Some(&depth));
        let budget = cursor.property("author");
        assert!(!budget.is_exhausted());
        let child = budget.descend();
        assert!(child.property("role").is_exhausted());
    }

    #[test]
    fn test_cursor_omitted_property_is_exhausted() {
        let depth = Depth::props([("author", Depth::Level(1))]);
        let cursor = DepthCursor::new(Some(&depth));
        assert!(cursor.property("comments").is_exhausted());
        assert!(!cursor.property("author").is_exhausted());
    }

    #[test]
    fn test_cursor_unbounded() {
        let cursor = DepthCursor::new(None);
        assert!(cursor.is_unbounded());
        assert!(!cursor.property("anything").is_exhausted());
        assert!(cursor.property("anything").descend().is_unbounded());
    }

    #[test]
    fn test_value_kind() {
        assert_eq!(value_kind(&json!([])), "array");
        assert_eq!(value_kind(&json!({})), "object");
        assert_eq!(value_kind(&json!("s")), "string");
    }
}
