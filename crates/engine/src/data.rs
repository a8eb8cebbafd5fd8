//! Normalized tables and the reference tree
//!
//! `NormalizedData` holds, per type, the flattened entity records, an index
//! from identity to table position, and the `Tree` of forward and backward
//! references between entities.

use normdb_core::merge::{merge_records, merge_reverse_refs};
use normdb_core::{Key, NdbError, NdbResult, REFS_FIELD, Record, Ref};
use normdb_schema::Schema;
use serde::Serialize;
use serde_json::Value;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashMap};

// ============================================================================
// TreeNode
// ============================================================================

/// Relations of a single entity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TreeNode {
    /// Forward references: property name to the identities it points at
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub props: BTreeMap<String, Ref>,

    /// Backward references: parent type to the parents pointing here
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub refs: BTreeMap<String, BTreeSet<Key>>,
}

impl TreeNode {
    /// Record a forward reference, merging with an earlier one
    pub fn set_prop(&mut self, property: &str, reference: Ref) {
        match self.props.entry(property.to_string()) {
            Entry::Occupied(mut entry) => entry.get_mut().merge(reference),
            Entry::Vacant(entry) => {
                entry.insert(reference);
            }
        }
    }

    /// Record that `parent_key` of `parent_type` points at this node
    pub fn add_ref(&mut self, parent_type: &str, parent_key: Key) {
        self.refs
            .entry(parent_type.to_string())
            .or_default()
            .insert(parent_key);
    }

    /// Fold `other` into this node: props per `Ref::merge`, refs unioned
    pub fn merge(&mut self, other: &TreeNode) {
        for (property, reference) in &other.props {
            self.set_prop(property, reference.clone());
        }
        for (parent_type, keys) in &other.refs {
            self.refs
                .entry(parent_type.clone())
                .or_default()
                .extend(keys.iter().cloned());
        }
    }
}

// ============================================================================
// Tree
// ============================================================================

/// The reference graph: type to identity to node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Tree {
    nodes: BTreeMap<String, BTreeMap<Key, TreeNode>>,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the node of `key` in `entity_type`
    pub fn node(&self, entity_type: &str, key: &Key) -> Option<&TreeNode> {
        self.nodes.get(entity_type).and_then(|nodes| nodes.get(key))
    }

    /// Get the node of `key` in `entity_type`, creating an empty one
    pub fn node_mut(&mut self, entity_type: &str, key: Key) -> &mut TreeNode {
        self.nodes
            .entry(entity_type.to_string())
            .or_default()
            .entry(key)
            .or_default()
    }

    /// Every identity of `entity_type` known to the tree, in key order
    pub fn keys_of(&self, entity_type: &str) -> impl Iterator<Item = &Key> {
        self.nodes.get(entity_type).into_iter().flat_map(BTreeMap::keys)
    }

    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    /// Total number of nodes across all types
    pub fn len(&self) -> usize {
        self.nodes.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fold every node of `other` into this tree
    pub fn merge_from(&mut self, other: &Tree) {
        for (entity_type, nodes) in &other.nodes {
            let mine = self.nodes.entry(entity_type.clone()).or_default();
            for (key, node) in nodes {
                match mine.entry(key.clone()) {
                    Entry::Occupied(mut entry) => entry.get_mut().merge(node),
                    Entry::Vacant(entry) => {
                        entry.insert(node.clone());
                    }
                }
            }
        }
    }
}

// ============================================================================
// NormalizedData
// ============================================================================

/// Flattened entity tables plus the reference tree
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedData {
    /// Flattened records per type, in first-seen order
    pub entities: BTreeMap<String, Vec<Record>>,

    /// Identity to position in `entities`, per type
    pub key_map: BTreeMap<String, HashMap<Key, usize>>,

    pub tree: Tree,
}

impl NormalizedData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records of `entity_type`, empty when the type has none
    pub fn records(&self, entity_type: &str) -> &[Record] {
        self.entities
            .get(entity_type)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Identities of every record of `entity_type`, in table order
    pub fn keys(&self, entity_type: &str, key_field: &str) -> Vec<Key> {
        self.records(entity_type)
            .iter()
            .filter_map(|record| record.get(key_field).and_then(Key::from_value))
            .collect()
    }

    /// Look up a record by identity.
    ///
    /// Uses the key map when it has an entry and falls back to scanning the
    /// table on the identity field.
    pub fn find(&self, entity_type: &str, key_field: &str, key: &Key) -> Option<&Record> {
        let records = self.entities.get(entity_type)?;
        self.key_map
            .get(entity_type)
            .and_then(|index| index.get(key))
            .and_then(|&position| records.get(position))
            .or_else(|| {
                records
                    .iter()
                    .find(|record| record.get(key_field).is_some_and(|value| key.matches(value)))
            })
    }

    fn position(&self, entity_type: &str, key_field: &str, key: &Key) -> Option<usize> {
        let records = self.entities.get(entity_type)?;
        self.key_map
            .get(entity_type)
            .and_then(|index| index.get(key).copied())
            .or_else(|| {
                records
                    .iter()
                    .position(|record| record.get(key_field).is_some_and(|value| key.matches(value)))
            })
    }

    /// Insert a record, merging into an existing one with the same identity
    pub fn upsert(&mut self, entity_type: &str, key_field: &str, key: Key, record: Record) {
        match self.position(entity_type, key_field, &key) {
            Some(position) => {
                if let Some(existing) = self
                    .entities
                    .get_mut(entity_type)
                    .and_then(|records| records.get_mut(position))
                {
                    merge_records(existing, record, &[(REFS_FIELD, merge_reverse_refs)]);
                }
                self.key_map
                    .entry(entity_type.to_string())
                    .or_default()
                    .insert(key, position);
            }
            None => {
                let records = self.entities.entry(entity_type.to_string()).or_default();
                records.push(record);
                let position = records.len() - 1;
                self.key_map
                    .entry(entity_type.to_string())
                    .or_default()
                    .insert(key, position);
            }
        }
    }

    /// Insert a stored row, reading its identity from `key_field`
    pub fn insert(&mut self, entity_type: &str, key_field: &str, record: Record) -> NdbResult<Key> {
        let key = record_key(entity_type, key_field, &record)?.ok_or_else(|| NdbError::MissingKey {
            entity_type: entity_type.to_string(),
            key_field: key_field.to_string(),
        })?;
        self.upsert(entity_type, key_field, key.clone(), record);
        Ok(key)
    }

    /// Fold a later result into this one.
    ///
    /// Records are upserted with the normalize merge rule and the trees are
    /// merged, so the key map keeps pointing at matching records. Every type
    /// and identity of `other` is checked first; on error `self` is unchanged.
    pub fn merge(&mut self, schema: &Schema, other: NormalizedData) -> NdbResult<()> {
        let mut keyed = Vec::with_capacity(other.entities.len());
        for (entity_type, records) in other.entities {
            let key_field = schema.entity(&entity_type)?.key.as_str();
            let records = records
                .into_iter()
                .map(|record| -> NdbResult<(Key, Record)> {
                    let key = record_key(&entity_type, key_field, &record)?.ok_or_else(|| {
                        NdbError::MissingKey {
                            entity_type: entity_type.clone(),
                            key_field: key_field.to_string(),
                        }
                    })?;
                    Ok((key, record))
                })
                .collect::<NdbResult<Vec<_>>>()?;
            keyed.push((entity_type, key_field, records));
        }

        for (entity_type, key_field, records) in keyed {
            for (key, record) in records {
                self.upsert(&entity_type, key_field, key, record);
            }
        }
        self.tree.merge_from(&other.tree);
        Ok(())
    }
}

/// Read the identity of a record.
///
/// `None` when the field is absent or null; an error when it holds something
/// other than a string or integer.
pub(crate) fn record_key(entity_type: &str, key_field: &str, record: &Record) -> NdbResult<Option<Key>> {
    match record.get(key_field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => Key::from_value(value).map(Some).ok_or_else(|| NdbError::InvalidKey {
            entity_type: entity_type.to_string(),
            key_field: key_field.to_string(),
            value: value.to_string(),
        }),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{blog_schema, record};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_tree_node_merge() {
        let mut node = TreeNode::default();
        node.set_prop("role", Ref::One(Key::from("admin")));
        node.set_prop("tags", Ref::Many(vec![Key::Int(1)]));
        node.add_ref("post", Key::Int(1));

        let mut other = TreeNode::default();
        other.set_prop("role", Ref::One(Key::from("standard")));
        other.set_prop("tags", Ref::Many(vec![Key::Int(2)]));
        other.add_ref("post", Key::Int(2));

        node.merge(&other);
        assert_eq!(node.props["role"], Ref::One(Key::from("standard")));
        assert_eq!(node.props["tags"], Ref::Many(vec![Key::Int(1), Key::Int(2)]));
        assert_eq!(node.refs["post"], BTreeSet::from([Key::Int(1), Key::Int(2)]));
    }

    #[test]
    fn test_tree_keys_of() {
        let mut tree = Tree::new();
        tree.node_mut("user", Key::from("b"));
        tree.node_mut("user", Key::from("a"));
        assert_eq!(tree.keys_of("user").collect::<Vec<_>>(), vec![&Key::from("a"), &Key::from("b")]);
        assert_eq!(tree.keys_of("ghost").count(), 0);
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn test_upsert_keeps_key_map_in_sync() {
        let mut data = NormalizedData::new();
        data.upsert("user", "id", Key::from("u1"), record(json!({ "id": "u1", "role": "admin" })));
        data.upsert("user", "id", Key::from("u2"), record(json!({ "id": "u2" })));
        data.upsert("user", "id", Key::from("u1"), record(json!({ "id": "u1", "role": "standard" })));

        assert_eq!(data.records("user").len(), 2);
        assert_eq!(data.key_map["user"][&Key::from("u1")], 0);
        assert_eq!(data.key_map["user"][&Key::from("u2")], 1);
        assert_eq!(
            data.find("user", "id", &Key::from("u1")).unwrap()["role"],
            json!("standard")
        );
    }

    #[test]
    fn test_find_falls_back_to_scan() {
        let mut data = NormalizedData::new();
        data.entities.insert(
            "role".to_string(),
            vec![record(json!({ "id": "admin" })), record(json!({ "id": "user" }))],
        );
        assert!(data.find("role", "id", &Key::from("user")).is_some());
        assert!(data.find("role", "id", &Key::from("ghost")).is_none());
        assert!(data.find("ghost", "id", &Key::from("user")).is_none());
    }

    #[test]
    fn test_insert_requires_identity() {
        let mut data = NormalizedData::new();
        let err = data.insert("user", "id", record(json!({ "name": "x" }))).unwrap_err();
        assert!(matches!(err, NdbError::MissingKey { .. }));

        let err = data.insert("user", "id", record(json!({ "id": 1.5 }))).unwrap_err();
        assert!(matches!(err, NdbError::InvalidKey { .. }));
    }

    #[test]
    fn test_merge_data() {
        let schema = blog_schema();
        let mut first = NormalizedData::new();
        first.insert("user", "id", record(json!({ "id": "u1", "_refs": { "post": [1] } }))).unwrap();
        first.tree.node_mut("user", Key::from("u1")).add_ref("post", Key::Int(1));

        let mut second = NormalizedData::new();
        second.insert("user", "id", record(json!({ "id": "u2" }))).unwrap();
        second.insert("user", "id", record(json!({ "id": "u1", "_refs": { "post": [2] } }))).unwrap();
        second.tree.node_mut("user", Key::from("u1")).add_ref("post", Key::Int(2));

        first.merge(&schema, second).unwrap();
        assert_eq!(first.keys("user", "id"), vec![Key::from("u1"), Key::from("u2")]);
        assert_eq!(
            first.find("user", "id", &Key::from("u1")).unwrap()[REFS_FIELD],
            json!({ "post": [1, 2] })
        );
        assert_eq!(
            first.tree.node("user", &Key::from("u1")).unwrap().refs["post"],
            BTreeSet::from([Key::Int(1), Key::Int(2)])
        );
    }

    #[test]
    fn test_failed_merge_leaves_data_unchanged() {
        let schema = blog_schema();
        let mut first = NormalizedData::new();
        first.insert("user", "id", record(json!({ "id": "u1", "role": "admin" }))).unwrap();
        first.tree.node_mut("user", Key::from("u1")).set_prop("role", Ref::One(Key::from("admin")));
        let before = first.clone();

        let mut other = NormalizedData::new();
        other.insert("user", "id", record(json!({ "id": "u1", "role": "standard" }))).unwrap();
        other.insert("zzz", "id", record(json!({ "id": 1 }))).unwrap();
        other.tree.node_mut("user", Key::from("u1")).set_prop("role", Ref::One(Key::from("standard")));
        let err = first.merge(&schema, other).unwrap_err();
        assert!(matches!(err, NdbError::UnknownType(_)));
        assert_eq!(first, before);

        let mut other = NormalizedData::new();
        other.insert("role", "id", record(json!({ "id": "standard" }))).unwrap();
        other.entities.entry("user".to_string()).or_default().push(record(json!({ "name": "nobody" })));
        let err = first.merge(&schema, other).unwrap_err();
        assert!(matches!(err, NdbError::MissingKey { .. }));
        assert_eq!(first, before);
    }

    #[test]
    fn test_merge_unknown_type_fails() {
        let mut other = NormalizedData::new();
        other.insert("ghost", "id", record(json!({ "id": 1 }))).unwrap();
        let err = NormalizedData::new().merge(&blog_schema(), other).unwrap_err();
        assert!(matches!(err, NdbError::UnknownType(_)));
    }
}
