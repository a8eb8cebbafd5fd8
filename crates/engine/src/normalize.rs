//! Flattening nested entity graphs
//!
//! `normalize` walks a value against the schema, pulls every nested related
//! entity out into its own table, replaces it in the parent with its
//! identity and records the relation in the reference tree. Children are
//! stored before their parents.

use crate::data::{NormalizedData, record_key};
use normdb_core::merge::merge_reverse_refs;
use normdb_core::{Key, KeyGenerator, NdbError, NdbResult, REFS_FIELD, Record, Ref};
use normdb_schema::{Schema, Target};
use serde_json::{Map, Value};

/// Per-call normalize settings
#[derive(Clone, Copy, Default)]
pub struct NormalizeOptions<'a> {
    /// Track which parents reference each entity
    pub reverse_refs: bool,

    /// Identity source for items that arrive without one
    pub unique_key: Option<&'a dyn KeyGenerator>,
}

impl<'a> NormalizeOptions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable backward-reference bookkeeping
    pub fn reverse_refs(mut self, enabled: bool) -> Self {
        self.reverse_refs = enabled;
        self
    }

    /// Use `generator` for items without an identity
    pub fn unique_key(mut self, generator: &'a dyn KeyGenerator) -> Self {
        self.unique_key = Some(generator);
        self
    }
}

impl std::fmt::Debug for NormalizeOptions<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NormalizeOptions")
            .field("reverse_refs", &self.reverse_refs)
            .field("unique_key", &self.unique_key.is_some())
            .finish()
    }
}

/// Normalize `value` as `entity_type`.
///
/// `value` may be a single entity, an array of entities (null elements are
/// skipped) or null, which yields empty data. Any failure aborts the whole
/// call.
pub fn normalize(
    schema: &Schema,
    entity_type: &str,
    value: &Value,
    options: &NormalizeOptions<'_>,
) -> NdbResult<NormalizedData> {
    schema.entity(entity_type)?;
    let mut normalizer = Normalizer {
        schema,
        options: *options,
        data: NormalizedData::new(),
    };

    match value {
        Value::Null => {}
        Value::Object(_) => {
            normalizer.visit(entity_type, value, entity_type, None)?;
        }
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                if item.is_null() {
                    continue;
                }
                normalizer.visit(entity_type, item, &format!("{}[{}]", entity_type, index), None)?;
            }
        }
        other => return Err(NdbError::shape(entity_type, "object or array", other)),
    }

    let data = normalizer.data;
    tracing::debug!(
        "Normalized {} into {} records across {} types",
        entity_type,
        data.entities.values().map(Vec::len).sum::<usize>(),
        data.entities.len()
    );
    Ok(data)
}

type Parent<'p> = Option<(&'p str, &'p Key)>;

struct Normalizer<'s, 'a> {
    schema: &'s Schema,
    options: NormalizeOptions<'a>,
    data: NormalizedData,
}

impl Normalizer<'_, '_> {
    /// Flatten one entity object and return its identity
    fn visit(&mut self, entity_type: &str, item: &Value, path: &str, parent: Parent<'_>) -> NdbResult<Key> {
        let Value::Object(source) = item else {
            return Err(NdbError::shape(path, "object", item));
        };
        let schema = self.schema;
        let entity = schema.entity(entity_type)?;

        let mut record: Record = source
            .iter()
            .filter(|(field, value)| !entity.targets.contains_key(*field) || value.is_null())
            .map(|(field, value)| (field.clone(), value.clone()))
            .collect();

        let key = match record_key(entity_type, &entity.key, &record)? {
            Some(key) => key,
            None => {
                let generator = self.options.unique_key.ok_or_else(|| NdbError::MissingKey {
                    entity_type: entity_type.to_string(),
                    key_field: entity.key.clone(),
                })?;
                let key = generator.generate(entity_type);
                record.insert(entity.key.clone(), key.to_value());
                key
            }
        };

        self.data.tree.node_mut(entity_type, key.clone());
        if let Some((parent_type, parent_key)) = parent {
            self.track_parent(entity_type, &key, parent_type, parent_key);
            if self.options.reverse_refs {
                let mut refs = Map::new();
                refs.insert(
                    parent_type.to_string(),
                    Value::Array(vec![parent_key.to_value()]),
                );
                let carried = record.remove(REFS_FIELD).unwrap_or(Value::Null);
                record.insert(
                    REFS_FIELD.to_string(),
                    merge_reverse_refs(carried, Value::Object(refs)),
                );
            }
        }

        for (property, target) in &entity.targets {
            let Some(value) = source.get(property).filter(|value| !value.is_null()) else {
                continue;
            };
            let child_path = format!("{}.{}", path, property);
            let reference = self.visit_target(entity_type, &key, target, value, &child_path)?;
            record.insert(property.clone(), reference.to_value());
            self.data
                .tree
                .node_mut(entity_type, key.clone())
                .set_prop(property, reference);
        }

        tracing::trace!("Flattened {}[{}]", entity_type, key);
        self.data.upsert(entity_type, &entity.key, key.clone(), record);
        Ok(key)
    }

    fn visit_target(
        &mut self,
        entity_type: &str,
        key: &Key,
        target: &Target,
        value: &Value,
        path: &str,
    ) -> NdbResult<Ref> {
        let parent = Some((entity_type, key));
        if target.is_array {
            let Value::Array(items) = value else {
                return Err(NdbError::shape(path, target.shape(), value));
            };
            let mut keys = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                if item.is_null() {
                    continue;
                }
                let item_path = format!("{}[{}]", path, index);
                keys.push(self.visit_related(&target.entity_type, item, &item_path, parent)?);
            }
            Ok(Ref::Many(keys))
        } else {
            if value.is_array() {
                return Err(NdbError::shape(path, target.shape(), value));
            }
            self.visit_related(&target.entity_type, value, path, parent)
                .map(Ref::One)
        }
    }

    /// A nested entity, or the identity of one that is already normalized
    fn visit_related(&mut self, entity_type: &str, value: &Value, path: &str, parent: Parent<'_>) -> NdbResult<Key> {
        match value {
            Value::Object(_) => self.visit(entity_type, value, path, parent),
            Value::String(_) | Value::Number(_) => {
                let key = Key::from_value(value).ok_or_else(|| NdbError::shape(path, "object", value))?;
                self.data.tree.node_mut(entity_type, key.clone());
                if let Some((parent_type, parent_key)) = parent {
                    self.track_parent(entity_type, &key, parent_type, parent_key);
                }
                Ok(key)
            }
            other => Err(NdbError::shape(path, "object", other)),
        }
    }

    fn track_parent(&mut self, entity_type: &str, key: &Key, parent_type: &str, parent_key: &Key) {
        if self.options.reverse_refs {
            self.data
                .tree
                .node_mut(entity_type, key.clone())
                .add_ref(parent_type, parent_key.clone());
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
