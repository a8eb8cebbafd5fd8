//! Rebuilding nested entity graphs
//!
//! A `Denormalizer` reads from `NormalizedData` and substitutes stored
//! identities with the entities they refer to, as far as the depth policy
//! allows.

use crate::data::{NormalizedData, record_key};
use normdb_core::{Depth, DepthCursor, Key, NdbError, NdbResult, REFS_FIELD, Record};
use normdb_schema::Schema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Per-call denormalize settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DenormalizeOptions {
    /// How far to hydrate; `None` is unbounded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth: Option<Depth>,

    /// Strip the backward-reference field from every materialized entity
    pub reverse_refs_deleted: bool,
}

impl DenormalizeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound the hydration depth
    pub fn depth(mut self, depth: impl Into<Depth>) -> Self {
        self.depth = Some(depth.into());
        self
    }

    pub fn reverse_refs_deleted(mut self, deleted: bool) -> Self {
        self.reverse_refs_deleted = deleted;
        self
    }
}

/// Reads nested entities out of normalized data
///
/// # Example
///
/// ```rust,ignore
/// let denormalizer = Denormalizer::new(&schema, &data)
///     .with_options(DenormalizeOptions::new().depth(Depth::Level(1)));
/// let post = denormalizer.from_key("post", &Key::Int(1))?;
/// ```
#[derive(Debug, Clone)]
pub struct Denormalizer<'a> {
    schema: &'a Schema,
    data: &'a NormalizedData,
    options: DenormalizeOptions,
}

impl<'a> Denormalizer<'a> {
    /// Create a denormalizer with unbounded depth
    pub fn new(schema: &'a Schema, data: &'a NormalizedData) -> Self {
        Self {
            schema,
            data,
            options: DenormalizeOptions::default(),
        }
    }

    pub fn with_options(mut self, options: DenormalizeOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &DenormalizeOptions {
        &self.options
    }

    /// Materialize the entity `key` of `entity_type`
    pub fn from_key(&self, entity_type: &str, key: &Key) -> NdbResult<Value> {
        let mut path = Vec::new();
        self.hydrate(entity_type, key, self.root_cursor(), &mut path)
    }

    /// Materialize several entities, in the order given
    pub fn from_keys(&self, entity_type: &str, keys: &[Key]) -> NdbResult<Vec<Value>> {
        keys.iter().map(|key| self.from_key(entity_type, key)).collect()
    }

    /// Materialize every stored entity of `entity_type`, in table order
    pub fn all(&self, entity_type: &str) -> NdbResult<Vec<Value>> {
        let entity = self.schema.entity(entity_type)?;
        let keys = self.data.keys(entity_type, &entity.key);
        tracing::debug!("Denormalizing all {} {} entities", keys.len(), entity_type);
        self.from_keys(entity_type, &keys)
    }

    /// Materialize the stored entity whose identity a partial record carries
    pub fn from_data(&self, entity_type: &str, item: &Value) -> NdbResult<Value> {
        let entity = self.schema.entity(entity_type)?;
        let Value::Object(record) = item else {
            return Err(NdbError::shape(entity_type, "object", item));
        };
        let key = record_key(entity_type, &entity.key, record)?.ok_or_else(|| NdbError::MissingKey {
            entity_type: entity_type.to_string(),
            key_field: entity.key.clone(),
        })?;
        self.from_key(entity_type, &key)
    }

    /// `from_data` over a sequence of partial records
    pub fn from_array(&self, entity_type: &str, items: &[Value]) -> NdbResult<Vec<Value>> {
        items.iter().map(|item| self.from_data(entity_type, item)).collect()
    }

    fn root_cursor(&self) -> DepthCursor<'_> {
        DepthCursor::new(self.options.depth.as_ref())
    }

    fn hydrate(
        &self,
        entity_type: &str,
        key: &Key,
        cursor: DepthCursor<'_>,
        path: &mut Vec<(String, Key)>,
    ) -> NdbResult<Value> {
        let entity = self.schema.entity(entity_type)?;
        let stored = self
            .data
            .find(entity_type, &entity.key, key)
            .ok_or_else(|| NdbError::not_found(entity_type, key))?;
        if let DepthCursor::Props(props) = cursor {
            for property in props.keys() {
                entity.require_target(entity_type, property)?;
            }
        }

        // Bounded policies always terminate; only unbounded ones can loop.
        let guarded = cursor.is_unbounded();
        if guarded {
            if path.iter().any(|(t, k)| t == entity_type && k == key) {
                return Err(NdbError::CycleDetected {
                    path: describe_path(path, entity_type, key),
                });
            }
            path.push((entity_type.to_string(), key.clone()));
        }

        let mut output: Record = stored.clone();
        for (property, target) in &entity.targets {
            let budget = cursor.property(property);
            if budget.is_exhausted() {
                continue;
            }
            let child = budget.descend();
            let hydrated = match stored.get(property) {
                None | Some(Value::Null) => continue,
                Some(Value::Array(items)) => {
                    let mut entities = Vec::with_capacity(items.len());
                    for (index, item) in items.iter().enumerate() {
                        let child_key = Key::from_value(item).ok_or_else(|| {
                            NdbError::shape(
                                format!("{}[{}].{}[{}]", entity_type, key, property, index),
                                "identity",
                                item,
                            )
                        })?;
                        entities.push(self.hydrate(&target.entity_type, &child_key, child, path)?);
                    }
                    Value::Array(entities)
                }
                Some(value) => {
                    let child_key = Key::from_value(value).ok_or_else(|| {
                        NdbError::shape(format!("{}[{}].{}", entity_type, key, property), "identity", value)
                    })?;
                    self.hydrate(&target.entity_type, &child_key, child, path)?
                }
            };
            output.insert(property.clone(), hydrated);
        }

        if self.options.reverse_refs_deleted {
            output.remove(REFS_FIELD);
        }
        if guarded {
            path.pop();
        }
        Ok(Value::Object(output))
    }
}

fn describe_path(path: &[(String, Key)], entity_type: &str, key: &Key) -> String {
    path.iter()
        .map(|(t, k)| format!("{}[{}]", t, k))
        .chain(std::iter::once(format!("{}[{}]", entity_type, key)))
        .collect::<Vec<_>>()
        .join(" -> ")
}

// ============================================================================
// Tests
// ============================================================================
