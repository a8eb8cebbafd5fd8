//! Fetching exactly the rows a denormalize needs
//!
//! `preload` computes the key closure of a selection from the reference
//! tree, asks the loader for each type's rows in one batch, and returns
//! `NormalizedData` ready for a `Denormalizer` with the same depth policy.

use crate::data::{NormalizedData, Tree};
use crate::graph::{KeySelection, find_entity_keys};
use normdb_core::{Key, Loader, NdbError, NdbResult};
use normdb_schema::Schema;
use serde_json::Value;

/// Load the rows reachable from `selection` through `loader`.
///
/// Types are loaded one after another; keys within a type are sorted.
/// Keys the loader does not return are simply absent from the result.
pub async fn preload<L>(
    schema: &Schema,
    tree: &Tree,
    entity_type: &str,
    loader: &L,
    selection: &KeySelection,
) -> NdbResult<NormalizedData>
where
    L: Loader + ?Sized,
{
    let closure = find_entity_keys(schema, tree, entity_type, selection)?;
    let mut data = NormalizedData {
        tree: tree.clone(),
        ..NormalizedData::default()
    };

    for (loaded_type, keys) in closure {
        let entity = schema.entity(&loaded_type)?;
        let keys: Vec<Key> = keys.into_iter().collect();
        tracing::debug!("Loading {} {} entities", keys.len(), loaded_type);

        let rows = loader
            .load(&loaded_type, &keys)
            .await
            .map_err(|e| NdbError::Load {
                entity_type: loaded_type.clone(),
                source: Box::new(e),
            })?;

        for (index, row) in rows.into_iter().enumerate() {
            let record = match row {
                Value::Object(record) => record,
                other => {
                    return Err(NdbError::shape(
                        format!("{}[{}]", loaded_type, index),
                        "object",
                        &other,
                    ));
                }
            };
            data.insert(&loaded_type, &entity.key, record)?;
        }
    }

    Ok(data)
}

// ============================================================================
// Tests
// ============================================================================
