//! Merge and dedup primitives
//!
//! Record merging follows one rule everywhere: a vacant field (`null` or an
//! empty array) always takes the incoming value, a field with a registered
//! merger is combined through it, and everything else is overwritten by the
//! incoming value.

use crate::types::Record;
use serde_json::Value;

/// Combines an existing non-vacant field value with an incoming one
pub type FieldMerger = fn(Value, Value) -> Value;

/// Push `item` unless an equal element is present; returns its index
pub fn push_distinct<T: PartialEq>(items: &mut Vec<T>, item: T) -> usize {
    match items.iter().position(|other| *other == item) {
        Some(index) => index,
        None => {
            items.push(item);
            items.len() - 1
        }
    }
}

/// Append every element of `incoming` not already in `items`, keeping order
pub fn union_distinct<T: PartialEq>(items: &mut Vec<T>, incoming: impl IntoIterator<Item = T>) {
    for item in incoming {
        push_distinct(items, item);
    }
}

/// Whether a field counts as unset for merging purposes
pub fn is_vacant(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Merge `incoming` into `existing` field by field.
///
/// Fields only present in `existing` are kept untouched.
pub fn merge_records(existing: &mut Record, incoming: Record, mergers: &[(&str, FieldMerger)]) {
    for (field, value) in incoming {
        match existing.get_mut(&field) {
            None => {
                existing.insert(field, value);
            }
            Some(current) if is_vacant(current) => *current = value,
            Some(current) => {
                let merger = mergers
                    .iter()
                    .find(|(name, _)| *name == field)
                    .map(|(_, merger)| *merger);
                *current = match merger {
                    Some(merger) => merger(current.take(), value),
                    None => value,
                };
            }
        }
    }
}

/// Union two backward-reference maps of shape `{ parentType: [key, ...] }`.
///
/// An existing value that is not such a map is replaced; an incoming one is
/// ignored.
pub fn merge_reverse_refs(existing: Value, incoming: Value) -> Value {
    let Value::Object(mut merged) = existing else {
        return incoming;
    };
    let Value::Object(incoming) = incoming else {
        return Value::Object(merged);
    };

    for (parent_type, keys) in incoming {
        let Value::Array(keys) = keys else { continue };
        match merged.get_mut(&parent_type) {
            Some(Value::Array(current)) => union_distinct(current, keys),
            _ => {
                merged.insert(parent_type, Value::Array(keys));
            }
        }
    }

    Value::Object(merged)
}

// ============================================================================
// Tests
// ============================================================================
