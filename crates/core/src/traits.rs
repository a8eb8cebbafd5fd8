//! Core traits for normdb
//!
//! These are the two capabilities the engine consumes from its caller: a way
//! to mint identities for items that arrive without one, and a way to fetch
//! stored rows by key when denormalizing from a reference graph.

use crate::types::Key;
use serde_json::Value;

// ============================================================================
// KeyGenerator Trait
// ============================================================================

/// Produces an identity for an item of `entity_type` that has none
///
/// # Example
///
/// ```rust
/// use normdb_core::{Key, KeyGenerator};
///
/// let sequence = std::sync::atomic::AtomicI64::new(100);
/// let generator = move |_entity_type: &str| {
///     Key::Int(sequence.fetch_add(1, std::sync::atomic::Ordering::Relaxed))
/// };
///
/// assert_eq!(generator.generate("comment"), Key::Int(100));
/// assert_eq!(generator.generate("comment"), Key::Int(101));
/// ```
pub trait KeyGenerator {
    /// Generate a fresh identity
    fn generate(&self, entity_type: &str) -> Key;
}

impl<F> KeyGenerator for F
where
    F: Fn(&str) -> Key,
{
    fn generate(&self, entity_type: &str) -> Key {
        self(entity_type)
    }
}

/// Generates random UUID v4 string identities
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidKeyGenerator;

impl KeyGenerator for UuidKeyGenerator {
    fn generate(&self, _entity_type: &str) -> Key {
        Key::Str(uuid::Uuid::new_v4().to_string())
    }
}

// ============================================================================
// Loader Trait
// ============================================================================

/// Fetches stored entity rows of one type by key
///
/// The engine requests all keys of a type in a single call. Rows are raw
/// flattened records; keys that do not exist are simply absent from the
/// result.
#[async_trait::async_trait]
pub trait Loader: Send + Sync {
    /// Error reported by the backing store
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load the rows of `entity_type` whose identity is in `keys`
    async fn load(&self, entity_type: &str, keys: &[Key]) -> Result<Vec<Value>, Self::Error>;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_key_generator() {
        let generator = |entity_type: &str| Key::Str(format!("{}-1", entity_type));
        assert_eq!(generator.generate("user"), Key::from("user-1"));
    }

    #[test]
    fn test_uuid_key_generator() {
        let first = UuidKeyGenerator.generate("user");
        let second = UuidKeyGenerator.generate("user");
        assert_ne!(first, second);
        match first {
            Key::Str(s) => assert!(uuid::Uuid::parse_str(&s).is_ok()),
            Key::Int(_) => panic!("expected a string key"),
        }
    }
}
