//! Operations on the reference tree alone
//!
//! These never look at entity payloads, so they can run before any row has
//! been fetched from storage.

use crate::data::Tree;
use normdb_core::{Depth, DepthCursor, Key, NdbResult};
use normdb_schema::Schema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Identities per type
pub type EntityKeys = BTreeMap<String, BTreeSet<Key>>;

/// Which roots to start from and how deep to follow
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeySelection {
    /// Root identities; `None` selects every identity of the root type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keys: Option<Vec<Key>>,

    /// Depth policy, read exactly like the denormalize one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth: Option<Depth>,
}

impl KeySelection {
    /// Every identity of the root type, unbounded
    pub fn all() -> Self {
        Self::default()
    }

    /// Only the given roots, unbounded
    pub fn keys<K: Into<Key>>(keys: impl IntoIterator<Item = K>) -> Self {
        Self {
            keys: Some(keys.into_iter().map(Into::into).collect()),
            depth: None,
        }
    }

    pub fn with_depth(mut self, depth: impl Into<Depth>) -> Self {
        self.depth = Some(depth.into());
        self
    }
}

/// Collect every `(type, key)` a denormalize of `selection` would read.
///
/// Roots are always included. Expansion is memoized per type, key and
/// remaining budget, so a node reached again with a larger budget is
/// expanded again while diamonds and cycles still terminate.
pub fn find_entity_keys(
    schema: &Schema,
    tree: &Tree,
    entity_type: &str,
    selection: &KeySelection,
) -> NdbResult<EntityKeys> {
    schema.entity(entity_type)?;
    let roots: Vec<Key> = match &selection.keys {
        Some(keys) => keys.clone(),
        None => tree.keys_of(entity_type).cloned().collect(),
    };

    let mut walker = KeyWalker {
        schema,
        tree,
        expanded: HashSet::new(),
        found: EntityKeys::new(),
    };
    let cursor = DepthCursor::new(selection.depth.as_ref());
    for key in roots {
        walker.walk(entity_type, key, cursor)?;
    }

    tracing::debug!(
        "Found {} keys across {} types from {}",
        walker.found.values().map(BTreeSet::len).sum::<usize>(),
        walker.found.len(),
        entity_type
    );
    Ok(walker.found)
}

/// Merge two trees into a new one.
///
/// Nodes present on one side are copied; nodes on both sides take the second
/// side's single references, union sequences and union back-references.
pub fn merge_trees(first: &Tree, second: &Tree) -> Tree {
    let mut merged = first.clone();
    merged.merge_from(second);
    merged
}

struct KeyWalker<'a> {
    schema: &'a Schema,
    tree: &'a Tree,
    expanded: HashSet<(&'a str, Key, DepthCursor<'a>)>,
    found: EntityKeys,
}

impl<'a> KeyWalker<'a> {
    fn walk(&mut self, entity_type: &'a str, root: Key, cursor: DepthCursor<'a>) -> NdbResult<()> {
        let schema = self.schema;
        let tree = self.tree;
        let mut pending = vec![(entity_type, root, cursor)];

        while let Some((entity_type, key, cursor)) = pending.pop() {
            if !self.expanded.insert((entity_type, key.clone(), cursor)) {
                continue;
            }
            let entity = schema.entity(entity_type)?;
            if let DepthCursor::Props(props) = cursor {
                for property in props.keys() {
                    entity.require_target(entity_type, property)?;
                }
            }

            if let Some(node) = tree.node(entity_type, &key) {
                for (property, reference) in &node.props {
                    let target = entity.require_target(entity_type, property)?;
                    let budget = cursor.property(property);
                    if budget.is_exhausted() {
                        continue;
                    }
                    let child = budget.descend();
                    for child_key in reference.keys() {
                        pending.push((target.entity_type.as_str(), child_key.clone(), child));
                    }
                }
            }

            self.found
                .entry(entity_type.to_string())
                .or_default()
                .insert(key);
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{blog_post, blog_schema, friends_schema};
    use crate::normalize::{NormalizeOptions, normalize};
    use normdb_core::{NdbError, Ref};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn keys<K: Into<Key>>(keys: impl IntoIterator<Item = K>) -> BTreeSet<Key> {
        keys.into_iter().map(Into::into).collect()
    }

    fn blog_tree() -> Tree {
        normalize(&blog_schema(), "post", &blog_post(), &NormalizeOptions::new().reverse_refs(true))
            .unwrap()
            .tree
    }

    #[test]
    fn test_unbounded_closure() {
        let found = find_entity_keys(&blog_schema(), &blog_tree(), "post", &KeySelection::keys([1])).unwrap();
        assert_eq!(
            found,
            EntityKeys::from([
                ("comment".to_string(), keys([10, 11])),
                ("post".to_string(), keys([1])),
                ("role".to_string(), keys(["r1", "r2"])),
                ("user".to_string(), keys(["u1", "u2"])),
            ])
        );
    }

    #[test]
    fn test_closure_matches_denormalize_depth() {
        let depth: Depth = serde_json::from_value(json!({ "author": 1, "comments": { "author": 0 } })).unwrap();
        let selection = KeySelection::keys([1]).with_depth(depth);
        let found = find_entity_keys(&blog_schema(), &blog_tree(), "post", &selection).unwrap();
        assert_eq!(
            found,
            EntityKeys::from([
                ("comment".to_string(), keys([10, 11])),
                ("post".to_string(), keys([1])),
                ("user".to_string(), keys(["u1"])),
            ])
        );
    }

    #[test]
    fn test_depth_zero_is_roots_only() {
        let selection = KeySelection::all().with_depth(Depth::Level(0));
        let found = find_entity_keys(&blog_schema(), &blog_tree(), "user", &selection).unwrap();
        assert_eq!(found, EntityKeys::from([("user".to_string(), keys(["u1", "u2"]))]));
    }

    #[test]
    fn test_larger_budget_reexpands() {
        // post.author reaches u1 with budget 0, comment.author with budget 1
        let depth = Depth::props([
            ("author", Depth::Level(1)),
            ("comments", Depth::props([("author", Depth::Level(2))])),
        ]);
        let selection = KeySelection::keys([1]).with_depth(depth);
        let found = find_entity_keys(&blog_schema(), &blog_tree(), "post", &selection).unwrap();
        assert_eq!(found["role"], keys(["r1", "r2"]));
    }

    #[test]
    fn test_cycle_and_diamond_terminate() {
        let schema = friends_schema();
        let tree = normalize(
            &schema,
            "user",
            &json!([
                { "id": "a", "bestFriend": "b" },
                { "id": "b", "bestFriend": "c" },
                { "id": "c", "bestFriend": "a" }
            ]),
            &NormalizeOptions::new(),
        )
        .unwrap()
        .tree;

        let found = find_entity_keys(&schema, &tree, "user", &KeySelection::keys(["a"])).unwrap();
        assert_eq!(found["user"], keys(["a", "b", "c"]));

        let found = find_entity_keys(&schema, &tree, "user", &KeySelection::keys(["a"]).with_depth(Depth::Level(1))).unwrap();
        assert_eq!(found["user"], keys(["a", "b"]));
    }

    #[test]
    fn test_unknown_root_or_property() {
        let schema = blog_schema();
        let tree = blog_tree();
        let err = find_entity_keys(&schema, &tree, "ghost", &KeySelection::all()).unwrap_err();
        assert!(matches!(err, NdbError::UnknownType(_)));

        let selection = KeySelection::keys([1]).with_depth(Depth::props([("editor", Depth::Level(1))]));
        let err = find_entity_keys(&schema, &tree, "post", &selection).unwrap_err();
        assert!(matches!(err, NdbError::UnknownTarget { ref property, .. } if property == "editor"));
    }

    #[test]
    fn test_tree_prop_without_target() {
        let mut tree = Tree::new();
        tree.node_mut("post", Key::Int(1)).set_prop("editor", Ref::One(Key::from("u9")));
        let err = find_entity_keys(&blog_schema(), &tree, "post", &KeySelection::keys([1])).unwrap_err();
        assert!(matches!(err, NdbError::UnknownTarget { ref property, .. } if property == "editor"));
    }

    #[test]
    fn test_type_missing_from_tree() {
        let found = find_entity_keys(&blog_schema(), &Tree::new(), "post", &KeySelection::keys([7])).unwrap();
        assert_eq!(found, EntityKeys::from([("post".to_string(), keys([7]))]));
        assert!(find_entity_keys(&blog_schema(), &Tree::new(), "post", &KeySelection::all())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_merge_trees_is_idempotent() {
        let tree = blog_tree();
        assert_eq!(merge_trees(&tree, &tree), tree);
    }

    #[test]
    fn test_merge_trees() {
        let mut first = Tree::new();
        first.node_mut("user", Key::from("u1")).set_prop("role", Ref::One(Key::from("admin")));
        first.node_mut("user", Key::from("u1")).add_ref("post", Key::Int(1));
        first.node_mut("post", Key::Int(1)).set_prop("comments", Ref::Many(vec![Key::Int(10)]));

        let mut second = Tree::new();
        second.node_mut("user", Key::from("u1")).set_prop("role", Ref::One(Key::from("standard")));
        second.node_mut("user", Key::from("u1")).add_ref("post", Key::Int(2));
        second.node_mut("post", Key::Int(1)).set_prop("comments", Ref::Many(vec![Key::Int(11)]));
        second.node_mut("role", Key::from("standard"));

        let merged = merge_trees(&first, &second);
        let user = merged.node("user", &Key::from("u1")).unwrap();
        assert_eq!(user.props["role"], Ref::One(Key::from("standard")));
        assert_eq!(user.refs["post"], keys([1, 2]));
        assert_eq!(
            merged.node("post", &Key::Int(1)).unwrap().props["comments"],
            Ref::Many(vec![Key::Int(10), Key::Int(11)])
        );
        assert!(merged.node("role", &Key::from("standard")).is_some());

        // inputs are untouched
        assert_eq!(
            first.node("user", &Key::from("u1")).unwrap().props["role"],
            Ref::One(Key::from("admin"))
        );
        assert!(first.node("role", &Key::from("standard")).is_none());
    }
}
