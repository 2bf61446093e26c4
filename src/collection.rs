//! Shared item collections.
//!
//! The loader appends into a collection and the optimistic mutator edits the
//! same collection in place, so both operate on one shared, lock-guarded
//! `Vec<Item>` registered under a collection key. Item identity is always the
//! stable `id` field, never the position in the vector.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::lock::{rw_read, rw_write};

const SOURCE: &str = "collection";

/// An opaque application record with a stable identity.
///
/// Every field other than `id` is carried as loosely-typed JSON so the data
/// layer stays agnostic of the host's record shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Item {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: Map::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Read a field as an integer, if present and numeric.
    pub fn number(&self, name: &str) -> Option<i64> {
        self.fields.get(name).and_then(Value::as_i64)
    }

    /// Read a field as a boolean, if present.
    pub fn flag(&self, name: &str) -> Option<bool> {
        self.fields.get(name).and_then(Value::as_bool)
    }
}

/// Shared handle to one collection's items.
pub type CollectionHandle = Arc<RwLock<Vec<Item>>>;

/// Named registry of shared item collections.
///
/// Collections are registered by the host (usually with the handle a loader
/// exposes) and looked up by the mutator per mutation.
#[derive(Default)]
pub struct ItemCollections {
    collections: RwLock<HashMap<String, CollectionHandle>>,
}

impl ItemCollections {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a collection handle under a key, replacing any previous one.
    pub fn register(&self, key: impl Into<String>, handle: CollectionHandle) {
        rw_write(&self.collections, SOURCE, "register").insert(key.into(), handle);
    }

    /// Create, register, and return an empty collection.
    pub fn create(&self, key: impl Into<String>) -> CollectionHandle {
        let handle: CollectionHandle = Arc::new(RwLock::new(Vec::new()));
        self.register(key, handle.clone());
        handle
    }

    /// Look up a registered collection.
    pub fn handle(&self, key: &str) -> Option<CollectionHandle> {
        rw_read(&self.collections, SOURCE, "handle").get(key).cloned()
    }

    /// Snapshot one item by id, cloning it out of the collection.
    pub fn find_item(&self, key: &str, item_id: &str) -> Option<Item> {
        let handle = self.handle(key)?;
        let items = rw_read(&handle, SOURCE, "find_item");
        items.iter().find(|item| item.id == item_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn item_field_accessors() {
        let item = Item::new("post-1")
            .with_field("likes", json!(10))
            .with_field("liked", json!(false))
            .with_field("title", json!("hello"));

        assert_eq!(item.number("likes"), Some(10));
        assert_eq!(item.flag("liked"), Some(false));
        assert_eq!(item.field("title"), Some(&json!("hello")));
        assert!(item.field("missing").is_none());
        assert!(item.number("title").is_none());
    }

    #[test]
    fn item_serde_flattens_fields() {
        let item: Item =
            serde_json::from_value(json!({"id": "a", "likes": 3, "liked": true})).expect("item");
        assert_eq!(item.id, "a");
        assert_eq!(item.number("likes"), Some(3));

        let round = serde_json::to_value(&item).expect("value");
        assert_eq!(round, json!({"id": "a", "likes": 3, "liked": true}));
    }

    #[test]
    fn register_and_find() {
        let collections = ItemCollections::new();
        let handle = collections.create("feed");

        handle
            .write()
            .expect("collection lock")
            .push(Item::new("post-1").with_field("likes", json!(1)));

        let found = collections.find_item("feed", "post-1").expect("item");
        assert_eq!(found.number("likes"), Some(1));

        assert!(collections.find_item("feed", "post-2").is_none());
        assert!(collections.find_item("other", "post-1").is_none());
    }

    #[test]
    fn identity_is_by_id_not_position() {
        let collections = ItemCollections::new();
        let handle = collections.create("feed");

        {
            let mut items = handle.write().expect("collection lock");
            items.push(Item::new("b"));
            items.push(Item::new("a"));
        }

        let found = collections.find_item("feed", "a").expect("item");
        assert_eq!(found.id, "a");
    }
}
