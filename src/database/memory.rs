//! In-memory document store.
//!
//! Keeps nodes, properties and the saved matrix in plain maps and counts
//! writes, so sessions can be previewed or exercised without SQLite.

use super::{CardStore, MatrixStore};
use crate::error::{Error, Result};
use crate::models::{
    CARD_TYPE_KEY, DifficultyMatrix, ItemVariant, Node, NodeId, PropertyMap, ReviewItem,
};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

#[derive(Default)]
pub struct MemoryStore {
    nodes: RefCell<BTreeMap<NodeId, Node>>,
    properties: RefCell<BTreeMap<NodeId, PropertyMap>>,
    saved_matrix: RefCell<Option<DifficultyMatrix>>,
    next_id: Cell<i64>,
    write_calls: Cell<usize>,
    save_calls: Cell<usize>,
    fail_writes: Cell<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a node under `parent` and returns its id.
    pub fn add_node(&self, parent: Option<NodeId>, content: &str) -> NodeId {
        let id = NodeId(self.next_id.get() + 1);
        self.next_id.set(id.0);
        self.nodes.borrow_mut().insert(
            id,
            Node {
                id,
                parent_id: parent,
                content: content.to_string(),
            },
        );
        id
    }

    /// Adds a question node with one answer child, marked as a review item.
    pub fn add_card(&self, question: &str, answer: &str, variant: ItemVariant) -> ReviewItem {
        let root = self.add_node(None, question);
        self.add_node(Some(root), answer);
        self.set_property(root, CARD_TYPE_KEY, Value::from(variant.as_str()));
        ReviewItem::new(root, variant)
    }

    pub fn set_content(&self, id: NodeId, content: &str) {
        if let Some(node) = self.nodes.borrow_mut().get_mut(&id) {
            node.content = content.to_string();
        }
    }

    pub fn set_property(&self, id: NodeId, key: &str, value: Value) {
        self.properties
            .borrow_mut()
            .entry(id)
            .or_default()
            .insert(key.to_string(), value);
    }

    pub fn properties(&self, id: NodeId) -> PropertyMap {
        self.properties
            .borrow()
            .get(&id)
            .cloned()
            .unwrap_or_default()
    }

    /// Makes every following `write_properties` call fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.set(fail);
    }

    pub fn write_count(&self) -> usize {
        self.write_calls.get()
    }

    pub fn save_count(&self) -> usize {
        self.save_calls.get()
    }

    pub fn saved_matrix(&self) -> Option<DifficultyMatrix> {
        self.saved_matrix.borrow().clone()
    }

    fn collect_descendants(&self, id: NodeId, out: &mut Vec<Node>) {
        let children: Vec<Node> = self
            .nodes
            .borrow()
            .values()
            .filter(|n| n.parent_id == Some(id))
            .cloned()
            .collect();
        for child in children {
            let child_id = child.id;
            out.push(child);
            self.collect_descendants(child_id, out);
        }
    }
}

impl CardStore for MemoryStore {
    fn fetch_node(&self, id: NodeId) -> Result<Node> {
        self.nodes
            .borrow()
            .get(&id)
            .cloned()
            .ok_or(Error::NodeNotFound(id))
    }

    fn fetch_node_and_descendants(&self, id: NodeId) -> Result<(Node, Vec<Node>)> {
        let root = self.fetch_node(id)?;
        let mut descendants = Vec::new();
        self.collect_descendants(id, &mut descendants);
        Ok((root, descendants))
    }

    fn read_properties(&self, node: &Node) -> Result<PropertyMap> {
        Ok(self.properties(node.id))
    }

    fn write_properties(&self, node: &Node, properties: &PropertyMap) -> Result<()> {
        self.write_calls.set(self.write_calls.get() + 1);
        if self.fail_writes.get() {
            return Err(Error::Io(std::io::Error::other("property write rejected")));
        }
        if !self.nodes.borrow().contains_key(&node.id) {
            return Err(Error::NodeNotFound(node.id));
        }
        let mut all = self.properties.borrow_mut();
        let stored = all.entry(node.id).or_default();
        for (key, value) in properties {
            stored.insert(key.clone(), value.clone());
        }
        Ok(())
    }
}

impl MatrixStore for MemoryStore {
    fn load_matrix(&self) -> Result<DifficultyMatrix> {
        Ok(self.saved_matrix().unwrap_or_default())
    }

    fn save_matrix(&self, matrix: &DifficultyMatrix) -> Result<()> {
        self.save_calls.set(self.save_calls.get() + 1);
        *self.saved_matrix.borrow_mut() = Some(matrix.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descendants_depth_first() {
        let store = MemoryStore::new();
        let root = store.add_node(None, "root");
        let a = store.add_node(Some(root), "a");
        store.add_node(Some(root), "b");
        store.add_node(Some(a), "a.1");

        let (node, descendants) = store.fetch_node_and_descendants(root).unwrap();
        assert_eq!(node.content, "root");
        let contents: Vec<_> = descendants.iter().map(|n| n.content.as_str()).collect();
        assert_eq!(contents, vec!["a", "a.1", "b"]);
    }

    #[test]
    fn test_write_merges_keys() {
        let store = MemoryStore::new();
        let item = store.add_card("q", "a", ItemVariant::Sided);
        let node = store.fetch_node(item.node_id()).unwrap();

        let mut props = PropertyMap::new();
        props.insert("card-repeats".into(), Value::from(2));
        store.write_properties(&node, &props).unwrap();

        let stored = store.read_properties(&node).unwrap();
        assert_eq!(stored["card-repeats"], Value::from(2));
        assert_eq!(stored[CARD_TYPE_KEY], Value::from("sided"));
        assert_eq!(store.write_count(), 1);
    }

    #[test]
    fn test_failed_write_leaves_properties() {
        let store = MemoryStore::new();
        let item = store.add_card("q", "a", ItemVariant::Sided);
        let node = store.fetch_node(item.node_id()).unwrap();
        store.set_fail_writes(true);

        let mut props = PropertyMap::new();
        props.insert("card-repeats".into(), Value::from(2));
        assert!(store.write_properties(&node, &props).is_err());
        assert!(!store.properties(node.id).contains_key("card-repeats"));
    }
}
