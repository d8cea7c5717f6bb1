//! Review items and what each of them shows per reveal phase.
//!
//! Two variants share the same payload, a reference to the backing node:
//! - Sided: the question phase shows the root node only, the answer phase adds its descendants
//! - Cloze: both phases show the whole subtree; the question phase asks the
//!   renderer to mask cloze spans

use super::item_properties::{CARD_TYPE_KEY, PropertyMap};
use super::{Node, NodeId};
use crate::database::CardStore;
use crate::error::Result;
use serde_json::Value;

/// Reveal stage of the item under review.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Question,
    Answer,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ItemVariant {
    Sided,
    Cloze,
}

impl ItemVariant {
    /// Unknown or missing markers fall back to `Sided`.
    pub fn from_marker(marker: Option<&str>) -> Self {
        match marker.map(str::trim) {
            Some(m) if m.eq_ignore_ascii_case("cloze") => ItemVariant::Cloze,
            _ => ItemVariant::Sided,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ItemVariant::Sided => "sided",
            ItemVariant::Cloze => "cloze",
        }
    }
}

/// Rendering hints handed to the renderer with the revealed nodes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DisplayConfig {
    pub mask_cloze: bool,
}

/// Content to render for one phase.
#[derive(Clone, Debug, PartialEq)]
pub struct Reveal {
    pub root: Node,
    pub descendants: Vec<Node>,
    pub config: DisplayConfig,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReviewItem {
    Sided(NodeId),
    Cloze(NodeId),
}

impl ReviewItem {
    pub fn new(id: NodeId, variant: ItemVariant) -> Self {
        match variant {
            ItemVariant::Sided => ReviewItem::Sided(id),
            ItemVariant::Cloze => ReviewItem::Cloze(id),
        }
    }

    pub fn from_type_marker(id: NodeId, marker: Option<&str>) -> Self {
        Self::new(id, ItemVariant::from_marker(marker))
    }

    /// Builds the item from the node's stored properties.
    pub fn from_properties(id: NodeId, properties: &PropertyMap) -> Self {
        let marker = properties.get(CARD_TYPE_KEY).and_then(Value::as_str);
        Self::from_type_marker(id, marker)
    }

    pub fn variant(&self) -> ItemVariant {
        match self {
            ReviewItem::Sided(_) => ItemVariant::Sided,
            ReviewItem::Cloze(_) => ItemVariant::Cloze,
        }
    }

    pub fn node_id(&self) -> NodeId {
        match *self {
            ReviewItem::Sided(id) | ReviewItem::Cloze(id) => id,
        }
    }

    /// Fetches the backing node. Always a fresh read; nodes may change
    /// in the background between calls.
    pub fn node(&self, store: &dyn CardStore) -> Result<Node> {
        store.fetch_node(self.node_id())
    }

    pub fn display_config(&self, phase: Phase) -> DisplayConfig {
        match (self, phase) {
            (ReviewItem::Cloze(_), Phase::Question) => DisplayConfig { mask_cloze: true },
            _ => DisplayConfig::default(),
        }
    }

    pub fn reveal(&self, phase: Phase, store: &dyn CardStore) -> Result<Reveal> {
        let config = self.display_config(phase);
        match (self, phase) {
            (ReviewItem::Sided(_), Phase::Question) => Ok(Reveal {
                root: self.node(store)?,
                descendants: Vec::new(),
                config,
            }),
            _ => {
                let (root, descendants) = store.fetch_node_and_descendants(self.node_id())?;
                Ok(Reveal {
                    root,
                    descendants,
                    config,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;
    use serde_json::json;

    fn store_with_card() -> (MemoryStore, NodeId) {
        let store = MemoryStore::new();
        let root = store.add_node(None, "What is the capital of {{cloze Poland}}?");
        store.add_node(Some(root), "Warsaw");
        (store, root)
    }

    #[test]
    fn test_variant_dispatch() {
        let id = NodeId(1);
        assert_eq!(ReviewItem::from_type_marker(id, Some("cloze")), ReviewItem::Cloze(id));
        assert_eq!(ReviewItem::from_type_marker(id, Some("sided")), ReviewItem::Sided(id));
        assert_eq!(ReviewItem::from_type_marker(id, Some("reverse")), ReviewItem::Sided(id));
        assert_eq!(ReviewItem::from_type_marker(id, None), ReviewItem::Sided(id));

        let mut props = PropertyMap::new();
        props.insert(CARD_TYPE_KEY.to_string(), json!("cloze"));
        assert_eq!(ReviewItem::from_properties(id, &props).variant(), ItemVariant::Cloze);
    }

    #[test]
    fn test_sided_reveal() {
        let (store, root) = store_with_card();
        let item = ReviewItem::Sided(root);

        let question = item.reveal(Phase::Question, &store).unwrap();
        assert_eq!(question.root.id, root);
        assert!(question.descendants.is_empty());
        assert_eq!(question.config, DisplayConfig::default());

        let answer = item.reveal(Phase::Answer, &store).unwrap();
        assert_eq!(answer.descendants.len(), 1);
        assert_eq!(answer.descendants[0].content, "Warsaw");
        assert_eq!(answer.config, DisplayConfig::default());
    }

    #[test]
    fn test_cloze_reveal() {
        let (store, root) = store_with_card();
        let item = ReviewItem::Cloze(root);

        let question = item.reveal(Phase::Question, &store).unwrap();
        let answer = item.reveal(Phase::Answer, &store).unwrap();
        assert_eq!(question.root, answer.root);
        assert_eq!(question.descendants, answer.descendants);
        assert!(question.config.mask_cloze);
        assert!(!answer.config.mask_cloze);
    }

    #[test]
    fn test_node_is_fetched_fresh() {
        let (store, root) = store_with_card();
        let item = ReviewItem::Sided(root);
        assert_eq!(item.node(&store).unwrap().content, "What is the capital of {{cloze Poland}}?");

        store.set_content(root, "Edited in the background");
        assert_eq!(item.node(&store).unwrap().content, "Edited in the background");
    }

    #[test]
    fn test_missing_node() {
        let store = MemoryStore::new();
        assert!(ReviewItem::Sided(NodeId(42)).node(&store).is_err());
    }
}
