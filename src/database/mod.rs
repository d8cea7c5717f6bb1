//! Collaborator contracts the review core depends on, and their implementations.
//!
//! The core never talks to storage directly: item nodes and their properties
//! come through [`CardStore`], the difficulty matrix through [`MatrixStore`].

pub mod db;
#[cfg(test)]
pub mod memory;

use crate::error::Result;
use crate::models::{DifficultyMatrix, Node, NodeId, PropertyMap};

pub use db::SqliteStore;
#[cfg(test)]
pub use memory::MemoryStore;

/// Document store holding item nodes and their properties.
pub trait CardStore {
    fn fetch_node(&self, id: NodeId) -> Result<Node>;

    /// The node and all of its descendants, depth-first in document order.
    fn fetch_node_and_descendants(&self, id: NodeId) -> Result<(Node, Vec<Node>)>;

    fn read_properties(&self, node: &Node) -> Result<PropertyMap>;

    /// Writes exactly the given keys, leaving other properties untouched.
    fn write_properties(&self, node: &Node, properties: &PropertyMap) -> Result<()>;
}

/// Durable storage for the difficulty matrix.
pub trait MatrixStore {
    fn load_matrix(&self) -> Result<DifficultyMatrix>;

    fn save_matrix(&self, matrix: &DifficultyMatrix) -> Result<()>;
}
