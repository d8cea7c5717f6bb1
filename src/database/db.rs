//! SQLite document store
//!
//! Handles database initialization, node and property storage for review items,
//! the persisted difficulty matrix, and the simulated current date.

use super::{CardStore, MatrixStore};
use crate::error::{Error, Result};
use crate::models::{
    CARD_TYPE_KEY, DifficultyMatrix, ItemProperties, ItemVariant, MatrixEntry, Node, NodeId,
    PropertyMap, ReviewItem,
};
use chrono::{DateTime, Duration, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

const SCHEMA: &str = "
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS nodes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        parent_id INTEGER,
        position INTEGER NOT NULL DEFAULT 0,
        content TEXT NOT NULL,
        FOREIGN KEY (parent_id) REFERENCES nodes(id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS node_properties (
        node_id INTEGER NOT NULL,
        key TEXT NOT NULL,
        value TEXT NOT NULL,
        PRIMARY KEY (node_id, key),
        FOREIGN KEY (node_id) REFERENCES nodes(id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS difficulty_matrix (
        repetitions INTEGER NOT NULL,
        easiness_factor REAL NOT NULL,
        optimal_factor REAL NOT NULL,
        PRIMARY KEY (repetitions, easiness_factor)
    );

    CREATE TABLE IF NOT EXISTS app_state (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );
";

/// Document store backed by a single SQLite connection.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (or creates) the database file and ensures the schema exists.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let store = Self::init(Connection::open(path)?)?;
        info!("Opened review database at {}", path.display());
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;

        // Initialize current_date if not exists
        conn.execute(
            "INSERT OR IGNORE INTO app_state (key, value) VALUES ('current_date', ?1)",
            params![Utc::now().timestamp().to_string()],
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| Error::LockPoisoned)
    }

    /// Retrieves the simulated current date
    pub fn get_current_date(&self) -> Result<DateTime<Utc>> {
        let timestamp: String = self.conn()?.query_row(
            "SELECT value FROM app_state WHERE key = 'current_date'",
            [],
            |row| row.get(0),
        )?;

        let secs = timestamp.parse::<i64>().unwrap_or(0);
        Ok(DateTime::from_timestamp(secs, 0).unwrap_or_default())
    }

    /// Advances the current date by 24 hours (for trying out schedules)
    pub fn advance_day(&self) -> Result<DateTime<Utc>> {
        let next_day = self.get_current_date()? + Duration::days(1);
        self.conn()?.execute(
            "UPDATE app_state SET value = ?1 WHERE key = 'current_date'",
            params![next_day.timestamp().to_string()],
        )?;
        Ok(next_day)
    }

    /// Appends a node as the last child of `parent` (or as a new top-level node)
    pub fn add_node(&self, parent: Option<NodeId>, content: &str) -> Result<NodeId> {
        let conn = self.conn()?;
        let parent_id = parent.map(|p| p.0);
        let position: i64 = conn.query_row(
            "SELECT COALESCE(MAX(position) + 1, 0) FROM nodes WHERE parent_id IS ?1",
            params![parent_id],
            |row| row.get(0),
        )?;
        conn.execute(
            "INSERT INTO nodes (parent_id, position, content) VALUES (?1, ?2, ?3)",
            params![parent_id, position, content],
        )?;
        Ok(NodeId(conn.last_insert_rowid()))
    }

    /// Creates a card: a question node marked with its type and one answer child
    pub fn add_card(
        &self,
        question: &str,
        answer: &str,
        variant: ItemVariant,
    ) -> Result<ReviewItem> {
        let root = self.add_node(None, question)?;
        if !answer.is_empty() {
            self.add_node(Some(root), answer)?;
        }

        let mut marker = PropertyMap::new();
        marker.insert(CARD_TYPE_KEY.to_string(), Value::from(variant.as_str()));
        let node = self.fetch_node(root)?;
        self.write_properties(&node, &marker)?;

        debug!("Added {} card {}", variant.as_str(), root);
        Ok(ReviewItem::new(root, variant))
    }

    /// All nodes carrying a type marker, in creation order
    pub fn list_cards(&self) -> Result<Vec<(ReviewItem, Node)>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT n.id, n.parent_id, n.content, p.value
             FROM nodes n
             JOIN node_properties p ON p.node_id = n.id AND p.key = ?1
             ORDER BY n.id ASC",
        )?;

        let cards = stmt
            .query_map(params![CARD_TYPE_KEY], |row| {
                let id = NodeId(row.get(0)?);
                let marker: String = row.get(3)?;
                Ok((
                    id,
                    Node {
                        id,
                        parent_id: row.get::<_, Option<i64>>(1)?.map(NodeId),
                        content: row.get(2)?,
                    },
                    marker,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(cards
            .into_iter()
            .map(|(id, node, marker)| {
                let mut properties = PropertyMap::new();
                if let Ok(value) = serde_json::from_str::<Value>(&marker) {
                    properties.insert(CARD_TYPE_KEY.to_string(), value);
                }
                (ReviewItem::from_properties(id, &properties), node)
            })
            .collect())
    }

    /// Cards due at `now`, never-scheduled ones first, then oldest schedule first
    pub fn due_items(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<ReviewItem>> {
        let mut due = Vec::new();
        for (item, node) in self.list_cards()? {
            let props = ItemProperties::from_map(&self.read_properties(&node)?);
            if props.is_due(now) {
                due.push((props.next_scheduled_at, item));
            }
        }
        due.sort_by_key(|(at, _)| *at);
        Ok(due.into_iter().take(limit).map(|(_, item)| item).collect())
    }
}

impl CardStore for SqliteStore {
    fn fetch_node(&self, id: NodeId) -> Result<Node> {
        self.conn()?
            .query_row(
                "SELECT id, parent_id, content FROM nodes WHERE id = ?1",
                params![id.0],
                |row| {
                    Ok(Node {
                        id: NodeId(row.get(0)?),
                        parent_id: row.get::<_, Option<i64>>(1)?.map(NodeId),
                        content: row.get(2)?,
                    })
                },
            )
            .optional()?
            .ok_or(Error::NodeNotFound(id))
    }

    fn fetch_node_and_descendants(&self, id: NodeId) -> Result<(Node, Vec<Node>)> {
        let root = self.fetch_node(id)?;

        // Sort keys are zero-padded (position, id) paths, so a parent sorts
        // right before its own subtree.
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "WITH RECURSIVE subtree(id, parent_id, content, sort_key) AS (
                SELECT id, parent_id, content, printf('%010d.%010d', position, id)
                FROM nodes WHERE parent_id = ?1
                UNION ALL
                SELECT n.id, n.parent_id, n.content,
                       s.sort_key || '/' || printf('%010d.%010d', n.position, n.id)
                FROM nodes n JOIN subtree s ON n.parent_id = s.id
            )
            SELECT id, parent_id, content FROM subtree ORDER BY sort_key",
        )?;

        let descendants = stmt
            .query_map(params![id.0], |row| {
                Ok(Node {
                    id: NodeId(row.get(0)?),
                    parent_id: row.get::<_, Option<i64>>(1)?.map(NodeId),
                    content: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok((root, descendants))
    }

    fn read_properties(&self, node: &Node) -> Result<PropertyMap> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT key, value FROM node_properties WHERE node_id = ?1")?;
        let rows = stmt
            .query_map(params![node.id.0], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut properties = PropertyMap::new();
        for (key, raw) in rows {
            match serde_json::from_str(&raw) {
                Ok(value) => {
                    properties.insert(key, value);
                }
                Err(e) => warn!("Ignoring unreadable property {} on {}: {}", key, node.id, e),
            }
        }
        Ok(properties)
    }

    fn write_properties(&self, node: &Node, properties: &PropertyMap) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM nodes WHERE id = ?1)",
            params![node.id.0],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(Error::NodeNotFound(node.id));
        }

        for (key, value) in properties {
            tx.execute(
                "INSERT INTO node_properties (node_id, key, value) VALUES (?1, ?2, ?3)
                 ON CONFLICT(node_id, key) DO UPDATE SET value = excluded.value",
                params![node.id.0, key, serde_json::to_string(value)?],
            )?;
        }

        tx.commit()?;
        Ok(())
    }
}

impl MatrixStore for SqliteStore {
    fn load_matrix(&self) -> Result<DifficultyMatrix> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT repetitions, easiness_factor, optimal_factor FROM difficulty_matrix",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(MatrixEntry {
                    repetitions: row.get(0)?,
                    easiness_factor: row.get(1)?,
                    optimal_factor: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(DifficultyMatrix::from(rows))
    }

    fn save_matrix(&self, matrix: &DifficultyMatrix) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM difficulty_matrix", [])?;
        for entry in matrix.entries() {
            tx.execute(
                "INSERT INTO difficulty_matrix (repetitions, easiness_factor, optimal_factor)
                 VALUES (?1, ?2, ?3)",
                params![entry.repetitions, entry.easiness_factor, entry.optimal_factor],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}
