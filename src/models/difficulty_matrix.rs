//! Difficulty matrix for the SM-5 scheduler.
//!
//! Maps a `(repetitions, easiness factor)` pair to a learned optimal factor.
//! The scheduler never mutates a matrix in place: it returns an updated copy and
//! the review session commits that copy into the shared value after a successful
//! score. The shared value is flushed to durable storage when a session completes.

use crate::database::MatrixStore;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Process-wide matrix handle owned by the review coordinator.
pub type SharedMatrix = Arc<Mutex<DifficultyMatrix>>;

/// Lookup key. The easiness factor is compared by its exact bit pattern, so
/// `2.5` and `2.5000000000000004` are distinct rows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct MatrixKey {
    repetitions: u32,
    ef_bits: u64,
}

impl MatrixKey {
    fn new(repetitions: u32, easiness_factor: f64) -> Self {
        Self {
            repetitions,
            ef_bits: easiness_factor.to_bits(),
        }
    }

    fn easiness_factor(&self) -> f64 {
        f64::from_bits(self.ef_bits)
    }
}

/// One stored row, used for the JSON and SQLite representations.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatrixEntry {
    pub repetitions: u32,
    pub easiness_factor: f64,
    pub optimal_factor: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(into = "Vec<MatrixEntry>", from = "Vec<MatrixEntry>")]
pub struct DifficultyMatrix {
    entries: BTreeMap<MatrixKey, f64>,
}

impl DifficultyMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, repetitions: u32, easiness_factor: f64) -> Option<f64> {
        self.entries
            .get(&MatrixKey::new(repetitions, easiness_factor))
            .copied()
    }

    pub fn insert(&mut self, repetitions: u32, easiness_factor: f64, optimal_factor: f64) {
        self.entries
            .insert(MatrixKey::new(repetitions, easiness_factor), optimal_factor);
    }

    /// Returns a copy of this matrix with one entry replaced.
    pub fn with_entry(&self, repetitions: u32, easiness_factor: f64, optimal_factor: f64) -> Self {
        let mut next = self.clone();
        next.insert(repetitions, easiness_factor, optimal_factor);
        next
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> Vec<MatrixEntry> {
        self.entries
            .iter()
            .map(|(key, &optimal_factor)| MatrixEntry {
                repetitions: key.repetitions,
                easiness_factor: key.easiness_factor(),
                optimal_factor,
            })
            .collect()
    }

    /// Wraps the matrix for sharing between the coordinator and its sessions.
    pub fn into_shared(self) -> SharedMatrix {
        Arc::new(Mutex::new(self))
    }

    /// Loads the matrix from durable storage, falling back to an empty matrix.
    ///
    /// A failed load is not fatal: scheduling still works through the
    /// fallback optimal factors, only less tuned.
    pub fn load_or_empty(store: &dyn MatrixStore) -> Self {
        match store.load_matrix() {
            Ok(matrix) => {
                debug!(entries = matrix.len(), "Loaded difficulty matrix");
                matrix
            }
            Err(e) => {
                warn!("Failed to load difficulty matrix, starting empty: {}", e);
                Self::new()
            }
        }
    }
}

impl From<Vec<MatrixEntry>> for DifficultyMatrix {
    fn from(rows: Vec<MatrixEntry>) -> Self {
        let mut matrix = Self::new();
        for row in rows {
            matrix.insert(row.repetitions, row.easiness_factor, row.optimal_factor);
        }
        matrix
    }
}

impl From<DifficultyMatrix> for Vec<MatrixEntry> {
    fn from(matrix: DifficultyMatrix) -> Self {
        matrix.entries()
    }
}

/// Returns a copy of the shared matrix.
pub fn snapshot(shared: &SharedMatrix) -> Result<DifficultyMatrix> {
    shared
        .lock()
        .map(|guard| guard.clone())
        .map_err(|_| Error::LockPoisoned)
}

/// Replaces the shared matrix with `next`.
pub fn commit(shared: &SharedMatrix, next: DifficultyMatrix) -> Result<()> {
    let mut guard = shared.lock().map_err(|_| Error::LockPoisoned)?;
    *guard = next;
    Ok(())
}

/// Writes the current in-memory matrix to durable storage.
pub fn flush(shared: &SharedMatrix, store: &dyn MatrixStore) -> Result<()> {
    let matrix = snapshot(shared)?;
    store.save_matrix(&matrix)?;
    debug!(entries = matrix.len(), "Flushed difficulty matrix");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_missing_entry() {
        let matrix = DifficultyMatrix::new();
        assert_eq!(matrix.get(1, 2.5), None);
        assert!(matrix.is_empty());
    }

    #[test]
    fn test_with_entry_leaves_original_untouched() {
        let original = DifficultyMatrix::new().with_entry(2, 2.5, 2.59);
        let updated = original.with_entry(3, 2.6, 2.69);

        assert_eq!(original.len(), 1);
        assert_eq!(updated.len(), 2);
        assert_eq!(updated.get(2, 2.5), Some(2.59));
        assert_eq!(updated.get(3, 2.6), Some(2.69));
        assert_eq!(original.get(3, 2.6), None);
    }

    #[test]
    fn test_keys_compare_exact_easiness_factor() {
        let matrix = DifficultyMatrix::new().with_entry(0, 1.7000000000000002, 3.44);
        assert_eq!(matrix.get(0, 1.7000000000000002), Some(3.44));
        assert_eq!(matrix.get(0, 1.7), None);
    }

    #[test]
    fn test_json_shape() {
        let matrix = DifficultyMatrix::new().with_entry(1, 2.5, 4.0);
        let json = serde_json::to_value(&matrix).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                {"repetitions": 1, "easiness_factor": 2.5, "optimal_factor": 4.0}
            ])
        );

        let back: DifficultyMatrix = serde_json::from_value(json).unwrap();
        assert_eq!(back, matrix);
    }

    #[test]
    fn test_commit_and_snapshot() {
        let shared = DifficultyMatrix::new().into_shared();
        commit(&shared, DifficultyMatrix::new().with_entry(2, 2.5, 2.5)).unwrap();
        assert_eq!(snapshot(&shared).unwrap().get(2, 2.5), Some(2.5));
    }
}
