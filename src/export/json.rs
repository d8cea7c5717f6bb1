//! JSON persistence for the difficulty matrix.
//! Provides a file-backed matrix store and import/export of matrix snapshots.

use crate::database::MatrixStore;
use crate::error::Result;
use crate::models::DifficultyMatrix;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Exports a matrix to a JSON file at the specified path.
pub fn export_matrix_to_path(matrix: &DifficultyMatrix, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json_string = serde_json::to_string_pretty(matrix)?;
    fs::write(path, json_string)?;
    Ok(())
}

/// Imports a matrix from a JSON file.
/// Returns an error if the file doesn't exist or contains invalid JSON.
pub fn import_matrix(path: &Path) -> Result<DifficultyMatrix> {
    let contents = fs::read_to_string(path)?;
    let matrix: DifficultyMatrix = serde_json::from_str(&contents)?;

    info!(
        "Difficulty matrix with {} entries imported from '{}'",
        matrix.len(),
        path.display()
    );
    Ok(matrix)
}

/// Matrix store backed by a single JSON file.
/// A missing file loads as an empty matrix.
pub struct JsonMatrixFile {
    path: PathBuf,
}

impl JsonMatrixFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl MatrixStore for JsonMatrixFile {
    fn load_matrix(&self) -> Result<DifficultyMatrix> {
        if !self.path.exists() {
            return Ok(DifficultyMatrix::new());
        }
        let contents = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    fn save_matrix(&self, matrix: &DifficultyMatrix) -> Result<()> {
        export_matrix_to_path(matrix, &self.path)
    }
}
