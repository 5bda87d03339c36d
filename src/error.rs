//! Error types for the Trainz exporter.
//!
//! Problems found in the scene are not errors: they are recorded as
//! [`Diagnostic`](crate::diagnostics::Diagnostic)s. `ExportError` covers the
//! failures that stop a run outright.

use thiserror::Error;

/// Result type alias using ExportError.
pub type Result<T> = std::result::Result<T, ExportError>;

/// Main error type for export operations.
#[derive(Error, Debug)]
pub enum ExportError {
    /// I/O error while reading the scene or writing the output document.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse a JSON scene snapshot.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The scene snapshot is internally inconsistent.
    #[error("Invalid scene: {0}")]
    InvalidScene(String),

    /// The scene collaborator refused or failed an edit operation.
    #[error("Scene edit failed: {0}")]
    SceneEdit(String),
}
