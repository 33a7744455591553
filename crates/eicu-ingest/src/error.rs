//! Error types for eICU source ingestion.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while reading source tables.
#[derive(Debug, Error)]
pub enum IngestError {
    // === File System Errors ===
    /// Directory not found or not readable.
    #[error("directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    /// Failed to read directory entries.
    #[error("failed to read directory {path}: {source}")]
    DirectoryRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// CSV file not found.
    #[error("CSV file not found: {path}")]
    FileNotFound { path: PathBuf },

    /// Failed to read file.
    #[error("failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // === CSV Errors ===
    /// Malformed CSV content.
    #[error("failed to parse CSV {path}: {message}")]
    Csv { path: PathBuf, message: String },

    /// Required column not found in the header.
    #[error("required column '{column}' not found in {path}")]
    MissingColumn { column: String, path: PathBuf },

    /// A typed field could not be parsed.
    #[error("invalid {column} value '{value}' at {path}:{line}")]
    InvalidField {
        path: PathBuf,
        line: u64,
        column: String,
        value: String,
    },
}

impl IngestError {
    /// True for file system failures as opposed to bad file contents.
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            IngestError::DirectoryNotFound { .. }
                | IngestError::DirectoryRead { .. }
                | IngestError::FileNotFound { .. }
                | IngestError::FileRead { .. }
        )
    }

    pub(crate) fn from_csv(path: &std::path::Path, error: csv::Error) -> Self {
        let message = error.to_string();
        match error.into_kind() {
            csv::ErrorKind::Io(source) => IngestError::FileRead {
                path: path.to_path_buf(),
                source,
            },
            _ => IngestError::Csv {
                path: path.to_path_buf(),
                message,
            },
        }
    }
}

/// Result type for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestError>;
