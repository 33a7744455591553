//! Error types for the pipeline stages.

use std::path::{Path, PathBuf};

use thiserror::Error;

use eicu_ingest::IngestError;
use eicu_model::CodeIndex;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error("failed to read {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {message}")]
    Csv { path: PathBuf, message: String },

    #[error("invalid dictionary {path} at line {line}: {reason}")]
    InvalidDictionary {
        path: PathBuf,
        line: u64,
        reason: String,
    },

    #[error("duplicate code index {index} in {path}")]
    DuplicateIndex { path: PathBuf, index: CodeIndex },

    #[error("no dictionary files found in {path}")]
    NoDictionaryFiles { path: PathBuf },

    #[error("malformed partial file {path} at line {line}: {reason}")]
    MalformedPartial {
        path: PathBuf,
        line: u64,
        reason: String,
    },

    #[error("invalid configuration {path}: {message}")]
    Config { path: PathBuf, message: String },

    #[error("failed to write report {path}: {message}")]
    Report { path: PathBuf, message: String },
}

impl CoreError {
    pub(crate) fn from_csv_read(path: &Path, error: csv::Error) -> Self {
        let message = error.to_string();
        match error.into_kind() {
            csv::ErrorKind::Io(source) => CoreError::FileRead {
                path: path.to_path_buf(),
                source,
            },
            _ => CoreError::Csv {
                path: path.to_path_buf(),
                message,
            },
        }
    }

    pub(crate) fn from_csv_write(path: &Path, error: csv::Error) -> Self {
        let message = error.to_string();
        match error.into_kind() {
            csv::ErrorKind::Io(source) => CoreError::FileWrite {
                path: path.to_path_buf(),
                source,
            },
            _ => CoreError::Csv {
                path: path.to_path_buf(),
                message,
            },
        }
    }

    pub(crate) fn write(path: &Path, source: std::io::Error) -> Self {
        CoreError::FileWrite {
            path: path.to_path_buf(),
            source,
        }
    }

    /// True for failures of the file system rather than of file contents.
    pub fn is_io(&self) -> bool {
        match self {
            CoreError::Ingest(inner) => inner.is_io(),
            CoreError::FileRead { .. }
            | CoreError::FileWrite { .. }
            | CoreError::CreateDir { .. } => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

/// Failures of dictionary revision, split by whether a rerun could help.
#[derive(Debug, Error)]
pub enum RevisionError {
    #[error("failed to read tuples: {0}")]
    Read(#[from] IngestError),

    #[error("failed to load dictionary: {0}")]
    Dictionary(#[source] CoreError),

    #[error("unexpected tuple header in {path}: {found}")]
    TupleHeader { path: PathBuf, found: String },

    #[error("malformed tuple in {path} at line {line}: {reason}")]
    MalformedTuple {
        path: PathBuf,
        line: u64,
        reason: String,
    },

    #[error("failed to write revision output: {0}")]
    Write(#[source] CoreError),

    #[error("revision failed ({revision}) and copying {path} failed: {source}")]
    FallbackFailed {
        revision: Box<RevisionError>,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RevisionError {
    /// Systemic failures mean the inputs disagree with each other and a rerun
    /// will fail the same way. I/O failures are transient.
    pub fn is_systemic(&self) -> bool {
        match self {
            RevisionError::Read(inner) => !inner.is_io(),
            RevisionError::Dictionary(inner) | RevisionError::Write(inner) => !inner.is_io(),
            RevisionError::TupleHeader { .. } | RevisionError::MalformedTuple { .. } => true,
            RevisionError::FallbackFailed { revision, .. } => revision.is_systemic(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_failures_are_transient() {
        let err = RevisionError::Read(IngestError::FileNotFound {
            path: PathBuf::from("records/tuples.csv"),
        });
        assert!(!err.is_systemic());
        let err = RevisionError::Dictionary(CoreError::FileRead {
            path: PathBuf::from("code_dict.csv"),
            source: std::io::Error::other("disk gone"),
        });
        assert!(!err.is_systemic());
    }

    #[test]
    fn content_mismatches_are_systemic() {
        let err = RevisionError::TupleHeader {
            path: PathBuf::from("tuples.csv"),
            found: "a,b".to_string(),
        };
        assert!(err.is_systemic());
        let err = RevisionError::Read(IngestError::Csv {
            path: PathBuf::from("tuples.csv"),
            message: "found record with 3 fields".to_string(),
        });
        assert!(err.is_systemic());
        let err = RevisionError::Dictionary(CoreError::DuplicateIndex {
            path: PathBuf::from("code_dict.csv"),
            index: 4,
        });
        assert!(err.is_systemic());
    }
}
