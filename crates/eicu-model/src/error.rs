use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("patient id must not be empty")]
    EmptyPatientId,
    #[error("unknown code type: {0}")]
    UnknownCodeType(String),
    #[error("expected '0' or '1' for a flag, got '{0}'")]
    InvalidFlag(String),
    #[error("malformed tuple line '{line}': {reason}")]
    MalformedTuple { line: String, reason: String },
}

pub type Result<T> = std::result::Result<T, ModelError>;
