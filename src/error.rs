use std::path::PathBuf;
use thiserror::Error;

/// Failure kinds surfaced by the engine. Each variant is distinguishable so
/// callers (HTTP layer, trainer) can map them to their own responses.
#[derive(Debug, Error)]
pub enum RecError {
    #[error("invalid interaction record: {0}")]
    InvalidRecord(String),

    #[error("invalid hyperparameter: {0}")]
    InvalidHyperparameter(String),

    #[error("interaction matrix has no non-zero entries")]
    EmptyInteractionMatrix,

    #[error("model file not found: {0}")]
    ModelNotFound(PathBuf),

    #[error("corrupt model file: {0}")]
    CorruptModel(String),

    #[error("unsupported model format version {found} (supported: {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("unknown user id {0}")]
    UnknownUser(u32),

    #[error("unknown item id {0}")]
    UnknownItem(u32),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("events file error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, RecError>;
