use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("unknown application kind: {0}")]
    UnknownApplicationKind(String),
    #[error("unknown lifecycle status: {0}")]
    UnknownStatus(String),
    #[error("invalid pod reference: {0}")]
    InvalidPodReference(String),
}
