use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("{0:?} is not a log format")]
    InvalidFormat(String),
    #[error("journald output needs linux and the `journald` feature")]
    JournaldNotSupported,
    #[error("a global subscriber is already installed")]
    AlreadyInitialized,
    #[error("subscriber setup failed: {0}")]
    InitializationFailed(String),
    #[error("invalid log filter {0:?}")]
    InvalidLogLevel(String),
    #[error("cannot swap log filter: {0}")]
    ReloadFailed(String),
}
