mod config;
mod error;
mod format;
mod level;
mod log;

pub use config::LoggerConfig;
pub use error::LoggerError;
pub use format::LoggerFormat;
pub use level::LoggerLevel;
pub use log::LoggerHandle;

pub use tracing::subscriber::DefaultGuard;

/// Install the global subscriber described by `cfg`.
///
/// Can succeed only once per process; the returned handle adjusts the level afterwards.
pub fn logger_init(cfg: &LoggerConfig) -> Result<LoggerHandle, LoggerError> {
    match cfg.format {
        LoggerFormat::Text => log::Logger::text(cfg),
        LoggerFormat::Json => log::Logger::json(cfg),
        LoggerFormat::Journald => log::Logger::journald(cfg),
    }
}

/// Install a text subscriber for the current thread only.
///
/// Unlike [`logger_init`] this can be called any number of times, which lets tests
/// drive a [`LoggerHandle`] without owning the process-wide subscriber.
pub fn logger_scoped(cfg: &LoggerConfig) -> Result<(LoggerHandle, DefaultGuard), LoggerError> {
    log::Logger::scoped(cfg)
}
