use time::{UtcOffset, format_description::well_known::Rfc3339};
use tracing::{Subscriber, subscriber::DefaultGuard};
use tracing_subscriber::{
    EnvFilter, Registry, fmt, fmt::time::OffsetTime, layer::SubscriberExt, reload,
    util::SubscriberInitExt,
};

use crate::logger::{config::LoggerConfig, error::LoggerError, level::LoggerLevel};

/// Handle to the installed subscriber's level filter.
#[derive(Clone)]
pub struct LoggerHandle {
    filter: reload::Handle<EnvFilter, Registry>,
}

impl LoggerHandle {
    /// Replace the active filter; takes effect for every subsequent event.
    pub fn set_level(&self, level: &LoggerLevel) -> Result<(), LoggerError> {
        let filter = mk_filter(level)?;
        self.filter
            .reload(filter)
            .map_err(|e| LoggerError::ReloadFailed(e.to_string()))
    }
}

pub struct Logger;

impl Logger {
    pub fn text(cfg: &LoggerConfig) -> Result<LoggerHandle, LoggerError> {
        let (filter, handle) = reload::Layer::new(mk_filter(&cfg.level)?);
        let fmt_layer = fmt::layer()
            .with_ansi(cfg.use_color)
            .with_target(cfg.with_targets)
            .with_timer(mk_timer());

        let subscriber = tracing_subscriber::registry().with(filter).with(fmt_layer);
        init_with(subscriber)?;
        Ok(LoggerHandle { filter: handle })
    }

    pub fn json(cfg: &LoggerConfig) -> Result<LoggerHandle, LoggerError> {
        let (filter, handle) = reload::Layer::new(mk_filter(&cfg.level)?);
        let fmt_layer = fmt::layer()
            .json()
            .with_ansi(false)
            .with_target(cfg.with_targets)
            .with_current_span(true)
            .with_timer(mk_timer());

        let subscriber = tracing_subscriber::registry().with(filter).with(fmt_layer);
        init_with(subscriber)?;
        Ok(LoggerHandle { filter: handle })
    }

    /// Text subscriber for the current thread only, captured by the test harness.
    /// Dropping the guard restores the previous subscriber.
    pub fn scoped(cfg: &LoggerConfig) -> Result<(LoggerHandle, DefaultGuard), LoggerError> {
        let (filter, handle) = reload::Layer::new(mk_filter(&cfg.level)?);
        let fmt_layer = fmt::layer()
            .with_ansi(false)
            .with_target(cfg.with_targets)
            .with_test_writer();

        let guard = tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .set_default();
        Ok((LoggerHandle { filter: handle }, guard))
    }

    pub fn journald(cfg: &LoggerConfig) -> Result<LoggerHandle, LoggerError> {
        let (filter, handle) = reload::Layer::new(mk_filter(&cfg.level)?);
        mk_journald(filter)?;
        Ok(LoggerHandle { filter: handle })
    }
}

fn mk_filter(level: &LoggerLevel) -> Result<EnvFilter, LoggerError> {
    EnvFilter::try_new(level.as_str())
        .map_err(|_| LoggerError::InvalidLogLevel(level.to_string()))
}

fn mk_timer() -> OffsetTime<Rfc3339> {
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    OffsetTime::new(offset, Rfc3339)
}

fn as_error(e: impl std::fmt::Display) -> LoggerError {
    let s = e.to_string();
    if s.contains("SetGlobalDefaultError") || s.contains("global default trace dispatcher") {
        LoggerError::AlreadyInitialized
    } else {
        LoggerError::InitializationFailed(s)
    }
}

fn init_with<S>(subscriber: S) -> Result<(), LoggerError>
where
    S: Subscriber + Send + Sync + 'static,
{
    subscriber.try_init().map_err(as_error)
}

#[cfg(all(target_os = "linux", feature = "journald"))]
fn mk_journald(filter: reload::Layer<EnvFilter, Registry>) -> Result<(), LoggerError> {
    let journald = tracing_journald::layer()
        .map_err(|e| LoggerError::InitializationFailed(format!("journald: {e}")))?;
    let subscriber = tracing_subscriber::registry().with(filter).with(journald);
    init_with(subscriber)
}

#[cfg(not(all(target_os = "linux", feature = "journald")))]
fn mk_journald(_filter: reload::Layer<EnvFilter, Registry>) -> Result<(), LoggerError> {
    Err(LoggerError::JournaldNotSupported)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LoggerFormat, logger_init, logger_scoped};

    // The global subscriber can be installed once per test binary, so every
    // assertion about it lives in this single test.
    #[test]
    fn init_once_then_reload_level() {
        let cfg = LoggerConfig {
            format: LoggerFormat::Text,
            level: LoggerLevel::new("warn").unwrap(),
            ..Default::default()
        };

        let handle = logger_init(&cfg).expect("first init succeeds");
        assert!(matches!(
            logger_init(&cfg),
            Err(LoggerError::AlreadyInitialized) | Err(LoggerError::InitializationFailed(_))
        ));

        handle
            .set_level(&LoggerLevel::new("debug").unwrap())
            .expect("reload succeeds");
        assert!(tracing::enabled!(tracing::Level::DEBUG));
    }

    #[test]
    fn scoped_logger_reloads_only_its_thread() {
        let cfg = LoggerConfig::new(LoggerFormat::Text, LoggerLevel::new("error").unwrap());
        let (handle, _guard) = logger_scoped(&cfg).unwrap();
        assert!(!tracing::enabled!(tracing::Level::INFO));

        handle.set_level(&LoggerLevel::new("info").unwrap()).unwrap();
        assert!(tracing::enabled!(tracing::Level::INFO));
    }
}
