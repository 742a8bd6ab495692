use std::{process::ExitCode, sync::Arc};

use anyhow::Context;
use tracing::info;

use podlaunch_core::{Bootstrap, BootstrapConfig, ConfigHandoff, EnvironmentResolver, FsStateStore};
use podlaunch_exec::InClusterConnector;
use podlaunch_observe::{LoggerConfig, LoggerHandle, logger_init};

#[tokio::main]
async fn main() -> ExitCode {
    let (cfg, logger) = match setup() {
        Ok(ready) => ready,
        Err(e) => {
            eprintln!("podlaunch-agentd: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    // 3) Collaborators: hand-off directory, state storage, launcher factory
    let handoff = ConfigHandoff::new(&cfg.config_dir)
        .with_timeout(cfg.handoff_timeout)
        .with_poll_interval(cfg.poll_interval);
    let store = Arc::new(FsStateStore::new(&cfg.state_prefix));
    let resolver = EnvironmentResolver::new(Arc::new(InClusterConnector::default()))
        .with_heartbeat_port(cfg.heartbeat_port);

    // 4) Run to a terminal state; launcher resources are released before returning
    let outcome = Bootstrap::new(handoff, store, resolver)
        .with_logger(logger)
        .run()
        .await;

    info!(target: "podlaunch.bootstrap", exit_code = outcome.exit_code(), "exiting");
    ExitCode::from(outcome.exit_code())
}

fn setup() -> anyhow::Result<(BootstrapConfig, LoggerHandle)> {
    // 1) Process config
    let cfg = BootstrapConfig::from_env().context("read bootstrap config")?;

    // 2) Logger
    let logger = logger_init(&LoggerConfig::new(cfg.log_format, cfg.log_level.clone()))
        .context("init logger")?;
    info!(
        target: "podlaunch.bootstrap",
        config_dir = %cfg.config_dir.display(),
        state_prefix = %cfg.state_prefix.display(),
        timeout = ?cfg.handoff_timeout,
        "podlaunch-agentd starting"
    );

    Ok((cfg, logger))
}
