//! Selects and builds the launcher for the configured execution environment.

use std::{
    net::{Ipv4Addr, SocketAddr},
    sync::Arc,
};

use podlaunch_exec::{
    ClusterConnector, ClusterLauncher, HeartbeatServer, LaunchError, Launcher,
    LocalContainerLauncher, LocalMounts, PortPool, RELAY_PORTS,
};
use thiserror::Error;
use tracing::info;

use crate::{
    config::HEARTBEAT_PORT,
    worker_env::{WorkerEnv, WorkerEnvironment},
};

#[derive(Debug, Error)]
pub enum EnvironmentError {
    #[error("invalid {key}: {value:?}")]
    InvalidSetting { key: &'static str, value: String },
    #[error("execution environment unavailable")]
    Unavailable(#[from] LaunchError),
}

/// Builds a [`Launcher`] from the worker settings.
///
/// Side effects (cluster client, address discovery, port reservation, heartbeat
/// server) happen only in the cluster branch.
pub struct EnvironmentResolver {
    connector: Arc<dyn ClusterConnector>,
    relay_ports: Vec<u16>,
    heartbeat_port: u16,
    serve_heartbeat: bool,
}

impl EnvironmentResolver {
    pub fn new(connector: Arc<dyn ClusterConnector>) -> Self {
        Self {
            connector,
            relay_ports: RELAY_PORTS.to_vec(),
            heartbeat_port: HEARTBEAT_PORT,
            serve_heartbeat: true,
        }
    }

    pub fn with_relay_ports(mut self, ports: impl IntoIterator<Item = u16>) -> Self {
        self.relay_ports = ports.into_iter().collect();
        self
    }

    pub fn with_heartbeat_port(mut self, port: u16) -> Self {
        self.heartbeat_port = port;
        self
    }

    /// Skip binding the heartbeat endpoint; the URL is still exported to workloads.
    pub fn without_heartbeat_server(mut self) -> Self {
        self.serve_heartbeat = false;
        self
    }

    pub async fn resolve(&self, env: &WorkerEnv) -> Result<Launcher, EnvironmentError> {
        match env.environment {
            WorkerEnvironment::Kubernetes => self.cluster(env).await,
            WorkerEnvironment::Docker => Ok(Self::local(env)),
        }
    }

    async fn cluster(&self, env: &WorkerEnv) -> Result<Launcher, EnvironmentError> {
        let own_ip = self.connector.local_address().await?;
        let heartbeat_url = SocketAddr::new(own_ip, self.heartbeat_port).to_string();

        // The pool is built here and nowhere else; the launcher holds the only handle.
        let ports = Arc::new(PortPool::new(self.relay_ports.iter().copied())?);
        let client = self.connector.connect()?;

        let mut launcher = ClusterLauncher::new(client, &env.kube_namespace, &heartbeat_url, ports);
        if self.serve_heartbeat {
            let bind = SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), self.heartbeat_port);
            launcher = launcher.with_heartbeat(HeartbeatServer::bind(bind).await?);
        }

        info!(
            target: "podlaunch.env",
            namespace = %env.kube_namespace,
            %heartbeat_url,
            relay_ports = ?self.relay_ports,
            "using cluster launcher"
        );
        Ok(launcher.into())
    }

    fn local(env: &WorkerEnv) -> Launcher {
        let mounts = LocalMounts {
            workspace: env.workspace_docker_mount.clone(),
            local: env.local_docker_mount.clone(),
        };
        info!(
            target: "podlaunch.env",
            workspace_root = %env.workspace_root.display(),
            workspace_mount = %mounts.workspace,
            local_mount = %mounts.local,
            network = %env.docker_network,
            "using local container launcher"
        );
        LocalContainerLauncher::new(mounts, &env.docker_network).into()
    }
}
