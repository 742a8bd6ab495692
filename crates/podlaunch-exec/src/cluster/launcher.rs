use std::{sync::Arc, time::Duration};

use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::{
    HeartbeatServer, JobSpec, PortLease, PortPool,
    cluster::{ClusterClient, PodPhase},
    error::LaunchError,
    launcher::WorkloadExit,
    spec::dns_label,
};

const MAIN_CONTAINER: &str = "main";

/// Launches workloads as pods in `namespace`.
///
/// Owns every cluster-side resource of the process: the API client, the relay
/// port pool handle, and the heartbeat server, which stops when the launcher drops.
pub struct ClusterLauncher {
    client: ClusterClient,
    namespace: String,
    heartbeat_url: String,
    ports: Arc<PortPool>,
    poll_interval: Duration,
    heartbeat: Option<HeartbeatServer>,
}

impl ClusterLauncher {
    pub fn new(
        client: ClusterClient,
        namespace: impl Into<String>,
        heartbeat_url: impl Into<String>,
        ports: Arc<PortPool>,
    ) -> Self {
        Self {
            client,
            namespace: namespace.into(),
            heartbeat_url: heartbeat_url.into(),
            ports,
            poll_interval: Duration::from_secs(1),
            heartbeat: None,
        }
    }

    pub fn with_heartbeat(mut self, server: HeartbeatServer) -> Self {
        self.heartbeat = Some(server);
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn heartbeat_url(&self) -> &str {
        &self.heartbeat_url
    }

    pub fn ports(&self) -> &Arc<PortPool> {
        &self.ports
    }

    pub async fn launch(&self, spec: &JobSpec) -> Result<ClusterHandle, LaunchError> {
        spec.validate()?;
        let lease = self.ports.lease(spec.ports_needed)?;
        let name = dns_label(&spec.name);
        let manifest = self.manifest(&name, spec, lease.ports());

        self.client.create_pod(&self.namespace, &manifest).await?;
        info!(
            target: "podlaunch.exec.cluster",
            pod = %name,
            namespace = %self.namespace,
            image = %spec.image,
            ports = ?lease.ports(),
            "pod created"
        );

        Ok(ClusterHandle {
            client: self.client.clone(),
            namespace: self.namespace.clone(),
            name,
            poll_interval: self.poll_interval,
            lease,
        })
    }

    pub(crate) fn manifest(&self, name: &str, spec: &JobSpec, ports: &[u16]) -> Value {
        let mut env: Vec<Value> = spec
            .env
            .to_pairs()
            .into_iter()
            .filter(|(k, _)| k != "HEARTBEAT_URL" && k != "RELAY_PORTS")
            .map(|(k, v)| json!({ "name": k, "value": v }))
            .collect();
        env.push(json!({ "name": "HEARTBEAT_URL", "value": self.heartbeat_url }));
        if !ports.is_empty() {
            let joined = ports
                .iter()
                .map(u16::to_string)
                .collect::<Vec<_>>()
                .join(",");
            env.push(json!({ "name": "RELAY_PORTS", "value": joined }));
        }

        let labels: serde_json::Map<String, Value> = spec
            .labels
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();

        let mut container = json!({
            "name": MAIN_CONTAINER,
            "image": spec.image,
            "env": env,
            "ports": ports.iter().map(|p| json!({ "containerPort": p })).collect::<Vec<_>>(),
        });
        if !spec.args.is_empty() {
            container["args"] = json!(spec.args);
        }
        if let Some(dir) = &spec.work_dir {
            container["workingDir"] = json!(format!("/workspace/{}", dir.display()));
        }

        json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": {
                "name": name,
                "namespace": self.namespace,
                "labels": labels,
            },
            "spec": {
                "restartPolicy": "Never",
                "containers": [container],
            },
        })
    }
}

/// A pod started by [`ClusterLauncher`]; its relay ports return to the pool when
/// the handle is dropped.
pub struct ClusterHandle {
    client: ClusterClient,
    namespace: String,
    name: String,
    poll_interval: Duration,
    lease: PortLease,
}

impl ClusterHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ports(&self) -> &[u16] {
        self.lease.ports()
    }

    /// Poll until the pod reaches a terminal phase. No deadline is imposed here.
    pub async fn wait(&mut self) -> Result<WorkloadExit, LaunchError> {
        loop {
            match self.client.pod_phase(&self.namespace, &self.name).await? {
                PodPhase::Succeeded { exit_code } | PodPhase::Failed { exit_code } => {
                    debug!(target: "podlaunch.exec.cluster", pod = %self.name, exit_code, "pod finished");
                    if let Err(e) = self.client.delete_pod(&self.namespace, &self.name).await {
                        warn!(target: "podlaunch.exec.cluster", pod = %self.name, error = %e, "pod cleanup failed");
                    }
                    return Ok(WorkloadExit::new(&self.name, exit_code));
                }
                phase => {
                    debug!(target: "podlaunch.exec.cluster", pod = %self.name, ?phase, "waiting");
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }

    /// Delete the pod without waiting for it to finish.
    pub async fn stop(&mut self) -> Result<(), LaunchError> {
        self.client.delete_pod(&self.namespace, &self.name).await?;
        info!(target: "podlaunch.exec.cluster", pod = %self.name, "pod stopped");
        Ok(())
    }
}
