//! Typed view over the delivered environment map.

use std::{fmt, path::PathBuf, str::FromStr};

use podlaunch_model::EnvironmentMap;

use crate::environment::EnvironmentError;

pub const WORKER_ENVIRONMENT: &str = "WORKER_ENVIRONMENT";
pub const JOB_KUBE_NAMESPACE: &str = "JOB_KUBE_NAMESPACE";
pub const WORKSPACE_ROOT: &str = "WORKSPACE_ROOT";
pub const WORKSPACE_DOCKER_MOUNT: &str = "WORKSPACE_DOCKER_MOUNT";
pub const LOCAL_DOCKER_MOUNT: &str = "LOCAL_DOCKER_MOUNT";
pub const DOCKER_NETWORK: &str = "DOCKER_NETWORK";
pub const LOG_LEVEL: &str = "LOG_LEVEL";

pub const DEFAULT_KUBE_NAMESPACE: &str = "default";
pub const DEFAULT_WORKSPACE_ROOT: &str = "/tmp/workspace";
pub const DEFAULT_WORKSPACE_DOCKER_MOUNT: &str = "airbyte_workspace";
pub const DEFAULT_LOCAL_DOCKER_MOUNT: &str = "/tmp/airbyte_local";
pub const DEFAULT_DOCKER_NETWORK: &str = "host";

/// Keys projected from the hand-off map onto this process and every launched workload.
pub const ENV_VARS_TO_TRANSFER: &[&str] = &[
    WORKER_ENVIRONMENT,
    JOB_KUBE_NAMESPACE,
    WORKSPACE_ROOT,
    WORKSPACE_DOCKER_MOUNT,
    LOCAL_DOCKER_MOUNT,
    DOCKER_NETWORK,
    LOG_LEVEL,
    "JOB_MAIN_CONTAINER_CPU_REQUEST",
    "JOB_MAIN_CONTAINER_CPU_LIMIT",
    "JOB_MAIN_CONTAINER_MEMORY_REQUEST",
    "JOB_MAIN_CONTAINER_MEMORY_LIMIT",
    "STATE_STORAGE_S3_BUCKET_NAME",
    "STATE_STORAGE_S3_REGION",
    "STATE_STORAGE_GCS_BUCKET_NAME",
    "S3_LOG_BUCKET",
    "S3_LOG_BUCKET_REGION",
    "GCS_LOG_BUCKET",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerEnvironment {
    /// Local container runtime.
    Docker,
    /// Cluster-orchestrated pods.
    Kubernetes,
}

impl fmt::Display for WorkerEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerEnvironment::Docker => f.write_str("DOCKER"),
            WorkerEnvironment::Kubernetes => f.write_str("KUBERNETES"),
        }
    }
}

impl FromStr for WorkerEnvironment {
    type Err = EnvironmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DOCKER" => Ok(WorkerEnvironment::Docker),
            "KUBERNETES" => Ok(WorkerEnvironment::Kubernetes),
            _ => Err(EnvironmentError::InvalidSetting {
                key: WORKER_ENVIRONMENT,
                value: s.to_string(),
            }),
        }
    }
}

/// Boolean switches passed through to the replication workloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeatureFlags {
    pub log_connector_messages: bool,
    pub use_stream_capable_state: bool,
    pub apply_field_selection: bool,
}

impl FeatureFlags {
    const LOG_CONNECTOR_MESSAGES: &'static str = "LOG_CONNECTOR_MESSAGES";
    const USE_STREAM_CAPABLE_STATE: &'static str = "USE_STREAM_CAPABLE_STATE";
    const APPLY_FIELD_SELECTION: &'static str = "APPLY_FIELD_SELECTION";

    /// Unset or unparseable flags are off.
    pub fn from_map(env: &EnvironmentMap) -> Self {
        let flag = |key: &str| env.get(key).map(parse_bool).unwrap_or(false);
        Self {
            log_connector_messages: flag(Self::LOG_CONNECTOR_MESSAGES),
            use_stream_capable_state: flag(Self::USE_STREAM_CAPABLE_STATE),
            apply_field_selection: flag(Self::APPLY_FIELD_SELECTION),
        }
    }

    pub fn to_env(&self) -> EnvironmentMap {
        [
            (Self::LOG_CONNECTOR_MESSAGES, self.log_connector_messages),
            (Self::USE_STREAM_CAPABLE_STATE, self.use_stream_capable_state),
            (Self::APPLY_FIELD_SELECTION, self.apply_field_selection),
        ]
        .into_iter()
        .map(|(k, v)| (k, v.to_string()))
        .collect()
    }
}

fn parse_bool(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

/// Worker settings derived from the hand-off environment map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerEnv {
    pub environment: WorkerEnvironment,
    pub kube_namespace: String,
    pub workspace_root: PathBuf,
    pub workspace_docker_mount: String,
    pub local_docker_mount: String,
    pub docker_network: String,
    pub features: FeatureFlags,
}

impl WorkerEnv {
    pub fn from_map(env: &EnvironmentMap) -> Result<Self, EnvironmentError> {
        let get = |key: &str, default: &str| -> String {
            env.get(key)
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .unwrap_or(default)
                .to_string()
        };

        let environment = match env.get(WORKER_ENVIRONMENT) {
            Some(raw) => raw.parse()?,
            None => WorkerEnvironment::Docker,
        };

        Ok(Self {
            environment,
            kube_namespace: get(JOB_KUBE_NAMESPACE, DEFAULT_KUBE_NAMESPACE),
            workspace_root: PathBuf::from(get(WORKSPACE_ROOT, DEFAULT_WORKSPACE_ROOT)),
            workspace_docker_mount: get(WORKSPACE_DOCKER_MOUNT, DEFAULT_WORKSPACE_DOCKER_MOUNT),
            local_docker_mount: get(LOCAL_DOCKER_MOUNT, DEFAULT_LOCAL_DOCKER_MOUNT),
            docker_network: get(DOCKER_NETWORK, DEFAULT_DOCKER_NETWORK),
            features: FeatureFlags::from_map(env),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_docker() {
        let env = WorkerEnv::from_map(&EnvironmentMap::new()).unwrap();
        assert_eq!(env.environment, WorkerEnvironment::Docker);
        assert_eq!(env.kube_namespace, "default");
        assert_eq!(env.workspace_root, PathBuf::from("/tmp/workspace"));
        assert_eq!(env.docker_network, "host");
        assert_eq!(env.features, FeatureFlags::default());
    }

    #[test]
    fn reads_cluster_settings() {
        let map: EnvironmentMap = [
            (WORKER_ENVIRONMENT, "kubernetes"),
            (JOB_KUBE_NAMESPACE, "jobs"),
            (WORKSPACE_ROOT, "/workspace"),
            ("LOG_CONNECTOR_MESSAGES", "TRUE"),
            ("APPLY_FIELD_SELECTION", "nope"),
        ]
        .into_iter()
        .collect();

        let env = WorkerEnv::from_map(&map).unwrap();
        assert_eq!(env.environment, WorkerEnvironment::Kubernetes);
        assert_eq!(env.kube_namespace, "jobs");
        assert_eq!(env.workspace_root, PathBuf::from("/workspace"));
        assert!(env.features.log_connector_messages);
        assert!(!env.features.apply_field_selection);
    }

    #[test]
    fn unknown_environment_is_rejected() {
        let map: EnvironmentMap = [(WORKER_ENVIRONMENT, "MESOS")].into_iter().collect();
        assert!(matches!(
            WorkerEnv::from_map(&map),
            Err(EnvironmentError::InvalidSetting { key: WORKER_ENVIRONMENT, .. })
        ));
    }

    #[test]
    fn flags_export_as_env() {
        let flags = FeatureFlags {
            use_stream_capable_state: true,
            ..Default::default()
        };
        let env = flags.to_env();
        assert_eq!(env.get("USE_STREAM_CAPABLE_STATE"), Some("true"));
        assert_eq!(env.get("LOG_CONNECTOR_MESSAGES"), Some("false"));
    }
}
