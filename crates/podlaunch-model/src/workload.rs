use serde::{Deserialize, Serialize};

use crate::EnvironmentMap;

/// A single child workload a job orchestrator asks the launcher to start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadSpec {
    /// Container image (e.g. `"airbyte/source-postgres:1.0.0"`).
    pub image: String,
    /// Arguments passed to the image entrypoint.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    /// Extra environment for the workload.
    #[serde(default, skip_serializing_if = "EnvironmentMap::is_empty")]
    pub env: EnvironmentMap,
}

impl WorkloadSpec {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            args: Vec::new(),
            env: EnvironmentMap::new(),
        }
    }
}

/// Job input for a replication: both ends are launched and awaited together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplicationInput {
    pub source: WorkloadSpec,
    pub destination: WorkloadSpec,
}
