use std::path::PathBuf;

use podlaunch_model::{EnvironmentMap, WorkloadSpec};

/// Maximum length of a Kubernetes object name that is also a DNS label.
const DNS_LABEL_MAX: usize = 63;

/// What a job orchestrator asks a launcher to start.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobSpec {
    /// Unique workload name (pod or container name).
    pub name: String,
    pub image: String,
    pub args: Vec<String>,
    pub env: EnvironmentMap,
    pub labels: Vec<(String, String)>,
    /// Relay ports the workload needs (cluster mode only).
    pub ports_needed: usize,
    /// Working directory relative to the workspace root.
    pub work_dir: Option<PathBuf>,
}

impl JobSpec {
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            args: Vec::new(),
            env: EnvironmentMap::new(),
            labels: Vec::new(),
            ports_needed: 0,
            work_dir: None,
        }
    }

    /// Start from a workload document; name is assigned by the caller.
    pub fn from_workload(name: impl Into<String>, workload: &WorkloadSpec) -> Self {
        Self {
            args: workload.args.clone(),
            env: workload.env.clone(),
            ..Self::new(name, workload.image.clone())
        }
    }

    pub fn with_env(mut self, env: &EnvironmentMap) -> Self {
        self.env = self.env.merged(env);
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.push((key.into(), value.into()));
        self
    }

    pub fn with_ports(mut self, ports: usize) -> Self {
        self.ports_needed = ports;
        self
    }

    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(dir.into());
        self
    }

    pub(crate) fn validate(&self) -> Result<(), crate::LaunchError> {
        if self.image.trim().is_empty() {
            return Err(crate::LaunchError::InvalidSpec("image is empty".into()));
        }
        if dns_label(&self.name).is_empty() {
            return Err(crate::LaunchError::InvalidSpec(format!(
                "unusable workload name: {:?}",
                self.name
            )));
        }
        Ok(())
    }
}

/// Lower-case `name` into a valid DNS-1123 label.
pub fn dns_label(name: &str) -> String {
    let mut out = String::with_capacity(name.len().min(DNS_LABEL_MAX));
    for c in name.chars() {
        let c = c.to_ascii_lowercase();
        if c.is_ascii_alphanumeric() {
            out.push(c);
        } else if !out.is_empty() && !out.ends_with('-') {
            out.push('-');
        }
        if out.len() == DNS_LABEL_MAX {
            break;
        }
    }
    out.trim_end_matches('-').to_string()
}
