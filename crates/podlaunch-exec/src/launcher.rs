use crate::{
    JobSpec,
    cluster::{ClusterHandle, ClusterLauncher},
    error::LaunchError,
    local::{LocalContainerLauncher, LocalHandle},
};

/// Launch capability bound to one execution environment.
pub enum Launcher {
    Cluster(ClusterLauncher),
    Local(LocalContainerLauncher),
}

impl Launcher {
    /// Short identifier of the environment, for logs.
    pub fn environment(&self) -> &'static str {
        match self {
            Launcher::Cluster(_) => "cluster",
            Launcher::Local(_) => "local",
        }
    }

    pub async fn launch(&self, spec: &JobSpec) -> Result<WorkloadHandle, LaunchError> {
        match self {
            Launcher::Cluster(l) => l.launch(spec).await.map(WorkloadHandle::Cluster),
            Launcher::Local(l) => l.launch(spec).await.map(WorkloadHandle::Local),
        }
    }
}

impl From<ClusterLauncher> for Launcher {
    fn from(l: ClusterLauncher) -> Self {
        Launcher::Cluster(l)
    }
}

impl From<LocalContainerLauncher> for Launcher {
    fn from(l: LocalContainerLauncher) -> Self {
        Launcher::Local(l)
    }
}

/// A started workload.
pub enum WorkloadHandle {
    Cluster(ClusterHandle),
    Local(LocalHandle),
}

impl WorkloadHandle {
    pub fn name(&self) -> &str {
        match self {
            WorkloadHandle::Cluster(h) => h.name(),
            WorkloadHandle::Local(h) => h.name(),
        }
    }

    /// Block until the workload finishes. Dropping the future leaves the workload running.
    pub async fn wait(&mut self) -> Result<WorkloadExit, LaunchError> {
        match self {
            WorkloadHandle::Cluster(h) => h.wait().await,
            WorkloadHandle::Local(h) => h.wait().await,
        }
    }

    /// Tear the workload down before it finishes on its own.
    pub async fn stop(&mut self) -> Result<(), LaunchError> {
        match self {
            WorkloadHandle::Cluster(h) => h.stop().await,
            WorkloadHandle::Local(h) => h.stop().await,
        }
    }
}

/// How a workload ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadExit {
    pub name: String,
    pub code: i32,
}

impl WorkloadExit {
    pub fn new(name: impl Into<String>, code: i32) -> Self {
        Self {
            name: name.into(),
            code,
        }
    }

    pub fn success(&self) -> bool {
        self.code == 0
    }
}
