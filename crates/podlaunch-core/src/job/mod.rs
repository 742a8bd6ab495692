//! Job orchestrators: one execution strategy per application kind, each bound to
//! the process's single [`Launcher`].

mod container;
pub use container::ContainerOrchestrator;

mod replicate;
pub use replicate::{ReplicationOrchestrator, ReplicationSummary, WorkloadSummary};

use std::path::PathBuf;

use async_trait::async_trait;
use podlaunch_exec::{JobSpec, LaunchError, Launcher};
use podlaunch_model::{ApplicationKind, EnvironmentMap, RunConfig, TaskIdentity, WorkloadSpec};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::info;

use crate::{
    handoff::{Handoff, INPUT_FILE},
    worker_env::{ENV_VARS_TO_TRANSFER, WorkerEnv},
};

#[derive(Debug, Error)]
pub enum JobError {
    #[error("job input {}: {reason}", path.display())]
    Input { path: PathBuf, reason: String },
    #[error(transparent)]
    Launch(#[from] LaunchError),
    #[error("workload {name} exited with code {code}")]
    WorkloadFailed { name: String, code: i32 },
    #[error("cannot encode job output: {0}")]
    Output(String),
}

/// Runs a job to completion and yields its optional output document.
#[async_trait]
pub trait RunJob: Send + Sync {
    async fn run_job(&self) -> Result<Option<String>, JobError>;
}

/// Everything a job needs from the hand-off, independent of the launcher.
#[derive(Debug, Clone)]
pub struct JobContext {
    pub identity: TaskIdentity,
    pub run_config: RunConfig,
    pub worker_env: WorkerEnv,
    /// The transferable subset of the hand-off environment.
    pub projected_env: EnvironmentMap,
    pub config_dir: PathBuf,
}

impl JobContext {
    pub fn new(handoff: &Handoff, worker_env: WorkerEnv) -> Self {
        Self {
            identity: handoff.identity.clone(),
            run_config: handoff.run_config.clone(),
            worker_env,
            projected_env: handoff.env.project(ENV_VARS_TO_TRANSFER.iter().copied()),
            config_dir: handoff.config_dir.clone(),
        }
    }

    /// `<job_id>/<attempt_id>`, relative to the workspace.
    pub fn job_dir(&self) -> PathBuf {
        PathBuf::from(&self.run_config.job_id).join(self.run_config.attempt_id.to_string())
    }

    pub fn job_root(&self) -> PathBuf {
        self.run_config.job_root(&self.worker_env.workspace_root)
    }

    /// Parse the job input document delivered with the hand-off.
    pub async fn read_input<T: DeserializeOwned>(&self) -> Result<T, JobError> {
        let path = self.config_dir.join(INPUT_FILE);
        let raw = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| JobError::Input {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        serde_json::from_str(&raw).map_err(|e| JobError::Input {
            path,
            reason: e.to_string(),
        })
    }

    /// Launch request for `workload`. The workload's own env wins over `extra`, which
    /// wins over the projected hand-off env.
    pub fn job_spec(&self, role: &str, workload: &WorkloadSpec, extra: &EnvironmentMap) -> JobSpec {
        let name = format!(
            "{role}-{}-{}",
            self.identity.job_id, self.identity.attempt_id
        );
        let mut spec = JobSpec::from_workload(name, workload)
            .with_label("job_id", &self.identity.job_id)
            .with_label("attempt_id", self.identity.attempt_id.to_string())
            .with_label("role", role)
            .with_work_dir(self.job_dir());
        spec.env = self.projected_env.merged(extra).merged(&workload.env);
        spec
    }
}

/// Closed set of orchestrators; built only by [`JobRouter`](crate::JobRouter).
pub enum JobOrchestrator {
    Replicate(ReplicationOrchestrator),
    Normalize(ContainerOrchestrator),
    Transform(ContainerOrchestrator),
    NoOp { launcher: Launcher, ctx: JobContext },
}

impl JobOrchestrator {
    pub fn kind(&self) -> ApplicationKind {
        match self {
            JobOrchestrator::Replicate(_) => ApplicationKind::Replicate,
            JobOrchestrator::Normalize(_) => ApplicationKind::Normalize,
            JobOrchestrator::Transform(_) => ApplicationKind::Transform,
            JobOrchestrator::NoOp { .. } => ApplicationKind::NoOp,
        }
    }

    pub fn launcher(&self) -> &Launcher {
        match self {
            JobOrchestrator::Replicate(o) => o.launcher(),
            JobOrchestrator::Normalize(o) | JobOrchestrator::Transform(o) => o.launcher(),
            JobOrchestrator::NoOp { launcher, .. } => launcher,
        }
    }
}

#[async_trait]
impl RunJob for JobOrchestrator {
    async fn run_job(&self) -> Result<Option<String>, JobError> {
        match self {
            JobOrchestrator::Replicate(o) => o.run().await,
            JobOrchestrator::Normalize(o) | JobOrchestrator::Transform(o) => o.run().await,
            JobOrchestrator::NoOp { ctx, .. } => {
                info!(
                    target: "podlaunch.job",
                    job_id = %ctx.identity.job_id,
                    attempt_id = ctx.identity.attempt_id,
                    "no-op job, nothing to run"
                );
                Ok(None)
            }
        }
    }
}
