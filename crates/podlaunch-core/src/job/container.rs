use podlaunch_exec::Launcher;
use podlaunch_model::{EnvironmentMap, WorkloadSpec};
use tracing::info;

use super::{JobContext, JobError};

/// Runs the single container described by the job input; used for normalization
/// and transformation jobs. Produces no output.
pub struct ContainerOrchestrator {
    role: &'static str,
    launcher: Launcher,
    ctx: JobContext,
}

impl ContainerOrchestrator {
    pub fn new(role: &'static str, launcher: Launcher, ctx: JobContext) -> Self {
        Self { role, launcher, ctx }
    }

    pub fn launcher(&self) -> &Launcher {
        &self.launcher
    }

    pub(crate) async fn run(&self) -> Result<Option<String>, JobError> {
        let workload: WorkloadSpec = self.ctx.read_input().await?;
        let spec = self.ctx.job_spec(self.role, &workload, &EnvironmentMap::new());

        let mut handle = self.launcher.launch(&spec).await?;
        let exit = handle.wait().await?;
        if !exit.success() {
            return Err(JobError::WorkloadFailed {
                name: exit.name,
                code: exit.code,
            });
        }

        info!(target: "podlaunch.job", role = self.role, workload = %exit.name, "workload finished");
        Ok(None)
    }
}
