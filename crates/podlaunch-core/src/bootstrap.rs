//! Sequencing of the whole launch under one fault boundary.

use std::{future::Future, sync::Arc};

use podlaunch_model::{EnvironmentMap, LifecycleStatus, PodReference};
use podlaunch_observe::{LoggerHandle, LoggerLevel};
use tracing::{Instrument, Span, error, field, info, info_span, warn};

use crate::{
    environment::EnvironmentResolver,
    error::{BootstrapError, error_chain},
    handoff::{ConfigHandoff, Handoff},
    job::{JobContext, RunJob},
    lifecycle::Lifecycle,
    router::JobRouter,
    store::StateStore,
    worker_env::{LOG_LEVEL, WorkerEnv},
};

/// How the bootstrap ended.
#[derive(Debug)]
pub enum BootstrapOutcome {
    /// No pod reference was ever known, so nothing was written.
    HandoffFailed(BootstrapError),
    /// `recorded` is false when `FAILED` itself could not be written.
    Failed {
        error: BootstrapError,
        recorded: bool,
    },
    Succeeded { output: String },
}

impl BootstrapOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, BootstrapOutcome::Succeeded { .. })
    }

    /// Process exit status: the authoritative result even when storage is not.
    pub fn exit_code(&self) -> u8 {
        if self.is_success() { 0 } else { 1 }
    }
}

pub struct Bootstrap {
    handoff: ConfigHandoff,
    store: Arc<dyn StateStore>,
    resolver: EnvironmentResolver,
    logger: Option<LoggerHandle>,
}

impl Bootstrap {
    pub fn new(
        handoff: ConfigHandoff,
        store: Arc<dyn StateStore>,
        resolver: EnvironmentResolver,
    ) -> Self {
        Self {
            handoff,
            store,
            resolver,
            logger: None,
        }
    }

    /// Let the hand-off's `LOG_LEVEL` replace the level the process started with.
    pub fn with_logger(mut self, logger: LoggerHandle) -> Self {
        self.logger = Some(logger);
        self
    }

    pub async fn run(&self) -> BootstrapOutcome {
        match self.handoff.await_and_load().await {
            Ok(handoff) => self.run_handoff(handoff).await,
            Err(e) => {
                let err = BootstrapError::from(e);
                error!(target: "podlaunch.bootstrap", error = %error_chain(&err), "hand-off failed, nothing recorded");
                BootstrapOutcome::HandoffFailed(err)
            }
        }
    }

    /// Everything after the hand-off: lifecycle, launcher, routing, and the job.
    pub async fn run_handoff(&self, handoff: Handoff) -> BootstrapOutcome {
        self.apply_log_level(&handoff.env);

        let span = info_span!(
            "job",
            application = %handoff.identity.application,
            job_id = %handoff.identity.job_id,
            attempt_id = handoff.identity.attempt_id,
            job_root = field::Empty,
        );
        let pod = handoff.pod.clone();
        let resolver = &self.resolver;

        let prepare = async move {
            let worker_env = WorkerEnv::from_map(&handoff.env)?;
            let ctx = JobContext::new(&handoff, worker_env);
            Span::current().record("job_root", field::display(ctx.job_root().display()));

            let launcher = resolver.resolve(&ctx.worker_env).await?;
            let job = JobRouter::route_named(&handoff.identity.application, launcher, ctx)?;
            info!(target: "podlaunch.bootstrap", kind = %job.kind(), "job routed");
            Ok::<_, BootstrapError>(job)
        };

        self.drive(pod, prepare).instrument(span).await
    }

    /// Run the lifecycle around `prepare` and the job it yields.
    ///
    /// Writes `INITIALIZING`, awaits `prepare`, writes `RUNNING`, runs the job and
    /// writes `SUCCEEDED` with its output. Any error on the way ends in a best-effort
    /// `FAILED` write.
    pub async fn drive<J, F>(&self, pod: PodReference, prepare: F) -> BootstrapOutcome
    where
        J: RunJob,
        F: Future<Output = Result<J, BootstrapError>>,
    {
        let mut lifecycle = Lifecycle::new(Arc::clone(&self.store), pod);

        match Self::advance(&mut lifecycle, prepare).await {
            Ok(output) => {
                info!(target: "podlaunch.bootstrap", pod = %lifecycle.pod(), output_bytes = output.len(), "job succeeded");
                BootstrapOutcome::Succeeded { output }
            }
            Err(err) => {
                error!(
                    target: "podlaunch.bootstrap",
                    pod = %lifecycle.pod(),
                    config_bug = err.is_config_bug(),
                    error = %error_chain(&err),
                    "job failed"
                );
                let recorded = match lifecycle.transition(LifecycleStatus::Failed, None).await {
                    Ok(_) => true,
                    Err(e) => {
                        error!(target: "podlaunch.bootstrap", pod = %lifecycle.pod(), error = %error_chain(&e), "could not record FAILED");
                        false
                    }
                };
                BootstrapOutcome::Failed {
                    error: err,
                    recorded,
                }
            }
        }
    }

    async fn advance<J, F>(lifecycle: &mut Lifecycle, prepare: F) -> Result<String, BootstrapError>
    where
        J: RunJob,
        F: Future<Output = Result<J, BootstrapError>>,
    {
        lifecycle.transition(LifecycleStatus::Initializing, None).await?;
        let job = prepare.await?;
        lifecycle.transition(LifecycleStatus::Running, None).await?;

        let output = job.run_job().await?.unwrap_or_default();
        lifecycle
            .transition(LifecycleStatus::Succeeded, Some(output.as_str()))
            .await?;
        // The job (and the launcher resources it owns) drops only after the final write.
        drop(job);
        Ok(output)
    }

    fn apply_log_level(&self, env: &EnvironmentMap) {
        let (Some(logger), Some(raw)) = (&self.logger, env.get(LOG_LEVEL)) else {
            return;
        };
        match LoggerLevel::new(raw).and_then(|level| logger.set_level(&level)) {
            Ok(()) => info!(target: "podlaunch.bootstrap", level = raw, "log level taken from hand-off"),
            Err(e) => warn!(target: "podlaunch.bootstrap", level = raw, error = %e, "ignoring hand-off log level"),
        }
    }
}
