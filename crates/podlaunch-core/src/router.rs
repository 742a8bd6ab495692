use podlaunch_exec::Launcher;
use podlaunch_model::ApplicationKind;
use thiserror::Error;
use tracing::debug;

use crate::job::{ContainerOrchestrator, JobContext, JobOrchestrator, ReplicationOrchestrator};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouteError {
    /// The scheduler handed over a kind this build does not know. Not retryable.
    #[error("unknown application kind {0:?}")]
    UnknownApplicationKind(String),
}

/// Maps an application kind to its orchestrator.
pub struct JobRouter;

impl JobRouter {
    /// Total over [`ApplicationKind`]; the launcher moves into the orchestrator.
    pub fn route(kind: ApplicationKind, launcher: Launcher, ctx: JobContext) -> JobOrchestrator {
        debug!(target: "podlaunch.router", %kind, environment = launcher.environment(), "routing job");
        match kind {
            ApplicationKind::Replicate => {
                let features = ctx.worker_env.features;
                JobOrchestrator::Replicate(ReplicationOrchestrator::new(launcher, ctx, features))
            }
            ApplicationKind::Normalize => {
                JobOrchestrator::Normalize(ContainerOrchestrator::new("normalize", launcher, ctx))
            }
            ApplicationKind::Transform => {
                JobOrchestrator::Transform(ContainerOrchestrator::new("transform", launcher, ctx))
            }
            ApplicationKind::NoOp => JobOrchestrator::NoOp { launcher, ctx },
        }
    }

    /// Route by the application name as delivered in the hand-off.
    pub fn route_named(
        application: &str,
        launcher: Launcher,
        ctx: JobContext,
    ) -> Result<JobOrchestrator, RouteError> {
        let kind = application
            .parse::<ApplicationKind>()
            .map_err(|_| RouteError::UnknownApplicationKind(application.trim().to_string()))?;
        Ok(Self::route(kind, launcher, ctx))
    }
}
