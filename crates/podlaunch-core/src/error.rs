use std::error::Error;

use thiserror::Error;

use crate::{
    environment::EnvironmentError, handoff::HandoffError, job::JobError, lifecycle::LifecycleError,
    router::RouteError,
};

/// Every way the bootstrap can end without `SUCCEEDED`.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("configuration hand-off failed")]
    Handoff(#[from] HandoffError),
    #[error("cannot build launcher")]
    Environment(#[from] EnvironmentError),
    #[error("cannot route job")]
    Route(#[from] RouteError),
    #[error("job execution failed")]
    Job(#[from] JobError),
    #[error("lifecycle write failed")]
    Lifecycle(#[from] LifecycleError),
}

impl BootstrapError {
    /// Bad input from the scheduler rather than a failure of this pod or its
    /// collaborators. Retrying the pod will not help.
    pub fn is_config_bug(&self) -> bool {
        matches!(self, BootstrapError::Route(_))
    }
}

/// `err` and its sources joined by `": "`.
pub fn error_chain(err: &dyn Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}
