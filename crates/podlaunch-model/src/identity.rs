use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{ApplicationKind, AttemptId, JobId, ModelError};

/// Run configuration of the job this pod executes.
///
/// Only the identifiers are interpreted here; every other field is carried opaquely
/// for the job orchestrators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunConfig {
    pub job_id: JobId,
    pub attempt_id: AttemptId,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RunConfig {
    pub fn new(job_id: impl Into<JobId>, attempt_id: AttemptId) -> Self {
        Self {
            job_id: job_id.into(),
            attempt_id,
            extra: Map::new(),
        }
    }

    /// Per-attempt working directory under `workspace_root`.
    pub fn job_root(&self, workspace_root: &Path) -> PathBuf {
        workspace_root
            .join(&self.job_id)
            .join(self.attempt_id.to_string())
    }
}

/// Identity of the running task.
///
/// `application` is kept as delivered; it is validated when the job is routed so that an
/// unsupported kind is reported through the lifecycle rather than lost at hand-off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskIdentity {
    pub application: String,
    pub job_id: JobId,
    pub attempt_id: AttemptId,
}

impl TaskIdentity {
    pub fn new(application: impl Into<String>, run: &RunConfig) -> Self {
        Self {
            application: application.into().trim().to_string(),
            job_id: run.job_id.clone(),
            attempt_id: run.attempt_id,
        }
    }

    pub fn kind(&self) -> Result<ApplicationKind, ModelError> {
        self.application.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_config_keeps_opaque_fields() {
        let json = r#"{"jobId":"17","attemptId":2,"sourceDockerImage":"src:1"}"#;
        let cfg: RunConfig = serde_json::from_str(json).unwrap();

        assert_eq!(cfg.job_id, "17");
        assert_eq!(cfg.attempt_id, 2);
        assert_eq!(cfg.extra.get("sourceDockerImage").and_then(Value::as_str), Some("src:1"));

        let back = serde_json::to_value(&cfg).unwrap();
        assert_eq!(back["sourceDockerImage"], "src:1");
    }

    #[test]
    fn run_config_requires_ids() {
        let res: Result<RunConfig, _> = serde_json::from_str(r#"{"jobId":"17"}"#);
        assert!(res.is_err());
    }

    #[test]
    fn job_root_is_workspace_job_attempt() {
        let cfg = RunConfig::new("42", 3);
        assert_eq!(
            cfg.job_root(Path::new("/workspace")),
            PathBuf::from("/workspace/42/3")
        );
    }

    #[test]
    fn identity_trims_application_and_defers_validation() {
        let run = RunConfig::new("1", 0);
        let identity = TaskIdentity::new("bogus\n", &run);
        assert_eq!(identity.application, "bogus");
        assert!(identity.kind().is_err());
    }
}
