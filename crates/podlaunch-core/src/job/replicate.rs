use podlaunch_exec::{Launcher, WorkloadExit, WorkloadHandle};
use podlaunch_model::ReplicationInput;
use serde::Serialize;
use tracing::{info, warn};

use super::{JobContext, JobError};
use crate::worker_env::FeatureFlags;

/// Relay ports each end of a replication exposes in cluster mode.
const PORTS_PER_END: usize = 2;

/// Launches the source and destination of a replication and waits for both.
///
/// The first end to fail stops the other, so a dead source never leaves the job
/// waiting on a destination that will not finish.
pub struct ReplicationOrchestrator {
    launcher: Launcher,
    ctx: JobContext,
    features: FeatureFlags,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadSummary {
    pub name: String,
    pub exit_code: i32,
}

impl From<&WorkloadExit> for WorkloadSummary {
    fn from(exit: &WorkloadExit) -> Self {
        Self {
            name: exit.name.clone(),
            exit_code: exit.code,
        }
    }
}

/// Output document of a successful replication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplicationSummary {
    pub job_id: String,
    pub attempt_id: i64,
    pub source: WorkloadSummary,
    pub destination: WorkloadSummary,
}

impl ReplicationOrchestrator {
    pub fn new(launcher: Launcher, ctx: JobContext, features: FeatureFlags) -> Self {
        Self {
            launcher,
            ctx,
            features,
        }
    }

    pub fn launcher(&self) -> &Launcher {
        &self.launcher
    }

    pub(crate) async fn run(&self) -> Result<Option<String>, JobError> {
        let input: ReplicationInput = self.ctx.read_input().await?;
        let flags = self.features.to_env();

        let destination = self
            .ctx
            .job_spec("destination", &input.destination, &flags)
            .with_ports(PORTS_PER_END);
        let source = self
            .ctx
            .job_spec("source", &input.source, &flags)
            .with_ports(PORTS_PER_END);

        // The destination starts first so it is ready to receive.
        let mut destination = self.launcher.launch(&destination).await?;
        let mut source = match self.launcher.launch(&source).await {
            Ok(handle) => handle,
            Err(e) => {
                warn!(target: "podlaunch.job", destination = %destination.name(), "source launch failed, stopping destination");
                stop(&mut destination).await;
                return Err(e.into());
            }
        };

        info!(
            target: "podlaunch.job",
            source = %source.name(),
            destination = %destination.name(),
            "replication workloads started"
        );

        let (source_first, first) = tokio::select! {
            exit = source.wait() => (true, exit),
            exit = destination.wait() => (false, exit),
        };
        let remaining = if source_first { &mut destination } else { &mut source };
        let first = match first.map_err(JobError::from).and_then(succeeded) {
            Ok(exit) => exit,
            Err(e) => {
                stop(remaining).await;
                return Err(e);
            }
        };
        let second = succeeded(remaining.wait().await?)?;
        let (source, destination) = if source_first { (first, second) } else { (second, first) };

        let summary = ReplicationSummary {
            job_id: self.ctx.identity.job_id.clone(),
            attempt_id: self.ctx.identity.attempt_id,
            source: (&source).into(),
            destination: (&destination).into(),
        };
        serde_json::to_string(&summary)
            .map(Some)
            .map_err(|e| JobError::Output(e.to_string()))
    }
}

fn succeeded(exit: WorkloadExit) -> Result<WorkloadExit, JobError> {
    if exit.success() {
        Ok(exit)
    } else {
        Err(JobError::WorkloadFailed {
            name: exit.name,
            code: exit.code,
        })
    }
}

async fn stop(handle: &mut WorkloadHandle) {
    if let Err(e) = handle.stop().await {
        warn!(target: "podlaunch.job", workload = %handle.name(), error = %e, "could not stop workload");
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::job::testing;

    fn write_input(dir: &std::path::Path) {
        std::fs::write(
            dir.join("input.json"),
            r#"{"source":{"image":"src:1","args":["read"]},"destination":{"image":"dst:1","args":["write"]}}"#,
        )
        .unwrap();
    }

    #[tokio::test]
    async fn both_ends_succeed_with_summary() {
        let tmp = tempfile::tempdir().unwrap();
        write_input(tmp.path());
        let job = ReplicationOrchestrator::new(
            testing::local_launcher("true"),
            testing::context(tmp.path(), "replication-orchestrator"),
            FeatureFlags::default(),
        );

        let output = job.run().await.unwrap().unwrap();
        let summary: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(summary["jobId"], "7");
        assert_eq!(summary["attemptId"], 1);
        assert_eq!(summary["source"]["name"], "source-7-1");
        assert_eq!(summary["destination"]["exitCode"], 0);
    }

    #[tokio::test]
    async fn failing_end_fails_the_job() {
        let tmp = tempfile::tempdir().unwrap();
        write_input(tmp.path());
        let job = ReplicationOrchestrator::new(
            testing::local_launcher("false"),
            testing::context(tmp.path(), "replication-orchestrator"),
            FeatureFlags::default(),
        );
        assert!(matches!(
            job.run().await.unwrap_err(),
            JobError::WorkloadFailed { code: 1, .. }
        ));
    }

    /// Runtime stand-in: the destination runs until killed, the source exits 1, and
    /// `rm -f <name>` is recorded next to the script.
    fn hanging_destination_runtime(dir: &std::path::Path) -> String {
        use std::os::unix::fs::PermissionsExt;

        let script = dir.join("runtime.sh");
        std::fs::write(
            &script,
            r#"#!/bin/sh
case "$1" in
  rm) echo "$3" >> "$(dirname "$0")/removed"; exit 0 ;;
esac
case "$*" in
  *"--name destination"*) exec sleep 30 ;;
esac
exit 1
"#,
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        script.display().to_string()
    }

    #[tokio::test]
    async fn failed_source_stops_the_destination() {
        let tmp = tempfile::tempdir().unwrap();
        write_input(tmp.path());
        let runtime = hanging_destination_runtime(tmp.path());
        let job = ReplicationOrchestrator::new(
            testing::local_launcher(&runtime),
            testing::context(tmp.path(), "replication-orchestrator"),
            FeatureFlags::default(),
        );

        let result = tokio::time::timeout(std::time::Duration::from_secs(10), job.run())
            .await
            .expect("job ends once the source fails");
        match result {
            Err(JobError::WorkloadFailed { name, code }) => {
                assert_eq!(name, "source-7-1");
                assert_eq!(code, 1);
            }
            other => panic!("expected the source failure, got {other:?}"),
        }

        let removed = std::fs::read_to_string(tmp.path().join("removed")).unwrap();
        assert_eq!(removed.trim(), "destination-7-1");
    }

    #[tokio::test]
    async fn malformed_input_is_rejected_before_launch() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("input.json"), r#"{"source":{"image":"src:1"}}"#).unwrap();
        let job = ReplicationOrchestrator::new(
            testing::local_launcher("podlaunch-no-such-runtime"),
            testing::context(tmp.path(), "replication-orchestrator"),
            FeatureFlags::default(),
        );
        assert!(matches!(job.run().await.unwrap_err(), JobError::Input { .. }));
    }
}
