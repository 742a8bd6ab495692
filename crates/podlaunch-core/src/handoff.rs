//! Hand-off of the configuration documents into the pod.
//!
//! The scheduler copies the documents into [`CONFIG_DIR`] after the pod has started and
//! creates [`SENTINEL_FILE`] last. There is no push signal, so the directory is polled.

use std::{
    io,
    path::{Path, PathBuf},
    time::Duration,
};

use podlaunch_model::{EnvironmentMap, PodReference, RunConfig, TaskIdentity};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info};

pub const CONFIG_DIR: &str = "/config";
pub const SENTINEL_FILE: &str = "FINISHED_UPLOADING";
pub const APPLICATION_FILE: &str = "application.txt";
pub const ENV_MAP_FILE: &str = "envMap.json";
pub const RUN_CONFIG_FILE: &str = "jobRunConfig.json";
pub const POD_INFO_FILE: &str = "KUBE_POD_INFO";
/// Job-kind specific input, read by the job orchestrators rather than here.
pub const INPUT_FILE: &str = "input.json";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum HandoffError {
    #[error("config files did not arrive in {} within {waited:?}", dir.display())]
    Timeout { dir: PathBuf, waited: Duration },
    #[error("read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed {file}: {reason}")]
    Malformed { file: &'static str, reason: String },
}

/// Everything delivered by the hand-off.
#[derive(Debug, Clone, PartialEq)]
pub struct Handoff {
    pub identity: TaskIdentity,
    pub env: EnvironmentMap,
    pub run_config: RunConfig,
    pub pod: PodReference,
    pub config_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ConfigHandoff {
    dir: PathBuf,
    timeout: Duration,
    poll_interval: Duration,
}

impl ConfigHandoff {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            timeout: DEFAULT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Wait for the sentinel, then parse all documents.
    pub async fn await_and_load(&self) -> Result<Handoff, HandoffError> {
        self.wait_for_sentinel().await?;
        self.load().await
    }

    /// Poll for the sentinel until it appears or the timeout elapses.
    ///
    /// Returns the number of checks made. A missing sentinel keeps the wait going; any
    /// other error checking for it (an unreadable directory) ends it at once.
    pub async fn wait_for_sentinel(&self) -> Result<u32, HandoffError> {
        let sentinel = self.dir.join(SENTINEL_FILE);
        let started = Instant::now();
        let deadline = started + self.timeout;
        let mut checks = 0u32;

        loop {
            checks += 1;
            let present = tokio::fs::try_exists(&sentinel)
                .await
                .map_err(|source| HandoffError::Io {
                    path: sentinel.clone(),
                    source,
                })?;
            if present {
                debug!(target: "podlaunch.handoff", checks, "sentinel present");
                return Ok(checks);
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(HandoffError::Timeout {
                    dir: self.dir.clone(),
                    waited: now - started,
                });
            }

            info!(target: "podlaunch.handoff", dir = %self.dir.display(), "waiting for config file transfers to complete");
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }

    /// Parse the documents. Assumes the sentinel is present: there is no partial recovery.
    pub async fn load(&self) -> Result<Handoff, HandoffError> {
        let application = self.read(APPLICATION_FILE).await?;
        if application.trim().is_empty() {
            return Err(HandoffError::Malformed {
                file: APPLICATION_FILE,
                reason: "empty application name".into(),
            });
        }

        let env: EnvironmentMap = self.read_json(ENV_MAP_FILE).await?;
        let run_config: RunConfig = self.read_json(RUN_CONFIG_FILE).await?;
        let pod: PodReference = self.read_json(POD_INFO_FILE).await?;
        pod.validate().map_err(|e| HandoffError::Malformed {
            file: POD_INFO_FILE,
            reason: e.to_string(),
        })?;

        let identity = TaskIdentity::new(application, &run_config);
        info!(
            target: "podlaunch.handoff",
            application = %identity.application,
            job_id = %identity.job_id,
            attempt_id = identity.attempt_id,
            pod = %pod,
            env_entries = env.len(),
            "hand-off documents loaded"
        );

        Ok(Handoff {
            identity,
            env,
            run_config,
            pod,
            config_dir: self.dir.clone(),
        })
    }

    async fn read(&self, file: &'static str) -> Result<String, HandoffError> {
        let path = self.dir.join(file);
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| HandoffError::Io { path, source })
    }

    async fn read_json<T: DeserializeOwned>(&self, file: &'static str) -> Result<T, HandoffError> {
        let raw = self.read(file).await?;
        serde_json::from_str(&raw).map_err(|e| HandoffError::Malformed {
            file,
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use podlaunch_model::ApplicationKind;
    use std::fs;

    fn write_documents(dir: &Path) {
        fs::write(dir.join(APPLICATION_FILE), "NO_OP\n").unwrap();
        fs::write(
            dir.join(ENV_MAP_FILE),
            r#"{"WORKER_ENVIRONMENT":"DOCKER","LOG_LEVEL":"debug"}"#,
        )
        .unwrap();
        fs::write(
            dir.join(RUN_CONFIG_FILE),
            r#"{"jobId":"7","attemptId":1,"extra":true}"#,
        )
        .unwrap();
        fs::write(dir.join(POD_INFO_FILE), r#"{"namespace":"jobs","name":"orch-7-1"}"#).unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn loads_immediately_when_sentinel_present() {
        let tmp = tempfile::tempdir().unwrap();
        write_documents(tmp.path());
        fs::write(tmp.path().join(SENTINEL_FILE), "").unwrap();

        let handoff = ConfigHandoff::new(tmp.path());
        assert_eq!(handoff.wait_for_sentinel().await.unwrap(), 1);

        let loaded = handoff.load().await.unwrap();
        assert_eq!(loaded.identity.kind().unwrap(), ApplicationKind::NoOp);
        assert_eq!(loaded.identity.job_id, "7");
        assert_eq!(loaded.identity.attempt_id, 1);
        assert_eq!(loaded.env.get("LOG_LEVEL"), Some("debug"));
        assert_eq!(loaded.pod, PodReference::new("jobs", "orch-7-1"));
        assert_eq!(loaded.run_config.extra.get("extra"), Some(&serde_json::json!(true)));
    }

    #[tokio::test(start_paused = true)]
    async fn result_is_independent_of_poll_count() {
        let immediate = tempfile::tempdir().unwrap();
        write_documents(immediate.path());
        fs::write(immediate.path().join(SENTINEL_FILE), "").unwrap();
        let first = ConfigHandoff::new(immediate.path()).await_and_load().await.unwrap();

        let delayed = tempfile::tempdir().unwrap();
        write_documents(delayed.path());
        let sentinel = delayed.path().join(SENTINEL_FILE);
        let writer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(3_500)).await;
            fs::write(sentinel, "").unwrap();
        });

        let handoff = ConfigHandoff::new(delayed.path());
        let checks = handoff.wait_for_sentinel().await.unwrap();
        writer.await.unwrap();
        assert!(checks > 1);

        let second = handoff.load().await.unwrap();
        assert_eq!(first.identity, second.identity);
        assert_eq!(first.env, second.env);
        assert_eq!(first.run_config, second.run_config);
        assert_eq!(first.pod, second.pod);
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_without_sentinel() {
        let tmp = tempfile::tempdir().unwrap();
        write_documents(tmp.path());

        let started = Instant::now();
        let err = ConfigHandoff::new(tmp.path())
            .with_timeout(Duration::from_secs(2))
            .await_and_load()
            .await
            .unwrap_err();

        assert!(matches!(err, HandoffError::Timeout { .. }));
        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(2));
        assert!(waited < Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn unreadable_config_dir_fails_without_waiting() {
        let tmp = tempfile::tempdir().unwrap();
        let not_a_dir = tmp.path().join("config");
        fs::write(&not_a_dir, "").unwrap();

        let started = Instant::now();
        let err = ConfigHandoff::new(&not_a_dir)
            .with_timeout(Duration::from_secs(60))
            .await_and_load()
            .await
            .unwrap_err();

        assert!(matches!(err, HandoffError::Io { ref path, .. } if path.ends_with(SENTINEL_FILE)));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn malformed_document_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        write_documents(tmp.path());
        fs::write(tmp.path().join(ENV_MAP_FILE), "{not json").unwrap();
        fs::write(tmp.path().join(SENTINEL_FILE), "").unwrap();

        let err = ConfigHandoff::new(tmp.path()).await_and_load().await.unwrap_err();
        assert!(matches!(err, HandoffError::Malformed { file: ENV_MAP_FILE, .. }));
    }

    #[tokio::test]
    async fn missing_document_is_an_io_error() {
        let tmp = tempfile::tempdir().unwrap();
        write_documents(tmp.path());
        fs::remove_file(tmp.path().join(POD_INFO_FILE)).unwrap();

        let err = ConfigHandoff::new(tmp.path()).load().await.unwrap_err();
        assert!(matches!(err, HandoffError::Io { .. }));
    }

    #[tokio::test]
    async fn unsafe_pod_reference_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        write_documents(tmp.path());
        fs::write(tmp.path().join(POD_INFO_FILE), r#"{"namespace":"..","name":"x"}"#).unwrap();

        let err = ConfigHandoff::new(tmp.path()).load().await.unwrap_err();
        assert!(matches!(err, HandoffError::Malformed { file: POD_INFO_FILE, .. }));
    }
}
