//! Monotonic lifecycle of the task running in this pod.
//!
//! Writes are awaited one at a time: a watcher that sees `RUNNING` may assume the job
//! started, and must never see a status go backwards.

use std::sync::Arc;

use podlaunch_model::{LifecycleStatus, PodReference};
use thiserror::Error;
use tracing::{debug, info};

use crate::store::{StateStore, StoreError, document_key};

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("cannot move from {from} to {to}")]
    Regression {
        from: LifecycleStatus,
        to: LifecycleStatus,
    },
    #[error("{0} written before INITIALIZING")]
    NotStarted(LifecycleStatus),
    #[error("write {status}")]
    Storage {
        status: LifecycleStatus,
        #[source]
        source: StoreError,
    },
}

/// Result of a successful transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    Written,
    /// Same status as the last write; nothing was stored.
    AlreadyRecorded,
}

/// What a watcher can read back for one pod.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observed {
    pub status: Option<LifecycleStatus>,
    pub output: Option<String>,
}

/// Writer side of the lifecycle for one pod. Only this process owns it.
pub struct Lifecycle {
    store: Arc<dyn StateStore>,
    pod: PodReference,
    current: Option<LifecycleStatus>,
}

impl Lifecycle {
    pub fn new(store: Arc<dyn StateStore>, pod: PodReference) -> Self {
        Self {
            store,
            pod,
            current: None,
        }
    }

    pub fn pod(&self) -> &PodReference {
        &self.pod
    }

    /// Last status durably written by this instance.
    pub fn current(&self) -> Option<LifecycleStatus> {
        self.current
    }

    /// Record `status`. `payload` is only stored with `SUCCEEDED`.
    ///
    /// On a storage error the recorded state is unchanged.
    pub async fn transition(
        &mut self,
        status: LifecycleStatus,
        payload: Option<&str>,
    ) -> Result<Ack, LifecycleError> {
        match self.current {
            Some(current) if current == status => {
                debug!(target: "podlaunch.lifecycle", pod = %self.pod, %status, "already recorded");
                return Ok(Ack::AlreadyRecorded);
            }
            Some(current) if !current.can_advance_to(status) => {
                return Err(LifecycleError::Regression {
                    from: current,
                    to: status,
                });
            }
            None if !matches!(status, LifecycleStatus::Initializing | LifecycleStatus::Failed) => {
                return Err(LifecycleError::NotStarted(status));
            }
            _ => {}
        }

        let body = match status {
            LifecycleStatus::Succeeded => payload.unwrap_or_default(),
            _ => "",
        };

        self.store
            .put(&document_key(&self.pod, status), body)
            .await
            .map_err(|source| LifecycleError::Storage { status, source })?;
        self.current = Some(status);

        info!(target: "podlaunch.lifecycle", pod = %self.pod, %status, "status recorded");
        Ok(Ack::Written)
    }

    /// Read side for watchers: most advanced status and, once succeeded, the output.
    pub async fn observe(
        store: &dyn StateStore,
        pod: &PodReference,
    ) -> Result<Observed, StoreError> {
        let status = store.status_of(pod).await?;
        let output = match status {
            Some(LifecycleStatus::Succeeded) => store.output_of(pod).await?,
            _ => None,
        };
        Ok(Observed { status, output })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStateStore;
    use LifecycleStatus::*;

    fn lifecycle() -> (Arc<MemoryStateStore>, Lifecycle) {
        let store = Arc::new(MemoryStateStore::new());
        let lc = Lifecycle::new(store.clone(), PodReference::new("jobs", "p"));
        (store, lc)
    }

    #[tokio::test]
    async fn full_success_path() {
        let (store, mut lc) = lifecycle();
        lc.transition(Initializing, None).await.unwrap();
        lc.transition(Running, None).await.unwrap();
        lc.transition(Succeeded, Some("42 rows")).await.unwrap();

        assert_eq!(store.written_statuses(), vec![Initializing, Running, Succeeded]);
        let observed = Lifecycle::observe(store.as_ref(), lc.pod()).await.unwrap();
        assert_eq!(observed.status, Some(Succeeded));
        assert_eq!(observed.output.as_deref(), Some("42 rows"));
    }

    #[tokio::test]
    async fn repeated_status_is_not_rewritten() {
        let (store, mut lc) = lifecycle();
        assert_eq!(lc.transition(Initializing, None).await.unwrap(), Ack::Written);
        assert_eq!(lc.transition(Initializing, None).await.unwrap(), Ack::AlreadyRecorded);
        assert_eq!(store.writes().len(), 1);
    }

    #[tokio::test]
    async fn terminal_status_rejects_further_writes() {
        let (store, mut lc) = lifecycle();
        lc.transition(Initializing, None).await.unwrap();
        lc.transition(Running, None).await.unwrap();
        lc.transition(Succeeded, None).await.unwrap();

        for next in [Running, Failed, Initializing] {
            assert!(matches!(
                lc.transition(next, None).await,
                Err(LifecycleError::Regression { from: Succeeded, .. })
            ));
        }
        assert_eq!(store.writes().len(), 3);
        assert_eq!(store.writes()[2].1, "");
    }

    #[tokio::test]
    async fn failed_may_follow_any_open_state() {
        let (store, mut lc) = lifecycle();
        lc.transition(Failed, None).await.unwrap();
        assert_eq!(store.written_statuses(), vec![Failed]);

        let (store, mut lc) = lifecycle();
        lc.transition(Initializing, None).await.unwrap();
        lc.transition(Failed, Some("ignored")).await.unwrap();
        assert_eq!(store.written_statuses(), vec![Initializing, Failed]);
        assert_eq!(store.writes()[1].1, "");
    }

    #[tokio::test]
    async fn running_requires_initializing() {
        let (store, mut lc) = lifecycle();
        assert!(matches!(
            lc.transition(Running, None).await,
            Err(LifecycleError::NotStarted(Running))
        ));
        assert!(store.writes().is_empty());
    }

    #[tokio::test]
    async fn storage_failure_keeps_state() {
        let store = Arc::new(MemoryStateStore::new().fail_writes_to("/RUNNING"));
        let mut lc = Lifecycle::new(store.clone(), PodReference::new("jobs", "p"));

        lc.transition(Initializing, None).await.unwrap();
        let err = lc.transition(Running, None).await.unwrap_err();
        assert!(matches!(err, LifecycleError::Storage { status: Running, .. }));
        assert_eq!(lc.current(), Some(Initializing));

        lc.transition(Failed, None).await.unwrap();
        assert_eq!(store.written_statuses(), vec![Initializing, Failed]);
    }
}
