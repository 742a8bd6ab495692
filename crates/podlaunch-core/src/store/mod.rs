//! Durable lifecycle documents.
//!
//! Each status is its own document at `<ns>/<pod>/<STATUS>` below the store root
//! (the state storage prefix). Only `SUCCEEDED` has a body: the job output.

mod fs;
pub use fs::FsStateStore;

mod memory;
pub use memory::MemoryStateStore;

use async_trait::async_trait;
use podlaunch_model::{LifecycleStatus, PodReference};
use thiserror::Error;

/// Read order used by watchers: the most advanced document wins.
const OBSERVE_ORDER: [LifecycleStatus; 4] = [
    LifecycleStatus::Succeeded,
    LifecycleStatus::Failed,
    LifecycleStatus::Running,
    LifecycleStatus::Initializing,
];

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("state storage io on {key}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
    #[error("state storage unavailable: {0}")]
    Unavailable(String),
}

/// Key of the document recording `status` for `pod`.
pub fn document_key(pod: &PodReference, status: LifecycleStatus) -> String {
    format!("{}/{}/{}", pod.namespace, pod.name, status.as_str())
}

#[async_trait]
pub trait StateStore: Send + Sync {
    /// Write `body` at `key`, replacing any previous document. Must be durable on return.
    async fn put(&self, key: &str, body: &str) -> Result<(), StoreError>;

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Most advanced status recorded for `pod`, if any.
    async fn status_of(&self, pod: &PodReference) -> Result<Option<LifecycleStatus>, StoreError> {
        for status in OBSERVE_ORDER {
            if self.get(&document_key(pod, status)).await?.is_some() {
                return Ok(Some(status));
            }
        }
        Ok(None)
    }

    /// Output recorded with `SUCCEEDED`.
    async fn output_of(&self, pod: &PodReference) -> Result<Option<String>, StoreError> {
        self.get(&document_key(pod, LifecycleStatus::Succeeded)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_layout_is_namespace_pod_status() {
        let pod = PodReference::new("jobs", "orch-7-1");
        assert_eq!(
            document_key(&pod, LifecycleStatus::Running),
            "jobs/orch-7-1/RUNNING"
        );
    }

    #[tokio::test]
    async fn status_of_prefers_terminal_documents() {
        let store = MemoryStateStore::new();
        let pod = PodReference::new("jobs", "p");
        assert_eq!(store.status_of(&pod).await.unwrap(), None);

        store.put(&document_key(&pod, LifecycleStatus::Initializing), "").await.unwrap();
        store.put(&document_key(&pod, LifecycleStatus::Running), "").await.unwrap();
        assert_eq!(store.status_of(&pod).await.unwrap(), Some(LifecycleStatus::Running));

        store.put(&document_key(&pod, LifecycleStatus::Succeeded), "done").await.unwrap();
        assert_eq!(store.status_of(&pod).await.unwrap(), Some(LifecycleStatus::Succeeded));
        assert_eq!(store.output_of(&pod).await.unwrap().as_deref(), Some("done"));
    }
}
