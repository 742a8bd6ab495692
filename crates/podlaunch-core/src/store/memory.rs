use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use podlaunch_model::LifecycleStatus;

use super::{StateStore, StoreError};

#[derive(Default)]
struct Inner {
    docs: HashMap<String, String>,
    /// Every successful put, in order.
    history: Vec<(String, String)>,
    /// Puts to keys ending with one of these fail.
    failing: Vec<String>,
}

/// Process-local store that keeps its write history; used for dry runs and tests.
#[derive(Default)]
pub struct MemoryStateStore {
    inner: Mutex<Inner>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every put to a key ending with `suffix` fail with [`StoreError::Unavailable`].
    pub fn fail_writes_to(self, suffix: impl Into<String>) -> Self {
        self.lock().failing.push(suffix.into());
        self
    }

    pub fn writes(&self) -> Vec<(String, String)> {
        self.lock().history.clone()
    }

    /// Statuses written so far, read back from the document names.
    pub fn written_statuses(&self) -> Vec<LifecycleStatus> {
        self.lock()
            .history
            .iter()
            .filter_map(|(key, _)| key.rsplit('/').next()?.parse().ok())
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn put(&self, key: &str, body: &str) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if inner.failing.iter().any(|s| key.ends_with(s.as_str())) {
            return Err(StoreError::Unavailable(format!("write to {key} rejected")));
        }
        inner.docs.insert(key.to_string(), body.to_string());
        inner.history.push((key.to_string(), body.to_string()));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.lock().docs.get(key).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_history_in_order() {
        let store = MemoryStateStore::new();
        store.put("ns/p/INITIALIZING", "").await.unwrap();
        store.put("ns/p/RUNNING", "").await.unwrap();

        assert_eq!(store.writes().len(), 2);
        assert_eq!(
            store.written_statuses(),
            vec![LifecycleStatus::Initializing, LifecycleStatus::Running]
        );
    }

    #[tokio::test]
    async fn rejected_writes_leave_no_trace() {
        let store = MemoryStateStore::new().fail_writes_to("/FAILED");
        assert!(store.put("ns/p/FAILED", "").await.is_err());
        assert!(store.writes().is_empty());
        assert_eq!(store.get("ns/p/FAILED").await.unwrap(), None);
    }
}
