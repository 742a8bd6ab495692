use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ModelError;

/// Image of the pod's main container, as reported by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerInfo {
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pull_policy: Option<String>,
}

/// The execution unit this process runs inside.
///
/// Used as the state storage key, so it must be stable for the life of the pod.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodReference {
    pub namespace: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_container_info: Option<ContainerInfo>,
}

impl PodReference {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            main_container_info: None,
        }
    }

    /// Both parts become path segments of the storage key; reject anything that could escape it.
    pub fn validate(&self) -> Result<(), ModelError> {
        for part in [&self.namespace, &self.name] {
            if part.is_empty() || part == "." || part == ".." || part.contains('/') {
                return Err(ModelError::InvalidPodReference(self.to_string()));
            }
        }
        Ok(())
    }
}

impl fmt::Display for PodReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pod_info_document() {
        let json = r#"{"namespace":"jobs","name":"orchestrator-repl-job-1-attempt-0","mainContainerInfo":{"image":"orchestrator:dev","pullPolicy":"IfNotPresent"}}"#;
        let pod: PodReference = serde_json::from_str(json).unwrap();
        assert_eq!(pod.to_string(), "jobs/orchestrator-repl-job-1-attempt-0");
        assert_eq!(
            pod.main_container_info.unwrap().pull_policy.as_deref(),
            Some("IfNotPresent")
        );
    }

    #[test]
    fn validate_rejects_path_like_parts() {
        assert!(PodReference::new("jobs", "pod-a").validate().is_ok());
        assert!(PodReference::new("", "pod-a").validate().is_err());
        assert!(PodReference::new("jobs", "../etc").validate().is_err());
        assert!(PodReference::new("..", "pod").validate().is_err());
    }
}
