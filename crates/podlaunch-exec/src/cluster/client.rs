use reqwest::{Method, RequestBuilder, StatusCode};
use serde_json::Value;
use tracing::trace;

use crate::error::LaunchError;

/// Observed phase of a launched pod.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded { exit_code: i32 },
    Failed { exit_code: i32 },
    Unknown,
}

impl PodPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PodPhase::Succeeded { .. } | PodPhase::Failed { .. })
    }

    /// Read `status.phase` and the main container's exit code from a pod document.
    pub fn from_pod(pod: &Value) -> PodPhase {
        let exit_code = pod
            .pointer("/status/containerStatuses/0/state/terminated/exitCode")
            .and_then(Value::as_i64)
            .map(|c| c as i32);

        match pod.pointer("/status/phase").and_then(Value::as_str) {
            Some("Pending") => PodPhase::Pending,
            Some("Running") => PodPhase::Running,
            Some("Succeeded") => PodPhase::Succeeded {
                exit_code: exit_code.unwrap_or(0),
            },
            Some("Failed") => PodPhase::Failed {
                exit_code: exit_code.unwrap_or(1),
            },
            _ => PodPhase::Unknown,
        }
    }
}

/// Minimal cluster API client: just the pod calls the launcher needs.
#[derive(Clone, Debug)]
pub struct ClusterClient {
    http: reqwest::Client,
    base: String,
    token: Option<String>,
}

impl ClusterClient {
    pub fn new(base: impl Into<String>, token: Option<String>, http: reqwest::Client) -> Self {
        Self {
            http,
            base: base.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    /// Client without credentials or custom TLS roots.
    pub fn anonymous(base: impl Into<String>) -> Self {
        Self::new(base, None, reqwest::Client::new())
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    pub async fn create_pod(&self, namespace: &str, manifest: &Value) -> Result<(), LaunchError> {
        let url = format!("{}/api/v1/namespaces/{namespace}/pods", self.base);
        trace!(target: "podlaunch.exec.cluster", %url, "create pod");

        let resp = self.request(Method::POST, &url).json(manifest).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LaunchError::ClusterApi(format!("create pod: {status}: {body}")));
        }
        Ok(())
    }

    pub async fn pod_phase(&self, namespace: &str, name: &str) -> Result<PodPhase, LaunchError> {
        let url = format!("{}/api/v1/namespaces/{namespace}/pods/{name}", self.base);
        let resp = self.request(Method::GET, &url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LaunchError::ClusterApi(format!("get pod {name}: {status}: {body}")));
        }
        let pod: Value = resp.json().await?;
        Ok(PodPhase::from_pod(&pod))
    }

    /// Delete a pod; a pod that is already gone counts as deleted.
    pub async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), LaunchError> {
        let url = format!("{}/api/v1/namespaces/{namespace}/pods/{name}", self.base);
        let resp = self.request(Method::DELETE, &url).send().await?;
        let status = resp.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Err(LaunchError::ClusterApi(format!("delete pod {name}: {status}")))
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let req = self.http.request(method, url);
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }
}
