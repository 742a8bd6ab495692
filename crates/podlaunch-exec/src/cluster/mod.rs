//! Cluster-orchestrated launch: workloads become pods created through the cluster API.

mod client;
pub use client::{ClusterClient, PodPhase};

mod launcher;
pub use launcher::{ClusterHandle, ClusterLauncher};

use std::{fs, net::IpAddr, path::PathBuf, time::Duration};

use async_trait::async_trait;
use tracing::debug;

use crate::error::LaunchError;

const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";

/// Builds the cluster API client and discovers this pod's address.
///
/// Both steps are side effects that only the cluster branch performs.
#[async_trait]
pub trait ClusterConnector: Send + Sync {
    fn connect(&self) -> Result<ClusterClient, LaunchError>;

    async fn local_address(&self) -> Result<IpAddr, LaunchError> {
        local_address().await
    }
}

/// Connects with the pod's mounted service account.
#[derive(Debug, Clone)]
pub struct InClusterConnector {
    pub service_account_dir: PathBuf,
    pub request_timeout: Duration,
}

impl Default for InClusterConnector {
    fn default() -> Self {
        Self {
            service_account_dir: PathBuf::from(SERVICE_ACCOUNT_DIR),
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[async_trait]
impl ClusterConnector for InClusterConnector {
    fn connect(&self) -> Result<ClusterClient, LaunchError> {
        let host = std::env::var("KUBERNETES_SERVICE_HOST").map_err(|_| {
            LaunchError::ClusterUnavailable("KUBERNETES_SERVICE_HOST is not set".into())
        })?;
        let port = std::env::var("KUBERNETES_SERVICE_PORT").unwrap_or_else(|_| "443".into());
        let base = match host.parse::<IpAddr>() {
            Ok(IpAddr::V6(v6)) => format!("https://[{v6}]:{port}"),
            _ => format!("https://{host}:{port}"),
        };

        let token_path = self.service_account_dir.join("token");
        let token = fs::read_to_string(&token_path).map_err(|e| {
            LaunchError::ClusterUnavailable(format!("read {}: {e}", token_path.display()))
        })?;

        let ca_path = self.service_account_dir.join("ca.crt");
        let ca = fs::read(&ca_path).map_err(|e| {
            LaunchError::ClusterUnavailable(format!("read {}: {e}", ca_path.display()))
        })?;
        let ca = reqwest::Certificate::from_pem(&ca)
            .map_err(|e| LaunchError::ClusterUnavailable(format!("ca certificate: {e}")))?;

        let http = reqwest::Client::builder()
            .add_root_certificate(ca)
            .timeout(self.request_timeout)
            .build()
            .map_err(|e| LaunchError::ClusterUnavailable(e.to_string()))?;

        debug!(target: "podlaunch.exec.cluster", %base, "cluster client constructed");
        Ok(ClusterClient::new(base, Some(token.trim().to_string()), http))
    }
}

/// Address other pods can reach this one on: the first non-loopback address the
/// hostname resolves to, IPv4 preferred.
pub async fn local_address() -> Result<IpAddr, LaunchError> {
    let host = hostname::get().map_err(|e| LaunchError::Address(format!("hostname: {e}")))?;
    let host = host
        .into_string()
        .map_err(|h| LaunchError::Address(format!("hostname is not utf-8: {h:?}")))?;

    let addrs: Vec<IpAddr> = tokio::net::lookup_host((host.as_str(), 0))
        .await
        .map_err(|e| LaunchError::Address(format!("resolve {host}: {e}")))?
        .map(|sa| sa.ip())
        .collect();

    pick_address(&addrs).ok_or_else(|| LaunchError::Address(format!("{host} has no addresses")))
}

fn pick_address(addrs: &[IpAddr]) -> Option<IpAddr> {
    addrs
        .iter()
        .find(|ip| ip.is_ipv4() && !ip.is_loopback())
        .or_else(|| addrs.iter().find(|ip| !ip.is_loopback()))
        .or_else(|| addrs.first())
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    #[test]
    fn pick_prefers_non_loopback_ipv4() {
        let addrs = [
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            IpAddr::V6(Ipv6Addr::new(0xfd00, 0, 0, 0, 0, 0, 0, 1)),
            IpAddr::V4(Ipv4Addr::new(10, 1, 2, 3)),
        ];
        assert_eq!(pick_address(&addrs), Some(IpAddr::V4(Ipv4Addr::new(10, 1, 2, 3))));
    }

    #[test]
    fn pick_falls_back_to_loopback() {
        let addrs = [IpAddr::V4(Ipv4Addr::LOCALHOST)];
        assert_eq!(pick_address(&addrs), Some(IpAddr::V4(Ipv4Addr::LOCALHOST)));
        assert_eq!(pick_address(&[]), None);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn own_address_lookup_runs_on_a_single_threaded_runtime() {
        let found = InClusterConnector::default().local_address().await;
        assert!(matches!(found, Ok(_) | Err(LaunchError::Address(_))));
    }

    #[test]
    fn in_cluster_connect_fails_without_service_account() {
        let dir = std::env::temp_dir().join("podlaunch-no-such-service-account");
        let connector = InClusterConnector {
            service_account_dir: dir,
            ..Default::default()
        };
        assert!(matches!(
            connector.connect(),
            Err(LaunchError::ClusterUnavailable(_))
        ));
    }
}
