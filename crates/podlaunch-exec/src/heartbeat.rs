use std::net::SocketAddr;

use axum::{Router, routing::get};
use tokio::{net::TcpListener, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::LaunchError;

/// Liveness endpoint polled by launched pods.
///
/// Workloads stop themselves once this stops answering, so it must live exactly as
/// long as the process that launched them. Dropping the server stops it.
pub struct HeartbeatServer {
    addr: SocketAddr,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl HeartbeatServer {
    pub async fn bind(addr: SocketAddr) -> Result<Self, LaunchError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| LaunchError::Heartbeat(format!("bind {addr}: {e}")))?;
        let addr = listener
            .local_addr()
            .map_err(|e| LaunchError::Heartbeat(e.to_string()))?;

        let cancel = CancellationToken::new();
        let shutdown = cancel.clone();
        let router = Router::new().route("/", get(|| async { "ok" }));

        let task = tokio::spawn(async move {
            let served = axum::serve(listener, router)
                .with_graceful_shutdown(shutdown.cancelled_owned())
                .await;
            if let Err(e) = served {
                warn!(target: "podlaunch.exec.heartbeat", error = %e, "heartbeat server stopped");
            }
        });

        info!(target: "podlaunch.exec.heartbeat", %addr, "heartbeat server listening");
        Ok(Self { addr, cancel, task })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop serving and wait for the listener to close.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        let _ = (&mut self.task).await;
        debug!(target: "podlaunch.exec.heartbeat", addr = %self.addr, "heartbeat server stopped");
    }
}

impl Drop for HeartbeatServer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn answers_until_shutdown() {
        let server = HeartbeatServer::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let url = format!("http://{}/", server.local_addr());

        let body = reqwest::get(&url).await.unwrap().text().await.unwrap();
        assert_eq!(body, "ok");

        server.shutdown().await;
        assert!(reqwest::get(&url).await.is_err());
    }

    #[tokio::test]
    async fn bind_conflict_is_reported() {
        let first = HeartbeatServer::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let err = HeartbeatServer::bind(first.local_addr()).await.err().unwrap();
        assert!(matches!(err, LaunchError::Heartbeat(_)));
    }
}
