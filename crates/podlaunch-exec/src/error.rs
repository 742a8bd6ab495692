use thiserror::Error;

#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("invalid job spec: {0}")]
    InvalidSpec(String),
    #[error("spawn failed: {0}")]
    Spawn(String),
    #[error("killed by signal")]
    KilledBySignal,
    #[error("io error: {0}")]
    Io(String),
    #[error("cluster client unavailable: {0}")]
    ClusterUnavailable(String),
    #[error("cluster api error: {0}")]
    ClusterApi(String),
    #[error("cannot determine own network address: {0}")]
    Address(String),
    #[error("invalid port pool: {0}")]
    InvalidPortPool(String),
    #[error("not enough relay ports: need {needed}, {available} available")]
    PortsExhausted { needed: usize, available: usize },
    #[error("heartbeat server failed: {0}")]
    Heartbeat(String),
}

impl From<std::io::Error> for LaunchError {
    fn from(e: std::io::Error) -> Self {
        LaunchError::Io(e.to_string())
    }
}

impl From<reqwest::Error> for LaunchError {
    fn from(e: reqwest::Error) -> Self {
        LaunchError::ClusterApi(e.to_string())
    }
}
