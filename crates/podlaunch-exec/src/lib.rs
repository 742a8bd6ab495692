//! Launchers for child workloads.
//!
//! A [`Launcher`] is built once per process for a concrete execution environment and
//! handed to a single job orchestrator.

mod error;
pub use error::LaunchError;

mod spec;
pub use spec::{JobSpec, dns_label};

mod ports;
pub use ports::{MIN_RELAY_PORTS, PortLease, PortPool, RELAY_PORTS};

pub mod cluster;
pub use cluster::{
    ClusterClient, ClusterConnector, ClusterHandle, ClusterLauncher, InClusterConnector, PodPhase,
};

mod local;
pub use local::{LocalContainerLauncher, LocalHandle, LocalMounts};

mod heartbeat;
pub use heartbeat::HeartbeatServer;

mod launcher;
pub use launcher::{Launcher, WorkloadExit, WorkloadHandle};
