//! Data model shared by the launch bootstrap.
//!
//! Everything here is either delivered through the hand-off directory or written
//! to state storage, so the types are serde-first and immutable once parsed.

mod error;
pub use error::ModelError;

mod kv;
pub use kv::KeyValue;

mod env_map;
pub use env_map::EnvironmentMap;

mod application;
pub use application::ApplicationKind;

mod identity;
pub use identity::{RunConfig, TaskIdentity};

mod pod;
pub use pod::{ContainerInfo, PodReference};

mod status;
pub use status::LifecycleStatus;

mod workload;
pub use workload::{ReplicationInput, WorkloadSpec};

/// Job identifier as assigned by the scheduler that created the pod.
pub type JobId = String;

/// Attempt number of a job; starts at 0.
pub type AttemptId = i64;
