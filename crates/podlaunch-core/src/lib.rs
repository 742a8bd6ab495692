//! Bootstrap of a job-launch pod.
//!
//! The sequence is: wait for the hand-off documents, record `INITIALIZING`, resolve the
//! execution environment into a [`Launcher`](podlaunch_exec::Launcher), route to the job
//! orchestrator, record `RUNNING`, run the job, and close the lifecycle with `SUCCEEDED`
//! or `FAILED`.

pub mod config;
pub use config::{BootstrapConfig, ConfigError, STATE_STORAGE_PREFIX};

pub mod error;
pub use error::{BootstrapError, error_chain};

pub mod handoff;
pub use handoff::{ConfigHandoff, Handoff, HandoffError};

pub mod worker_env;
pub use worker_env::{ENV_VARS_TO_TRANSFER, FeatureFlags, WorkerEnv, WorkerEnvironment};

pub mod environment;
pub use environment::{EnvironmentError, EnvironmentResolver};

pub mod store;
pub use store::{FsStateStore, MemoryStateStore, StateStore, StoreError, document_key};

pub mod lifecycle;
pub use lifecycle::{Ack, Lifecycle, LifecycleError, Observed};

pub mod job;
pub use job::{JobContext, JobError, JobOrchestrator, RunJob};

pub mod router;
pub use router::{JobRouter, RouteError};

pub mod bootstrap;
pub use bootstrap::{Bootstrap, BootstrapOutcome};
