use std::process::Stdio;

use tokio::{
    io::{AsyncBufReadExt, BufReader},
    process::{Child, Command},
    task::JoinHandle,
};
use tracing::{debug, info, trace, warn};

use crate::{JobSpec, error::LaunchError, launcher::WorkloadExit, spec::dns_label};

/// Mount points inside every local container.
const WORKSPACE_MOUNT_TARGET: &str = "/data";
const LOCAL_MOUNT_TARGET: &str = "/local";

/// Volume specs passed to the container runtime.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalMounts {
    /// Volume or host path holding the shared workspace.
    pub workspace: String,
    /// Host path exposed for local file destinations.
    pub local: String,
}

/// Runs workloads as containers on the local container runtime.
#[derive(Clone, Debug)]
pub struct LocalContainerLauncher {
    mounts: LocalMounts,
    network: String,
    runtime: String,
}

impl LocalContainerLauncher {
    pub fn new(mounts: LocalMounts, network: impl Into<String>) -> Self {
        Self {
            mounts,
            network: network.into(),
            runtime: "docker".to_string(),
        }
    }

    /// Override the runtime binary (`docker`, `podman`, ...).
    pub fn with_runtime(mut self, runtime: impl Into<String>) -> Self {
        self.runtime = runtime.into();
        self
    }

    pub fn mounts(&self) -> &LocalMounts {
        &self.mounts
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    pub async fn launch(&self, spec: &JobSpec) -> Result<LocalHandle, LaunchError> {
        spec.validate()?;
        let name = dns_label(&spec.name);
        let mut cmd = Command::new(&self.runtime);
        cmd.args(self.run_args(&name, spec));
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::inherit());
        cmd.kill_on_drop(true);

        trace!(target: "podlaunch.exec.local", runtime = %self.runtime, container = %name, "spawn");
        let mut child = cmd
            .spawn()
            .map_err(|e| LaunchError::Spawn(format!("{}: {e}", self.runtime)))?;

        let relay = child.stdout.take().map(|stdout| {
            let container = name.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    info!(target: "podlaunch.exec.local.out", %container, "{line}");
                }
            })
        });

        info!(target: "podlaunch.exec.local", container = %name, image = %spec.image, "container started");
        Ok(LocalHandle {
            name,
            runtime: self.runtime.clone(),
            child,
            relay,
        })
    }

    /// Arguments for `<runtime> run`.
    pub(crate) fn run_args(&self, name: &str, spec: &JobSpec) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "run".into(),
            "--rm".into(),
            "--init".into(),
            "--name".into(),
            name.into(),
            "--network".into(),
            self.network.clone(),
            "-v".into(),
            format!("{}:{WORKSPACE_MOUNT_TARGET}", self.mounts.workspace),
            "-v".into(),
            format!("{}:{LOCAL_MOUNT_TARGET}", self.mounts.local),
        ];
        if let Some(dir) = &spec.work_dir {
            args.push("-w".into());
            args.push(format!("{WORKSPACE_MOUNT_TARGET}/{}", dir.display()));
        }
        for (k, v) in spec.env.to_pairs() {
            args.push("-e".into());
            args.push(format!("{k}={v}"));
        }
        for (k, v) in &spec.labels {
            args.push("--label".into());
            args.push(format!("{k}={v}"));
        }
        args.push(spec.image.clone());
        args.extend(spec.args.iter().cloned());
        args
    }
}

/// A running local container.
pub struct LocalHandle {
    name: String,
    runtime: String,
    child: Child,
    relay: Option<JoinHandle<()>>,
}

impl LocalHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn wait(&mut self) -> Result<WorkloadExit, LaunchError> {
        let status = self.child.wait().await?;
        if let Some(relay) = self.relay.take() {
            // drain the tail of the output
            let _ = relay.await;
        }
        match status.code() {
            Some(code) => {
                debug!(target: "podlaunch.exec.local", container = %self.name, code, "container exited");
                Ok(WorkloadExit::new(&self.name, code))
            }
            None => Err(LaunchError::KilledBySignal),
        }
    }

    /// Remove the container, then kill the runtime client attached to it.
    ///
    /// Killing the client alone leaves the container running under the daemon.
    pub async fn stop(&mut self) -> Result<(), LaunchError> {
        let removed = Command::new(&self.runtime)
            .args(["rm", "-f", self.name.as_str()])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| LaunchError::Spawn(format!("{}: {e}", self.runtime)))?;
        if !removed.success() {
            warn!(target: "podlaunch.exec.local", container = %self.name, status = %removed, "container removal failed");
        }

        // Already exited is fine.
        let _ = self.child.start_kill();
        info!(target: "podlaunch.exec.local", container = %self.name, "container stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn launcher() -> LocalContainerLauncher {
        LocalContainerLauncher::new(
            LocalMounts {
                workspace: "airbyte_workspace".into(),
                local: "/tmp/airbyte_local".into(),
            },
            "host",
        )
    }

    #[test]
    fn run_args_carry_mounts_network_env_and_workdir() {
        let mut spec = JobSpec::new("dest", "dest:2")
            .with_work_dir("12/1")
            .with_label("job_id", "12");
        spec.env.push("A", "1");
        spec.args = vec!["write".into(), "--config".into(), "c.json".into()];

        let args = launcher().run_args("dest", &spec);
        let joined = args.join(" ");

        assert!(joined.starts_with("run --rm --init --name dest --network host"));
        assert!(joined.contains("-v airbyte_workspace:/data"));
        assert!(joined.contains("-v /tmp/airbyte_local:/local"));
        assert!(joined.contains("-w /data/12/1"));
        assert!(joined.contains("-e A=1"));
        assert!(joined.contains("--label job_id=12"));
        assert!(joined.ends_with("dest:2 write --config c.json"));
    }

    #[tokio::test]
    async fn missing_runtime_is_a_spawn_error() {
        let launcher = launcher().with_runtime("podlaunch-definitely-missing-runtime");
        let err = launcher.launch(&JobSpec::new("x", "img:1")).await.err().unwrap();
        assert!(matches!(err, LaunchError::Spawn(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn wait_reports_exit_code() {
        // `sh run ...` fails because "run" is not a script; good enough to observe a non-zero exit.
        let launcher = launcher().with_runtime("sh");
        let mut handle = launcher.launch(&JobSpec::new("reader", "img:1")).await.unwrap();
        let exit = handle.wait().await.unwrap();
        assert_eq!(exit.name, "reader");
        assert_ne!(exit.code, 0);
        assert!(!exit.success());
    }
}
