//! Container restart actuator
//!
//! Drives the container-runtime CLI (`docker` by default) with a hard
//! deadline per invocation. A restart only counts as successful when
//! the tool exits zero AND echoes the container name back; stub
//! runtimes that exit zero without doing anything are treated as
//! failures.

use std::path::PathBuf;
use std::process::Output;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{info, warn};

use crate::error::{RecoveryError, Result};

pub const DEFAULT_DOCKER_BINARY: &str = "/usr/bin/docker";
pub const DEFAULT_RESTART_TIMEOUT: Duration = Duration::from_secs(60);

/// Coarse container state derived from `docker inspect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerStatus {
    Running,
    Stopped,
    Restarting,
    Unknown,
}

impl ContainerStatus {
    /// Map a raw `.State.Status` value.
    pub fn from_docker(raw: &str) -> Self {
        match raw {
            "running" => ContainerStatus::Running,
            "exited" | "dead" => ContainerStatus::Stopped,
            "restarting" => ContainerStatus::Restarting,
            _ => ContainerStatus::Unknown,
        }
    }
}

/// Actuator seam: restart and inspect supervised containers.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn restart(&self, container: &str) -> Result<()>;
    async fn status(&self, container: &str) -> Result<ContainerStatus>;
}

/// `ContainerRuntime` backed by the docker CLI.
#[derive(Debug, Clone)]
pub struct DockerRuntime {
    binary: PathBuf,
    timeout: Duration,
}

impl Default for DockerRuntime {
    fn default() -> Self {
        Self::new(PathBuf::from(DEFAULT_DOCKER_BINARY), DEFAULT_RESTART_TIMEOUT)
    }
}

impl DockerRuntime {
    pub fn new(binary: PathBuf, timeout: Duration) -> Self {
        Self { binary, timeout }
    }
}

fn combined_output(output: &Output) -> String {
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    text
}

fn is_not_found(output: &str) -> bool {
    output.to_lowercase().contains("no such container")
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn restart(&self, container: &str) -> Result<()> {
        info!("🔄 Restarting container {}", container);

        let mut command = Command::new(&self.binary);
        command.args(["restart", container]).kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(output) => output?,
            Err(_) => {
                warn!("Restart of {} exceeded {:?}", container, self.timeout);
                return Err(RecoveryError::RestartTimeout {
                    container: container.to_string(),
                    timeout: self.timeout,
                });
            }
        };

        let combined = combined_output(&output);
        if is_not_found(&combined) {
            return Err(RecoveryError::ContainerNotFound(container.to_string()));
        }
        if !output.status.success() || !combined.contains(container) {
            return Err(RecoveryError::RestartFailed {
                container: container.to_string(),
                output: combined.trim().to_string(),
            });
        }

        info!("✅ Container {} restarted", container);
        Ok(())
    }

    async fn status(&self, container: &str) -> Result<ContainerStatus> {
        let mut command = Command::new(&self.binary);
        command
            .args(["inspect", "--format", "{{.State.Status}}", container])
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(output) => output?,
            Err(_) => {
                return Err(RecoveryError::StatusFailed {
                    container: container.to_string(),
                    output: format!("timed out after {:?}", self.timeout),
                })
            }
        };

        let combined = combined_output(&output);
        if is_not_found(&combined) {
            return Err(RecoveryError::ContainerNotFound(container.to_string()));
        }
        if !output.status.success() {
            return Err(RecoveryError::StatusFailed {
                container: container.to_string(),
                output: combined.trim().to_string(),
            });
        }

        let raw = String::from_utf8_lossy(&output.stdout);
        Ok(ContainerStatus::from_docker(raw.trim()))
    }
}
