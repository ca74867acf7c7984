//! Recovery actuators
//!
//! Container restarts through the container-runtime CLI and operator
//! alerts through Discord/Slack-shaped webhooks.

pub mod alerts;
pub mod container;
pub mod error;

pub use alerts::{discord_payload, slack_payload, Alert, AlertSeverity, AlertSink, WebhookAlerter};
pub use container::{
    ContainerRuntime, ContainerStatus, DockerRuntime, DEFAULT_DOCKER_BINARY,
    DEFAULT_RESTART_TIMEOUT,
};
pub use error::{RecoveryError, Result};
