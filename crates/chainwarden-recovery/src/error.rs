use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecoveryError {
    #[error("Container not found: {0}")]
    ContainerNotFound(String),

    #[error("Restart of {container} timed out after {timeout:?}")]
    RestartTimeout { container: String, timeout: Duration },

    #[error("Restart of {container} failed: {output}")]
    RestartFailed { container: String, output: String },

    #[error("Status query for {container} failed: {output}")]
    StatusFailed { container: String, output: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Webhook error: {0}")]
    Webhook(String),
}

pub type Result<T> = std::result::Result<T, RecoveryError>;
