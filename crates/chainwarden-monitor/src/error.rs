use thiserror::Error;

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Node already registered: {0}")]
    DuplicateNode(String),

    #[error("Unknown node: {0}")]
    UnknownNode(String),

    #[error("Monitor already running")]
    AlreadyRunning,

    #[error("Monitor not running")]
    NotRunning,

    #[error("Monitor shutdown timed out")]
    ShutdownTimeout,
}

pub type Result<T> = std::result::Result<T, MonitorError>;
