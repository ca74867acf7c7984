use thiserror::Error;

/// Errors produced while probing a chain node over RPC.
#[derive(Error, Debug)]
pub enum ProbeError {
    /// Transport-level failure: connection refused, DNS, TLS, deadline.
    #[error("RPC unreachable: {0}")]
    Unreachable(String),

    /// Well-formed error object returned by the remote node.
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// Malformed response or missing expected field.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Block template rejected by the sidechain block validator.
    #[error("Sidechain block validation failed: {0}")]
    MwebFailure(String),

    /// Block template unavailable because the node is still syncing
    /// or loading its indexes.
    #[error("Node in initial block download: {0}")]
    NodeInIbd(String),

    /// Block template generation failed for a reason with no
    /// chain-specific signature.
    #[error("Block template generation failed: {0}")]
    TemplateFailed(String),
}

impl From<reqwest::Error> for ProbeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ProbeError::Parse(err.to_string())
        } else {
            ProbeError::Unreachable(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ProbeError {
    fn from(err: serde_json::Error) -> Self {
        ProbeError::Parse(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ProbeError>;
