//! Chain-specific RPC error classification
//!
//! Litecoin-family nodes report two well-known families of
//! `getblocktemplate` failures: sidechain (MWEB) block-validation
//! errors, which warrant a restart, and initial-sync / index-loading
//! conditions, which must never trigger one. Both are recognized by
//! case-insensitive substring match against fixed pattern tables.

use crate::error::ProbeError;

/// Error signatures emitted by the MWEB extension-block validator.
pub const MWEB_ERROR_PATTERNS: &[&str] = &[
    "mweb-connect-failed",
    "MWEB::Node::ConnectBlock",
    "PedersenCommitSum",
    "secp256k1_pedersen_commit_sum",
];

/// Error signatures for nodes that are syncing or still loading state.
pub const IBD_ERROR_PATTERNS: &[&str] = &[
    "initial sync",
    "initialblockdownload",
    "Loading block index",
    "Rewinding blocks",
    "Verifying blocks",
    "Loading banlist",
    "Loading wallet",
    "Rescanning",
];

fn matches_any(message: &str, patterns: &[&str]) -> bool {
    let lower = message.to_lowercase();
    patterns
        .iter()
        .any(|pattern| lower.contains(&pattern.to_lowercase()))
}

/// Whether a raw error message carries an MWEB validation signature.
pub fn is_mweb_message(message: &str) -> bool {
    matches_any(message, MWEB_ERROR_PATTERNS)
}

/// Whether a raw error message carries an initial-sync signature.
pub fn is_ibd_message(message: &str) -> bool {
    matches_any(message, IBD_ERROR_PATTERNS)
}

/// Whether an error is an MWEB validation failure, either by sentinel
/// identity or by pattern match on the wrapped message.
pub fn is_mweb_error(err: &ProbeError) -> bool {
    match err {
        ProbeError::MwebFailure(_) => true,
        ProbeError::Rpc { message, .. } => is_mweb_message(message),
        ProbeError::TemplateFailed(message) => is_mweb_message(message),
        _ => false,
    }
}

/// Whether an error is an initial-sync condition, either by sentinel
/// identity or by pattern match on the wrapped message.
pub fn is_ibd_error(err: &ProbeError) -> bool {
    match err {
        ProbeError::NodeInIbd(_) => true,
        ProbeError::Rpc { message, .. } => is_ibd_message(message),
        ProbeError::TemplateFailed(message) => is_ibd_message(message),
        _ => false,
    }
}

/// Wrap a block-template RPC error into its classified kind.
///
/// MWEB signatures take precedence over sync signatures; anything else
/// becomes a generic template failure with code and message preserved.
pub fn classify_template_error(code: i64, message: &str) -> ProbeError {
    if is_mweb_message(message) {
        ProbeError::MwebFailure(message.to_string())
    } else if is_ibd_message(message) {
        ProbeError::NodeInIbd(message.to_string())
    } else {
        ProbeError::TemplateFailed(format!("RPC error {}: {}", code, message))
    }
}
