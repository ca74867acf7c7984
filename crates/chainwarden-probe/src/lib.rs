//! Chain probers and diagnostics
//!
//! Per-chain RPC capability providers (UTXO and EVM dialects), the
//! chain-specific error classifier, and the sequencer that composes a
//! `Diagnostics` snapshot per probe.

pub mod classifier;
pub mod diagnostics;
pub mod error;
pub mod evm;
pub mod traits;
pub mod utxo;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

#[cfg(test)]
mod mock_rpc;

pub use diagnostics::{
    run_diagnostics, Diagnostics, MempoolSnapshot, CHAIN_ERROR_IBD, CHAIN_ERROR_MWEB,
};
pub use error::{ProbeError, Result};
pub use evm::EvmProber;
pub use traits::{BlockTemplate, ChainProber, Connectivity, MempoolInfo, SyncStatus};
pub use utxo::UtxoProber;
