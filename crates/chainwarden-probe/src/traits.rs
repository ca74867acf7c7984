//! Prober capability traits
//!
//! Each capability is its own trait so a prober only implements what
//! its chain actually supports; the diagnostics aggregator calls only
//! what is advertised. `ChainProber` is the conjunction required of
//! every registered node.

use std::time::Duration;

use async_trait::async_trait;

use crate::diagnostics::MempoolSnapshot;
use crate::error::Result;

/// Basic liveness of the RPC endpoint.
#[async_trait]
pub trait Connectivity: Send + Sync {
    /// Succeeds iff the node answers an RPC round trip within the deadline.
    async fn check_connectivity(&self, deadline: Duration) -> Result<()>;
}

/// Chain synchronization state.
#[async_trait]
pub trait SyncStatus: Send + Sync {
    /// Verification progress in `[0, 1]`.
    async fn sync_progress(&self, deadline: Duration) -> Result<f64>;

    /// Whether the node is in its initial catch-up phase.
    async fn is_ibd(&self, deadline: Duration) -> Result<bool>;

    /// Current best block height.
    async fn tip_height(&self, deadline: Duration) -> Result<u64>;
}

/// Mineable block-template generation, the strongest liveness signal
/// for mining-facing nodes.
#[async_trait]
pub trait BlockTemplate: Send + Sync {
    async fn block_template(&self, deadline: Duration) -> Result<()>;
}

/// Mempool statistics. Optional; not every chain exposes them.
#[async_trait]
pub trait MempoolInfo: Send + Sync {
    async fn mempool_info(&self, deadline: Duration) -> Result<MempoolSnapshot>;
}

/// The capability set every supervised node must provide.
pub trait ChainProber: Connectivity + SyncStatus + BlockTemplate {
    /// Stable chain identity, e.g. `"litecoin"`.
    fn chain_name(&self) -> &str;

    /// Mempool capability when the chain advertises one.
    fn mempool(&self) -> Option<&dyn MempoolInfo> {
        None
    }
}
