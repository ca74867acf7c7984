//! Diagnostics snapshot and the probe sequencer
//!
//! One `Diagnostics` value is produced per probe. The sequencer never
//! fails: an unreachable node yields a snapshot with
//! `rpc_connected = false` and everything downstream unset.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::classifier;
use crate::traits::ChainProber;

/// Tag recorded when the block-template error carries an MWEB
/// validation signature.
pub const CHAIN_ERROR_MWEB: &str = "MWEB_FAILURE";

/// Tag recorded when the block-template error indicates the node is
/// still syncing or loading.
pub const CHAIN_ERROR_IBD: &str = "NODE_IN_IBD";

/// Mempool statistics reported by the node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MempoolSnapshot {
    /// Number of transactions currently queued.
    pub size: u64,
    /// Serialized size of the queued transactions.
    pub bytes: u64,
    /// Total memory usage of the mempool.
    pub usage: u64,
    /// Configured mempool ceiling.
    pub max_bytes: u64,
    /// Minimum fee rate for acceptance.
    pub min_fee: f64,
}

/// Point-in-time health snapshot of a single chain node.
///
/// When `rpc_connected` is false only `timestamp`, `rpc_latency` and
/// `rpc_error` are meaningful; consumers must treat every other field
/// as absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub chain_name: String,
    pub timestamp: DateTime<Utc>,

    pub rpc_connected: bool,
    pub rpc_latency: Duration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpc_error: Option<String>,

    /// Verification progress in `[0, 1]`.
    pub sync_progress: f64,
    pub is_ibd: bool,
    pub block_height: u64,

    pub block_template_ok: bool,
    pub block_template_latency: Duration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_template_error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mempool: Option<MempoolSnapshot>,

    /// Classified chain-specific error tags, in detection order.
    #[serde(default)]
    pub chain_specific_errors: Vec<String>,
}

impl Diagnostics {
    /// Empty snapshot for a chain, stamped now.
    pub fn empty(chain_name: &str) -> Self {
        Self {
            chain_name: chain_name.to_string(),
            timestamp: Utc::now(),
            rpc_connected: false,
            rpc_latency: Duration::ZERO,
            rpc_error: None,
            sync_progress: 0.0,
            is_ibd: false,
            block_height: 0,
            block_template_ok: false,
            block_template_latency: Duration::ZERO,
            block_template_error: None,
            mempool: None,
            chain_specific_errors: Vec::new(),
        }
    }

    /// Whether a chain-specific tag was recorded for this probe.
    pub fn has_chain_error(&self, tag: &str) -> bool {
        self.chain_specific_errors.iter().any(|t| t == tag)
    }
}

/// Run the full capability sequence against a prober and compose the
/// snapshot. Infallible by design; per-op failures degrade the
/// snapshot instead of propagating.
pub async fn run_diagnostics(prober: &dyn ChainProber, rpc_timeout: Duration) -> Diagnostics {
    let mut diag = Diagnostics::empty(prober.chain_name());

    let started = Instant::now();
    match prober.check_connectivity(rpc_timeout).await {
        Ok(()) => {
            diag.rpc_latency = started.elapsed();
            diag.rpc_connected = true;
        }
        Err(err) => {
            diag.rpc_latency = started.elapsed();
            diag.rpc_error = Some(err.to_string());
            warn!(chain = %diag.chain_name, "RPC unreachable: {}", err);
            return diag;
        }
    }

    match prober.sync_progress(rpc_timeout).await {
        Ok(progress) => diag.sync_progress = progress,
        Err(err) => debug!(chain = %diag.chain_name, "sync_progress failed: {}", err),
    }
    match prober.is_ibd(rpc_timeout).await {
        Ok(ibd) => diag.is_ibd = ibd,
        Err(err) => debug!(chain = %diag.chain_name, "is_ibd failed: {}", err),
    }
    match prober.tip_height(rpc_timeout).await {
        Ok(height) => diag.block_height = height,
        Err(err) => debug!(chain = %diag.chain_name, "tip_height failed: {}", err),
    }

    let template_started = Instant::now();
    match prober.block_template(rpc_timeout).await {
        Ok(()) => {
            diag.block_template_latency = template_started.elapsed();
            diag.block_template_ok = true;
        }
        Err(err) => {
            diag.block_template_latency = template_started.elapsed();
            diag.block_template_error = Some(err.to_string());
            if classifier::is_mweb_error(&err) {
                diag.chain_specific_errors.push(CHAIN_ERROR_MWEB.to_string());
                warn!(chain = %diag.chain_name, "MWEB validation failure: {}", err);
            }
            if classifier::is_ibd_error(&err) {
                diag.chain_specific_errors.push(CHAIN_ERROR_IBD.to_string());
                // A node that cannot build templates because it is
                // loading must not look like a template fault.
                diag.is_ibd = true;
                debug!(chain = %diag.chain_name, "node still syncing: {}", err);
            }
        }
    }

    if let Some(mempool) = prober.mempool() {
        match mempool.mempool_info(rpc_timeout).await {
            Ok(snapshot) => diag.mempool = Some(snapshot),
            Err(err) => debug!(chain = %diag.chain_name, "mempool_info failed: {}", err),
        }
    }

    diag
}
