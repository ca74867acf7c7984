//! EVM-style chain prober
//!
//! Speaks JSON-RPC 2.0 over HTTP without authentication, suitable for
//! BlockDAG and any Ethereum-compatible endpoint. Sync state comes
//! from `eth_syncing`; the pending block stands in for a mineable
//! template.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use crate::error::{ProbeError, Result};
use crate::traits::{BlockTemplate, ChainProber, Connectivity, SyncStatus};

/// Progress at or above which a node counts as fully synced.
const SYNCED_PROGRESS_THRESHOLD: f64 = 0.9999;

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// JSON-RPC 2.0 response envelope.
#[derive(Debug, Deserialize)]
struct RpcResponse<R> {
    result: Option<R>,
    error: Option<RpcErrorObject>,
    #[serde(default)]
    #[allow(dead_code)]
    id: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct SyncingInfo {
    #[serde(rename = "currentBlock")]
    current_block: String,
    #[serde(rename = "highestBlock")]
    highest_block: String,
}

/// Decode a 0x-prefixed hex quantity.
fn parse_quantity(value: &str) -> Result<u64> {
    u64::from_str_radix(value.trim_start_matches("0x"), 16)
        .map_err(|err| ProbeError::Parse(format!("invalid hex quantity {:?}: {}", value, err)))
}

/// Prober for Ethereum-compatible nodes.
#[derive(Debug, Clone)]
pub struct EvmProber {
    chain: String,
    url: String,
    client: reqwest::Client,
}

impl EvmProber {
    pub fn new(chain: &str, url: &str) -> Self {
        Self {
            chain: chain.to_string(),
            url: url.to_string(),
            client: reqwest::Client::new(),
        }
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
        deadline: Duration,
    ) -> Result<T> {
        let response = self
            .client
            .post(&self.url)
            .timeout(deadline)
            .json(&json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": method,
                "params": params,
            }))
            .send()
            .await?;

        let envelope = response
            .json::<RpcResponse<T>>()
            .await
            .map_err(|err| ProbeError::Parse(err.to_string()))?;

        if let Some(err) = envelope.error {
            return Err(ProbeError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        envelope
            .result
            .ok_or_else(|| ProbeError::Parse(format!("empty result for {}", method)))
    }

    /// `eth_syncing` returns `false` once synced, otherwise an object
    /// with current/highest block quantities.
    async fn syncing_progress(&self, deadline: Duration) -> Result<f64> {
        let value: serde_json::Value = self.call("eth_syncing", json!([]), deadline).await?;
        if value == serde_json::Value::Bool(false) {
            return Ok(1.0);
        }
        let info: SyncingInfo = serde_json::from_value(value)?;
        let current = parse_quantity(&info.current_block)?;
        let highest = parse_quantity(&info.highest_block)?;
        if highest == 0 {
            return Ok(0.0);
        }
        Ok(current as f64 / highest as f64)
    }
}

#[async_trait]
impl Connectivity for EvmProber {
    async fn check_connectivity(&self, deadline: Duration) -> Result<()> {
        self.call::<String>("eth_blockNumber", json!([]), deadline)
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl SyncStatus for EvmProber {
    async fn sync_progress(&self, deadline: Duration) -> Result<f64> {
        self.syncing_progress(deadline).await
    }

    async fn is_ibd(&self, deadline: Duration) -> Result<bool> {
        let progress = self.syncing_progress(deadline).await?;
        Ok(progress < SYNCED_PROGRESS_THRESHOLD)
    }

    async fn tip_height(&self, deadline: Duration) -> Result<u64> {
        let hex: String = self.call("eth_blockNumber", json!([]), deadline).await?;
        parse_quantity(&hex)
    }
}

#[async_trait]
impl BlockTemplate for EvmProber {
    async fn block_template(&self, deadline: Duration) -> Result<()> {
        match self
            .call::<serde_json::Value>("eth_getBlockByNumber", json!(["pending", false]), deadline)
            .await
        {
            Ok(block) if block.is_null() => Err(ProbeError::TemplateFailed(
                "pending block unavailable".to_string(),
            )),
            Ok(_) => Ok(()),
            Err(ProbeError::Rpc { code, message }) => Err(ProbeError::TemplateFailed(format!(
                "RPC error {}: {}",
                code, message
            ))),
            Err(err) => Err(err),
        }
    }
}

impl ChainProber for EvmProber {
    fn chain_name(&self) -> &str {
        &self.chain
    }
}
