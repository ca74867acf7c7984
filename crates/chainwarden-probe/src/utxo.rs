//! UTXO-style (Litecoin-family) chain prober
//!
//! Speaks JSON-RPC 1.0 over HTTP with Basic auth against a single
//! reusable client. The block-template call requests the segwit+mweb
//! rule set; its errors are run through the chain-specific classifier.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use crate::classifier::{classify_template_error, is_ibd_message};
use crate::diagnostics::MempoolSnapshot;
use crate::error::{ProbeError, Result};
use crate::traits::{BlockTemplate, ChainProber, Connectivity, MempoolInfo, SyncStatus};

const RPC_REQUEST_ID: &str = "health-check";

/// Rule set requested from `getblocktemplate`.
const TEMPLATE_RULES: &[&str] = &["segwit", "mweb"];

/// Error object returned by the node.
#[derive(Debug, Clone, PartialEq, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// JSON-RPC 1.0 response envelope.
#[derive(Debug, Deserialize)]
struct RpcResponse<R> {
    result: Option<R>,
    error: Option<RpcErrorObject>,
    #[serde(default)]
    #[allow(dead_code)]
    id: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct BlockchainInfo {
    #[serde(default)]
    verificationprogress: f64,
    #[serde(default)]
    initialblockdownload: bool,
}

#[derive(Debug, Deserialize)]
struct RawMempoolInfo {
    #[serde(default)]
    size: u64,
    #[serde(default)]
    bytes: u64,
    #[serde(default)]
    usage: u64,
    #[serde(default, rename = "maxmempool")]
    max_mempool: u64,
    #[serde(default, rename = "mempoolminfee")]
    mempool_min_fee: f64,
}

/// Prober for Litecoin-family nodes.
#[derive(Debug, Clone)]
pub struct UtxoProber {
    chain: String,
    url: String,
    user: String,
    password: String,
    client: reqwest::Client,
}

impl UtxoProber {
    pub fn new(chain: &str, url: &str, user: &str, password: &str) -> Self {
        Self {
            chain: chain.to_string(),
            url: url.to_string(),
            user: user.to_string(),
            password: password.to_string(),
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
            .basic_auth(&self.user, Some(&self.password))
            .timeout(deadline)
            .json(&json!({
                "jsonrpc": "1.0",
                "id": RPC_REQUEST_ID,
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

    async fn blockchain_info(&self, deadline: Duration) -> Result<BlockchainInfo> {
        self.call("getblockchaininfo", json!([]), deadline).await
    }
}

#[async_trait]
impl Connectivity for UtxoProber {
    async fn check_connectivity(&self, deadline: Duration) -> Result<()> {
        self.call::<u64>("getblockcount", json!([]), deadline)
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl SyncStatus for UtxoProber {
    async fn sync_progress(&self, deadline: Duration) -> Result<f64> {
        let info = self.blockchain_info(deadline).await?;
        Ok(info.verificationprogress.clamp(0.0, 1.0))
    }

    async fn is_ibd(&self, deadline: Duration) -> Result<bool> {
        match self.blockchain_info(deadline).await {
            Ok(info) => Ok(info.initialblockdownload),
            // Nodes still loading their index reject getblockchaininfo
            // with a recognizable message. That is IBD, not a fault.
            Err(ProbeError::Rpc { ref message, .. }) if is_ibd_message(message) => Ok(true),
            Err(err) => Err(err),
        }
    }

    async fn tip_height(&self, deadline: Duration) -> Result<u64> {
        self.call("getblockcount", json!([]), deadline).await
    }
}

#[async_trait]
impl BlockTemplate for UtxoProber {
    async fn block_template(&self, deadline: Duration) -> Result<()> {
        let params = json!([{ "rules": TEMPLATE_RULES }]);
        match self
            .call::<serde_json::Value>("getblocktemplate", params, deadline)
            .await
        {
            Ok(_) => Ok(()),
            Err(ProbeError::Rpc { code, message }) => {
                Err(classify_template_error(code, &message))
            }
            Err(err) => Err(err),
        }
    }
}

#[async_trait]
impl MempoolInfo for UtxoProber {
    async fn mempool_info(&self, deadline: Duration) -> Result<MempoolSnapshot> {
        let raw: RawMempoolInfo = self.call("getmempoolinfo", json!([]), deadline).await?;
        Ok(MempoolSnapshot {
            size: raw.size,
            bytes: raw.bytes,
            usage: raw.usage,
            max_bytes: raw.max_mempool,
            min_fee: raw.mempool_min_fee,
        })
    }
}

impl ChainProber for UtxoProber {
    fn chain_name(&self) -> &str {
        &self.chain
    }

    fn mempool(&self) -> Option<&dyn MempoolInfo> {
        Some(self)
    }
}
