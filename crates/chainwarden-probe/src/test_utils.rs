//! Programmable prober stub for aggregator and supervisor tests.

use std::time::Duration;

use async_trait::async_trait;

use crate::classifier::classify_template_error;
use crate::diagnostics::MempoolSnapshot;
use crate::error::{ProbeError, Result};
use crate::traits::{BlockTemplate, ChainProber, Connectivity, MempoolInfo, SyncStatus};

/// A `ChainProber` whose answers are fixed up front.
#[derive(Debug, Clone, Default)]
pub struct StubProber {
    pub chain: String,
    pub connect_error: Option<String>,
    pub sync_progress: f64,
    pub ibd: bool,
    pub height: u64,
    pub template_error: Option<(i64, String)>,
    pub mempool: Option<MempoolSnapshot>,
    /// Artificial delay applied to every op.
    pub op_delay: Duration,
}

impl StubProber {
    pub fn named(chain: &str) -> Self {
        Self {
            chain: chain.to_string(),
            sync_progress: 1.0,
            ..Self::default()
        }
    }

    pub fn with_connect_error(mut self, message: &str) -> Self {
        self.connect_error = Some(message.to_string());
        self
    }

    pub fn with_sync_progress(mut self, progress: f64) -> Self {
        self.sync_progress = progress;
        self
    }

    pub fn with_ibd(mut self, ibd: bool) -> Self {
        self.ibd = ibd;
        self
    }

    pub fn with_height(mut self, height: u64) -> Self {
        self.height = height;
        self
    }

    pub fn with_template_error(mut self, code: i64, message: &str) -> Self {
        self.template_error = Some((code, message.to_string()));
        self
    }

    pub fn with_mempool(mut self, mempool: MempoolSnapshot) -> Self {
        self.mempool = Some(mempool);
        self
    }

    pub fn with_op_delay(mut self, delay: Duration) -> Self {
        self.op_delay = delay;
        self
    }

    async fn delay(&self) {
        if !self.op_delay.is_zero() {
            tokio::time::sleep(self.op_delay).await;
        }
    }
}

#[async_trait]
impl Connectivity for StubProber {
    async fn check_connectivity(&self, _deadline: Duration) -> Result<()> {
        self.delay().await;
        match &self.connect_error {
            Some(message) => Err(ProbeError::Unreachable(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl SyncStatus for StubProber {
    async fn sync_progress(&self, _deadline: Duration) -> Result<f64> {
        self.delay().await;
        Ok(self.sync_progress)
    }

    async fn is_ibd(&self, _deadline: Duration) -> Result<bool> {
        self.delay().await;
        Ok(self.ibd)
    }

    async fn tip_height(&self, _deadline: Duration) -> Result<u64> {
        self.delay().await;
        Ok(self.height)
    }
}

#[async_trait]
impl BlockTemplate for StubProber {
    async fn block_template(&self, _deadline: Duration) -> Result<()> {
        self.delay().await;
        match &self.template_error {
            Some((code, message)) => Err(classify_template_error(*code, message)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl MempoolInfo for StubProber {
    async fn mempool_info(&self, _deadline: Duration) -> Result<MempoolSnapshot> {
        self.delay().await;
        self.mempool
            .clone()
            .ok_or_else(|| ProbeError::Parse("no mempool configured".to_string()))
    }
}

impl ChainProber for StubProber {
    fn chain_name(&self) -> &str {
        &self.chain
    }

    fn mempool(&self) -> Option<&dyn MempoolInfo> {
        if self.mempool.is_some() {
            Some(self)
        } else {
            None
        }
    }
}
