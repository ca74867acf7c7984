use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use chainwarden_monitor::MonitorConfig;

/// Supervisor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Supervisor loop configuration
    #[serde(default)]
    pub monitor: MonitorSection,

    /// Container-runtime configuration
    #[serde(default)]
    pub recovery: RecoverySection,

    /// Alert webhook configuration
    #[serde(default)]
    pub alerts: AlertSection,

    /// Metrics surface configuration
    #[serde(default)]
    pub metrics: MetricsSection,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingSection,

    /// Supervised chain nodes
    #[serde(default)]
    pub chains: Vec<ChainConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorSection {
    /// Seconds between probe rounds
    #[serde(default = "default_check_interval")]
    pub check_interval: u64,

    /// Per-RPC-call deadline in seconds
    #[serde(default = "default_rpc_timeout")]
    pub rpc_timeout: u64,

    /// Failed probes in a row before a restart is issued
    #[serde(default = "default_consecutive_failures")]
    pub consecutive_failures_before_restart: u32,

    /// Restart budget per node per rolling hour
    #[serde(default = "default_max_restarts")]
    pub max_restarts_per_hour: u32,

    /// Seconds after a restart during which no further restart is issued
    #[serde(default = "default_restart_cooldown")]
    pub restart_cooldown: u64,

    #[serde(default = "default_true")]
    pub enable_auto_restart: bool,

    #[serde(default = "default_true")]
    pub enable_alerts: bool,

    /// RPC latency (milliseconds) above which an alert is raised
    #[serde(default = "default_max_rpc_latency_ms")]
    pub max_rpc_latency_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoverySection {
    /// Container-runtime binary
    #[serde(default = "default_docker_binary")]
    pub docker_binary: PathBuf,

    /// Seconds allowed for one restart invocation
    #[serde(default = "default_restart_timeout")]
    pub restart_timeout: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertSection {
    /// Discord- or Slack-compatible webhook URL; empty disables delivery
    #[serde(default)]
    pub webhook_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSection {
    #[serde(default = "default_true")]
    pub prometheus_enabled: bool,

    /// Scrape endpoint bind address
    #[serde(default = "default_metrics_addr")]
    pub prometheus_addr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSection {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Which prober dialect a chain speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainKind {
    /// JSON-RPC 1.0 with Basic auth (Litecoin family)
    Utxo,
    /// JSON-RPC 2.0, unauthenticated (Ethereum-compatible)
    Evm,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Stable chain identity, used as the registry key
    pub name: String,

    pub kind: ChainKind,

    pub rpc_url: String,

    /// Required for utxo chains
    #[serde(default)]
    pub rpc_user: Option<String>,

    #[serde(default)]
    pub rpc_password: Option<String>,

    /// Container restarted on recovery
    pub container_name: String,

    /// Carried for payout-side consumers; unused by the supervisor
    #[serde(default)]
    pub wallet_address: Option<String>,
}

fn default_check_interval() -> u64 {
    30
}
fn default_rpc_timeout() -> u64 {
    10
}
fn default_consecutive_failures() -> u32 {
    3
}
fn default_max_restarts() -> u32 {
    3
}
fn default_restart_cooldown() -> u64 {
    60
}
fn default_max_rpc_latency_ms() -> u64 {
    5_000
}
fn default_true() -> bool {
    true
}
fn default_docker_binary() -> PathBuf {
    PathBuf::from("/usr/bin/docker")
}
fn default_restart_timeout() -> u64 {
    60
}
fn default_metrics_addr() -> String {
    "0.0.0.0:9090".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for MonitorSection {
    fn default() -> Self {
        Self {
            check_interval: default_check_interval(),
            rpc_timeout: default_rpc_timeout(),
            consecutive_failures_before_restart: default_consecutive_failures(),
            max_restarts_per_hour: default_max_restarts(),
            restart_cooldown: default_restart_cooldown(),
            enable_auto_restart: true,
            enable_alerts: true,
            max_rpc_latency_ms: default_max_rpc_latency_ms(),
        }
    }
}

impl Default for RecoverySection {
    fn default() -> Self {
        Self {
            docker_binary: default_docker_binary(),
            restart_timeout: default_restart_timeout(),
        }
    }
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self {
            prometheus_enabled: true,
            prometheus_addr: default_metrics_addr(),
        }
    }
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl MonitorSection {
    pub fn to_monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            check_interval: Duration::from_secs(self.check_interval),
            rpc_timeout: Duration::from_secs(self.rpc_timeout),
            consecutive_failures_before_restart: self.consecutive_failures_before_restart,
            max_restarts_per_hour: self.max_restarts_per_hour,
            restart_cooldown: Duration::from_secs(self.restart_cooldown),
            enable_auto_restart: self.enable_auto_restart,
            enable_alerts: self.enable_alerts,
            max_rpc_latency: Duration::from_millis(self.max_rpc_latency_ms),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            monitor: MonitorSection::default(),
            recovery: RecoverySection::default(),
            alerts: AlertSection::default(),
            metrics: MetricsSection::default(),
            logging: LoggingSection::default(),
            chains: vec![
                ChainConfig {
                    name: "litecoin".to_string(),
                    kind: ChainKind::Utxo,
                    rpc_url: "http://127.0.0.1:9332".to_string(),
                    rpc_user: Some("rpcuser".to_string()),
                    rpc_password: Some("rpcpassword".to_string()),
                    container_name: "litecoin-node".to_string(),
                    wallet_address: None,
                },
                ChainConfig {
                    name: "blockdag".to_string(),
                    kind: ChainKind::Evm,
                    rpc_url: "http://127.0.0.1:8545".to_string(),
                    rpc_user: None,
                    rpc_password: None,
                    container_name: "blockdag-node".to_string(),
                    wallet_address: None,
                },
            ],
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn to_file(&self, path: &str) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Overlay secrets from the environment: `CHAINWARDEN_WEBHOOK_URL`
    /// plus `CHAINWARDEN_<NAME>_RPC_USER` / `_RPC_PASSWORD` per chain.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("CHAINWARDEN_WEBHOOK_URL") {
            self.alerts.webhook_url = Some(url);
        }
        for chain in &mut self.chains {
            let prefix = format!("CHAINWARDEN_{}", chain.name.to_uppercase().replace('-', "_"));
            if let Ok(user) = std::env::var(format!("{}_RPC_USER", prefix)) {
                chain.rpc_user = Some(user);
            }
            if let Ok(password) = std::env::var(format!("{}_RPC_PASSWORD", prefix)) {
                chain.rpc_password = Some(password);
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.monitor.check_interval == 0 {
            anyhow::bail!("check_interval must be greater than 0");
        }
        if self.monitor.rpc_timeout == 0 {
            anyhow::bail!("rpc_timeout must be greater than 0");
        }
        if self.monitor.max_restarts_per_hour == 0 {
            anyhow::bail!("max_restarts_per_hour must be greater than 0");
        }
        if self.recovery.restart_timeout == 0 {
            anyhow::bail!("restart_timeout must be greater than 0");
        }

        if self.chains.is_empty() {
            anyhow::bail!("At least one chain must be configured");
        }
        let mut seen = std::collections::HashSet::new();
        for chain in &self.chains {
            if chain.name.is_empty() {
                anyhow::bail!("Chain name must not be empty");
            }
            if !seen.insert(&chain.name) {
                anyhow::bail!("Duplicate chain name: {}", chain.name);
            }
            if chain.rpc_url.is_empty() {
                anyhow::bail!("Chain {} has no rpc_url", chain.name);
            }
            if chain.container_name.is_empty() {
                anyhow::bail!("Chain {} has no container_name", chain.name);
            }
            if chain.kind == ChainKind::Utxo
                && (chain.rpc_user.is_none() || chain.rpc_password.is_none())
            {
                anyhow::bail!(
                    "Chain {} is utxo and requires rpc_user and rpc_password",
                    chain.name
                );
            }
        }

        if self.metrics.prometheus_enabled && self.metrics.prometheus_addr.is_empty() {
            anyhow::bail!("prometheus_addr must be set when prometheus_enabled");
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            anyhow::bail!("Invalid log level: {}", self.logging.level);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.monitor.check_interval, 30);
        assert_eq!(config.monitor.rpc_timeout, 10);
        assert_eq!(config.monitor.consecutive_failures_before_restart, 3);
        assert_eq!(config.chains.len(), 2);
    }

    #[test]
    fn test_toml_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chainwarden.toml");
        let path = path.to_str().unwrap();

        let config = Config::default();
        config.to_file(path).unwrap();
        let loaded = Config::from_file(path).unwrap();

        assert_eq!(loaded.monitor.check_interval, config.monitor.check_interval);
        assert_eq!(loaded.chains.len(), config.chains.len());
        assert_eq!(loaded.chains[0].name, "litecoin");
        assert_eq!(loaded.chains[0].kind, ChainKind::Utxo);
        assert_eq!(loaded.chains[1].kind, ChainKind::Evm);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let parsed: Config = toml::from_str(
            r#"
            [[chains]]
            name = "litecoin"
            kind = "utxo"
            rpc_url = "http://10.0.0.5:9332"
            rpc_user = "ltc"
            rpc_password = "secret"
            container_name = "litecoin-node"
            "#,
        )
        .unwrap();

        assert_eq!(parsed.monitor.check_interval, 30);
        assert_eq!(parsed.monitor.max_restarts_per_hour, 3);
        assert!(parsed.metrics.prometheus_enabled);
        assert_eq!(parsed.chains.len(), 1);
        assert!(parsed.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let mut config = Config::default();
        config.monitor.check_interval = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_chains() {
        let mut config = Config::default();
        config.chains.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_utxo_without_credentials() {
        let mut config = Config::default();
        config.chains[0].rpc_password = None;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_duplicate_chain_names() {
        let mut config = Config::default();
        let duplicate = config.chains[0].clone();
        config.chains.push(duplicate);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        std::env::set_var("CHAINWARDEN_WEBHOOK_URL", "https://discord.com/api/webhooks/1");
        std::env::set_var("CHAINWARDEN_LITECOIN_RPC_PASSWORD", "from-env");

        config.apply_env_overrides();

        assert_eq!(
            config.alerts.webhook_url.as_deref(),
            Some("https://discord.com/api/webhooks/1")
        );
        assert_eq!(config.chains[0].rpc_password.as_deref(), Some("from-env"));
        // Untouched where no variable is set.
        assert_eq!(config.chains[0].rpc_user.as_deref(), Some("rpcuser"));

        std::env::remove_var("CHAINWARDEN_WEBHOOK_URL");
        std::env::remove_var("CHAINWARDEN_LITECOIN_RPC_PASSWORD");
    }

    #[test]
    fn test_monitor_section_conversion() {
        let section = MonitorSection::default();
        let config = section.to_monitor_config();
        assert_eq!(config.check_interval, Duration::from_secs(30));
        assert_eq!(config.rpc_timeout, Duration::from_secs(10));
        assert_eq!(config.max_rpc_latency, Duration::from_millis(5_000));
    }
}
