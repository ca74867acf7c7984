// Chainwarden entry point: supervise, spot-check, or inspect the
// configured chain fleet.

mod config;
mod service;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use chainwarden_monitor::NodeStatus;

use config::Config;
use service::WardenService;

#[derive(Parser)]
#[clap(name = "chainwarden", version, about = "Multi-chain node health supervisor")]
struct Cli {
    /// Configuration file
    #[clap(
        short,
        long,
        global = true,
        value_name = "FILE",
        default_value = "chainwarden.toml"
    )]
    config: String,

    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Supervise the configured chains until interrupted
    Run {
        /// Probe and alert only; never restart containers
        #[clap(long)]
        no_restart: bool,

        /// Supervise only the named chains instead of every configured one
        #[clap(long, value_name = "NAME")]
        only: Vec<String>,
    },

    /// Probe each configured chain once and print the verdicts
    Check {
        /// Probe a single chain
        chain: Option<String>,
    },

    /// Validate the configuration and list what would be supervised
    Config,

    /// Write a starter configuration file
    Init {
        /// Destination path
        #[clap(short, long, default_value = "chainwarden.toml")]
        output: String,

        /// Replace the file if it already exists
        #[clap(long)]
        force: bool,
    },
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Run {
        no_restart: false,
        only: Vec::new(),
    });

    match command {
        Command::Run { no_restart, only } => run(&cli.config, no_restart, &only).await,
        Command::Check { chain } => check(&cli.config, chain.as_deref()).await,
        Command::Config => inspect(&cli.config),
        Command::Init { output, force } => write_starter_config(&output, force),
    }
}

fn load_config(path: &str) -> Result<Config> {
    if !std::path::Path::new(path).exists() {
        bail!(
            "Configuration file {} not found; generate one with `chainwarden init`",
            path
        );
    }
    let mut config = Config::from_file(path)?;
    config.apply_env_overrides();
    Ok(config)
}

/// Narrow the chain list to the named subset, rejecting unknown names.
fn restrict_chains(config: &mut Config, only: &[String]) -> Result<()> {
    if only.is_empty() {
        return Ok(());
    }
    let known: Vec<&str> = config.chains.iter().map(|c| c.name.as_str()).collect();
    for name in only {
        if !known.contains(&name.as_str()) {
            bail!(
                "Chain {} is not configured (configured: {})",
                name,
                known.join(", ")
            );
        }
    }
    config.chains.retain(|c| only.iter().any(|n| n == &c.name));
    Ok(())
}

/// Supervise until SIGINT/SIGTERM.
async fn run(config_path: &str, no_restart: bool, only: &[String]) -> Result<()> {
    let mut config = load_config(config_path)?;
    restrict_chains(&mut config, only)?;
    if no_restart {
        config.monitor.enable_auto_restart = false;
    }

    init_logging(&config.logging.level);
    info!(
        "🛡️  chainwarden v{}: {} chains, probe every {}s, auto-restart {}",
        env!("CARGO_PKG_VERSION"),
        config.chains.len(),
        config.monitor.check_interval,
        if config.monitor.enable_auto_restart { "on" } else { "off" }
    );

    let mut service = WardenService::new(config)?;
    service.start()?;
    service.wait_for_shutdown().await
}

/// One probe round, printed as a table. Exits non-zero when any node
/// comes back unhealthy, so it can gate deploy scripts.
async fn check(config_path: &str, chain: Option<&str>) -> Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(name) = chain {
        restrict_chains(&mut config, std::slice::from_ref(&name.to_string()))?;
    }
    // One-shot mode: no scrape surface, no recovery actions.
    config.metrics.prometheus_enabled = false;
    config.monitor.enable_auto_restart = false;
    config.monitor.enable_alerts = false;

    let names: Vec<String> = config.chains.iter().map(|c| c.name.clone()).collect();
    let service = WardenService::new(config)?;

    println!(
        "{:<12} {:<10} {:>10} {:>9}  DETAIL",
        "CHAIN", "STATUS", "HEIGHT", "RPC"
    );
    let mut unhealthy = 0;
    for name in &names {
        let status = service.supervisor().force_check(name).await?;
        if status == NodeStatus::Unhealthy {
            unhealthy += 1;
        }

        let health = match service.supervisor().node_health(name) {
            Some(health) => health,
            None => continue,
        };
        let (height, latency, detail) = match &health.last_diagnostics {
            Some(diag) => (
                diag.block_height.to_string(),
                format!("{}ms", diag.rpc_latency.as_millis()),
                diag.rpc_error
                    .clone()
                    .or_else(|| diag.block_template_error.clone())
                    .unwrap_or_else(|| "-".to_string()),
            ),
            None => (
                "-".to_string(),
                "-".to_string(),
                "probe timed out".to_string(),
            ),
        };
        println!(
            "{:<12} {:<10} {:>10} {:>9}  {}",
            name,
            status.to_string(),
            height,
            latency,
            detail
        );
    }

    if unhealthy > 0 {
        bail!("{} of {} nodes unhealthy", unhealthy, names.len());
    }
    Ok(())
}

/// Validate the configuration and summarize the resulting setup.
fn inspect(config_path: &str) -> Result<()> {
    let config = load_config(config_path)?;
    config.validate()?;

    println!("Configuration OK: {}", config_path);
    println!(
        "  probe every {}s; restart after {} consecutive failures (max {}/h, {}s cooldown)",
        config.monitor.check_interval,
        config.monitor.consecutive_failures_before_restart,
        config.monitor.max_restarts_per_hour,
        config.monitor.restart_cooldown,
    );
    match &config.alerts.webhook_url {
        Some(url) if !url.trim().is_empty() => println!("  alerts: webhook configured"),
        _ => println!("  alerts: disabled (no webhook)"),
    }
    if config.metrics.prometheus_enabled {
        println!("  metrics: http://{}/metrics", config.metrics.prometheus_addr);
    } else {
        println!("  metrics: disabled");
    }
    println!("  chains:");
    for chain in &config.chains {
        println!(
            "    {:<12} {:<5} {} -> container {}",
            chain.name,
            format!("{:?}", chain.kind).to_lowercase(),
            chain.rpc_url,
            chain.container_name
        );
    }
    Ok(())
}

fn write_starter_config(output: &str, force: bool) -> Result<()> {
    if std::path::Path::new(output).exists() && !force {
        bail!("{} already exists; pass --force to replace it", output);
    }
    Config::default().to_file(output)?;
    println!("Wrote starter configuration to {}", output);
    println!("Edit the chain endpoints, then try `chainwarden check`.");
    Ok(())
}

/// `RUST_LOG` wins over the configured level.
fn init_logging(level: &str) {
    let directives = std::env::var("RUST_LOG").unwrap_or_else(|_| level.to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(directives))
        .compact()
        .init();
}
