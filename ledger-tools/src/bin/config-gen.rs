use ledger_client::GatewayConfig;
use ledger_network::{NetworkConfig, OrdererConfig};

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::Parser;

#[derive(Debug, Parser)]
#[command(
    name = "config-gen",
    version = "0.1.0",
    about = "Generate a client_config.yaml with a simulated network"
)]
struct Cli {
    /// Number of simulated peers
    #[arg(short, long, default_value = "3")]
    pub count: u16,
    /// Channel the peers are joined to
    #[arg(long, default_value = "mychannel")]
    pub channel: String,
    /// Organisation owning the peers
    #[arg(long, default_value = "Org1")]
    pub org: String,
    /// Commit timeout in milliseconds
    #[arg(long, default_value = "10000")]
    pub commit_timeout_ms: u64,
    /// Output directory
    #[arg(short, long, default_value = "./")]
    pub output_path: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    if !cli.output_path.is_dir() {
        return Err(anyhow!("output path is not a directory"));
    }
    if cli.count == 0 {
        return Err(anyhow!("at least one peer is required"));
    }
    gen_config_file(cli.output_path.join("client_config.yaml"), &cli)
}

fn gen_config_file(path: PathBuf, cli: &Cli) -> Result<()> {
    let network = NetworkConfig {
        channel: cli.channel.clone(),
        org: cli.org.clone(),
        orderer: OrdererConfig::default(),
        ..NetworkConfig::with_peers(cli.count as usize)
    };
    let config = GatewayConfig {
        commit_timeout: Duration::from_millis(cli.commit_timeout_ms),
        network: Some(network),
        ..GatewayConfig::default()
    };
    let config_str = serde_yaml::to_string(&config)?;

    let mut config_file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&path)?;
    config_file.write_all(config_str.as_bytes())?;
    println!("wrote {}", path.display());
    Ok(())
}
