use crate::watcher::CommitPolicy;
use ledger_network::NetworkConfig;

use std::env::current_exe;
use std::fs::read_to_string;
use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

const DEFAULT_PROPOSAL_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_ORDERING_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_COMMIT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_COMMIT_RECONNECT_ATTEMPTS: u32 = 10;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayConfig {
    #[serde(
        default = "default_proposal_timeout",
        deserialize_with = "parse_milliseconds",
        serialize_with = "serialize_milliseconds",
        rename = "proposal_timeout_ms"
    )]
    pub proposal_timeout: Duration,
    #[serde(
        default = "default_ordering_timeout",
        deserialize_with = "parse_milliseconds",
        serialize_with = "serialize_milliseconds",
        rename = "ordering_timeout_ms"
    )]
    pub ordering_timeout: Duration,
    #[serde(
        default = "default_commit_timeout",
        deserialize_with = "parse_milliseconds",
        serialize_with = "serialize_milliseconds",
        rename = "commit_timeout_ms"
    )]
    pub commit_timeout: Duration,
    #[serde(default = "default_commit_reconnect_attempts")]
    pub commit_reconnect_attempts: u32,
    /// In-memory network definition, only read by the CLI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<NetworkConfig>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            proposal_timeout: DEFAULT_PROPOSAL_TIMEOUT,
            ordering_timeout: DEFAULT_ORDERING_TIMEOUT,
            commit_timeout: DEFAULT_COMMIT_TIMEOUT,
            commit_reconnect_attempts: DEFAULT_COMMIT_RECONNECT_ATTEMPTS,
            network: None,
        }
    }
}

impl GatewayConfig {
    pub fn new() -> Result<Self> {
        let current_exe = current_exe()?;
        let config_path = current_exe
            .parent()
            .ok_or_else(|| anyhow!("executable has no parent directory"))?
            .join("client_config.yaml");
        Self::from_path(config_path)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        if !path.as_ref().is_file() {
            return Err(anyhow!("config file not found, or not a file"));
        }
        let config_str = read_to_string(path.as_ref())?;
        Self::from_yaml(&config_str)
    }

    pub fn from_yaml(config_str: &str) -> Result<Self> {
        Ok(serde_yaml::from_str::<GatewayConfig>(config_str)?)
    }

    pub fn commit_policy(&self) -> CommitPolicy {
        CommitPolicy {
            timeout: self.commit_timeout,
            max_reconnects: self.commit_reconnect_attempts,
        }
    }
}

fn default_proposal_timeout() -> Duration {
    DEFAULT_PROPOSAL_TIMEOUT
}

fn default_ordering_timeout() -> Duration {
    DEFAULT_ORDERING_TIMEOUT
}

fn default_commit_timeout() -> Duration {
    DEFAULT_COMMIT_TIMEOUT
}

fn default_commit_reconnect_attempts() -> u32 {
    DEFAULT_COMMIT_RECONNECT_ATTEMPTS
}

fn parse_milliseconds<'de, D>(d: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let millisecs: u64 = Deserialize::deserialize(d)?;
    Ok(Duration::from_millis(millisecs))
}

fn serialize_milliseconds<S>(duration: &Duration, s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    s.serialize_u64(duration.as_millis() as u64)
}
