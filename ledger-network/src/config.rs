use ledger_common::{ChaincodeInfo, ORDERING_SUCCESS, VALID};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_channel")]
    pub channel: String,
    #[serde(default = "default_org")]
    pub org: String,
    /// Enrolled users. Empty admits anyone in `org`.
    #[serde(default)]
    pub users: Vec<String>,
    /// Number of upcoming proposals that fail at the transport level.
    #[serde(default)]
    pub proposal_faults: u32,
    pub peers: Vec<PeerConfig>,
    #[serde(default)]
    pub orderer: OrdererConfig,
    /// Installed on every peer and instantiated on the channel.
    #[serde(default = "default_chaincodes")]
    pub chaincodes: Vec<ChaincodeInfo>,
}

impl NetworkConfig {
    pub fn with_peers(count: usize) -> Self {
        Self {
            channel: default_channel(),
            org: default_org(),
            users: Vec::new(),
            proposal_faults: 0,
            peers: (0..count)
                .map(|n| PeerConfig::new(format!("peer{n}")))
                .collect(),
            orderer: OrdererConfig::default(),
            chaincodes: default_chaincodes(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self::with_peers(3)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerConfig {
    pub name: String,
    #[serde(default)]
    pub endorsement: EndorsementMode,
    /// Validation code this peer reports when the transaction lands in a block.
    #[serde(default = "default_commit_code")]
    pub commit_code: String,
    #[serde(default)]
    pub events: EventMode,
}

impl PeerConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            endorsement: EndorsementMode::default(),
            commit_code: default_commit_code(),
            events: EventMode::default(),
        }
    }

    pub fn endorsement(mut self, mode: EndorsementMode) -> Self {
        self.endorsement = mode;
        self
    }

    pub fn commit_code(mut self, code: impl Into<String>) -> Self {
        self.commit_code = code.into();
        self
    }

    pub fn events(mut self, mode: EventMode) -> Self {
        self.events = mode;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum EndorsementMode {
    #[default]
    Echo,
    Payload {
        payload: String,
    },
    Error {
        status: u32,
        message: String,
    },
    Unreachable,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum EventMode {
    #[default]
    Online,
    Silent,
    /// Not connected and cannot reconnect.
    Offline,
    /// The first `failures` subscriptions fail while the hub stays connected.
    Flaky {
        failures: u32,
    },
    /// Drops the connection on the first subscription.
    Broken,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrdererConfig {
    #[serde(default = "default_ordering_status")]
    pub status: String,
    #[serde(default)]
    pub delay_ms: u64,
}

impl Default for OrdererConfig {
    fn default() -> Self {
        Self {
            status: default_ordering_status(),
            delay_ms: 0,
        }
    }
}

fn default_channel() -> String {
    "mychannel".to_string()
}

fn default_org() -> String {
    "Org1".to_string()
}

fn default_chaincodes() -> Vec<ChaincodeInfo> {
    vec![ChaincodeInfo {
        name: "ngo".to_string(),
        version: "v1".to_string(),
        path: "github.com/ngo".to_string(),
    }]
}

fn default_commit_code() -> String {
    VALID.to_string()
}

fn default_ordering_status() -> String {
    ORDERING_SUCCESS.to_string()
}
