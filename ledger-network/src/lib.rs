mod common;
mod config;
mod event_hub;
mod orderer;
mod peer;
mod session;

pub use common::BlockEvent;
pub use config::{EndorsementMode, EventMode, NetworkConfig, OrdererConfig, PeerConfig};
pub use event_hub::EventHub;
pub use peer::UNAVAILABLE_STATUS;
pub use session::{MemoryChannel, MemorySession, MemorySessionProvider, UNKNOWN_PEER_STATUS};

use common::{CommitLog, CHANNEL_CAPACITY};
use orderer::Orderer;
use peer::Peer;

use std::sync::Arc;

use log::info;
use tokio::sync::broadcast;

pub struct MemoryNetwork {
    provider: MemorySessionProvider,
    channel: Arc<MemoryChannel>,
}

impl MemoryNetwork {
    /// Starts the ordering service. Must be called from within a tokio runtime.
    pub fn spawn(config: NetworkConfig) -> Self {
        let (blocks, _) = broadcast::channel(CHANNEL_CAPACITY);
        let committed = CommitLog::default();
        let orderer = Orderer::spawn(config.orderer.clone(), blocks.clone(), committed.clone());
        let peers = config.peers.iter().map(Peer::new).collect();
        let hubs = config
            .peers
            .iter()
            .map(|peer| Arc::new(EventHub::new(peer, blocks.clone(), committed.clone())))
            .collect();
        let channel = Arc::new(MemoryChannel::new(
            config.channel.clone(),
            peers,
            hubs,
            orderer,
            committed,
            config.chaincodes.clone(),
            config.proposal_faults,
        ));
        info!(
            "network up: channel '{}' for {} with {} peers",
            config.channel,
            config.org,
            config.peers.len()
        );
        Self {
            provider: MemorySessionProvider::new(config.org, config.users, channel.clone()),
            channel,
        }
    }

    pub fn provider(&self) -> MemorySessionProvider {
        self.provider.clone()
    }

    pub fn channel(&self) -> Arc<MemoryChannel> {
        self.channel.clone()
    }

    pub fn event_hub(&self, peer: &str) -> Option<Arc<EventHub>> {
        self.channel.event_hub(peer)
    }
}
