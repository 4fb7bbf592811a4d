use crate::common::{CommitLog, OrderingSender};
use crate::event_hub::EventHub;
use crate::peer::Peer;
use ledger_common::{
    BlockInfo, ChaincodeInfo, ChannelError, ChannelHandle, ChannelInfo, ClientSession,
    ErrorDetail, EventSource, OrderingOutcome, OrderingRequest, PeerRef, PeerResponse, Proposal,
    ProposalResult, SessionProvider, SubmissionError, TransactionId, TransactionInfo,
    TransactionRequest,
};

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use log::{debug, info};
use tokio::sync::oneshot;

pub const UNKNOWN_PEER_STATUS: u32 = 404;

#[derive(Clone)]
pub struct MemorySessionProvider {
    org: String,
    users: Vec<String>,
    channel: Arc<MemoryChannel>,
}

impl MemorySessionProvider {
    pub(crate) fn new(org: String, users: Vec<String>, channel: Arc<MemoryChannel>) -> Self {
        Self {
            org,
            users,
            channel,
        }
    }
}

#[async_trait]
impl SessionProvider for MemorySessionProvider {
    async fn session_for(
        &self,
        org: &str,
        user: &str,
    ) -> Result<Arc<dyn ClientSession>, SubmissionError> {
        if org != self.org {
            return Err(SubmissionError::Auth(format!(
                "organization {org} is not part of this network"
            )));
        }
        if !self.users.is_empty() && !self.users.iter().any(|enrolled| enrolled == user) {
            return Err(SubmissionError::Auth(format!(
                "user {user} is not enrolled in {org}"
            )));
        }
        info!("issued session for {user}@{org}");
        Ok(Arc::new(MemorySession {
            creator: format!("{org}/{user}"),
            channel: self.channel.clone(),
        }))
    }
}

pub struct MemorySession {
    creator: String,
    channel: Arc<MemoryChannel>,
}

#[async_trait]
impl ClientSession for MemorySession {
    fn channel(&self, name: &str) -> Option<Arc<dyn ChannelHandle>> {
        (name == self.channel.name).then(|| self.channel.clone() as Arc<dyn ChannelHandle>)
    }

    fn new_transaction_id(&self) -> TransactionId {
        TransactionId::generate(self.creator.as_bytes())
    }

    async fn query_channels(&self, peer: &PeerRef) -> Result<Vec<String>, ChannelError> {
        self.channel.ledger_peer(peer)?;
        Ok(vec![self.channel.name.clone()])
    }

    async fn query_installed_chaincodes(
        &self,
        peer: &PeerRef,
    ) -> Result<Vec<ChaincodeInfo>, ChannelError> {
        self.channel.ledger_peer(peer)?;
        Ok(self.channel.chaincodes.clone())
    }
}

pub struct MemoryChannel {
    name: String,
    peers: Vec<Peer>,
    hubs: Vec<Arc<EventHub>>,
    orderer: OrderingSender,
    committed: CommitLog,
    chaincodes: Vec<ChaincodeInfo>,
    proposal_faults: AtomicU32,
    proposals: AtomicUsize,
}

impl MemoryChannel {
    pub(crate) fn new(
        name: String,
        peers: Vec<Peer>,
        hubs: Vec<Arc<EventHub>>,
        orderer: OrderingSender,
        committed: CommitLog,
        chaincodes: Vec<ChaincodeInfo>,
        proposal_faults: u32,
    ) -> Self {
        Self {
            name,
            peers,
            hubs,
            orderer,
            committed,
            chaincodes,
            proposal_faults: AtomicU32::new(proposal_faults),
            proposals: AtomicUsize::new(0),
        }
    }

    fn ledger_peer(&self, peer: &PeerRef) -> Result<&Peer, ChannelError> {
        let found = self
            .peers
            .iter()
            .find(|candidate| candidate.peer() == peer)
            .ok_or_else(|| {
                ChannelError::new(&format!("peer {peer} is not joined to {}", self.name))
            })?;
        if !found.is_reachable() {
            return Err(ChannelError::new(&format!("failed to connect to {peer}")));
        }
        Ok(found)
    }

    pub fn event_hub(&self, peer: &str) -> Option<Arc<EventHub>> {
        self.hubs
            .iter()
            .find(|hub| hub.peer().name() == peer)
            .cloned()
    }

    pub fn proposal_count(&self) -> usize {
        self.proposals.load(Ordering::SeqCst)
    }

    /// The next `count` proposals fail in transport.
    pub fn inject_proposal_faults(&self, count: u32) {
        self.proposal_faults.store(count, Ordering::SeqCst);
    }
}

#[async_trait]
impl ChannelHandle for MemoryChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send_proposal(
        &self,
        request: &TransactionRequest,
        _timeout: Duration,
    ) -> Result<ProposalResult, ChannelError> {
        self.proposals.fetch_add(1, Ordering::SeqCst);
        if self
            .proposal_faults
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            debug!("dropping proposal {}", request.transaction_id);
            return Err(ChannelError::new("connection reset by peer"));
        }

        let responses = if request.target_peers.is_empty() {
            self.peers.iter().map(|peer| peer.endorse(request)).collect()
        } else {
            request
                .target_peers
                .iter()
                .map(|target| match self.peers.iter().find(|peer| peer.peer() == target) {
                    Some(peer) => peer.endorse(request),
                    None => PeerResponse::Failed(ErrorDetail {
                        peer: target.clone(),
                        status: UNKNOWN_PEER_STATUS,
                        message: format!("peer {target} is not joined to {}", self.name),
                    }),
                })
                .collect()
        };

        let header = serde_json::to_vec(request).map_err(|err| {
            ChannelError::new_with_source("cannot encode proposal header", Box::new(err))
        })?;
        Ok(ProposalResult {
            responses,
            proposal: Proposal {
                transaction_id: request.transaction_id.clone(),
                header: Bytes::from(header),
            },
        })
    }

    async fn send_to_orderer(
        &self,
        request: OrderingRequest,
        _timeout: Duration,
    ) -> Result<OrderingOutcome, ChannelError> {
        let (reply, outcome) = oneshot::channel();
        self.orderer
            .send((request, reply))
            .await
            .map_err(|_| ChannelError::new("ordering service is not running"))?;
        outcome
            .await
            .map_err(|_| ChannelError::new("ordering service dropped the request"))
    }

    fn event_sources_for_org(&self) -> Vec<Arc<dyn EventSource>> {
        self.hubs
            .iter()
            .map(|hub| hub.clone() as Arc<dyn EventSource>)
            .collect()
    }

    async fn query_block(
        &self,
        number: u64,
        peer: &PeerRef,
    ) -> Result<Option<BlockInfo>, ChannelError> {
        self.ledger_peer(peer)?;
        Ok(self.committed.block(number))
    }

    async fn query_transaction(
        &self,
        tx_id: &TransactionId,
        peer: &PeerRef,
    ) -> Result<Option<TransactionInfo>, ChannelError> {
        let peer = self.ledger_peer(peer)?;
        Ok(self
            .committed
            .block_of(tx_id)
            .map(|block_number| TransactionInfo {
                transaction_id: tx_id.clone(),
                block_number,
                validation_code: peer.commit_code().to_string(),
            }))
    }

    async fn query_info(&self, peer: &PeerRef) -> Result<ChannelInfo, ChannelError> {
        self.ledger_peer(peer)?;
        Ok(self.committed.info())
    }

    async fn query_instantiated_chaincodes(
        &self,
        peer: &PeerRef,
    ) -> Result<Vec<ChaincodeInfo>, ChannelError> {
        self.ledger_peer(peer)?;
        Ok(self.chaincodes.clone())
    }
}
