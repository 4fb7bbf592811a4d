use ledger_common::{
    BlockInfo, ChaincodeInfo, ChannelError, ChannelHandle, ChannelInfo, Endorsement, EventSource,
    OrderingOutcome, OrderingRequest, PeerRef, PeerResponse, Proposal, ProposalResult,
    Subscription, SubscriptionSink, TransactionId, TransactionInfo, TransactionRequest, TxEvent,
    VALID,
};

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

pub fn request(peers: &[&str]) -> TransactionRequest {
    request_for("createDonor", peers)
}

pub fn request_for(function: &str, peers: &[&str]) -> TransactionRequest {
    TransactionRequest::new(
        "mychannel",
        "ngo",
        function,
        vec!["{}".to_string()],
        peers.iter().map(|peer| PeerRef::new(*peer)).collect(),
        TransactionId::from("tx-test"),
    )
}

pub fn endorsement(peer: &str, payload: &str) -> PeerResponse {
    PeerResponse::Endorsed(Endorsement {
        peer: PeerRef::new(peer),
        status: 200,
        message: "OK".into(),
        payload: Bytes::from(payload.to_string()),
    })
}

pub fn ordering_request(tx_id: &str) -> OrderingRequest {
    OrderingRequest {
        transaction_id: tx_id.into(),
        proposal: Proposal {
            transaction_id: tx_id.into(),
            header: Bytes::new(),
        },
        endorsements: vec![],
    }
}

#[derive(Default)]
pub struct ScriptedChannel {
    responses: Option<Vec<PeerResponse>>,
    proposal_faults: AtomicU32,
    proposal_delay: Duration,
    proposal_calls: AtomicUsize,
    ordering: Option<OrderingOutcome>,
    ordering_fault: bool,
    ordering_delay: Duration,
    ordering_calls: AtomicUsize,
    sources: Vec<Arc<ScriptedSource>>,
    subscribed_before_ordering: Mutex<Option<bool>>,
    blocks: Vec<BlockInfo>,
    ledger_delay: Duration,
    ledger_fault: bool,
}

impl ScriptedChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn responses(mut self, responses: Vec<PeerResponse>) -> Self {
        self.responses = Some(responses);
        self
    }

    pub fn proposal_faults(self, faults: u32) -> Self {
        self.proposal_faults.store(faults, Ordering::SeqCst);
        self
    }

    pub fn proposal_delay(mut self, delay: Duration) -> Self {
        self.proposal_delay = delay;
        self
    }

    pub fn ordering(mut self, outcome: OrderingOutcome) -> Self {
        self.ordering = Some(outcome);
        self
    }

    pub fn ordering_fault(mut self) -> Self {
        self.ordering_fault = true;
        self
    }

    pub fn ordering_delay(mut self, delay: Duration) -> Self {
        self.ordering_delay = delay;
        self
    }

    pub fn sources(mut self, sources: Vec<Arc<ScriptedSource>>) -> Self {
        self.sources = sources;
        self
    }

    pub fn block(mut self, transactions: &[&str]) -> Self {
        self.blocks.push(BlockInfo {
            number: self.blocks.len() as u64,
            previous_hash: String::new(),
            data_hash: String::new(),
            transactions: transactions.iter().map(|tx| TransactionId::from(*tx)).collect(),
        });
        self
    }

    pub fn ledger_delay(mut self, delay: Duration) -> Self {
        self.ledger_delay = delay;
        self
    }

    pub fn ledger_fault(mut self) -> Self {
        self.ledger_fault = true;
        self
    }

    pub fn build(self) -> Arc<Self> {
        Arc::new(self)
    }

    async fn ledger(&self) -> Result<(), ChannelError> {
        if !self.ledger_delay.is_zero() {
            tokio::time::sleep(self.ledger_delay).await;
        }
        if self.ledger_fault {
            return Err(ChannelError::new("failed to connect to peer0"));
        }
        Ok(())
    }

    pub fn proposal_calls(&self) -> usize {
        self.proposal_calls.load(Ordering::SeqCst)
    }

    pub fn ordering_calls(&self) -> usize {
        self.ordering_calls.load(Ordering::SeqCst)
    }

    /// Whether every source had been subscribed when ordering was called.
    pub fn subscribed_before_ordering(&self) -> Option<bool> {
        *self.subscribed_before_ordering.lock().unwrap()
    }
}

#[async_trait]
impl ChannelHandle for ScriptedChannel {
    fn name(&self) -> &str {
        "mychannel"
    }

    async fn send_proposal(
        &self,
        request: &TransactionRequest,
        _timeout: Duration,
    ) -> Result<ProposalResult, ChannelError> {
        self.proposal_calls.fetch_add(1, Ordering::SeqCst);
        if !self.proposal_delay.is_zero() {
            tokio::time::sleep(self.proposal_delay).await;
        }
        let faults = self.proposal_faults.load(Ordering::SeqCst);
        if faults > 0 {
            self.proposal_faults.store(faults - 1, Ordering::SeqCst);
            return Err(ChannelError::new("connection reset by peer"));
        }
        let responses = match &self.responses {
            Some(responses) => responses.clone(),
            None => request
                .target_peers
                .iter()
                .map(|peer| endorsement(peer.name(), "{}"))
                .collect(),
        };
        Ok(ProposalResult {
            responses,
            proposal: Proposal {
                transaction_id: request.transaction_id.clone(),
                header: Bytes::new(),
            },
        })
    }

    async fn send_to_orderer(
        &self,
        _request: OrderingRequest,
        _timeout: Duration,
    ) -> Result<OrderingOutcome, ChannelError> {
        self.ordering_calls.fetch_add(1, Ordering::SeqCst);
        let subscribed = self
            .sources
            .iter()
            .all(|source| source.subscribe_calls() > 0);
        *self.subscribed_before_ordering.lock().unwrap() = Some(subscribed);
        if !self.ordering_delay.is_zero() {
            tokio::time::sleep(self.ordering_delay).await;
        }
        if self.ordering_fault {
            return Err(ChannelError::new("orderer unreachable"));
        }
        Ok(self.ordering.clone().unwrap_or(OrderingOutcome::Accepted))
    }

    fn event_sources_for_org(&self) -> Vec<Arc<dyn EventSource>> {
        self.sources
            .iter()
            .map(|source| source.clone() as Arc<dyn EventSource>)
            .collect()
    }

    async fn query_block(
        &self,
        number: u64,
        _peer: &PeerRef,
    ) -> Result<Option<BlockInfo>, ChannelError> {
        self.ledger().await?;
        Ok(self.blocks.get(number as usize).cloned())
    }

    async fn query_transaction(
        &self,
        tx_id: &TransactionId,
        _peer: &PeerRef,
    ) -> Result<Option<TransactionInfo>, ChannelError> {
        self.ledger().await?;
        Ok(self
            .blocks
            .iter()
            .find(|block| block.transactions.contains(tx_id))
            .map(|block| TransactionInfo {
                transaction_id: tx_id.clone(),
                block_number: block.number,
                validation_code: VALID.to_string(),
            }))
    }

    async fn query_info(&self, _peer: &PeerRef) -> Result<ChannelInfo, ChannelError> {
        self.ledger().await?;
        Ok(ChannelInfo {
            height: self.blocks.len() as u64,
            current_block_hash: String::new(),
            previous_block_hash: String::new(),
        })
    }

    async fn query_instantiated_chaincodes(
        &self,
        _peer: &PeerRef,
    ) -> Result<Vec<ChaincodeInfo>, ChannelError> {
        self.ledger().await?;
        Ok(vec![ChaincodeInfo {
            name: "ngo".into(),
            version: "v1".into(),
            path: "github.com/ngo".into(),
        }])
    }
}

pub struct ScriptedSource {
    peer: PeerRef,
    connected: AtomicBool,
    script: Mutex<VecDeque<Vec<TxEvent>>>,
    sinks: Mutex<Vec<SubscriptionSink>>,
    disconnect_on_error: bool,
    reconnect_ok: bool,
    reconnect_delay: Duration,
    subscribe_calls: AtomicUsize,
    reconnect_calls: AtomicU32,
}

impl ScriptedSource {
    pub fn new(peer: &str) -> Self {
        Self {
            peer: PeerRef::new(peer),
            connected: AtomicBool::new(true),
            script: Default::default(),
            sinks: Default::default(),
            disconnect_on_error: false,
            reconnect_ok: true,
            reconnect_delay: Duration::ZERO,
            subscribe_calls: AtomicUsize::new(0),
            reconnect_calls: AtomicU32::new(0),
        }
    }

    /// Events delivered to the next subscription, in order.
    pub fn then(self, events: Vec<TxEvent>) -> Self {
        self.script.lock().unwrap().push_back(events);
        self
    }

    pub fn offline(self) -> Self {
        self.connected.store(false, Ordering::SeqCst);
        self
    }

    pub fn disconnect_on_error(mut self) -> Self {
        self.disconnect_on_error = true;
        self
    }

    pub fn reconnect_fails(mut self) -> Self {
        self.reconnect_ok = false;
        self
    }

    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn build(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn subscribe_calls(&self) -> usize {
        self.subscribe_calls.load(Ordering::SeqCst)
    }

    pub fn reconnect_calls(&self) -> u32 {
        self.reconnect_calls.load(Ordering::SeqCst)
    }

    pub fn live_subscriptions(&self) -> usize {
        self.sinks
            .lock()
            .unwrap()
            .iter()
            .filter(|sink| !sink.is_cancelled())
            .count()
    }

    pub fn all_subscriptions_cancelled(&self) -> bool {
        self.live_subscriptions() == 0
    }
}

#[async_trait]
impl EventSource for ScriptedSource {
    fn peer(&self) -> &PeerRef {
        &self.peer
    }

    fn subscribe(&self, _tx_id: &TransactionId) -> Result<Subscription, ChannelError> {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        if !self.connected.load(Ordering::SeqCst) {
            return Err(ChannelError::new("event source is not connected"));
        }
        let (sink, subscription) = Subscription::channel();
        let events = self.script.lock().unwrap().pop_front().unwrap_or_default();
        for event in events {
            if matches!(event, TxEvent::Error(_)) && self.disconnect_on_error {
                self.connected.store(false, Ordering::SeqCst);
            }
            sink.send(event);
        }
        self.sinks.lock().unwrap().push(sink);
        Ok(subscription)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn reconnect(&self) -> Result<(), ChannelError> {
        self.reconnect_calls.fetch_add(1, Ordering::SeqCst);
        if !self.reconnect_delay.is_zero() {
            tokio::time::sleep(self.reconnect_delay).await;
        }
        if self.reconnect_ok {
            self.connected.store(true, Ordering::SeqCst);
            Ok(())
        } else {
            Err(ChannelError::new("peer refused the connection"))
        }
    }
}
