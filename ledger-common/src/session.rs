use crate::{
    BlockInfo, ChaincodeInfo, ChannelError, ChannelInfo, OrderingOutcome, OrderingRequest, PeerRef,
    ProposalResult, SubmissionError, TransactionId, TransactionInfo, TransactionRequest, TxEvent,
};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio_util::sync::CancellationToken;

#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Authenticated session for `user` of `org`. Fails with [`SubmissionError::Auth`].
    async fn session_for(
        &self,
        org: &str,
        user: &str,
    ) -> Result<Arc<dyn ClientSession>, SubmissionError>;
}

#[async_trait]
pub trait ClientSession: Send + Sync {
    fn channel(&self, name: &str) -> Option<Arc<dyn ChannelHandle>>;

    fn new_transaction_id(&self) -> TransactionId;

    async fn query_channels(&self, peer: &PeerRef) -> Result<Vec<String>, ChannelError>;

    async fn query_installed_chaincodes(
        &self,
        peer: &PeerRef,
    ) -> Result<Vec<ChaincodeInfo>, ChannelError>;
}

#[async_trait]
pub trait ChannelHandle: Send + Sync {
    fn name(&self) -> &str;

    async fn send_proposal(
        &self,
        request: &TransactionRequest,
        timeout: Duration,
    ) -> Result<ProposalResult, ChannelError>;

    async fn send_to_orderer(
        &self,
        request: OrderingRequest,
        timeout: Duration,
    ) -> Result<OrderingOutcome, ChannelError>;

    fn event_sources_for_org(&self) -> Vec<Arc<dyn EventSource>>;

    async fn query_block(
        &self,
        number: u64,
        peer: &PeerRef,
    ) -> Result<Option<BlockInfo>, ChannelError>;

    async fn query_transaction(
        &self,
        tx_id: &TransactionId,
        peer: &PeerRef,
    ) -> Result<Option<TransactionInfo>, ChannelError>;

    async fn query_info(&self, peer: &PeerRef) -> Result<ChannelInfo, ChannelError>;

    async fn query_instantiated_chaincodes(
        &self,
        peer: &PeerRef,
    ) -> Result<Vec<ChaincodeInfo>, ChannelError>;
}

#[async_trait]
pub trait EventSource: Send + Sync {
    fn peer(&self) -> &PeerRef;

    /// Starts delivering events for `tx_id`. The subscription is live when this returns.
    fn subscribe(&self, tx_id: &TransactionId) -> Result<Subscription, ChannelError>;

    fn is_connected(&self) -> bool;

    async fn reconnect(&self) -> Result<(), ChannelError>;
}

/// Receiving half of a commit-event subscription. Dropping it cancels.
pub struct Subscription {
    events: UnboundedReceiver<TxEvent>,
    token: CancellationToken,
}

#[derive(Clone)]
pub struct SubscriptionSink {
    events: UnboundedSender<TxEvent>,
    token: CancellationToken,
}

impl Subscription {
    pub fn channel() -> (SubscriptionSink, Subscription) {
        let (events_tx, events_rx) = unbounded_channel();
        let token = CancellationToken::new();
        (
            SubscriptionSink {
                events: events_tx,
                token: token.clone(),
            },
            Subscription {
                events: events_rx,
                token,
            },
        )
    }

    pub async fn next(&mut self) -> Option<TxEvent> {
        if self.token.is_cancelled() {
            return None;
        }
        self.events.recv().await
    }

    /// Idempotent.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

impl SubscriptionSink {
    /// Returns false when the subscriber is no longer listening.
    pub fn send(&self, event: TxEvent) -> bool {
        !self.token.is_cancelled() && self.events.send(event).is_ok()
    }

    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}
