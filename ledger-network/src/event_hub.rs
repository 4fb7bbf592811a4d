use crate::common::{BlockEvent, CommitLog};
use crate::config::{EventMode, PeerConfig};
use ledger_common::{
    ChannelError, EventSource, PeerRef, Subscription, SubscriptionSink, TransactionId, TxEvent,
};

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use log::{debug, trace, warn};
use tokio::sync::broadcast::{self, error::RecvError};

/// Per-peer commit event stream over the channel's block broadcast.
pub struct EventHub {
    peer: PeerRef,
    mode: EventMode,
    commit_code: String,
    blocks: broadcast::Sender<BlockEvent>,
    committed: CommitLog,
    connected: AtomicBool,
    failures_left: AtomicU32,
    reconnects: AtomicU32,
}

impl EventHub {
    pub fn new(
        config: &PeerConfig,
        blocks: broadcast::Sender<BlockEvent>,
        committed: CommitLog,
    ) -> Self {
        let failures = match config.events {
            EventMode::Flaky { failures } => failures,
            _ => 0,
        };
        Self {
            peer: PeerRef::new(config.name.as_str()),
            mode: config.events.clone(),
            commit_code: config.commit_code.clone(),
            blocks,
            committed,
            connected: AtomicBool::new(config.events != EventMode::Offline),
            failures_left: AtomicU32::new(failures),
            reconnects: AtomicU32::new(0),
        }
    }

    /// Drops the connection. Live subscriptions keep running until cancelled.
    pub fn disconnect(&self) {
        debug!("event hub {} disconnected", self.peer);
        self.connected.store(false, Ordering::SeqCst);
    }

    pub fn reconnect_count(&self) -> u32 {
        self.reconnects.load(Ordering::SeqCst)
    }

    fn forward(&self, sink: SubscriptionSink, tx_id: TransactionId) {
        // Taken before consulting the log so no block falls in between.
        let mut blocks = self.blocks.subscribe();
        let code = self.commit_code.clone();
        if let Some(block_number) = self.committed.block_of(&tx_id) {
            trace!("{}: {tx_id} already in block {block_number}", self.peer);
            sink.send(TxEvent::Status { code, block_number });
            return;
        }
        let peer = self.peer.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = sink.cancelled() => break,
                    block = blocks.recv() => match block {
                        Ok(block) if block.transactions.contains(&tx_id) => {
                            trace!("{peer}: {tx_id} in block {}", block.block_number);
                            sink.send(TxEvent::Status {
                                code,
                                block_number: block.block_number,
                            });
                            break;
                        }
                        Ok(_) => continue,
                        Err(RecvError::Lagged(skipped)) => {
                            warn!("{peer}: event stream lagged by {skipped} blocks");
                        }
                        Err(RecvError::Closed) => {
                            sink.send(TxEvent::Error("block stream closed".to_string()));
                            break;
                        }
                    }
                }
            }
        });
    }
}

#[async_trait]
impl EventSource for EventHub {
    fn peer(&self) -> &PeerRef {
        &self.peer
    }

    fn subscribe(&self, tx_id: &TransactionId) -> Result<Subscription, ChannelError> {
        if !self.is_connected() {
            return Err(ChannelError::new(&format!(
                "event hub {} is not connected",
                self.peer
            )));
        }
        let (sink, subscription) = Subscription::channel();
        match self.mode {
            EventMode::Broken => {
                self.disconnect();
                sink.send(TxEvent::Error("connection lost".to_string()));
            }
            EventMode::Flaky { .. }
                if self
                    .failures_left
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .is_ok() =>
            {
                sink.send(TxEvent::Error("event stream interrupted".to_string()));
            }
            EventMode::Silent => {
                tokio::spawn(async move { sink.cancelled().await });
            }
            _ => self.forward(sink, tx_id.clone()),
        }
        Ok(subscription)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn reconnect(&self) -> Result<(), ChannelError> {
        self.reconnects.fetch_add(1, Ordering::SeqCst);
        match self.mode {
            EventMode::Offline | EventMode::Broken => Err(ChannelError::new(&format!(
                "peer {} refused the connection",
                self.peer
            ))),
            _ => {
                self.connected.store(true, Ordering::SeqCst);
                Ok(())
            }
        }
    }
}
