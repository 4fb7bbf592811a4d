use crate::common::{BlockEvent, CommitLog, OrderingReceiver, OrderingSender, CHANNEL_CAPACITY};
use crate::config::OrdererConfig;
use ledger_common::{OrderingOutcome, ORDERING_SUCCESS};

use std::time::Duration;

use log::{debug, trace};
use tokio::sync::{broadcast, mpsc::channel};

/// Ordering service. Cuts one block per accepted transaction and announces it
/// to every event hub on the channel.
pub struct Orderer {
    config: OrdererConfig,
    receiver: OrderingReceiver,
    blocks: broadcast::Sender<BlockEvent>,
    committed: CommitLog,
    height: u64,
}

impl Orderer {
    pub fn spawn(
        config: OrdererConfig,
        blocks: broadcast::Sender<BlockEvent>,
        committed: CommitLog,
    ) -> OrderingSender {
        let (sender, receiver) = channel(CHANNEL_CAPACITY);
        tokio::spawn(async move {
            Self {
                config,
                receiver,
                blocks,
                committed,
                height: 0,
            }
            .run()
            .await
        });
        sender
    }

    async fn run(&mut self) {
        while let Some((request, reply)) = self.receiver.recv().await {
            trace!("ordering {}", request.transaction_id);
            if self.config.delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.delay_ms)).await;
            }
            if self.config.status != ORDERING_SUCCESS {
                debug!(
                    "rejecting {} with {}",
                    request.transaction_id, self.config.status
                );
                let _ = reply.send(OrderingOutcome::Rejected(self.config.status.clone()));
                continue;
            }

            self.height += 1;
            let block = BlockEvent {
                block_number: self.height,
                transactions: vec![request.transaction_id],
            };
            self.committed.record(&block);
            if reply.send(OrderingOutcome::Accepted).is_err() {
                trace!("submitter of block {} stopped waiting", self.height);
            }
            if self.blocks.send(block).is_err() {
                trace!("no event hub listening for block {}", self.height);
            }
        }
        debug!("ordering service stopped at height {}", self.height);
    }
}
