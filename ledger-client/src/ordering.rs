use ledger_common::{ChannelHandle, OrderingOutcome, OrderingRequest, ORDERING_TIMEOUT};

use std::sync::Arc;
use std::time::Duration;

use log::{error, info};
use tokio::time;

/// Status reported when the ordering service could not be reached at all.
pub const ORDERING_UNAVAILABLE: &str = "SERVICE_UNAVAILABLE";

pub struct OrderingSubmitter {
    channel: Arc<dyn ChannelHandle>,
    timeout: Duration,
}

impl OrderingSubmitter {
    pub fn new(channel: Arc<dyn ChannelHandle>, timeout: Duration) -> Self {
        Self { channel, timeout }
    }

    /// Single attempt. A missing answer within the timeout is `Rejected(TIMEOUT)`.
    pub async fn submit(&self, request: OrderingRequest) -> OrderingOutcome {
        let tx_id = request.transaction_id.clone();
        let outcome = match time::timeout(
            self.timeout,
            self.channel.send_to_orderer(request, self.timeout),
        )
        .await
        {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(err)) => {
                error!("txId: {tx_id}. failed to reach the ordering service: {err}");
                OrderingOutcome::Rejected(ORDERING_UNAVAILABLE.to_string())
            }
            Err(_) => OrderingOutcome::Rejected(ORDERING_TIMEOUT.to_string()),
        };
        match &outcome {
            OrderingOutcome::Accepted => {
                info!("txId: {tx_id}. Successfully sent transaction to the ordering service.")
            }
            OrderingOutcome::Rejected(status) => {
                error!("txId: {tx_id}. Failed to order the transaction. Error code: {status}")
            }
        }
        outcome
    }
}
