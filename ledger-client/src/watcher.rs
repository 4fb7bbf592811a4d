use ledger_common::{CommitOutcome, EventSource, PeerRef, Subscription, TransactionId, TxEvent, VALID};

use std::future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::{
    sync::oneshot,
    time::{self, Sleep},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitPolicy {
    pub timeout: Duration,
    pub max_reconnects: u32,
}

impl Default for CommitPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_reconnects: 10,
        }
    }
}

/// One-shot timer whose cancellation is idempotent.
pub struct CommitTimer {
    sleep: Option<Pin<Box<Sleep>>>,
}

impl CommitTimer {
    pub fn start(timeout: Duration) -> Self {
        Self {
            sleep: Some(Box::pin(time::sleep(timeout))),
        }
    }

    /// Completes when the timer fires. Never completes once cancelled.
    pub async fn fired(&mut self) {
        match self.sleep.as_mut() {
            Some(sleep) => sleep.as_mut().await,
            None => future::pending().await,
        }
    }

    pub fn cancel(&mut self) {
        self.sleep = None;
    }

    pub fn is_armed(&self) -> bool {
        self.sleep.is_some()
    }
}

enum Wait {
    Terminal(CommitOutcome),
    StreamError(String),
}

pub struct CommitWatcher {
    source: Arc<dyn EventSource>,
    tx_id: TransactionId,
    timer: CommitTimer,
    subscription: Option<Subscription>,
    pending_error: Option<String>,
    reconnects_left: u32,
}

impl CommitWatcher {
    pub fn register(source: Arc<dyn EventSource>, tx_id: TransactionId, policy: CommitPolicy) -> Self {
        info!(
            "txId: {tx_id}. setting up commit event handler on {}",
            source.peer()
        );
        let timer = CommitTimer::start(policy.timeout);
        let (subscription, pending_error) = match source.subscribe(&tx_id) {
            Ok(subscription) => (Some(subscription), None),
            Err(err) => (None, Some(err.to_string())),
        };
        Self {
            source,
            tx_id,
            timer,
            subscription,
            pending_error,
            reconnects_left: policy.max_reconnects,
        }
    }

    pub fn peer(&self) -> &PeerRef {
        self.source.peer()
    }

    pub fn spawn(self) -> WatchHandle {
        let peer = self.peer().clone();
        let (sender, receiver) = oneshot::channel();
        tokio::spawn(async move {
            let _ = sender.send(self.watch().await);
        });
        WatchHandle { peer, receiver }
    }

    pub async fn watch(mut self) -> CommitOutcome {
        let outcome = self.drive().await;
        self.timer.cancel();
        if let Some(subscription) = self.subscription.take() {
            subscription.cancel();
        }

        let peer = self.source.peer();
        let tx_id = &self.tx_id;
        match &outcome {
            CommitOutcome::Committed(block) => {
                info!("txId: {tx_id}. committed on {peer} in block {block}")
            }
            CommitOutcome::Invalid(code) => {
                error!("txId: {tx_id}. transaction invalid on {peer}, code:{code}")
            }
            CommitOutcome::TimedOut => error!("txId: {tx_id}. REQUEST_TIMEOUT:{peer}"),
            CommitOutcome::ConnectionFailed(reason) => {
                error!("txId: {tx_id}. event source {peer} failed: {reason}")
            }
        }
        outcome
    }

    async fn drive(&mut self) -> CommitOutcome {
        loop {
            let reason = match self.pending_error.take() {
                Some(reason) => reason,
                None => match self.next_event().await {
                    Wait::Terminal(outcome) => return outcome,
                    Wait::StreamError(reason) => reason,
                },
            };
            warn!(
                "txId: {}. failed to receive the block event from {}: {reason}",
                self.tx_id,
                self.source.peer()
            );

            if !self.source.is_connected() {
                return CommitOutcome::ConnectionFailed(reason);
            }
            if let Err(outcome) = self.reconnect(reason).await {
                return outcome;
            }
        }
    }

    async fn next_event(&mut self) -> Wait {
        let Some(subscription) = self.subscription.as_mut() else {
            return Wait::StreamError("no active subscription".to_string());
        };
        tokio::select! {
            biased;
            event = subscription.next() => match event {
                Some(TxEvent::Status { code, block_number }) if code == VALID => {
                    Wait::Terminal(CommitOutcome::Committed(block_number))
                }
                Some(TxEvent::Status { code, .. }) => Wait::Terminal(CommitOutcome::Invalid(code)),
                Some(TxEvent::Error(reason)) => Wait::StreamError(reason),
                None => Wait::StreamError("event stream closed".to_string()),
            },
            () = self.timer.fired() => Wait::Terminal(CommitOutcome::TimedOut),
        }
    }

    /// Reconnects and resubscribes, spending the reconnect budget.
    async fn reconnect(&mut self, mut reason: String) -> Result<(), CommitOutcome> {
        if let Some(stale) = self.subscription.take() {
            stale.cancel();
        }
        loop {
            if self.reconnects_left == 0 {
                return Err(CommitOutcome::ConnectionFailed(format!(
                    "reached max number of reconnect attempts: {reason}"
                )));
            }
            self.reconnects_left -= 1;
            debug!(
                "txId: {}. retrying event source connection to {} ({} attempts left)",
                self.tx_id,
                self.source.peer(),
                self.reconnects_left
            );

            let attempt = tokio::select! {
                biased;
                () = self.timer.fired() => return Err(CommitOutcome::TimedOut),
                attempt = self.source.reconnect() => attempt,
            };
            match attempt.and_then(|()| self.source.subscribe(&self.tx_id)) {
                Ok(subscription) => {
                    self.subscription = Some(subscription);
                    return Ok(());
                }
                Err(err) => reason = err.to_string(),
            }
        }
    }
}

pub struct WatchHandle {
    peer: PeerRef,
    receiver: oneshot::Receiver<CommitOutcome>,
}

impl WatchHandle {
    pub fn peer(&self) -> &PeerRef {
        &self.peer
    }

    pub async fn outcome(self) -> (PeerRef, CommitOutcome) {
        let outcome = self.receiver.await.unwrap_or_else(|_| {
            CommitOutcome::ConnectionFailed("commit watcher terminated without an outcome".into())
        });
        (self.peer, outcome)
    }
}
