use ledger_common::{
    BlockInfo, ChaincodeInfo, ChannelError, ChannelHandle, ChannelInfo, ClientSession, PeerRef,
    SubmissionError, TransactionId, TransactionInfo,
};

use std::future::Future;
use std::time::Duration;

use log::{debug, error};
use tokio::time;

/// Read-only questions about the ledger and the peers serving it. Each call
/// goes to one peer and is never retried.
pub struct LedgerInspector {
    timeout: Duration,
}

impl LedgerInspector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub async fn block(
        &self,
        channel: &dyn ChannelHandle,
        number: u64,
        peer: &PeerRef,
    ) -> Result<BlockInfo, SubmissionError> {
        debug!("getBlockByNumber - block {number} on {} from {peer}", channel.name());
        self.ask("getBlockByNumber", channel.query_block(number, peer))
            .await?
            .ok_or_else(|| SubmissionError::NotFound(format!("block {number}")))
    }

    pub async fn transaction(
        &self,
        channel: &dyn ChannelHandle,
        tx_id: &TransactionId,
        peer: &PeerRef,
    ) -> Result<TransactionInfo, SubmissionError> {
        debug!("getTransactionByID - {tx_id} on {} from {peer}", channel.name());
        self.ask("getTransactionByID", channel.query_transaction(tx_id, peer))
            .await?
            .ok_or_else(|| SubmissionError::NotFound(format!("transaction {tx_id}")))
    }

    pub async fn channel_info(
        &self,
        channel: &dyn ChannelHandle,
        peer: &PeerRef,
    ) -> Result<ChannelInfo, SubmissionError> {
        self.ask("getChainInfo", channel.query_info(peer)).await
    }

    pub async fn instantiated_chaincodes(
        &self,
        channel: &dyn ChannelHandle,
        peer: &PeerRef,
    ) -> Result<Vec<ChaincodeInfo>, SubmissionError> {
        self.ask(
            "getInstantiatedChaincodes",
            channel.query_instantiated_chaincodes(peer),
        )
        .await
    }

    pub async fn channels(
        &self,
        session: &dyn ClientSession,
        peer: &PeerRef,
    ) -> Result<Vec<String>, SubmissionError> {
        self.ask("getChannels", session.query_channels(peer)).await
    }

    pub async fn installed_chaincodes(
        &self,
        session: &dyn ClientSession,
        peer: &PeerRef,
    ) -> Result<Vec<ChaincodeInfo>, SubmissionError> {
        self.ask("getInstalledChaincodes", session.query_installed_chaincodes(peer))
            .await
    }

    async fn ask<T>(
        &self,
        what: &str,
        query: impl Future<Output = Result<T, ChannelError>>,
    ) -> Result<T, SubmissionError> {
        let answer = time::timeout(self.timeout, query)
            .await
            .map_err(|_| {
                SubmissionError::LedgerQuery(format!("no answer within {:?}", self.timeout))
            })?
            .map_err(|err| SubmissionError::LedgerQuery(err.to_string()));
        if let Err(err) = &answer {
            error!("{what} - {err}");
        }
        answer
    }
}
