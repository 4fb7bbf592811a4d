use ledger_common::{ChannelHandle, ProposalResult, SubmissionError, TransactionRequest};

use std::sync::Arc;
use std::time::Duration;

use log::{error, info};
use tokio::time;

/// Sends endorsement requests, retrying once on transport failure.
pub struct ProposalSubmitter {
    channel: Arc<dyn ChannelHandle>,
    timeout: Duration,
}

impl ProposalSubmitter {
    pub fn new(channel: Arc<dyn ChannelHandle>, timeout: Duration) -> Self {
        Self { channel, timeout }
    }

    pub async fn submit(
        &self,
        request: &TransactionRequest,
    ) -> Result<ProposalResult, SubmissionError> {
        let tx_id = &request.transaction_id;
        let result = match self.send_once(request).await {
            Ok(result) => result,
            Err(err) => {
                error!("txId: {tx_id}. got error while sending transaction proposal: {err}");
                error!("txId: {tx_id}. retrying one more time before throwing an error");
                self.send_once(request).await.map_err(|err| {
                    error!("txId: {tx_id}. proposal retry failed: {err}");
                    SubmissionError::ProposalUnavailable
                })?
            }
        };

        if result.responses.is_empty() {
            error!("txId: {tx_id}. proposal returned no peer responses");
            return Err(SubmissionError::ProposalUnavailable);
        }
        info!(
            "txId: {tx_id}. received {} proposal responses",
            result.responses.len()
        );
        Ok(result)
    }

    /// One attempt, reported as [`SubmissionError::ProposalSend`] on any fault.
    async fn send_once(
        &self,
        request: &TransactionRequest,
    ) -> Result<ProposalResult, SubmissionError> {
        match time::timeout(self.timeout, self.channel.send_proposal(request, self.timeout)).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(err)) => Err(SubmissionError::ProposalSend(err.to_string())),
            Err(_) => Err(SubmissionError::ProposalSend(format!(
                "no proposal response within {:?}",
                self.timeout
            ))),
        }
    }
}

#[cfg(test)]
mod proposal_test {
    use super::*;
    use crate::test_support::{request, ScriptedChannel};
    use ledger_common::{ErrorDetail, PeerRef, PeerResponse};

    #[tokio::test]
    async fn retries_once_after_transport_failure() {
        let channel = ScriptedChannel::new().proposal_faults(1).build();
        let submitter = ProposalSubmitter::new(channel.clone(), Duration::from_secs(30));
        let result = submitter.submit(&request(&["peer0"])).await.unwrap();
        assert_eq!(result.responses.len(), 1);
        assert_eq!(channel.proposal_calls(), 2);
    }

    #[tokio::test]
    async fn second_failure_is_unavailable() {
        let channel = ScriptedChannel::new().proposal_faults(5).build();
        let submitter = ProposalSubmitter::new(channel.clone(), Duration::from_secs(30));
        let err = submitter.submit(&request(&["peer0"])).await.unwrap_err();
        assert_eq!(err, SubmissionError::ProposalUnavailable);
        assert_eq!(channel.proposal_calls(), 2);
    }

    #[tokio::test]
    async fn peer_errors_are_not_retried() {
        let channel = ScriptedChannel::new().responses(vec![PeerResponse::Failed(ErrorDetail {
            peer: PeerRef::new("peer0"),
            status: 500,
            message: "chaincode error".into(),
        })])
        .build();
        let submitter = ProposalSubmitter::new(channel.clone(), Duration::from_secs(30));
        let result = submitter.submit(&request(&["peer0"])).await.unwrap();
        assert_eq!(result.responses.len(), 1);
        assert_eq!(channel.proposal_calls(), 1);
    }

    #[tokio::test]
    async fn empty_result_is_unavailable_without_retry() {
        let channel = ScriptedChannel::new().responses(vec![]).build();
        let submitter = ProposalSubmitter::new(channel.clone(), Duration::from_secs(30));
        let err = submitter.submit(&request(&["peer0"])).await.unwrap_err();
        assert_eq!(err, SubmissionError::ProposalUnavailable);
        assert_eq!(channel.proposal_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_proposal_counts_as_transport_failure() {
        let channel = ScriptedChannel::new().proposal_delay(Duration::from_secs(60)).build();
        let submitter = ProposalSubmitter::new(channel.clone(), Duration::from_secs(30));
        let err = submitter.submit(&request(&["peer0"])).await.unwrap_err();
        assert_eq!(err, SubmissionError::ProposalUnavailable);
        assert_eq!(channel.proposal_calls(), 2);
    }
}
