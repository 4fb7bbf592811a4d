use crate::classifier::classify;
use crate::config::GatewayConfig;
use crate::ordering::OrderingSubmitter;
use crate::proposal::ProposalSubmitter;
use crate::watcher::{CommitPolicy, CommitWatcher};
use ledger_common::{
    ChannelHandle, CommitOutcome, EventSource, OrderingOutcome, OrderingRequest, PeerRef,
    SubmissionError, SubmissionResult, TransactionId, TransactionRequest,
};

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use log::{error, info};

#[derive(Clone)]
pub struct SubmissionCoordinator {
    channel: Arc<dyn ChannelHandle>,
    proposal_timeout: Duration,
    ordering_timeout: Duration,
    commit_policy: CommitPolicy,
}

impl SubmissionCoordinator {
    pub fn new(channel: Arc<dyn ChannelHandle>, config: &GatewayConfig) -> Self {
        Self {
            channel,
            proposal_timeout: config.proposal_timeout,
            ordering_timeout: config.ordering_timeout,
            commit_policy: config.commit_policy(),
        }
    }

    pub async fn run(&self, request: &TransactionRequest) -> SubmissionResult {
        let tx_id = request.transaction_id.clone();
        let pipeline = self.clone();
        let owned = request.clone();
        let verdict = match tokio::spawn(async move { pipeline.submit(&owned).await }).await {
            Ok(verdict) => verdict,
            Err(err) => Err(SubmissionError::Internal(format!(
                "submission task aborted: {err}"
            ))),
        };
        let elapsed = request.age().num_milliseconds();
        match verdict {
            Ok(()) => {
                info!("txId: {tx_id}. transaction committed on every watched peer after {elapsed}ms");
                SubmissionResult::success(tx_id)
            }
            Err(reason) => {
                error!("txId: {tx_id}. submission failed after {elapsed}ms: {reason}");
                SubmissionResult::failure(Some(tx_id), reason)
            }
        }
    }

    async fn submit(&self, request: &TransactionRequest) -> Result<(), SubmissionError> {
        let tx_id = &request.transaction_id;
        let proposal = ProposalSubmitter::new(self.channel.clone(), self.proposal_timeout)
            .submit(request)
            .await?;
        let classified = classify(proposal.responses)?;
        if let Some(first) = classified.valid.first() {
            info!(
                "txId: {tx_id}. Successfully sent Proposal and received ProposalResponse: Status - {}, message - \"{}\"",
                first.status, first.message
            );
        }

        let handles: Vec<_> = self
            .watched_sources(request)
            .into_iter()
            .map(|source| CommitWatcher::register(source, tx_id.clone(), self.commit_policy).spawn())
            .collect();

        let ordering = OrderingSubmitter::new(self.channel.clone(), self.ordering_timeout);
        let ordering_request = OrderingRequest {
            transaction_id: tx_id.clone(),
            proposal: proposal.proposal,
            endorsements: classified.valid,
        };
        let (ordering_outcome, commit_outcomes) = futures::join!(
            ordering.submit(ordering_request),
            join_all(handles.into_iter().map(|handle| handle.outcome()))
        );

        synthesize(tx_id, &ordering_outcome, commit_outcomes)
    }

    fn watched_sources(&self, request: &TransactionRequest) -> Vec<Arc<dyn EventSource>> {
        let mut sources: Vec<Arc<dyn EventSource>> = Vec::new();
        for source in self.channel.event_sources_for_org() {
            if !sources.iter().any(|seen| seen.peer() == source.peer()) {
                sources.push(source);
            }
        }
        let targeted: Vec<_> = sources
            .iter()
            .filter(|source| request.target_peers.contains(source.peer()))
            .cloned()
            .collect();
        if targeted.is_empty() {
            sources
        } else {
            targeted
        }
    }
}

/// Reduces the joined outcomes to a verdict. An ordering rejection wins;
/// otherwise the first non-committed watcher, in registration order.
pub fn synthesize(
    tx_id: &TransactionId,
    ordering: &OrderingOutcome,
    commits: Vec<(PeerRef, CommitOutcome)>,
) -> Result<(), SubmissionError> {
    let mut failure = match ordering {
        OrderingOutcome::Accepted => None,
        OrderingOutcome::Rejected(status) => Some(SubmissionError::OrderingRejected {
            status: status.clone(),
        }),
    };
    for (peer, outcome) in commits {
        info!("txId: {tx_id}. event results for {peer}: {outcome:?}");
        if let Some(err) = outcome.into_error(&peer) {
            failure.get_or_insert(err);
        }
    }
    match failure {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

#[cfg(test)]
mod coordinator_test {
    use super::*;
    use crate::test_support::{request, ScriptedChannel, ScriptedSource};
    use ledger_common::{ErrorDetail, PeerResponse, TxEvent, ORDERING_TIMEOUT, VALID};

    fn committed(peer: &str, block_number: u64) -> Arc<ScriptedSource> {
        ScriptedSource::new(peer)
            .then(vec![TxEvent::Status {
                code: VALID.into(),
                block_number,
            }])
            .build()
    }

    fn coordinator(channel: Arc<ScriptedChannel>) -> SubmissionCoordinator {
        SubmissionCoordinator::new(channel, &GatewayConfig::default())
    }

    #[test]
    fn ordering_rejection_takes_precedence() {
        let verdict = synthesize(
            &"tx".into(),
            &OrderingOutcome::Rejected("BAD_REQUEST".into()),
            vec![(PeerRef::new("peer0"), CommitOutcome::Invalid("ENDORSEMENT_POLICY_FAILURE".into()))],
        );
        assert_eq!(
            verdict,
            Err(SubmissionError::OrderingRejected {
                status: "BAD_REQUEST".into()
            })
        );
    }

    #[test]
    fn first_failing_watcher_in_registration_order() {
        let verdict = synthesize(
            &"tx".into(),
            &OrderingOutcome::Accepted,
            vec![
                (PeerRef::new("peer0"), CommitOutcome::Committed(3)),
                (PeerRef::new("peer1"), CommitOutcome::TimedOut),
                (PeerRef::new("peer2"), CommitOutcome::Invalid("MVCC_READ_CONFLICT".into())),
            ],
        );
        assert_eq!(
            verdict,
            Err(SubmissionError::CommitTimedOut {
                peer: PeerRef::new("peer1")
            })
        );
    }

    #[test]
    fn all_committed_and_accepted_succeeds() {
        let verdict = synthesize(
            &"tx".into(),
            &OrderingOutcome::Accepted,
            vec![
                (PeerRef::new("peer0"), CommitOutcome::Committed(3)),
                (PeerRef::new("peer1"), CommitOutcome::Committed(3)),
            ],
        );
        assert_eq!(verdict, Ok(()));
    }

    #[tokio::test(start_paused = true)]
    async fn three_peers_commit() {
        let channel = ScriptedChannel::new()
            .sources(vec![committed("peer0", 5), committed("peer1", 5), committed("peer2", 5)])
            .build();
        let result = coordinator(channel.clone())
            .run(&request(&["peer0", "peer1", "peer2"]))
            .await;
        assert!(result.is_success());
        assert_eq!(result.transaction_id, Some("tx-test".into()));
        assert_eq!(channel.subscribed_before_ordering(), Some(true));
    }

    #[tokio::test(start_paused = true)]
    async fn all_proposals_error() {
        let failures = ["peer0", "peer1", "peer2"]
            .iter()
            .map(|peer| {
                PeerResponse::Failed(ErrorDetail {
                    peer: PeerRef::new(*peer),
                    status: 500,
                    message: "chaincode error".into(),
                })
            })
            .collect();
        let channel = ScriptedChannel::new()
            .responses(failures)
            .sources(vec![committed("peer0", 5)])
            .build();
        let result = coordinator(channel.clone())
            .run(&request(&["peer0", "peer1", "peer2"]))
            .await;
        match result.failure_reason() {
            Some(SubmissionError::NoValidResponses(errors)) => assert_eq!(errors.len(), 3),
            other => panic!("unexpected failure {:?}", other),
        }
        assert_eq!(channel.ordering_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn ordering_timeout_fails_despite_commits() {
        let channel = ScriptedChannel::new()
            .ordering_delay(Duration::from_secs(60))
            .sources(vec![committed("peer0", 5), committed("peer1", 5)])
            .build();
        let result = coordinator(channel)
            .run(&request(&["peer0", "peer1"]))
            .await;
        assert_eq!(
            result.failure_reason(),
            Some(&SubmissionError::OrderingRejected {
                status: ORDERING_TIMEOUT.into()
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_commit_fails_submission() {
        let invalid = ScriptedSource::new("peer1")
            .then(vec![TxEvent::Status {
                code: "MVCC_READ_CONFLICT".into(),
                block_number: 5,
            }])
            .build();
        let channel = ScriptedChannel::new()
            .sources(vec![committed("peer0", 5), invalid])
            .build();
        let result = coordinator(channel)
            .run(&request(&["peer0", "peer1"]))
            .await;
        assert_eq!(
            result.failure_reason(),
            Some(&SubmissionError::CommitInvalid {
                peer: PeerRef::new("peer1"),
                code: "MVCC_READ_CONFLICT".into()
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn only_targeted_peers_are_watched() {
        let untargeted = ScriptedSource::new("peer9").build();
        let channel = ScriptedChannel::new()
            .sources(vec![committed("peer0", 5), untargeted.clone(), committed("peer0", 5)])
            .build();
        let result = coordinator(channel).run(&request(&["peer0"])).await;
        assert!(result.is_success());
        assert_eq!(untargeted.subscribe_calls(), 0);
    }
}
