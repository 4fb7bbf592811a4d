use crate::{SubmissionError, TransactionId};

use std::borrow::Cow;
use std::fmt;

use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

pub const VALID: &str = "VALID";
pub const ORDERING_SUCCESS: &str = "SUCCESS";
pub const ORDERING_TIMEOUT: &str = "TIMEOUT";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerRef(String);

impl PeerRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerRef {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TransactionRequest {
    pub target_peers: Vec<PeerRef>,
    pub chaincode_id: String,
    pub function_name: String,
    pub arguments: Vec<String>,
    pub channel_id: String,
    pub transaction_id: TransactionId,
    pub created_at: DateTime<Utc>,
}

impl TransactionRequest {
    /// Target peers are deduplicated, keeping the first occurrence of each.
    pub fn new(
        channel_id: impl Into<String>,
        chaincode_id: impl Into<String>,
        function_name: impl Into<String>,
        arguments: Vec<String>,
        target_peers: Vec<PeerRef>,
        transaction_id: TransactionId,
    ) -> Self {
        let mut peers: Vec<PeerRef> = Vec::with_capacity(target_peers.len());
        for peer in target_peers {
            if !peers.contains(&peer) {
                peers.push(peer);
            }
        }
        Self {
            target_peers: peers,
            chaincode_id: chaincode_id.into(),
            function_name: function_name.into(),
            arguments,
            channel_id: channel_id.into(),
            transaction_id,
            created_at: Utc::now(),
        }
    }

    /// Time since the request was built. Clamped at zero if the clock stepped back.
    pub fn age(&self) -> Duration {
        (Utc::now() - self.created_at).max(Duration::zero())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endorsement {
    pub peer: PeerRef,
    pub status: u32,
    pub message: String,
    pub payload: Bytes,
}

impl Endorsement {
    pub fn payload_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub peer: PeerRef,
    pub status: u32,
    pub message: String,
}

impl fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "peer={}, status={}, message={}",
            self.peer, self.status, self.message
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PeerResponse {
    Endorsed(Endorsement),
    Failed(ErrorDetail),
}

impl PeerResponse {
    pub fn peer(&self) -> &PeerRef {
        match self {
            PeerResponse::Endorsed(endorsement) => &endorsement.peer,
            PeerResponse::Failed(detail) => &detail.peer,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Proposal {
    pub transaction_id: TransactionId,
    pub header: Bytes,
}

#[derive(Debug, Clone)]
pub struct ProposalResult {
    pub responses: Vec<PeerResponse>,
    pub proposal: Proposal,
}

#[derive(Debug, Clone)]
pub struct OrderingRequest {
    pub transaction_id: TransactionId,
    pub proposal: Proposal,
    pub endorsements: Vec<Endorsement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderingOutcome {
    Accepted,
    Rejected(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxEvent {
    Status { code: String, block_number: u64 },
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommitOutcome {
    Committed(u64),
    Invalid(String),
    TimedOut,
    ConnectionFailed(String),
}

impl CommitOutcome {
    pub fn into_error(self, peer: &PeerRef) -> Option<SubmissionError> {
        match self {
            CommitOutcome::Committed(_) => None,
            CommitOutcome::Invalid(code) => Some(SubmissionError::CommitInvalid {
                peer: peer.clone(),
                code,
            }),
            CommitOutcome::TimedOut => Some(SubmissionError::CommitTimedOut { peer: peer.clone() }),
            CommitOutcome::ConnectionFailed(reason) => {
                Some(SubmissionError::CommitConnectionFailed {
                    peer: peer.clone(),
                    reason,
                })
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmissionOutcome {
    Success,
    Failure(SubmissionError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionResult {
    /// Absent when the run failed before an id could be allocated.
    pub transaction_id: Option<TransactionId>,
    pub outcome: SubmissionOutcome,
}

impl SubmissionResult {
    pub fn success(transaction_id: TransactionId) -> Self {
        Self {
            transaction_id: Some(transaction_id),
            outcome: SubmissionOutcome::Success,
        }
    }

    pub fn failure(transaction_id: Option<TransactionId>, reason: SubmissionError) -> Self {
        Self {
            transaction_id,
            outcome: SubmissionOutcome::Failure(reason),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == SubmissionOutcome::Success
    }

    pub fn failure_reason(&self) -> Option<&SubmissionError> {
        match &self.outcome {
            SubmissionOutcome::Success => None,
            SubmissionOutcome::Failure(reason) => Some(reason),
        }
    }

    pub fn describe(&self) -> String {
        match (&self.outcome, &self.transaction_id) {
            (SubmissionOutcome::Success, Some(tx_id)) => {
                format!("Successfully invoked chaincode. transaction ID: {tx_id}")
            }
            (SubmissionOutcome::Success, None) => "Successfully invoked chaincode".to_string(),
            (SubmissionOutcome::Failure(reason), _) => {
                format!("Failed to invoke chaincode. cause:{reason}")
            }
        }
    }
}
