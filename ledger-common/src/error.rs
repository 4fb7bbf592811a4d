use crate::{ErrorDetail, PeerRef};

use std::error::Error;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail")]
pub enum SubmissionError {
    ProposalSend(String),
    ProposalUnavailable,
    NoValidResponses(Vec<ErrorDetail>),
    CommitTimedOut { peer: PeerRef },
    CommitInvalid { peer: PeerRef, code: String },
    CommitConnectionFailed { peer: PeerRef, reason: String },
    OrderingRejected { status: String },
    ChannelNotFound(String),
    Auth(String),
    MalformedPayload(String),
    /// A block, transaction or peer asked for by a ledger query does not exist.
    NotFound(String),
    LedgerQuery(String),
    Internal(String),
}

impl Error for SubmissionError {}

impl fmt::Display for SubmissionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmissionError::ProposalSend(reason) => {
                write!(f, "failed to send transaction proposal: {reason}")
            }
            SubmissionError::ProposalUnavailable => {
                f.write_str("Unable to obtain transaction proposal")
            }
            SubmissionError::NoValidResponses(errors) => {
                write!(
                    f,
                    "No valid responses from any peers. {} peer error responses:",
                    errors.len()
                )?;
                for detail in errors {
                    write!(f, "\n    {detail}")?;
                }
                Ok(())
            }
            SubmissionError::CommitTimedOut { peer } => write!(f, "REQUEST_TIMEOUT:{peer}"),
            SubmissionError::CommitInvalid { peer, code } => write!(
                f,
                "The invoke chaincode transaction was invalid on {peer}, code:{code}"
            ),
            SubmissionError::CommitConnectionFailed { peer, reason } => {
                write!(f, "Failed to receive the block event from {peer}: {reason}")
            }
            SubmissionError::OrderingRejected { status } => {
                write!(f, "Failed to order the transaction. Error code: {status}")
            }
            SubmissionError::ChannelNotFound(name) => {
                write!(f, "Channel {name} was not defined in the connection profile")
            }
            SubmissionError::Auth(reason) => {
                write!(f, "failed to obtain a client session: {reason}")
            }
            SubmissionError::MalformedPayload(reason) => {
                write!(f, "query payload is not valid JSON: {reason}")
            }
            SubmissionError::NotFound(what) => write!(f, "{what} was not found on the ledger"),
            SubmissionError::LedgerQuery(reason) => {
                write!(f, "failed to query the ledger: {reason}")
            }
            SubmissionError::Internal(reason) => f.write_str(reason),
        }
    }
}

#[derive(Debug)]
pub struct ChannelError {
    context: String,
    source: Option<Box<dyn Error + Send + Sync>>,
}

impl ChannelError {
    pub fn new(context: &str) -> Self {
        Self {
            context: context.into(),
            source: None,
        }
    }

    pub fn new_with_source(context: &str, err: Box<dyn Error + Send + Sync>) -> Self {
        Self {
            context: context.into(),
            source: Some(err),
        }
    }
}

impl Error for ChannelError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source.as_ref().map(|err| err.as_ref() as &(dyn Error + 'static))
    }
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(ref err) = self.source {
            write!(f, "{}: {}", self.context, err)
        } else {
            f.write_str(&self.context)
        }
    }
}
